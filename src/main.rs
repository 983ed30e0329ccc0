use clap::{Parser, Subcommand};
use imagepipe::config::{self, PipelineConfig};
use imagepipe::imaging::{CodecError, RustCodec};
use imagepipe::output;
use imagepipe::pipeline::{Pipeline, PipelineError};
use imagepipe::plan::OperationKind;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;

#[derive(Parser)]
#[command(name = "imagepipe")]
#[command(about = "Decode, transform and re-encode images with compression metrics")]
#[command(long_about = "\
Decode, transform and re-encode images with compression metrics

Operations:

  convert   re-encode to another format (default avif), optional resize
  compress  re-encode with a quality setting, keeping the source format
  resize    scale to a width and/or height (fit: cover, contain, fill, inside, outside)
  process   any combination of rotate, flip, flop, grayscale, blur, sharpen,
            normalize and resize, then encode
  metadata  print decoded image metadata as JSON
  validate  check whether a file decodes as a supported image

Options are passed as key=value pairs; dotted keys build nested objects:

  imagepipe process in.jpg -o out.webp --set format=webp --set rotate=90 \\
      --set resize.width=300 --set resize.fit=contain

Run 'imagepipe gen-config' to generate a documented config file.")]
#[command(version)]
struct Cli {
    /// Pipeline config file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Input, output and options shared by the encoding commands.
#[derive(clap::Args, Clone)]
struct RunArgs {
    /// Source image
    input: PathBuf,

    /// Where to write the encoded result
    #[arg(short, long)]
    output: PathBuf,

    /// Operation option as key=value (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Re-encode to another format
    Convert(RunArgs),
    /// Re-encode with a quality setting
    Compress(RunArgs),
    /// Resize to a width and/or height
    Resize(RunArgs),
    /// Apply any combination of transforms
    Process(RunArgs),
    /// Print decoded image metadata
    Metadata { input: PathBuf },
    /// Check whether a file is a supported image
    Validate { input: PathBuf },
    /// Print a stock config file with all options documented
    GenConfig,
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error("{0}")]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid --set '{0}': expected KEY=VALUE")]
    BadOption(String),
}

impl CliError {
    fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_error",
            Self::Codec(_) => "codec_error",
            Self::Pipeline(e) => e.kind(),
            Self::Io { .. } => "io_error",
            Self::Json(_) => "output_error",
            Self::BadOption(_) => "invalid_request",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return ExitCode::SUCCESS;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error [{}]: {}", e.kind(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = config::load_config(cli.config.as_deref())?;
    init_logging(&config);

    let codec = RustCodec::with_max_input_pixels(config.codec.max_input_pixels)
        .with_cache_max_bytes(config.codec.cache_max_bytes);
    let pipeline = Pipeline::new(codec, config)?;

    match cli.command {
        Command::Convert(args) => encode_command(&pipeline, OperationKind::Convert, &args),
        Command::Compress(args) => encode_command(&pipeline, OperationKind::Compress, &args),
        Command::Resize(args) => encode_command(&pipeline, OperationKind::Resize, &args),
        Command::Process(args) => encode_command(&pipeline, OperationKind::Process, &args),
        Command::Metadata { input } => {
            let record = pipeline.metadata(&read_input(&input)?)?;
            output::print_json(&record)?;
            Ok(())
        }
        Command::Validate { input } => {
            let outcome = pipeline.validate(&read_input(&input)?);
            output::print_json(&outcome)?;
            Ok(())
        }
        Command::GenConfig => Ok(()),
    }
}

fn encode_command(
    pipeline: &Pipeline<RustCodec>,
    kind: OperationKind,
    args: &RunArgs,
) -> Result<(), CliError> {
    let options = options_from_pairs(&args.set)?;
    let bytes = read_input(&args.input)?;
    let result = pipeline.run(kind, &bytes, &options)?;
    std::fs::write(&args.output, &result.data).map_err(|source| CliError::Io {
        path: args.output.clone(),
        source,
    })?;
    output::print_result_output(&args.input, &args.output, &result);
    tracing::debug!(cache = %pipeline.codec().cache_stats(), "codec cache");
    Ok(())
}

fn read_input(path: &Path) -> Result<Vec<u8>, CliError> {
    std::fs::read(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Install the stderr fmt subscriber at the configured level.
fn init_logging(config: &PipelineConfig) {
    let level = config
        .logging
        .level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

/// Build an option map from `key=value` pairs; `a.b=v` nests `b` under `a`.
///
/// Values stay strings; the plan builder coerces numbers and booleans.
fn options_from_pairs(pairs: &[String]) -> Result<Map<String, Value>, CliError> {
    let mut options = Map::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .filter(|(k, _)| !k.is_empty())
            .ok_or_else(|| CliError::BadOption(pair.clone()))?;

        let mut path: Vec<&str> = key.split('.').collect();
        let leaf = path.pop().unwrap_or(key);
        let mut target = &mut options;
        for segment in path {
            let entry = target
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            target = match entry {
                Value::Object(map) => map,
                _ => return Err(CliError::BadOption(pair.clone())),
            };
        }
        target.insert(leaf.to_string(), Value::String(value.to_string()));
    }
    Ok(options)
}
