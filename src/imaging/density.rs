//! Minimal pixel-density probe for JPEG and PNG byte buffers.
//!
//! The `image` crate decodes pixels but drops the resolution fields, so the
//! metadata operation reads them straight from the container:
//!
//! - JPEG: JFIF APP0 segment (`units`, `Xdensity`, `Ydensity`).
//! - PNG: `pHYs` chunk (pixels per unit, unit 1 = metre).
//!
//! Densities are reported in pixels per inch. Anything unparseable yields `None`.

use crate::types::ImageFormat;

const INCH_PER_CM: f64 = 2.54;
const INCH_PER_M: f64 = 0.0254;

/// Read the declared horizontal pixel density, dispatching by format.
pub fn read_density(data: &[u8], format: ImageFormat) -> Option<f64> {
    match format {
        ImageFormat::Jpeg => read_density_from_jpeg(data),
        ImageFormat::Png => read_density_from_png(data),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// JPEG: JFIF APP0
// ---------------------------------------------------------------------------

const JFIF_IDENTIFIER: &[u8] = b"JFIF\0";

/// Walk JPEG markers up to the first scan and parse the JFIF APP0 segment.
fn read_density_from_jpeg(data: &[u8]) -> Option<f64> {
    if !data.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];
        // SOS (0xDA) means image data starts, stop scanning
        if marker == 0xDA || marker == 0xD9 {
            return None;
        }
        // Fill bytes and markers without a length field
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        if (0xD0..=0xD7).contains(&marker) || marker == 0x01 {
            pos += 2;
            continue;
        }

        let seg_len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        let seg_start = pos + 4;
        let seg_end = (pos + 2 + seg_len).min(data.len());
        if marker == 0xE0 && seg_start <= seg_end {
            if let Some(density) = parse_jfif(&data[seg_start..seg_end]) {
                return Some(density);
            }
        }
        pos += 2 + seg_len;
    }
    None
}

/// APP0 payload: "JFIF\0" (5) + version (2) + units (1) + Xdensity (2) + Ydensity (2).
fn parse_jfif(segment: &[u8]) -> Option<f64> {
    if !segment.starts_with(JFIF_IDENTIFIER) || segment.len() < 12 {
        return None;
    }
    let units = segment[7];
    let x_density = u16::from_be_bytes([segment[8], segment[9]]) as f64;
    if x_density == 0.0 {
        return None;
    }
    match units {
        1 => Some(x_density),
        2 => Some(round_density(x_density * INCH_PER_CM)),
        // 0 = aspect ratio only, no absolute density
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// PNG: pHYs chunk
// ---------------------------------------------------------------------------

const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Walk PNG chunks until `pHYs` or `IDAT` (pHYs must precede image data).
fn read_density_from_png(data: &[u8]) -> Option<f64> {
    if !data.starts_with(PNG_SIGNATURE) {
        return None;
    }
    let mut pos = PNG_SIGNATURE.len();
    while pos + 8 <= data.len() {
        let length =
            u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]) as usize;
        let kind = &data[pos + 4..pos + 8];
        let body_start = pos + 8;
        let body_end = body_start.checked_add(length)?;
        if body_end > data.len() {
            return None;
        }
        match kind {
            b"pHYs" if length == 9 => {
                let body = &data[body_start..body_end];
                let ppu_x = u32::from_be_bytes([body[0], body[1], body[2], body[3]]) as f64;
                // Unit 1 = metre; 0 = unknown (aspect ratio only)
                return (body[8] == 1 && ppu_x > 0.0).then(|| round_density(ppu_x * INCH_PER_M));
            }
            b"IDAT" | b"IEND" => return None,
            _ => {}
        }
        // Chunk body + 4-byte CRC
        pos = body_end + 4;
    }
    None
}

/// Round to two decimals so 2835 px/m reads as 72.01 rather than 72.009.
fn round_density(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
