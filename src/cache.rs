//! Process-wide codec result cache.
//!
//! Decoding and (especially) AVIF encoding dominate request time. Clients
//! re-uploading the same image with the same options are common, so the codec
//! keeps a bounded cache of recent results.
//!
//! # Design
//!
//! ## Cache keys
//!
//! The cache is **content-addressed**: lookups are by SHA-256 digest, never
//! by request identity.
//!
//! - **Decode entries**: digest of the encoded input bytes.
//! - **Encode entries**: digest of the pixel buffer, its dimensions and
//!   colour type, plus every field of the resolved
//!   [`EncodeParams`](crate::imaging::params::EncodeParams). Changing any
//!   parameter (quality, effort, subsampling, ...) yields a different key.
//!
//! ## Eviction
//!
//! Both kinds share two bounds: an entry count (`max_entries`) and a byte
//! budget (`max_bytes`). An entry weighs its pixel buffer (decodes) or its
//! encoded length (encodes). Inserting evicts least recently used entries
//! until both bounds hold; a single value heavier than the whole budget is
//! not stored. `max_entries = 0` or `max_bytes = 0` disables caching: every
//! lookup misses and nothing is stored.
//!
//! ## Sharing
//!
//! The [`LruCache`] sits behind a [`Mutex`]; the critical sections only touch
//! the map, never pixels, so contention is negligible next to codec work.

use crate::imaging::ImageAsset;
use crate::imaging::params::EncodeParams;
use image::DynamicImage;
use lru::LruCache;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Mutex;

/// A cached codec result.
#[derive(Debug, Clone)]
pub enum CachedValue {
    Decoded(ImageAsset),
    Encoded(Vec<u8>),
}

impl CachedValue {
    /// Bytes held: the decoded pixel buffer or the encoded output.
    pub fn weight(&self) -> u64 {
        let len = match self {
            Self::Decoded(asset) => asset.image().as_bytes().len(),
            Self::Encoded(bytes) => bytes.len(),
        };
        len as u64
    }
}

struct CacheInner {
    entries: LruCache<String, CachedValue>,
    /// Sum of the weights of `entries`.
    bytes: u64,
    stats: CacheStats,
}

/// Least-recently-used cache of decode and encode results, bounded by entry
/// count and total bytes.
pub struct CodecCache {
    max_entries: usize,
    max_bytes: u64,
    inner: Mutex<CacheInner>,
}

impl fmt::Debug for CodecCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecCache")
            .field("max_entries", &self.max_entries)
            .field("max_bytes", &self.max_bytes)
            .finish_non_exhaustive()
    }
}

impl CodecCache {
    pub fn new(max_entries: usize, max_bytes: u64) -> Self {
        Self {
            max_entries,
            max_bytes,
            inner: Mutex::new(CacheInner {
                entries: LruCache::unbounded(),
                bytes: 0,
                stats: CacheStats::default(),
            }),
        }
    }

    #[cfg(test)]
    pub(crate) fn max_entries(&self) -> usize {
        self.max_entries
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock().entries.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub(crate) fn bytes(&self) -> u64 {
        self.lock().bytes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner> {
        // A panic while holding the lock leaves the map consistent (all
        // mutations are single calls), so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Look up a cached value, marking it most recently used.
    pub fn get(&self, key: &str) -> Option<CachedValue> {
        let mut inner = self.lock();
        let found = inner.entries.get(key).cloned();
        match found {
            Some(_) => inner.stats.hit(),
            None => inner.stats.miss(),
        }
        found
    }

    /// Store a value, evicting least recently used entries until both the
    /// entry and byte bounds hold.
    pub fn insert(&self, key: String, value: CachedValue) {
        let weight = value.weight();
        if self.max_entries == 0 || self.max_bytes == 0 || weight > self.max_bytes {
            return;
        }
        let mut inner = self.lock();
        if let Some(replaced) = inner.entries.put(key, value) {
            inner.bytes = inner.bytes.saturating_sub(replaced.weight());
        }
        inner.bytes += weight;
        while inner.entries.len() > self.max_entries || inner.bytes > self.max_bytes {
            let Some((_, evicted)) = inner.entries.pop_lru() else {
                break;
            };
            inner.bytes = inner.bytes.saturating_sub(evicted.weight());
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.lock().stats
    }
}

/// SHA-256 of an encoded input buffer, as a hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"decode\0");
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// SHA-256 of decoded pixels plus the encode parameters.
///
/// Inputs: pixel bytes, dimensions, colour type and every encode parameter.
/// If any of these change, a previously cached encoding is not reused.
pub fn hash_encode_request(image: &DynamicImage, params: &EncodeParams) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"encode\0");
    hasher.update(image.width().to_le_bytes());
    hasher.update(image.height().to_le_bytes());
    hasher.update(format!("{:?}", image.color()).as_bytes());
    hasher.update(image.as_bytes());
    match *params {
        EncodeParams::Avif {
            quality,
            effort,
            chroma_subsampling,
        } => {
            hasher.update(b"avif\0");
            hasher.update([quality.value(), effort]);
            hasher.update(chroma_subsampling.to_string().as_bytes());
        }
        EncodeParams::Webp {
            quality,
            effort,
            smart_subsample,
        } => {
            hasher.update(b"webp\0");
            hasher.update([quality.value(), effort, u8::from(smart_subsample)]);
        }
        EncodeParams::Jpeg {
            quality,
            progressive,
            optimize_coding,
        } => {
            hasher.update(b"jpeg\0");
            hasher.update([
                quality.value(),
                u8::from(progressive),
                u8::from(optimize_coding),
            ]);
        }
        EncodeParams::Png {
            compression_level,
            progressive,
        } => {
            hasher.update(b"png\0");
            hasher.update([compression_level, u8::from(progressive)]);
        }
    }
    format!("{:x}", hasher.finalize())
}

/// Summary of cache performance since startup.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} hits, {} misses", self.hits, self.misses)
    }
}
