//! Payload compression.
//!
//! Shrinks large payloads with zlib deflate before the (textual)
//! transport layer, encoding the binary result as base64. Running
//! statistics make the compress-vs-skip trade-off observable.

use std::io::{Read, Write};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;

use crate::error_handling::CompressionError;

/// Tunables for the compression stage.
#[derive(Debug, Clone)]
pub struct CompressionSettings {
    /// Serialized size (bytes) at or above which payloads are compressed.
    pub threshold: usize,
    /// Deflate level, 0 (store) through 9 (best).
    pub level: u32,
}

/// Read-only snapshot of compression activity.
#[derive(Debug, Clone)]
pub struct CompressionStats {
    /// Payloads run through the encoder.
    pub payloads_compressed: u64,
    /// Uncompressed bytes in.
    pub total_bytes_in: u64,
    /// Compressed bytes out (pre-base64).
    pub total_bytes_out: u64,
    /// Bytes saved across all payloads (zero when compression inflated).
    pub bytes_saved: u64,
    /// Running mean of compressed/original per payload.
    pub average_ratio: f64,
    /// Cumulative wall-clock time spent compressing.
    pub total_time: Duration,
}

#[derive(Default)]
struct StatsInner {
    payloads_compressed: u64,
    total_bytes_in: u64,
    total_bytes_out: u64,
    average_ratio: f64,
    total_time: Duration,
}

/// Deflate/base64 codec with running statistics.
pub struct CompressionService {
    settings: Mutex<CompressionSettings>,
    stats: Mutex<StatsInner>,
}

impl CompressionService {
    /// Creates a service with the given settings.
    pub fn new(settings: CompressionSettings) -> Self {
        CompressionService {
            settings: Mutex::new(settings),
            stats: Mutex::new(StatsInner::default()),
        }
    }

    /// True iff the serialized payload meets the compression threshold.
    pub fn should_compress(&self, payload: &[u8]) -> bool {
        payload.len()
            >= self
                .settings
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .threshold
    }

    /// Whether the deflate codec is available in this build.
    ///
    /// Always true here; callers skip compression rather than fail when
    /// a port lands somewhere without the codec.
    pub fn is_supported(&self) -> bool {
        true
    }

    /// Deflates `payload` and encodes the result as base64 text.
    pub fn compress(&self, payload: &[u8]) -> Result<String, CompressionError> {
        let level = self
            .settings
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .level;

        let start = Instant::now();
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level));
        encoder.write_all(payload)?;
        let compressed = encoder.finish()?;
        let encoded = BASE64.encode(&compressed);
        let elapsed = start.elapsed();

        let mut stats = self
            .stats
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        stats.payloads_compressed += 1;
        stats.total_bytes_in += payload.len() as u64;
        stats.total_bytes_out += compressed.len() as u64;
        stats.total_time += elapsed;
        let ratio = if payload.is_empty() {
            1.0
        } else {
            compressed.len() as f64 / payload.len() as f64
        };
        // Simple running mean over all payloads
        let n = stats.payloads_compressed as f64;
        stats.average_ratio += (ratio - stats.average_ratio) / n;

        Ok(encoded)
    }

    /// Reverses [`compress`](Self::compress): base64 → inflate → UTF-8 →
    /// JSON. Raises the error of the first failing stage and never
    /// returns a partial value.
    pub fn decompress<T: DeserializeOwned>(&self, encoded: &str) -> Result<T, CompressionError> {
        let compressed = BASE64.decode(encoded)?;
        let mut decoder = ZlibDecoder::new(compressed.as_slice());
        let mut bytes = Vec::new();
        decoder.read_to_end(&mut bytes)?;
        let text = String::from_utf8(bytes)?;
        let value = serde_json::from_str(&text)?;
        Ok(value)
    }

    /// Snapshot of compression activity.
    pub fn stats(&self) -> CompressionStats {
        let stats = self
            .stats
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        CompressionStats {
            payloads_compressed: stats.payloads_compressed,
            total_bytes_in: stats.total_bytes_in,
            total_bytes_out: stats.total_bytes_out,
            bytes_saved: stats.total_bytes_in.saturating_sub(stats.total_bytes_out),
            average_ratio: stats.average_ratio,
            total_time: stats.total_time,
        }
    }

    /// Applies new settings to subsequent payloads.
    pub fn reconfigure(&self, settings: CompressionSettings) {
        *self
            .settings
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = settings;
    }
}
