//! Loudness measurement of rendered MSU-1 PCM files
//!
//! # PCM layout
//! - bytes 0..4: `MSU1` magic
//! - bytes 4..8: loop point in samples (u32 little-endian)
//! - remainder: 44.1 kHz interleaved stereo, 16-bit little-endian
//!
//! Levels are reported in dBFS and floored at the 16-bit noise floor so
//! silent files still produce finite numbers.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

const MSU_MAGIC: &[u8; 4] = b"MSU1";
const HEADER_LEN: usize = 8;
const FULL_SCALE: f64 = 32768.0;
/// Quietest level a 16-bit sample can express
pub const SILENCE_DB: f64 = -96.0;

/// Loudness measurement errors
#[derive(Debug, Error)]
pub enum MeterError {
    /// File missing or unreadable
    #[error("I/O error reading {0}: {1}")]
    Io(PathBuf, std::io::Error),

    /// File is not an MSU-1 PCM
    #[error("Not an MSU-1 PCM file: {0}")]
    InvalidFormat(PathBuf),

    /// Header present but no samples
    #[error("PCM file has no samples: {0}")]
    Empty(PathBuf),

    /// Blocking measurement task failed
    #[error("Measurement task failed: {0}")]
    Task(String),
}

/// Average (RMS) and peak level of one file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub average_db: f64,
    pub peak_db: f64,
}

/// Supplies loudness measurements for the analyzer
#[async_trait]
pub trait LoudnessMeter: Send + Sync {
    async fn measure(&self, path: &Path) -> Result<Measurement, MeterError>;
}

/// Reads MSU-1 PCM files on the blocking thread pool
#[derive(Debug, Clone, Copy, Default)]
pub struct PcmLoudnessMeter;

#[async_trait]
impl LoudnessMeter for PcmLoudnessMeter {
    async fn measure(&self, path: &Path) -> Result<Measurement, MeterError> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || measure_pcm_file(&path))
            .await
            .map_err(|e| MeterError::Task(e.to_string()))?
    }
}

/// Measure a PCM file synchronously
pub fn measure_pcm_file(path: &Path) -> Result<Measurement, MeterError> {
    let bytes = std::fs::read(path).map_err(|e| MeterError::Io(path.to_path_buf(), e))?;
    if bytes.len() < HEADER_LEN || &bytes[..4] != MSU_MAGIC {
        return Err(MeterError::InvalidFormat(path.to_path_buf()));
    }
    let measurement = measure_samples(&bytes[HEADER_LEN..])
        .ok_or_else(|| MeterError::Empty(path.to_path_buf()))?;

    tracing::debug!(
        file = %path.display(),
        average_db = measurement.average_db,
        peak_db = measurement.peak_db,
        "Measured PCM loudness"
    );
    Ok(measurement)
}

/// RMS and peak over 16-bit little-endian samples; `None` when empty
pub fn measure_samples(data: &[u8]) -> Option<Measurement> {
    let mut sum_squares = 0.0_f64;
    let mut peak = 0_u32;
    let mut count = 0_u64;

    for chunk in data.chunks_exact(2) {
        let sample = i16::from_le_bytes([chunk[0], chunk[1]]);
        let value = f64::from(sample);
        sum_squares += value * value;
        peak = peak.max(u32::from(sample.unsigned_abs()));
        count += 1;
    }

    if count == 0 {
        return None;
    }

    let rms = (sum_squares / count as f64).sqrt();
    Some(Measurement {
        average_db: to_dbfs(rms),
        peak_db: to_dbfs(f64::from(peak)),
    })
}

fn to_dbfs(level: f64) -> f64 {
    if level <= 0.0 {
        return SILENCE_DB;
    }
    (20.0 * (level / FULL_SCALE).log10()).max(SILENCE_DB)
}
