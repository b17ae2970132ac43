//! Kurtosis measurement backends.
//!
//! Measuring is the expensive step the brightness cache exists to avoid.
//! The default backend shells out to ImageMagick's `identify`; the native
//! backend decodes the image in-process.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum MeasureError {
    #[error("no usable kurtosis for {}: {reason}", path.display())]
    MeasurementFailed { path: PathBuf, reason: String },
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl MeasureError {
    fn failed(path: &Path, reason: impl Into<String>) -> Self {
        MeasureError::MeasurementFailed {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Anything that turns an image into a kurtosis score.
pub trait KurtosisMeter: Send + Sync {
    fn measure(&self, path: &Path) -> Result<f64, MeasureError>;

    fn name(&self) -> &'static str;
}

/// Which meter to use, from the `[measure]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MeasureBackend {
    /// `identify` when installed, native otherwise
    #[default]
    Auto,
    Identify,
    Native,
}

pub fn meter_for(backend: MeasureBackend) -> Arc<dyn KurtosisMeter> {
    match backend {
        MeasureBackend::Identify => Arc::new(IdentifyMeter::default()),
        MeasureBackend::Native => Arc::new(NativeMeter::default()),
        MeasureBackend::Auto => match which::which("identify") {
            Ok(program) => {
                debug!("using {} for brightness measurement", program.display());
                Arc::new(IdentifyMeter { program })
            }
            Err(_) => {
                info!("ImageMagick 'identify' not found, measuring images in-process");
                Arc::new(NativeMeter::default())
            }
        },
    }
}

/// Runs `identify -verbose` and reads the overall kurtosis statistic.
#[derive(Debug, Clone)]
pub struct IdentifyMeter {
    pub program: PathBuf,
}

impl Default for IdentifyMeter {
    fn default() -> Self {
        Self {
            program: PathBuf::from("identify"),
        }
    }
}

impl KurtosisMeter for IdentifyMeter {
    fn measure(&self, path: &Path) -> Result<f64, MeasureError> {
        let output = Command::new(&self.program)
            .arg("-verbose")
            .arg(path)
            .output()
            .map_err(|source| MeasureError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MeasureError::failed(path, stderr.trim().to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_identify_output(&stdout)
            .ok_or_else(|| MeasureError::failed(path, "identify printed no kurtosis"))
    }

    fn name(&self) -> &'static str {
        "identify"
    }
}

/// Kurtosis from `identify -verbose` output.
///
/// Per-channel statistics come first; the last `kurtosis:` line is the
/// overall value.
pub fn parse_identify_output(output: &str) -> Option<f64> {
    let line = output.lines().rev().find(|l| l.contains("kurtosis:"))?;
    let value = line.split_whitespace().nth(1)?;
    value.parse::<f64>().ok().filter(|k| k.is_finite())
}

/// Decodes the image with the `image` crate and computes the excess
/// kurtosis of all RGB samples.
#[derive(Debug, Clone)]
pub struct NativeMeter {
    /// Images are downsampled so neither side exceeds this
    pub max_dimension: u32,
}

impl Default for NativeMeter {
    fn default() -> Self {
        Self { max_dimension: 256 }
    }
}

impl KurtosisMeter for NativeMeter {
    fn measure(&self, path: &Path) -> Result<f64, MeasureError> {
        let img = image::open(path).map_err(|e| MeasureError::failed(path, e.to_string()))?;
        let img = if img.width() > self.max_dimension || img.height() > self.max_dimension {
            img.thumbnail(self.max_dimension, self.max_dimension)
        } else {
            img
        };
        let rgb = img.to_rgb8();

        excess_kurtosis(rgb.as_raw())
            .ok_or_else(|| MeasureError::failed(path, "image has no tonal variation"))
    }

    fn name(&self) -> &'static str {
        "native"
    }
}

/// Excess kurtosis (normal distribution = 0) of 8-bit samples.
///
/// `None` for empty input or zero variance.
pub fn excess_kurtosis(samples: &[u8]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let n = samples.len() as f64;
    let mean = samples.par_iter().map(|&v| f64::from(v)).sum::<f64>() / n;

    let (m2, m4) = samples
        .par_iter()
        .map(|&v| {
            let d = f64::from(v) - mean;
            let d2 = d * d;
            (d2, d2 * d2)
        })
        .reduce(|| (0.0, 0.0), |a, b| (a.0 + b.0, a.1 + b.1));

    let variance = m2 / n;
    if variance <= f64::EPSILON {
        return None;
    }
    Some((m4 / n) / (variance * variance) - 3.0)
}
