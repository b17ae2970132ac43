mod cache;
mod index;
mod scan;

pub use index::list_images;
pub use scan::{ScanJob, ScanSummary};

use crate::brightness::{effective_bucket, BrightnessBucket};
use crate::measure::{KurtosisMeter, MeasureError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Database schema version stored in the `info` table
pub const SCHEMA_VERSION: &str = "0.3";

/// One known image.
#[derive(Debug, Clone, PartialEq)]
pub struct WallpaperRecord {
    pub path: PathBuf,
    /// Measured kurtosis, `None` until measured
    pub kurtosis: Option<f64>,
    /// User override, always wins over the kurtosis
    pub defined_brightness: Option<BrightnessBucket>,
    /// Reserved; not used for selection
    pub rating: Option<i64>,
}

impl WallpaperRecord {
    /// Bucket this image counts as, if known.
    pub fn bucket(&self) -> Option<BrightnessBucket> {
        effective_bucket(self.kurtosis, self.defined_brightness)
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("wallpaper database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to prepare {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Measurement(#[from] MeasureError),
    #[error("path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),
}

/// Whether `get_or_compute` hit the store or ran the meter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup {
    Cached(f64),
    Measured(f64),
}

impl Lookup {
    pub fn kurtosis(self) -> f64 {
        match self {
            Lookup::Cached(k) | Lookup::Measured(k) => k,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub total: usize,
    pub measured: usize,
    pub overridden: usize,
    pub dark: usize,
    pub medium: usize,
    pub bright: usize,
    /// Neither measured nor overridden
    pub unknown: usize,
}

impl CacheStats {
    pub fn from_records(records: &[WallpaperRecord]) -> Self {
        let mut stats = CacheStats {
            total: records.len(),
            ..Default::default()
        };

        for record in records {
            if record.kurtosis.is_some() {
                stats.measured += 1;
            }
            if record.defined_brightness.is_some() {
                stats.overridden += 1;
            }
            match record.bucket() {
                Some(BrightnessBucket::Dark) => stats.dark += 1,
                Some(BrightnessBucket::Medium) => stats.medium += 1,
                Some(BrightnessBucket::Bright) => stats.bright += 1,
                None => stats.unknown += 1,
            }
        }

        stats
    }

    pub fn in_bucket(&self, bucket: BrightnessBucket) -> usize {
        match bucket {
            BrightnessBucket::Dark => self.dark,
            BrightnessBucket::Medium => self.medium,
            BrightnessBucket::Bright => self.bright,
        }
    }
}

/// Persistent path -> kurtosis store backed by SQLite.
///
/// Every operation opens its own connection, so clones can be used from
/// the scan worker and the selector at the same time.
#[derive(Clone)]
pub struct BrightnessCache {
    db_path: PathBuf,
    meter: Arc<dyn KurtosisMeter>,
}

/// `root` as a string prefix with exactly one trailing separator, so that
/// `/a` never matches `/ab`.
pub(crate) fn root_prefix(root: &Path) -> Result<String, CacheError> {
    let root_str = root
        .to_str()
        .ok_or_else(|| CacheError::NonUtf8Path(root.to_path_buf()))?;
    let trimmed = root_str.trim_end_matches('/');
    Ok(format!("{trimmed}/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kurtosis: Option<f64>, defined: Option<BrightnessBucket>) -> WallpaperRecord {
        WallpaperRecord {
            path: PathBuf::from("/walls/x.png"),
            kurtosis,
            defined_brightness: defined,
            rating: None,
        }
    }

    #[test]
    fn root_prefix_normalizes_trailing_slash() {
        assert_eq!(root_prefix(Path::new("/a")).expect("utf8"), "/a/");
        assert_eq!(root_prefix(Path::new("/a/")).expect("utf8"), "/a/");
        assert_eq!(root_prefix(Path::new("/a//")).expect("utf8"), "/a/");
        assert_eq!(root_prefix(Path::new("/")).expect("utf8"), "/");
    }

    #[test]
    fn stats_count_effective_buckets() {
        let records = vec![
            record(Some(-1.0), None),
            record(Some(1.0), None),
            record(Some(5.0), Some(BrightnessBucket::Bright)),
            record(None, Some(BrightnessBucket::Dark)),
            record(None, None),
        ];
        let stats = CacheStats::from_records(&records);
        assert_eq!(stats.total, 5);
        assert_eq!(stats.measured, 3);
        assert_eq!(stats.overridden, 2);
        assert_eq!(stats.bright, 2);
        assert_eq!(stats.medium, 1);
        assert_eq!(stats.dark, 1);
        assert_eq!(stats.unknown, 1);
    }
}
