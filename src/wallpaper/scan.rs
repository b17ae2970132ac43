//! Background pre-measurement of a whole wallpaper folder.

use super::{list_images, BrightnessCache, CacheError, Lookup};
use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanProgress {
    pub current: usize,
    pub total: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub total: usize,
    /// Measured during this scan
    pub measured: usize,
    /// Already in the store
    pub cached: usize,
    /// Measurement failed, skipped
    pub failed: usize,
    pub cancelled: bool,
}

pub struct ScanJob {
    cache: BrightnessCache,
    root: PathBuf,
    recursive: bool,
}

impl ScanJob {
    pub fn new(cache: BrightnessCache, root: PathBuf, recursive: bool) -> Self {
        Self {
            cache,
            root,
            recursive,
        }
    }

    /// Measure every image under the root that is not cached yet.
    ///
    /// `progress` gets `(0, total)` once the images are listed and then
    /// `(current, total)` after each image. The cancel flag is checked
    /// between images.
    pub fn run<F>(&self, cancel: &AtomicBool, mut progress: F) -> Result<ScanSummary>
    where
        F: FnMut(usize, usize),
    {
        let images = list_images(&self.root, self.recursive)?;
        let total = images.len();
        let mut summary = ScanSummary {
            total,
            ..Default::default()
        };
        info!("scanning {} images in {}", total, self.root.display());
        progress(0, total);

        for (i, path) in images.iter().enumerate() {
            if cancel.load(Ordering::SeqCst) {
                info!("scan cancelled after {} of {} images", i, total);
                summary.cancelled = true;
                break;
            }

            match self.cache.lookup_or_compute(path) {
                Ok(Lookup::Cached(_)) => summary.cached += 1,
                Ok(Lookup::Measured(_)) => summary.measured += 1,
                Err(e @ (CacheError::Measurement(_) | CacheError::NonUtf8Path(_))) => {
                    warn!("skipping {}: {}", path.display(), e);
                    summary.failed += 1;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to scan {}", path.display()))
                }
            }
            progress(i + 1, total);
        }

        debug!("scan finished: {:?}", summary);
        Ok(summary)
    }

    /// Run on a worker thread; progress arrives on the handle's channel.
    pub fn spawn(self) -> Result<ScanHandle> {
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();
        let flag = Arc::clone(&cancel);

        let worker = thread::Builder::new()
            .name("nextwall-scan".into())
            .spawn(move || {
                self.run(&flag, |current, total| {
                    // Receiver gone means nobody is watching; keep measuring.
                    let _ = tx.send(ScanProgress { current, total });
                })
            })
            .context("Failed to start scan thread")?;

        Ok(ScanHandle {
            cancel,
            progress: rx,
            worker,
        })
    }
}

/// A scan running on its own thread.
pub struct ScanHandle {
    cancel: Arc<AtomicBool>,
    progress: Receiver<ScanProgress>,
    worker: JoinHandle<Result<ScanSummary>>,
}

impl ScanHandle {
    /// Setting this flag stops the worker after the current image.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn progress(&self) -> &Receiver<ScanProgress> {
        &self.progress
    }

    pub fn join(self) -> Result<ScanSummary> {
        self.worker
            .join()
            .map_err(|_| anyhow!("scan thread panicked"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::{KurtosisMeter, MeasureError};
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    /// Fails for files named `broken*`, returns 1.0 otherwise.
    #[derive(Default)]
    struct PickyMeter {
        calls: AtomicUsize,
    }

    impl KurtosisMeter for PickyMeter {
        fn measure(&self, path: &Path) -> Result<f64, MeasureError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            if name.starts_with("broken") {
                return Err(MeasureError::MeasurementFailed {
                    path: path.to_path_buf(),
                    reason: "unreadable".into(),
                });
            }
            Ok(1.0)
        }

        fn name(&self) -> &'static str {
            "picky"
        }
    }

    fn setup(files: &[&str]) -> Result<(TempDir, PathBuf, BrightnessCache, Arc<PickyMeter>)> {
        let dir = TempDir::new()?;
        let root = dir.path().join("walls");
        fs::create_dir_all(&root)?;
        for name in files {
            fs::write(root.join(name), b"x")?;
        }
        let meter = Arc::new(PickyMeter::default());
        let cache = BrightnessCache::open(&dir.path().join("nextwall.db"), meter.clone())?;
        Ok((dir, root, cache, meter))
    }

    #[test]
    fn empty_folder_reports_zero_total() -> Result<()> {
        let (_dir, root, cache, _meter) = setup(&[])?;
        let mut seen = Vec::new();

        let summary = ScanJob::new(cache, root, true)
            .run(&AtomicBool::new(false), |c, t| seen.push((c, t)))?;

        assert_eq!(summary, ScanSummary::default());
        assert_eq!(seen, vec![(0, 0)]);
        Ok(())
    }

    #[test]
    fn measures_new_images_and_skips_failures() -> Result<()> {
        let (_dir, root, cache, meter) = setup(&["a.png", "b.png", "broken.png"])?;
        let job = ScanJob::new(cache.clone(), root.clone(), false);

        let first = job.run(&AtomicBool::new(false), |_, _| {})?;
        assert_eq!(first.total, 3);
        assert_eq!(first.measured, 2);
        assert_eq!(first.failed, 1);
        assert!(!first.cancelled);

        let root = root.canonicalize()?;
        assert_eq!(cache.get_kurtosis(&root.join("a.png"))?, Some(1.0));
        assert_eq!(cache.get_kurtosis(&root.join("broken.png"))?, None);

        let second = job.run(&AtomicBool::new(false), |_, _| {})?;
        assert_eq!(second.cached, 2);
        assert_eq!(second.failed, 1);
        // Only the broken image was retried.
        assert_eq!(meter.calls.load(Ordering::SeqCst), 4);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_name_is_skipped_without_stopping_the_batch() -> Result<()> {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let (_dir, root, cache, _meter) = setup(&["a.png", "z.png"])?;
        fs::write(root.join(OsStr::from_bytes(b"bad\xff.png")), b"x")?;

        let summary = ScanJob::new(cache.clone(), root.clone(), false)
            .run(&AtomicBool::new(false), |_, _| {})?;

        assert_eq!(summary.total, 3);
        assert_eq!(summary.measured, 2);
        assert_eq!(summary.failed, 1);
        let root = root.canonicalize()?;
        assert_eq!(cache.get_kurtosis(&root.join("z.png"))?, Some(1.0));
        Ok(())
    }

    #[test]
    fn cancellation_stops_between_images() -> Result<()> {
        let (_dir, root, cache, _meter) = setup(&["a.png", "b.png", "c.png"])?;
        let cancel = AtomicBool::new(false);

        let summary = ScanJob::new(cache.clone(), root.clone(), false).run(&cancel, |current, _| {
            if current == 1 {
                cancel.store(true, Ordering::SeqCst);
            }
        })?;

        assert!(summary.cancelled);
        assert_eq!(summary.measured, 1);
        // Entries written before the cancel are kept.
        assert_eq!(cache.records_under(&root.canonicalize()?)?.len(), 1);
        Ok(())
    }

    #[test]
    fn spawned_scan_streams_progress() -> Result<()> {
        let (_dir, root, cache, _meter) = setup(&["a.png", "b.png"])?;

        let handle = ScanJob::new(cache, root, false).spawn()?;
        let events: Vec<ScanProgress> = handle.progress().iter().collect();
        let summary = handle.join()?;

        assert_eq!(summary.measured, 2);
        assert_eq!(events.first(), Some(&ScanProgress { current: 0, total: 2 }));
        assert_eq!(events.last(), Some(&ScanProgress { current: 2, total: 2 }));
        Ok(())
    }
}
