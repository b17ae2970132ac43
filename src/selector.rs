//! Picks the next wallpaper.
//!
//! Candidates come from the brightness cache, restricted to the configured
//! root. With a time-of-day target only images whose brightness fits are
//! considered; a user override pulls an image into its bucket whatever its
//! kurtosis says. Records whose file has vanished are evicted as they are
//! drawn, and the current background is redrawn a bounded number of times.

use crate::brightness::BrightnessBucket;
use crate::desktop::Desktop;
use crate::wallpaper::{BrightnessCache, CacheError, WallpaperRecord};
use anyhow::Context;
use rand::Rng;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Redraws allowed when the current background comes up again.
pub const MAX_REPEATS: usize = 3;

#[derive(Debug, Error)]
pub enum SelectError {
    #[error("no wallpapers known under {}; a scan may be required", root.display())]
    NoWallpaperFound { root: PathBuf },
    #[error(
        "not enough distinct wallpapers: drew the current background again {attempts} times; \
         add images or widen the folder"
    )]
    InsufficientCandidates { attempts: usize },
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Desktop(anyhow::Error),
}

/// Outcome of a successful change.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub path: PathBuf,
    /// Records dropped because their file no longer exists
    pub evicted: Vec<PathBuf>,
    /// Times the current background was drawn and rejected
    pub repeats: usize,
}

pub struct Selector<'a> {
    cache: &'a BrightnessCache,
    desktop: &'a dyn Desktop,
    root: PathBuf,
    target: Option<BrightnessBucket>,
}

impl<'a> Selector<'a> {
    /// Selector over every known image under `root`.
    pub fn new(cache: &'a BrightnessCache, desktop: &'a dyn Desktop, root: &Path) -> Self {
        let root = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        Self {
            cache,
            desktop,
            root,
            target: None,
        }
    }

    /// Only consider images that fit `target`.
    pub fn with_target(mut self, target: BrightnessBucket) -> Self {
        self.target = Some(target);
        self
    }

    /// Paths eligible for the next draw.
    pub fn candidates(&self) -> Result<Vec<PathBuf>, SelectError> {
        let records = self.cache.records_under(&self.root)?;
        let Some(target) = self.target else {
            return Ok(records.into_iter().map(|r| r.path).collect());
        };

        let mut by_kurtosis = Vec::new();
        let mut by_override = Vec::new();
        for record in records {
            match record.defined_brightness {
                Some(bucket) if bucket == target => by_override.push(record.path),
                Some(_) => {}
                None => {
                    if let Some(kurtosis) = self.kurtosis_of(&record)? {
                        if target.admits_kurtosis(kurtosis) {
                            by_kurtosis.push(record.path);
                        }
                    }
                }
            }
        }

        debug!(
            "{} target: {} by kurtosis, {} by override",
            target,
            by_kurtosis.len(),
            by_override.len()
        );
        by_kurtosis.extend(by_override);
        Ok(by_kurtosis)
    }

    /// Kurtosis of a record, measuring it now if it never was.
    fn kurtosis_of(&self, record: &WallpaperRecord) -> Result<Option<f64>, SelectError> {
        if let Some(kurtosis) = record.kurtosis {
            return Ok(Some(kurtosis));
        }
        if !record.path.exists() {
            debug!("not measuring missing file {}", record.path.display());
            return Ok(None);
        }
        match self.cache.get_or_compute(&record.path) {
            Ok(kurtosis) => Ok(Some(kurtosis)),
            Err(CacheError::Measurement(e)) => {
                warn!("leaving out {}: {}", record.path.display(), e);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn change_background(&self) -> Result<Selection, SelectError> {
        self.change_background_with(&mut rand::thread_rng())
    }

    /// Pick a new wallpaper and apply it.
    pub fn change_background_with<R: Rng>(
        &self,
        rng: &mut R,
    ) -> Result<Selection, SelectError> {
        let mut pool = self.candidates()?;
        info!(
            "{} candidates under {} (target: {})",
            pool.len(),
            self.root.display(),
            self.target
                .map(|t| t.to_string())
                .unwrap_or_else(|| "any".into())
        );
        if pool.is_empty() {
            return Err(self.no_wallpaper());
        }

        let current = self
            .desktop
            .current_background()
            .context("Failed to read the current background")
            .map_err(SelectError::Desktop)?;

        let mut evicted = Vec::new();
        let mut repeats = 0;
        let path = loop {
            let path = self.draw_existing(&mut pool, &mut evicted, &mut *rng)?;
            if current.as_deref() != Some(path.as_path()) {
                break path;
            }
            if repeats == MAX_REPEATS {
                warn!("current background drawn {} times in a row", repeats + 1);
                return Err(SelectError::InsufficientCandidates { attempts: repeats });
            }
            repeats += 1;
            debug!("drew current background {}, redrawing", path.display());
        };

        self.desktop
            .set_background(&path)
            .with_context(|| format!("Failed to set background to {}", path.display()))
            .map_err(SelectError::Desktop)?;

        Ok(Selection {
            path,
            evicted,
            repeats,
        })
    }

    /// Uniform draw from `pool`, evicting entries whose file is gone.
    fn draw_existing<R: Rng>(
        &self,
        pool: &mut Vec<PathBuf>,
        evicted: &mut Vec<PathBuf>,
        rng: &mut R,
    ) -> Result<PathBuf, SelectError> {
        while !pool.is_empty() {
            let index = rng.gen_range(0..pool.len());
            if pool[index].exists() {
                return Ok(pool[index].clone());
            }

            let stale = pool.swap_remove(index);
            info!("{} no longer exists, forgetting it", stale.display());
            self.cache.delete(&stale)?;
            evicted.push(stale);
        }
        Err(self.no_wallpaper())
    }

    fn no_wallpaper(&self) -> SelectError {
        SelectError::NoWallpaperFound {
            root: self.root.clone(),
        }
    }
}
