mod brightness;
mod core;
mod status;

pub use brightness::cmd_brightness;
pub use self::core::{cmd_forget, cmd_next, cmd_open_current, cmd_remove_current, cmd_scan};
pub use status::cmd_status;

use crate::brightness::BrightnessBucket;
use crate::desktop::DesktopBackend;
use crate::timeprofile::{self, TargetMode, TimeSettings};
use crate::wallpaper::BrightnessCache;
use std::path::{Path, PathBuf};

/// Everything a command needs, after config and flags are merged.
pub struct Session {
    pub wallpaper_dir: PathBuf,
    pub recursive: bool,
    pub time: TimeSettings,
    /// `--brightness`, overrides clock and sun
    pub explicit_target: Option<BrightnessBucket>,
    pub desktop_backend: DesktopBackend,
    pub cache: BrightnessCache,
}

impl Session {
    /// Bucket to select for, or `None` when time fitting is off.
    pub fn target(&self) -> Option<(BrightnessBucket, TargetMode)> {
        if let Some(bucket) = self.explicit_target {
            return Some((bucket, TargetMode::Explicit));
        }
        if !self.time.fit_time {
            return None;
        }
        Some((timeprofile::current_target(&self.time), self.time.mode()))
    }
}

/// Absolute form of a user-supplied path, resolving symlinks when the file
/// exists.
fn absolute_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }
    let path = crate::utils::expand_tilde(path);
    if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(&path))
            .unwrap_or(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::NativeMeter;
    use crate::timeprofile::Location;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn session(dir: &TempDir) -> Session {
        Session {
            wallpaper_dir: dir.path().to_path_buf(),
            recursive: false,
            time: TimeSettings::default(),
            explicit_target: None,
            desktop_backend: DesktopBackend::Auto,
            cache: BrightnessCache::open(
                &dir.path().join("nextwall.db"),
                Arc::new(NativeMeter::default()),
            )
            .expect("open cache"),
        }
    }

    #[test]
    fn no_target_without_fit_time() {
        let dir = TempDir::new().expect("tempdir");
        assert_eq!(session(&dir).target(), None);
    }

    #[test]
    fn explicit_target_beats_location() {
        let dir = TempDir::new().expect("tempdir");
        let mut session = session(&dir);
        session.time.fit_time = true;
        session
            .time
            .set_location(Location::new(0.0, 0.0).expect("valid"));
        assert_eq!(session.target().map(|(_, mode)| mode), Some(TargetMode::Geo));

        session.explicit_target = Some(BrightnessBucket::Dark);
        assert_eq!(
            session.target(),
            Some((BrightnessBucket::Dark, TargetMode::Explicit))
        );
    }

    #[test]
    fn relative_paths_become_absolute() {
        let path = absolute_path(Path::new("does-not-exist.png"));
        assert!(path.is_absolute());
        assert!(path.ends_with("does-not-exist.png"));
    }
}
