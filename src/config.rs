use crate::desktop::DesktopBackend;
use crate::measure::MeasureBackend;
use crate::timeprofile::TimeSettings;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Overrides the config file location
pub const CONFIG_ENV: &str = "NEXTWALL_CONFIG";
/// Overrides the database location
pub const DATABASE_ENV: &str = "NEXTWALL_DB";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub wallpaper: WallpaperConfig,
    #[serde(default)]
    pub time: TimeSettings,
    #[serde(default)]
    pub measure: MeasureConfig,
    #[serde(default)]
    pub desktop: DesktopConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WallpaperConfig {
    pub directory: PathBuf,
    #[serde(default)]
    pub recursive: bool,
}

impl Default for WallpaperConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("/usr/share/backgrounds"),
            recursive: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MeasureConfig {
    #[serde(default)]
    pub backend: MeasureBackend,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DesktopConfig {
    #[serde(default)]
    pub backend: DesktopBackend,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheConfig {
    /// Database file; defaults to the user data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
}

impl Config {
    pub fn config_path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        directories::ProjectDirs::from("org", "nextwall", "nextwall")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }

    /// Load config from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load config from `path`, creating a default one if missing.
    ///
    /// An unparsable file is left alone and defaults are used.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Config::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        match toml::from_str::<Config>(&data) {
            Ok(config) => Ok(config),
            Err(e) => {
                warn!("Failed to parse config at {}: {}", path.display(), e);
                warn!("Using default configuration.");
                Ok(Config::default())
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let data = toml::to_string_pretty(self)?;
        fs::write(path, data)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;

        Ok(())
    }

    /// Where the brightness database lives: `NEXTWALL_DB`, then the config
    /// value, then the user data directory.
    pub fn database_path(&self) -> PathBuf {
        resolve_database(
            std::env::var_os(DATABASE_ENV).map(PathBuf::from),
            self.cache.database.as_deref(),
        )
    }

    pub fn wallpaper_dir(&self) -> PathBuf {
        crate::utils::expand_tilde(&self.wallpaper.directory)
    }
}

fn resolve_database(from_env: Option<PathBuf>, from_config: Option<&Path>) -> PathBuf {
    from_env
        .or_else(|| from_config.map(crate::utils::expand_tilde))
        .unwrap_or_else(crate::wallpaper::BrightnessCache::default_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_config_is_created_with_defaults() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path)?;
        assert!(path.exists());
        assert_eq!(config.wallpaper.directory, PathBuf::from("/usr/share/backgrounds"));
        assert_eq!(config.time.day_start, 12);
        assert_eq!(config.measure.backend, MeasureBackend::Auto);

        let reloaded = Config::load_from(&path)?;
        assert_eq!(reloaded.time.night_start, config.time.night_start);
        Ok(())
    }

    #[test]
    fn partial_sections_keep_defaults() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[wallpaper]
directory = "/srv/walls"

[time]
fit_time = true
latitude = 60.17
longitude = 24.94

[desktop]
backend = "swww"
"#,
        )?;

        let config = Config::load_from(&path)?;
        assert_eq!(config.wallpaper.directory, PathBuf::from("/srv/walls"));
        assert!(!config.wallpaper.recursive);
        assert!(config.time.fit_time);
        assert_eq!(config.time.dawn_start, 9);
        assert!(config.time.location().is_some());
        assert_eq!(config.desktop.backend, DesktopBackend::Swww);
        assert_eq!(config.cache.database, None);
        Ok(())
    }

    #[test]
    fn broken_config_falls_back_without_overwriting() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("config.toml");
        fs::write(&path, "[time\nfit_time = ")?;

        let config = Config::load_from(&path)?;
        assert!(!config.time.fit_time);
        assert_eq!(fs::read_to_string(&path)?, "[time\nfit_time = ");
        Ok(())
    }

    #[test]
    fn database_location_precedence() {
        let env = Some(PathBuf::from("/env/nextwall.db"));
        let conf = Path::new("/conf/nextwall.db");

        assert_eq!(resolve_database(env.clone(), Some(conf)), PathBuf::from("/env/nextwall.db"));
        assert_eq!(resolve_database(None, Some(conf)), PathBuf::from("/conf/nextwall.db"));
        assert!(resolve_database(None, None).ends_with("nextwall.db"));
    }
}
