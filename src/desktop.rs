//! Reading and writing the desktop background setting.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// The desktop's "current background" setting.
pub trait Desktop {
    /// Path of the current background, if one is set.
    fn current_background(&self) -> Result<Option<PathBuf>>;

    fn set_background(&self, path: &Path) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Which backend to use, from the `[desktop]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DesktopBackend {
    #[default]
    Auto,
    Gsettings,
    Gconf,
    Swww,
}

/// Pick the backend. `Auto` looks at the session and the tools on `PATH`.
pub fn detect(backend: DesktopBackend) -> Result<Box<dyn Desktop>> {
    let chosen = match backend {
        DesktopBackend::Auto => auto_backend()?,
        other => other,
    };
    debug!("desktop backend: {:?}", chosen);

    Ok(match chosen {
        DesktopBackend::Gsettings => Box::new(GSettings),
        DesktopBackend::Gconf => Box::new(GConf),
        DesktopBackend::Swww | DesktopBackend::Auto => Box::new(Swww),
    })
}

fn auto_backend() -> Result<DesktopBackend> {
    let current = std::env::var("XDG_CURRENT_DESKTOP").unwrap_or_default();
    let on_path = |tool: &str| which::which(tool).is_ok();
    pick_backend(&current, on_path)
        .ok_or_else(|| anyhow!("No supported desktop found (need gsettings, gconftool-2 or swww)"))
}

fn pick_backend(current_desktop: &str, on_path: impl Fn(&str) -> bool) -> Option<DesktopBackend> {
    let gnome_like = current_desktop
        .split(':')
        .any(|d| matches!(d.to_lowercase().as_str(), "gnome" | "unity" | "budgie" | "pantheon"));

    if gnome_like && on_path("gsettings") {
        return Some(DesktopBackend::Gsettings);
    }
    if !gnome_like && on_path("swww") {
        return Some(DesktopBackend::Swww);
    }
    if on_path("gsettings") {
        Some(DesktopBackend::Gsettings)
    } else if on_path("gconftool-2") {
        Some(DesktopBackend::Gconf)
    } else {
        None
    }
}

fn run(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("Failed to run {}", program))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("{} failed: {}", program, stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| anyhow!("path is not valid UTF-8: {}", path.display()))
}

/// GNOME 3 and later.
pub struct GSettings;

const GNOME_SCHEMA: &str = "org.gnome.desktop.background";

impl Desktop for GSettings {
    fn current_background(&self) -> Result<Option<PathBuf>> {
        let value = run("gsettings", &["get", GNOME_SCHEMA, "picture-uri"])?;
        Ok(parse_gsettings_uri(&value))
    }

    fn set_background(&self, path: &Path) -> Result<()> {
        let uri = format!("file://{}", path_str(path)?);
        run("gsettings", &["set", GNOME_SCHEMA, "picture-uri", &uri])?;

        // Only exists on GNOME 42+.
        if let Err(e) = run("gsettings", &["set", GNOME_SCHEMA, "picture-uri-dark", &uri]) {
            debug!("picture-uri-dark not updated: {}", e);
        }
        info!("background set to {}", path.display());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "gsettings"
    }
}

/// `'file:///a%20b.png'` -> `/a b.png`
fn parse_gsettings_uri(value: &str) -> Option<PathBuf> {
    let value = value.trim().trim_matches('\'');
    if value.is_empty() {
        return None;
    }
    let path = value.strip_prefix("file://").unwrap_or(value);
    Some(PathBuf::from(percent_decode(path)))
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let (hi, lo) = (bytes[i + 1], bytes[i + 2]);
            if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() {
                out.push((hex_value(hi) << 4) | hex_value(lo));
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}

/// GNOME 2.
pub struct GConf;

const GCONF_KEY: &str = "/desktop/gnome/background/picture_filename";

impl Desktop for GConf {
    fn current_background(&self) -> Result<Option<PathBuf>> {
        let value = run("gconftool-2", &["--get", GCONF_KEY])?;
        let value = value.trim();
        Ok((!value.is_empty()).then(|| PathBuf::from(value)))
    }

    fn set_background(&self, path: &Path) -> Result<()> {
        run(
            "gconftool-2",
            &["--type", "string", "--set", GCONF_KEY, path_str(path)?],
        )?;
        info!("background set to {}", path.display());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "gconf"
    }
}

/// swww on wlroots compositors. Sets every output.
pub struct Swww;

impl Swww {
    fn ensure_daemon(&self) -> Result<()> {
        if run("swww", &["query"]).is_ok() {
            return Ok(());
        }
        Command::new("swww-daemon")
            .spawn()
            .context("Failed to start swww-daemon")?;

        // Give it a moment to initialize
        std::thread::sleep(std::time::Duration::from_millis(100));
        Ok(())
    }
}

impl Desktop for Swww {
    fn current_background(&self) -> Result<Option<PathBuf>> {
        let output = run("swww", &["query"])?;
        Ok(parse_swww_query(&output))
    }

    fn set_background(&self, path: &Path) -> Result<()> {
        self.ensure_daemon()?;
        run(
            "swww",
            &["img", path_str(path)?, "--transition-type", "fade"],
        )?;
        info!("background set to {}", path.display());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "swww"
    }
}

/// Image shown on the first output in `swww query` output.
fn parse_swww_query(output: &str) -> Option<PathBuf> {
    output.lines().find_map(|line| {
        let (_, image) = line.split_once("image: ")?;
        let image = image.trim();
        (!image.is_empty()).then(|| PathBuf::from(image))
    })
}
