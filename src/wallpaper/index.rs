use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Thumbnail directories written by image viewers
const THUMBNAIL_DIRS: &[&str] = &[".thumbs", ".thumbnails"];

/// Absolute paths of all image files under `root`.
///
/// Non-recursive mode only looks at the direct children of `root`.
pub fn list_images(root: &Path, recursive: bool) -> Result<BTreeSet<PathBuf>> {
    let root = fs::canonicalize(root)
        .with_context(|| format!("Wallpaper directory not found: {}", root.display()))?;
    if !root.is_dir() {
        anyhow::bail!("Not a directory: {}", root.display());
    }

    let images = if recursive {
        WalkDir::new(&root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_thumbnail_dir(e))
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| p.is_file() && crate::utils::is_image_file(p))
            .collect()
    } else {
        fs::read_dir(&root)
            .with_context(|| format!("Failed to read directory: {}", root.display()))?
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file() && crate::utils::is_image_file(p))
            .collect()
    };

    Ok(images)
}

fn is_thumbnail_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && THUMBNAIL_DIRS
            .iter()
            .any(|name| entry.file_name() == OsStr::new(name))
}
