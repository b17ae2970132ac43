use anyhow::{Context, Result};
use dialoguer::{theme::ColorfulTheme, Confirm};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::Ordering;
use tracing::info;

use super::{absolute_path, Session};
use crate::desktop::{self, Desktop};
use crate::selector::{SelectError, Selector};
use crate::wallpaper::{ScanJob, ScanSummary};

const IMAGE_VIEWER: &str = "xdg-open";

pub async fn cmd_next(session: &Session) -> Result<()> {
    let desktop = desktop::detect(session.desktop_backend)?;
    let path = change_background(session, desktop.as_ref())?;
    println!("{}", path.display());
    Ok(())
}

fn change_background(session: &Session, desktop: &dyn Desktop) -> Result<PathBuf> {
    let mut selector = Selector::new(&session.cache, desktop, &session.wallpaper_dir);
    if let Some((target, mode)) = session.target() {
        info!(
            "target brightness: {} ({}, by {})",
            target,
            target.period_name(),
            mode
        );
        selector = selector.with_target(target);
    }

    match selector.change_background() {
        Ok(selection) => {
            if !selection.evicted.is_empty() {
                eprintln!(
                    "Forgot {} wallpaper(s) that no longer exist.",
                    selection.evicted.len()
                );
            }
            Ok(selection.path)
        }
        Err(e @ SelectError::NoWallpaperFound { .. }) => {
            eprintln!(
                "Run 'nextwall scan -d {}' to measure your wallpapers first.",
                session.wallpaper_dir.display()
            );
            Err(e.into())
        }
        Err(e @ SelectError::InsufficientCandidates { .. }) => {
            eprintln!("Add more images, use --recursive, or scan a wider folder.");
            Err(e.into())
        }
        Err(e) => Err(e).context("Failed to change the background"),
    }
}

pub async fn cmd_scan(session: &Session) -> Result<()> {
    println!("Scanning {}...", session.wallpaper_dir.display());
    let job = ScanJob::new(
        session.cache.clone(),
        session.wallpaper_dir.clone(),
        session.recursive,
    );
    let handle = job.spawn()?;

    let cancel = handle.cancel_flag();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nStopping after the current image...");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} ({eta} left)")?
            .progress_chars("=> "),
    );

    let summary = tokio::task::spawn_blocking(move || {
        for progress in handle.progress().iter() {
            bar.set_length(progress.total as u64);
            bar.set_position(progress.current as u64);
        }
        bar.finish_and_clear();
        handle.join()
    })
    .await
    .context("Scan worker failed")??;
    ctrl_c.abort();

    print_scan_summary(&summary);
    Ok(())
}

fn print_scan_summary(summary: &ScanSummary) {
    if summary.cancelled {
        println!("Scan cancelled.");
    }
    println!("Found {} wallpapers:", summary.total);
    println!("  Measured:       {}", summary.measured);
    println!("  Already known:  {}", summary.cached);
    println!("  Failed:         {}", summary.failed);
}

pub fn cmd_forget(session: &Session, path: &Path) -> Result<()> {
    let path = absolute_path(path);
    if session.cache.delete(&path)? {
        println!("Forgot {}", path.display());
    } else {
        println!("{} is not in the database", path.display());
    }
    Ok(())
}

pub async fn cmd_remove_current(session: &Session, yes: bool) -> Result<()> {
    let desktop = desktop::detect(session.desktop_backend)?;
    let current = desktop
        .current_background()?
        .context("No background is currently set")?;

    if !yes {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Delete {} from disk?", current.display()))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Nothing deleted.");
            return Ok(());
        }
    }

    std::fs::remove_file(&current)
        .with_context(|| format!("Failed to delete {}", current.display()))?;
    session.cache.delete(&current)?;
    println!("Deleted {}", current.display());

    let next = change_background(session, desktop.as_ref())?;
    println!("{}", next.display());
    Ok(())
}

pub fn cmd_open_current(session: &Session) -> Result<()> {
    let desktop = desktop::detect(session.desktop_backend)?;
    let current = desktop
        .current_background()?
        .context("No background is currently set")?;
    if !current.is_file() {
        anyhow::bail!("Current background {} no longer exists", current.display());
    }

    open_with(IMAGE_VIEWER, &current)?;
    println!("Opened {}", current.display());
    Ok(())
}

fn open_with(program: &str, path: &Path) -> Result<()> {
    let status = Command::new(program)
        .arg(path)
        .status()
        .with_context(|| format!("Failed to run {}", program))?;
    if !status.success() {
        anyhow::bail!("{} exited with {}", program, status);
    }
    Ok(())
}
