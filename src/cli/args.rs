use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use crate::brightness::BrightnessBucket;
use crate::timeprofile::Location;

#[derive(Parser)]
#[command(name = "nextwall")]
#[command(version)]
#[command(about = "Change the desktop background, matching image brightness to the time of day")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Option<Commands>,

    /// Wallpaper directory
    #[arg(short, long, global = true)]
    pub(crate) dir: Option<PathBuf>,

    /// Include subdirectories
    #[arg(short, long, global = true)]
    pub(crate) recursive: bool,

    /// Pick a wallpaper whose brightness fits the time of day
    #[arg(short = 't', long, global = true)]
    pub(crate) fit_time: bool,

    /// Force the target brightness (0/dark, 1/medium, 2/bright); implies --fit-time
    #[arg(short, long, global = true, value_name = "N")]
    pub(crate) brightness: Option<BrightnessBucket>,

    /// Use sunrise and sunset at this location instead of fixed hours
    #[arg(short, long, global = true, value_name = "LAT:LON", allow_hyphen_values = true)]
    pub(crate) location: Option<Location>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub(crate) verbose: u8,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Change to a new wallpaper (default)
    Next,
    /// Measure the brightness of every wallpaper in the directory
    Scan,
    /// Show the current target and what the database knows
    Status,
    /// Manage per-image brightness overrides
    Brightness {
        #[command(subcommand)]
        action: BrightnessAction,
    },
    /// Drop an image from the database (the file is kept)
    Forget {
        /// Path to wallpaper
        path: PathBuf,
    },
    /// Delete the current wallpaper from disk and change to a new one
    RemoveCurrent {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Open the current wallpaper in the default image viewer
    OpenCurrent,
}

#[derive(Subcommand)]
pub(crate) enum BrightnessAction {
    /// Pin a wallpaper to a brightness, whatever it measures
    Set {
        /// Path to wallpaper
        path: PathBuf,
        /// 0/dark, 1/medium or 2/bright
        value: BrightnessBucket,
    },
    /// Remove the override
    Clear {
        /// Path to wallpaper
        path: PathBuf,
    },
    /// Show measured and effective brightness
    Show {
        /// Path to wallpaper
        path: PathBuf,
    },
}
