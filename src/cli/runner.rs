use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use super::{Cli, Commands};
use crate::cli_cmds::*;
use crate::config::Config;
use crate::{measure, utils, wallpaper};

pub(crate) async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load()?;
    let session = session_from(&cli, &config)?;

    match cli.command {
        Some(Commands::Next) | None => {
            cmd_next(&session).await?;
        }
        Some(Commands::Scan) => {
            cmd_scan(&session).await?;
        }
        Some(Commands::Status) => {
            cmd_status(&session)?;
        }
        Some(Commands::Brightness { action }) => {
            cmd_brightness(action, &session)?;
        }
        Some(Commands::Forget { path }) => {
            cmd_forget(&session, &path)?;
        }
        Some(Commands::RemoveCurrent { yes }) => {
            cmd_remove_current(&session, yes).await?;
        }
        Some(Commands::OpenCurrent) => {
            cmd_open_current(&session)?;
        }
    }

    Ok(())
}

/// Command-line flags layered over the config file for this run.
fn session_from(cli: &Cli, config: &Config) -> Result<Session> {
    let mut time = config.time.clone();
    if cli.fit_time || cli.brightness.is_some() {
        time.fit_time = true;
    }
    if let Some(location) = cli.location {
        time.set_location(location);
    }

    let wallpaper_dir = cli
        .dir
        .as_deref()
        .map(utils::expand_tilde)
        .unwrap_or_else(|| config.wallpaper_dir());

    let meter = measure::meter_for(config.measure.backend);
    let cache = wallpaper::BrightnessCache::open(&config.database_path(), meter)?;

    Ok(Session {
        wallpaper_dir,
        recursive: cli.recursive || config.wallpaper.recursive,
        time,
        explicit_target: cli.brightness,
        desktop_backend: config.desktop.backend,
        cache,
    })
}

/// Log to stderr. `RUST_LOG` wins over the `-v` count.
fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
