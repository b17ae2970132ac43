mod brightness;
mod cli;
mod cli_cmds;
mod config;
mod desktop;
mod measure;
mod selector;
mod timeprofile;
mod utils;
mod wallpaper;

use anyhow::Result;

pub(crate) use cli::BrightnessAction;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
