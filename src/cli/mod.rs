mod args;
mod runner;

pub(crate) use args::{BrightnessAction, Cli, Commands};
pub(crate) use runner::run;
