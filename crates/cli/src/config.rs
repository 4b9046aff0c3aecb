pub use taskdeck_core::config::*;

use crate::cli::Cli;

pub fn from_cli(cli: &Cli) -> AppConfig {
    AppConfig::discover(cli.data_dir.clone(), cli.storage)
}
