use std::io::{self, IsTerminal};

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = taskdeck::cli::Cli::parse();
    taskdeck::init_tracing(cli.log_filter.clone())?;

    let config = taskdeck::config::from_cli(&cli);
    let mut store = taskdeck::Store::open(taskdeck::core::open_storage(&config));
    tracing::debug!(
        data_dir = %config.data_dir().display(),
        host = %config.host(),
        storage = store.storage_label(),
        "session started"
    );

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    match cli.command.clone() {
        Some(taskdeck::cli::CliCommand::Shell) => {
            let stdin = io::stdin();
            let prompt = stdin.is_terminal();
            taskdeck::shell::run(&mut store, stdin.lock(), &mut handle, prompt)?;
        }
        Some(command) => taskdeck::commands::execute(&mut store, command, &mut handle)?,
        None => {
            let list = taskdeck::cli::CliCommand::List(Default::default());
            taskdeck::commands::execute(&mut store, list, &mut handle)?;
        }
    }

    Ok(())
}
