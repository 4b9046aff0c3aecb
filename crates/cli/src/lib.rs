pub mod cli;
pub mod commands;
pub mod config;
pub mod shell;

use anyhow::Result;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

pub use taskdeck_core as core;
pub use taskdeck_core::model;

pub use taskdeck_core::AppConfig;

/// Install the stderr subscriber. `filter` defaults to `warn`; `RUST_LOG`
/// directives are layered on top.
pub fn init_tracing(filter: Option<String>) -> Result<()> {
    let filter = filter.unwrap_or_else(|| "warn".to_string());
    let directive: Directive = filter.parse()?;
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
    Ok(())
}
