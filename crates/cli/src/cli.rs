use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::core::StorageHost;
use crate::model::{CategoryFilter, StatusFilter};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskdeck",
    version,
    about = "Tasks grouped by colour-coded categories, saved between sessions.",
    after_help = "Examples:\n  taskdeck add Buy milk --category personal\n  taskdeck list --filter active\n  taskdeck category delete finance --yes\n  taskdeck dispatch '{\"type\":\"TOGGLE_TASK\",\"payload\":{\"id\":\"01J...\"}}'"
)]
pub struct Cli {
    /// Override the data directory (defaults to platform-specific app dir)
    #[arg(long, value_name = "PATH", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Storage host (durable or memory); TASKDECK_STORAGE sets the default
    #[arg(long, value_enum, value_name = "HOST", global = true)]
    pub storage: Option<StorageHost>,

    /// Tracing filter (e.g. "warn", "taskdeck_core=debug"); RUST_LOG refines it
    #[arg(long = "log", value_name = "DIRECTIVE", global = true)]
    pub log_filter: Option<String>,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

/// A single line typed into `taskdeck shell`.
#[derive(Parser, Debug, Clone)]
#[command(name = "taskdeck", no_binary_name = true, disable_version_flag = true)]
pub struct ShellLine {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CliCommand {
    /// Add a task
    Add(AddArgs),
    /// List tasks matching the status and category filters (default command)
    List(ListArgs),
    /// Flip a task between active and completed
    Toggle(IdArgs),
    /// Delete one or more tasks by id
    Delete(DeleteArgs),
    /// Edit a task's text, description or category
    Edit(EditArgs),
    /// Manage categories
    #[command(subcommand)]
    Category(CategoryCommand),
    /// Completion statistics and the activity dashboard
    Stats(StatsArgs),
    /// Dispatch a raw action, e.g. '{"type":"CANCEL_EDIT"}'
    Dispatch(DispatchArgs),
    /// Read commands from stdin, one per line, against a single session
    Shell,
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// Task title
    #[arg(value_name = "TEXT", required = true)]
    pub text: Vec<String>,

    /// Optional detailed notes
    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// Category id (`none` for no category)
    #[arg(long, short = 'c', value_name = "ID")]
    pub category: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Status filter (all, active, completed)
    #[arg(long, value_enum)]
    pub filter: Option<StatusFilter>,

    /// Category filter (all, none, or a category id)
    #[arg(long, short = 'c', value_name = "ID")]
    pub category: Option<CategoryFilter>,
}

#[derive(Args, Debug, Clone)]
pub struct IdArgs {
    #[arg(value_name = "ID")]
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    /// One or more task ids to delete
    #[arg(value_name = "ID", required = true)]
    pub ids: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    #[arg(value_name = "ID")]
    pub id: String,

    /// Replacement title (unchanged when omitted)
    #[arg(long)]
    pub text: Option<String>,

    /// Replacement notes (unchanged when omitted or empty)
    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// New category id (`none` clears it)
    #[arg(long, short = 'c', value_name = "ID")]
    pub category: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CategoryCommand {
    /// List categories with their task counts
    List,
    /// Create a category
    Add(CategoryAddArgs),
    /// Rename or recolour a category
    Update(CategoryUpdateArgs),
    /// Delete a category; its tasks become uncategorised
    Delete(CategoryDeleteArgs),
}

#[derive(Args, Debug, Clone)]
pub struct CategoryAddArgs {
    #[arg(value_name = "NAME", required = true)]
    pub name: Vec<String>,

    /// Hex colour (#rgb or #rrggbb)
    #[arg(long)]
    pub color: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CategoryUpdateArgs {
    #[arg(value_name = "ID")]
    pub id: String,

    #[arg(long)]
    pub name: String,

    /// Hex colour (#rgb or #rrggbb)
    #[arg(long)]
    pub color: String,
}

#[derive(Args, Debug, Clone)]
pub struct CategoryDeleteArgs {
    #[arg(value_name = "ID")]
    pub id: String,

    /// Confirm the deletion
    #[arg(long, short = 'y', action = ArgAction::SetTrue)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct StatsArgs {
    /// Limit the dashboard to one category (all, none, or a category id)
    #[arg(long, short = 'c', value_name = "ID")]
    pub category: Option<CategoryFilter>,

    /// Emit JSON instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DispatchArgs {
    /// Action as `{"type": ..., "payload": {...}}`
    #[arg(value_name = "JSON")]
    pub action: String,

    /// Confirm a DELETE_CATEGORY action
    #[arg(long, short = 'y', action = ArgAction::SetTrue)]
    pub yes: bool,
}
