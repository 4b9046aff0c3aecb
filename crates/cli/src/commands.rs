use std::fmt;
use std::io::Write;

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use serde::Serialize;
use thiserror::Error;

use crate::cli::{
    AddArgs, CategoryAddArgs, CategoryCommand, CategoryDeleteArgs, CategoryUpdateArgs, CliCommand,
    DeleteArgs, DispatchArgs, EditArgs, ListArgs, StatsArgs,
};
use crate::core::views::{category_name, visible_tasks, TaskStats};
use crate::core::{Action, Dashboard, Store};
use crate::model::{
    is_reserved_category_id, is_valid_color, AppState, CategoryFilter, Task, UNCATEGORIZED,
};

/// Input a command handler refuses to turn into a state change.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("task text cannot be empty")]
    EmptyText,
    #[error("category name cannot be empty")]
    EmptyName,
    #[error("invalid colour '{0}': expected #rgb or #rrggbb")]
    InvalidColor(String),
    #[error("no task with id '{0}'")]
    UnknownTask(String),
    #[error("no category with id '{0}'")]
    UnknownCategory(String),
    #[error("'{0}' is reserved and cannot be changed")]
    ReservedCategory(String),
    #[error("deleting category '{0}' moves its tasks to No Category; re-run with --yes to confirm")]
    Unconfirmed(String),
}

pub fn execute<W: Write>(store: &mut Store, command: CliCommand, mut writer: W) -> Result<()> {
    match command {
        CliCommand::Add(args) => handle_add(store, args, &mut writer),
        CliCommand::List(args) => handle_list(store, args, &mut writer),
        CliCommand::Toggle(args) => handle_toggle(store, &args.id, &mut writer),
        CliCommand::Delete(args) => handle_delete(store, &args, &mut writer),
        CliCommand::Edit(args) => handle_edit(store, args, &mut writer),
        CliCommand::Category(command) => handle_category(store, command, &mut writer),
        CliCommand::Stats(args) => handle_stats(store, args, &mut writer),
        CliCommand::Dispatch(args) => handle_dispatch(store, args, &mut writer),
        CliCommand::Shell => Err(anyhow!("the shell is already running")),
    }
}

fn handle_add<W: Write>(store: &mut Store, args: AddArgs, mut writer: W) -> Result<()> {
    let action = Action::AddTask {
        text: args.text.join(" ").trim().to_string(),
        description: args.description.filter(|value| !value.trim().is_empty()),
        category_id: args.category,
    };
    check_action(store.state(), &action, false)?;

    let state = store.dispatch(action);
    let task = state
        .tasks
        .last()
        .context("task list empty after ADD_TASK")?;
    writeln!(writer, "Added {} ({})", task.id, category_name(&state, &task.category_id))?;
    Ok(())
}

fn handle_list<W: Write>(store: &mut Store, args: ListArgs, mut writer: W) -> Result<()> {
    if let Some(filter) = args.filter {
        store.dispatch(Action::SetFilter { filter });
    }
    if let Some(category_id) = args.category {
        store.dispatch(Action::SetCategoryFilter { category_id });
    }

    let state = store.snapshot();
    let tasks = visible_tasks(&state);
    if tasks.is_empty() {
        writeln!(writer, "No tasks")?;
        return Ok(());
    }
    for task in &tasks {
        write_task(&state, task, &mut writer)?;
    }
    writeln!(
        writer,
        "{} of {} tasks shown ({}, category {})",
        tasks.len(),
        state.tasks.len(),
        state.filter,
        state.category_filter
    )?;
    Ok(())
}

fn write_task<W: Write>(state: &AppState, task: &Task, mut writer: W) -> Result<()> {
    let mark = if task.completed { "x" } else { " " };
    writeln!(
        writer,
        "[{}] {}  {}  ({})",
        mark,
        task.id,
        task.text,
        category_name(state, &task.category_id)
    )?;
    if !task.description.is_empty() {
        writeln!(writer, "      {}", task.description)?;
    }
    Ok(())
}

fn handle_toggle<W: Write>(store: &mut Store, id: &str, mut writer: W) -> Result<()> {
    if store.state().task(id).is_none() {
        return Err(InputError::UnknownTask(id.to_string()).into());
    }
    let state = store.dispatch(Action::toggle_task(id));
    let status = match state.task(id) {
        Some(task) if task.completed => "completed",
        _ => "active",
    };
    writeln!(writer, "Marked {} {}", id, status)?;
    Ok(())
}

fn handle_delete<W: Write>(store: &mut Store, args: &DeleteArgs, mut writer: W) -> Result<()> {
    let mut summary = DeleteSummary::default();
    for id in &args.ids {
        if store.state().task(id).is_some() {
            store.dispatch(Action::delete_task(id.as_str()));
            summary.deleted += 1;
        } else {
            summary.missing.push(id.clone());
        }
    }
    summary.write_to(&mut writer)
}

fn handle_edit<W: Write>(store: &mut Store, args: EditArgs, mut writer: W) -> Result<()> {
    let text = match args.text {
        Some(text) if text.trim().is_empty() => return Err(InputError::EmptyText.into()),
        Some(text) => text.trim().to_string(),
        None => String::new(),
    };
    let update = Action::UpdateTask {
        id: args.id.clone(),
        text,
        description: args.description,
        category_id: args.category,
    };
    check_action(store.state(), &update, false)?;

    let state = store.dispatch(Action::SetEditingTask {
        id: args.id.clone(),
    });
    if state.editing_task().is_none() {
        store.dispatch(Action::CancelEdit);
        return Err(InputError::UnknownTask(args.id).into());
    }

    let state = store.dispatch(update);
    if let Some(task) = state.task(&args.id) {
        write_task(&state, task, &mut writer)?;
    }
    Ok(())
}

fn handle_category<W: Write>(store: &mut Store, command: CategoryCommand, mut writer: W) -> Result<()> {
    match command {
        CategoryCommand::List => {
            let state = store.snapshot();
            for category in state.categories.iter() {
                let count = state
                    .tasks
                    .iter()
                    .filter(|task| task.category_id == category.id)
                    .count();
                writeln!(
                    writer,
                    "{}  {}  {}  {}",
                    category.id,
                    category.name,
                    category.color,
                    TaskCount(count)
                )?;
            }
            let loose = state.tasks.iter().filter(|task| task.is_uncategorized()).count();
            writeln!(writer, "{}  No Category  {}", UNCATEGORIZED, TaskCount(loose))?;
            Ok(())
        }
        CategoryCommand::Add(args) => handle_category_add(store, args, &mut writer),
        CategoryCommand::Update(args) => handle_category_update(store, args, &mut writer),
        CategoryCommand::Delete(args) => handle_category_delete(store, args, &mut writer),
    }
}

fn handle_category_add<W: Write>(store: &mut Store, args: CategoryAddArgs, mut writer: W) -> Result<()> {
    let action = Action::AddCategory {
        name: args.name.join(" ").trim().to_string(),
        color: args.color,
    };
    check_action(store.state(), &action, false)?;

    let state = store.dispatch(action);
    let category = state
        .categories
        .last()
        .context("category list empty after ADD_CATEGORY")?;
    writeln!(writer, "Added category {} ({})", category.id, category.name)?;
    Ok(())
}

fn handle_category_update<W: Write>(
    store: &mut Store,
    args: CategoryUpdateArgs,
    mut writer: W,
) -> Result<()> {
    let update = Action::UpdateCategory {
        id: args.id.clone(),
        name: args.name.trim().to_string(),
        color: args.color,
    };
    check_action(store.state(), &update, false)?;

    let state = store.dispatch(Action::SetEditingCategory {
        id: args.id.clone(),
    });
    let previous = match state.editing_category() {
        Some(category) => category.name.clone(),
        None => {
            store.dispatch(Action::CancelEdit);
            return Err(InputError::UnknownCategory(args.id).into());
        }
    };

    let state = store.dispatch(update);
    if let Some(category) = state.category(&args.id) {
        writeln!(
            writer,
            "Updated category {}: {} -> {} ({})",
            category.id, previous, category.name, category.color
        )?;
    }
    Ok(())
}

fn handle_category_delete<W: Write>(
    store: &mut Store,
    args: CategoryDeleteArgs,
    mut writer: W,
) -> Result<()> {
    let action = Action::delete_category(args.id.as_str());
    check_action(store.state(), &action, args.yes)?;
    if !store.state().has_category(&args.id) {
        return Err(InputError::UnknownCategory(args.id).into());
    }

    let moved = store
        .state()
        .tasks
        .iter()
        .filter(|task| task.category_id == args.id)
        .count();
    store.dispatch(action);
    writeln!(
        writer,
        "Deleted category {}; {} moved to No Category",
        args.id,
        TaskCount(moved)
    )?;
    Ok(())
}

#[derive(Serialize)]
struct StatsReport<'a> {
    stats: TaskStats,
    dashboard: Dashboard<'a>,
}

fn handle_stats<W: Write>(store: &mut Store, args: StatsArgs, mut writer: W) -> Result<()> {
    let state = store.snapshot();
    let selection = args.category.unwrap_or(CategoryFilter::All);
    let dashboard = Dashboard::compute(&state, &selection, &Local::now());
    let stats = TaskStats::from_tasks(state.tasks.iter().filter(|task| selection.admits(task)));

    if args.json {
        let report = StatsReport { stats, dashboard };
        let json = serde_json::to_string_pretty(&report).context("failed to encode stats")?;
        writeln!(writer, "{}", json)?;
        return Ok(());
    }

    writeln!(
        writer,
        "Total {}  Completed {}  Active {}  ({}% complete)",
        stats.total, stats.completed, stats.active, stats.percent_complete
    )?;
    writeln!(
        writer,
        "Today: {} added, {} completed",
        dashboard.added_today, dashboard.completed_today
    )?;
    if !dashboard.urgent.is_empty() {
        writeln!(writer, "Up next:")?;
        for task in &dashboard.urgent {
            writeln!(writer, "  {}  {}", task.id, task.text)?;
        }
    }
    writeln!(writer, "By category:")?;
    for stat in &dashboard.categories {
        writeln!(
            writer,
            "  {:<12} {}/{} ({}%)",
            stat.name, stat.completed, stat.total, stat.percentage
        )?;
    }
    writeln!(writer, "By weekday:")?;
    for day in &dashboard.weekdays {
        writeln!(writer, "  {} {:>3} ({}%)", day.day, day.count, day.rate)?;
    }
    Ok(())
}

fn handle_dispatch<W: Write>(store: &mut Store, args: DispatchArgs, mut writer: W) -> Result<()> {
    let action = Action::from_json(&args.action)?;
    check_action(store.state(), &action, args.yes)?;
    if let Action::Unknown(kind) = &action {
        tracing::warn!(kind = kind.as_str(), "dispatching unrecognised action");
    }
    let kind = action.kind().to_string();
    store.dispatch(action);
    writeln!(writer, "Dispatched {}", kind)?;
    Ok(())
}

/// Validation every collaborator owes the store before dispatching `action`.
/// `confirmed` stands for the user having approved a category deletion.
fn check_action(state: &AppState, action: &Action, confirmed: bool) -> Result<(), InputError> {
    match action {
        Action::AddTask {
            text, category_id, ..
        } => {
            if text.trim().is_empty() {
                return Err(InputError::EmptyText);
            }
            if let Some(id) = category_id {
                ensure_category(state, id)?;
            }
        }
        Action::UpdateTask {
            text, category_id, ..
        } => {
            // Empty text keeps the current title; blank text would replace it.
            if !text.is_empty() && text.trim().is_empty() {
                return Err(InputError::EmptyText);
            }
            if let Some(id) = category_id {
                ensure_category(state, id)?;
            }
        }
        Action::AddCategory { name, color } => {
            ensure_name(name)?;
            if let Some(color) = color {
                ensure_color(color)?;
            }
        }
        Action::UpdateCategory { id, name, color } => {
            ensure_mutable(id)?;
            ensure_name(name)?;
            ensure_color(color)?;
        }
        Action::DeleteCategory { id } => {
            ensure_mutable(id)?;
            if !confirmed {
                return Err(InputError::Unconfirmed(id.clone()));
            }
        }
        _ => {}
    }
    Ok(())
}

fn ensure_name(name: &str) -> Result<(), InputError> {
    if name.trim().is_empty() {
        Err(InputError::EmptyName)
    } else {
        Ok(())
    }
}

fn ensure_mutable(id: &str) -> Result<(), InputError> {
    if is_reserved_category_id(id) {
        Err(InputError::ReservedCategory(id.to_string()))
    } else {
        Ok(())
    }
}

fn ensure_category(state: &AppState, id: &str) -> Result<(), InputError> {
    if id == UNCATEGORIZED || state.has_category(id) {
        Ok(())
    } else {
        Err(InputError::UnknownCategory(id.to_string()))
    }
}

fn ensure_color(color: &str) -> Result<(), InputError> {
    if is_valid_color(color) {
        Ok(())
    } else {
        Err(InputError::InvalidColor(color.to_string()))
    }
}

#[derive(Default)]
struct DeleteSummary {
    deleted: usize,
    missing: Vec<String>,
}

impl DeleteSummary {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writeln!(writer, "{}", SummaryLine::deleted(self.deleted))?;
        if !self.missing.is_empty() {
            writeln!(writer, "Not found: {}", self.missing.join(", "))?;
        }
        Ok(())
    }
}

enum SummaryLine {
    Deleted(usize),
    NoneDeleted,
}

impl SummaryLine {
    fn deleted(count: usize) -> Self {
        if count > 0 {
            SummaryLine::Deleted(count)
        } else {
            SummaryLine::NoneDeleted
        }
    }
}

impl fmt::Display for SummaryLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryLine::Deleted(count) => write!(f, "Deleted {}", TaskCount(*count)),
            SummaryLine::NoneDeleted => write!(f, "No tasks deleted"),
        }
    }
}

struct TaskCount(usize);

impl fmt::Display for TaskCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} task{}", self.0, if self.0 == 1 { "" } else { "s" })
    }
}
