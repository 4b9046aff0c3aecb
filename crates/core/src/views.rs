//! Read-side derivations collaborators render from.

use serde::Serialize;

use crate::model::{AppState, Task, DEFAULT_CATEGORY_COLOR, UNCATEGORIZED_LABEL};

/// Tasks passing the state's status and category filters, newest first.
pub fn visible_tasks(state: &AppState) -> Vec<&Task> {
    let tasks = state
        .tasks
        .iter()
        .filter(|task| state.filter.admits(task))
        .filter(|task| state.category_filter.admits(task))
        .collect();
    newest_first(tasks)
}

/// Sort by creation time, newest first. Ties keep their incoming order.
pub fn newest_first(mut tasks: Vec<&Task>) -> Vec<&Task> {
    tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    tasks
}

pub fn category_name<'a>(state: &'a AppState, id: &str) -> &'a str {
    state
        .category(id)
        .map(|category| category.name.as_str())
        .unwrap_or(UNCATEGORIZED_LABEL)
}

pub fn category_color<'a>(state: &'a AppState, id: &str) -> &'a str {
    state
        .category(id)
        .map(|category| category.color.as_str())
        .unwrap_or(DEFAULT_CATEGORY_COLOR)
}

/// Rounded percentage, 0 when `whole` is 0.
pub fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round() as u32
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub active: usize,
    pub percent_complete: u32,
}

impl TaskStats {
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut total = 0;
        let mut completed = 0;
        for task in tasks {
            total += 1;
            if task.completed {
                completed += 1;
            }
        }
        Self {
            total,
            completed,
            active: total - completed,
            percent_complete: percent(completed, total),
        }
    }
}
