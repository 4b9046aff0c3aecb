//! The transition function: `(state, action, stamp) -> state`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ulid::{Generator, Ulid};

use crate::action::Action;
use crate::model::{AppState, Category, CategoryFilter, Task, DEFAULT_CATEGORY_COLOR, UNCATEGORIZED};

/// Identity and time handed to creating transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamp {
    pub id: String,
    pub at: DateTime<Utc>,
}

impl Stamp {
    pub fn new(id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self { id: id.into(), at }
    }
}

/// Supplies one [`Stamp`] per dispatch.
pub trait StampSource {
    fn next_stamp(&mut self) -> Stamp;
}

/// Wall-clock stamps with monotonic ULID ids.
pub struct SystemStamps {
    generator: Generator,
}

impl SystemStamps {
    pub fn new() -> Self {
        Self {
            generator: Generator::new(),
        }
    }
}

impl Default for SystemStamps {
    fn default() -> Self {
        Self::new()
    }
}

impl StampSource for SystemStamps {
    fn next_stamp(&mut self) -> Stamp {
        let at = Utc::now();
        // Overflow only happens after 2^80 ids inside one millisecond.
        let id = self
            .generator
            .generate_from_datetime(at.into())
            .unwrap_or_else(|_| Ulid::from_datetime(at.into()));
        Stamp::new(id.to_string(), at)
    }
}

/// Compute the state that follows `state` once `action` is applied.
///
/// Never mutates `state`; collections the action does not touch are shared
/// with the returned value.
pub fn apply(state: &AppState, action: &Action, stamp: &Stamp) -> AppState {
    match action {
        Action::AddTask {
            text,
            description,
            category_id,
        } => {
            let category_id = match category_id.as_deref() {
                Some(id) if state.has_category(id) => id.to_string(),
                _ => UNCATEGORIZED.to_string(),
            };
            let task = Task {
                id: stamp.id.clone(),
                text: text.clone(),
                description: description.clone().unwrap_or_default(),
                category_id,
                completed: false,
                created_at: stamp.at,
            };
            let mut tasks = Vec::with_capacity(state.tasks.len() + 1);
            tasks.extend(state.tasks.iter().cloned());
            tasks.push(task);
            AppState {
                tasks: Arc::new(tasks),
                ..state.clone()
            }
        }
        Action::ToggleTask { id } => AppState {
            tasks: map_matching(&state.tasks, |task| task.id == *id, |task| Task {
                completed: !task.completed,
                ..task.clone()
            }),
            ..state.clone()
        },
        Action::DeleteTask { id } => AppState {
            tasks: retain(&state.tasks, |task| task.id != *id),
            editing_task_id: state
                .editing_task_id
                .clone()
                .filter(|editing| editing != id),
            ..state.clone()
        },
        Action::SetFilter { filter } => AppState {
            filter: *filter,
            ..state.clone()
        },
        Action::SetCategoryFilter { category_id } => AppState {
            category_filter: category_id.clone(),
            ..state.clone()
        },
        Action::SetEditingTask { id } => AppState {
            editing_task_id: Some(id.clone()),
            ..state.clone()
        },
        Action::UpdateTask {
            id,
            text,
            description,
            category_id,
        } => AppState {
            tasks: map_matching(&state.tasks, |task| task.id == *id, |task| {
                merge_task(state, task, text, description.as_deref(), category_id.as_deref())
            }),
            editing_task_id: None,
            ..state.clone()
        },
        Action::CancelEdit => AppState {
            editing_task_id: None,
            editing_category_id: None,
            ..state.clone()
        },
        Action::AddCategory { name, color } => {
            let category = Category {
                id: stamp.id.clone(),
                name: name.clone(),
                color: color
                    .clone()
                    .unwrap_or_else(|| DEFAULT_CATEGORY_COLOR.to_string()),
            };
            let mut categories = Vec::with_capacity(state.categories.len() + 1);
            categories.extend(state.categories.iter().cloned());
            categories.push(category);
            AppState {
                categories: Arc::new(categories),
                ..state.clone()
            }
        }
        Action::UpdateCategory { id, name, color } => AppState {
            categories: map_matching(
                &state.categories,
                |category| category.id == *id,
                |category| Category {
                    name: name.clone(),
                    color: color.clone(),
                    ..category.clone()
                },
            ),
            editing_category_id: None,
            ..state.clone()
        },
        Action::DeleteCategory { id } => AppState {
            categories: retain(&state.categories, |category| category.id != *id),
            tasks: map_matching(
                &state.tasks,
                |task| task.category_id == *id,
                |task| Task {
                    category_id: UNCATEGORIZED.to_string(),
                    ..task.clone()
                },
            ),
            category_filter: if state.category_filter.targets(id) {
                CategoryFilter::All
            } else {
                state.category_filter.clone()
            },
            ..state.clone()
        },
        Action::SetEditingCategory { id } => AppState {
            editing_category_id: Some(id.clone()),
            ..state.clone()
        },
        Action::Unknown(_) => state.clone(),
    }
}

fn merge_task(
    state: &AppState,
    task: &Task,
    text: &str,
    description: Option<&str>,
    category_id: Option<&str>,
) -> Task {
    let mut merged = task.clone();
    if !text.is_empty() {
        merged.text = text.to_string();
    }
    if let Some(description) = description.filter(|value| !value.is_empty()) {
        merged.description = description.to_string();
    }
    match category_id {
        Some(UNCATEGORIZED) => merged.category_id = UNCATEGORIZED.to_string(),
        Some(id) if state.has_category(id) => merged.category_id = id.to_string(),
        _ => {}
    }
    merged
}

/// Rewrite the items matching `pred`, sharing the original allocation when
/// nothing matches.
fn map_matching<T: Clone>(
    items: &Arc<Vec<T>>,
    pred: impl Fn(&T) -> bool,
    rewrite: impl Fn(&T) -> T,
) -> Arc<Vec<T>> {
    if !items.iter().any(&pred) {
        return Arc::clone(items);
    }
    Arc::new(
        items
            .iter()
            .map(|item| if pred(item) { rewrite(item) } else { item.clone() })
            .collect(),
    )
}

fn retain<T: Clone>(items: &Arc<Vec<T>>, keep: impl Fn(&T) -> bool) -> Arc<Vec<T>> {
    if items.iter().all(&keep) {
        return Arc::clone(items);
    }
    Arc::new(items.iter().filter(|item| keep(*item)).cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{StatusFilter, UNCATEGORIZED};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::rstest;

    fn stamp(id: &str) -> Stamp {
        Stamp::new(id, Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap())
    }

    fn with_task(text: &str, category: Option<&str>) -> (AppState, String) {
        let action = Action::AddTask {
            text: text.into(),
            description: None,
            category_id: category.map(str::to_string),
        };
        let state = apply(&AppState::default(), &action, &stamp("t1"));
        (state, "t1".to_string())
    }

    #[test]
    fn add_task_appends_with_defaults() {
        let state = AppState::default();
        let action = Action::AddTask {
            text: "Buy milk".into(),
            description: None,
            category_id: Some("personal".into()),
        };
        let next = apply(&state, &action, &stamp("t1"));

        assert_eq!(next.tasks.len(), 1);
        let task = &next.tasks[0];
        assert_eq!(task.id, "t1");
        assert_eq!(task.text, "Buy milk");
        assert_eq!(task.description, "");
        assert_eq!(task.category_id, "personal");
        assert!(!task.completed);
        assert_eq!(task.created_at, stamp("t1").at);
        assert!(state.tasks.is_empty(), "input state must not change");
        assert!(Arc::ptr_eq(&state.categories, &next.categories));
    }

    #[test]
    fn add_task_defaults_category_to_none() {
        let (state, _) = with_task("Call mom", None);
        assert_eq!(state.tasks[0].category_id, UNCATEGORIZED);
    }

    #[test]
    fn add_task_with_missing_category_is_uncategorized() {
        let (state, _) = with_task("Call mom", Some("ghost"));
        assert_eq!(state.tasks[0].category_id, UNCATEGORIZED);
    }

    #[test]
    fn add_task_appends_in_creation_order() {
        let (state, _) = with_task("first", None);
        let next = apply(&state, &Action::add_task("second"), &stamp("t2"));
        let texts: Vec<&str> = next.tasks.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[test]
    fn toggling_twice_restores_completion() {
        let (state, id) = with_task("Stretch", None);
        let once = apply(&state, &Action::toggle_task(&id), &stamp("x"));
        assert!(once.tasks[0].completed);
        let twice = apply(&once, &Action::toggle_task(&id), &stamp("y"));
        assert_eq!(twice.tasks[0].completed, state.tasks[0].completed);
    }

    #[test]
    fn toggle_unknown_id_keeps_collection_identity() {
        let (state, _) = with_task("Stretch", None);
        let next = apply(&state, &Action::toggle_task("missing"), &stamp("x"));
        assert!(Arc::ptr_eq(&state.tasks, &next.tasks));
        assert_eq!(next, state);
    }

    #[test]
    fn delete_task_clears_matching_edit_pointer() {
        let (state, id) = with_task("Stretch", None);
        let editing = apply(
            &state,
            &Action::SetEditingTask { id: id.clone() },
            &stamp("x"),
        );
        let next = apply(&editing, &Action::delete_task(&id), &stamp("y"));
        assert!(next.tasks.is_empty());
        assert_eq!(next.editing_task_id, None);
    }

    #[test]
    fn delete_task_keeps_unrelated_edit_pointer() {
        let (state, _) = with_task("Stretch", None);
        let editing = apply(
            &state,
            &Action::SetEditingTask { id: "other".into() },
            &stamp("x"),
        );
        let next = apply(&editing, &Action::delete_task("t1"), &stamp("y"));
        assert_eq!(next.editing_task_id.as_deref(), Some("other"));
    }

    #[test]
    fn delete_unknown_task_is_a_no_op() {
        let (state, _) = with_task("Stretch", None);
        let next = apply(&state, &Action::delete_task("missing"), &stamp("x"));
        assert!(Arc::ptr_eq(&state.tasks, &next.tasks));
    }

    #[rstest]
    #[case(StatusFilter::Active)]
    #[case(StatusFilter::Completed)]
    #[case(StatusFilter::All)]
    fn set_filter_replaces_status_filter(#[case] filter: StatusFilter) {
        let next = apply(
            &AppState::default(),
            &Action::SetFilter { filter },
            &stamp("x"),
        );
        assert_eq!(next.filter, filter);
    }

    #[test]
    fn set_category_filter_accepts_unknown_ids() {
        let next = apply(
            &AppState::default(),
            &Action::SetCategoryFilter {
                category_id: CategoryFilter::from("ghost"),
            },
            &stamp("x"),
        );
        assert_eq!(next.category_filter.as_str(), "ghost");
    }

    #[test]
    fn set_editing_task_overwrites_prior_pointer() {
        let first = apply(
            &AppState::default(),
            &Action::SetEditingTask { id: "a".into() },
            &stamp("x"),
        );
        let second = apply(&first, &Action::SetEditingTask { id: "b".into() }, &stamp("y"));
        assert_eq!(second.editing_task_id.as_deref(), Some("b"));
    }

    #[test]
    fn update_task_merges_fields_and_clears_pointer() {
        let (state, id) = with_task("Old", None);
        let editing = apply(
            &state,
            &Action::SetEditingTask { id: id.clone() },
            &stamp("x"),
        );
        let next = apply(
            &editing,
            &Action::UpdateTask {
                id: id.clone(),
                text: "New".into(),
                description: Some("details".into()),
                category_id: Some("work".into()),
            },
            &stamp("y"),
        );
        let task = &next.tasks[0];
        assert_eq!(task.text, "New");
        assert_eq!(task.description, "details");
        assert_eq!(task.category_id, "work");
        assert_eq!(task.created_at, state.tasks[0].created_at);
        assert_eq!(next.editing_task_id, None);
    }

    #[test]
    fn update_task_with_empty_text_keeps_old_text() {
        let (state, id) = with_task("Old", Some("work"));
        let next = apply(
            &state,
            &Action::UpdateTask {
                id,
                text: String::new(),
                description: Some(String::new()),
                category_id: None,
            },
            &stamp("y"),
        );
        assert_eq!(next.tasks[0].text, "Old");
        assert_eq!(next.tasks[0].category_id, "work");
    }

    #[test]
    fn update_task_can_move_task_to_none() {
        let (state, id) = with_task("Old", Some("work"));
        let next = apply(
            &state,
            &Action::UpdateTask {
                id,
                text: "Old".into(),
                description: None,
                category_id: Some(UNCATEGORIZED.into()),
            },
            &stamp("y"),
        );
        assert!(next.tasks[0].is_uncategorized());
    }

    #[test]
    fn update_task_ignores_missing_category() {
        let (state, id) = with_task("Old", Some("work"));
        let next = apply(
            &state,
            &Action::UpdateTask {
                id,
                text: "Old".into(),
                description: None,
                category_id: Some("ghost".into()),
            },
            &stamp("y"),
        );
        assert_eq!(next.tasks[0].category_id, "work");
    }

    #[test]
    fn update_unknown_task_still_clears_pointer() {
        let (state, _) = with_task("Old", None);
        let editing = apply(
            &state,
            &Action::SetEditingTask { id: "t1".into() },
            &stamp("x"),
        );
        let next = apply(
            &editing,
            &Action::UpdateTask {
                id: "missing".into(),
                text: "New".into(),
                description: None,
                category_id: None,
            },
            &stamp("y"),
        );
        assert!(Arc::ptr_eq(&editing.tasks, &next.tasks));
        assert_eq!(next.editing_task_id, None);
    }

    #[test]
    fn cancel_edit_is_idempotent() {
        let state = apply(
            &AppState::default(),
            &Action::SetEditingTask { id: "a".into() },
            &stamp("x"),
        );
        let state = apply(
            &state,
            &Action::SetEditingCategory { id: "work".into() },
            &stamp("y"),
        );
        let once = apply(&state, &Action::CancelEdit, &stamp("z"));
        let twice = apply(&once, &Action::CancelEdit, &stamp("w"));
        assert_eq!(once.editing_task_id, None);
        assert_eq!(once.editing_category_id, None);
        assert_eq!(once, twice);
    }

    #[test]
    fn add_category_defaults_to_gray() {
        let next = apply(
            &AppState::default(),
            &Action::add_category("Errands"),
            &stamp("c1"),
        );
        let added = next.categories.last().unwrap();
        assert_eq!(added.id, "c1");
        assert_eq!(added.name, "Errands");
        assert_eq!(added.color, DEFAULT_CATEGORY_COLOR);
        assert_eq!(next.categories.len(), 6);
    }

    #[test]
    fn update_category_replaces_name_and_color() {
        let state = apply(
            &AppState::default(),
            &Action::SetEditingCategory { id: "work".into() },
            &stamp("x"),
        );
        let next = apply(
            &state,
            &Action::UpdateCategory {
                id: "work".into(),
                name: "Office".into(),
                color: "#000000".into(),
            },
            &stamp("y"),
        );
        let work = next.category("work").unwrap();
        assert_eq!(work.name, "Office");
        assert_eq!(work.color, "#000000");
        assert_eq!(next.editing_category_id, None);
    }

    #[test]
    fn update_unknown_category_clears_pointer_only() {
        let state = apply(
            &AppState::default(),
            &Action::SetEditingCategory { id: "work".into() },
            &stamp("x"),
        );
        let next = apply(
            &state,
            &Action::UpdateCategory {
                id: "ghost".into(),
                name: "Ghost".into(),
                color: "#000000".into(),
            },
            &stamp("y"),
        );
        assert!(Arc::ptr_eq(&state.categories, &next.categories));
        assert_eq!(next.editing_category_id, None);
    }

    #[test]
    fn delete_category_cascades_to_tasks() {
        let (state, _) = with_task("Report", Some("work"));
        let next = apply(&state, &Action::delete_category("work"), &stamp("x"));
        assert_eq!(next.tasks[0].category_id, UNCATEGORIZED);
        assert!(next.category("work").is_none());
        assert!(next.references_are_consistent());
    }

    #[test]
    fn delete_category_resets_matching_filter() {
        let state = apply(
            &AppState::default(),
            &Action::SetCategoryFilter {
                category_id: CategoryFilter::from("work"),
            },
            &stamp("x"),
        );
        let next = apply(&state, &Action::delete_category("work"), &stamp("y"));
        assert_eq!(next.category_filter, CategoryFilter::All);
    }

    #[test]
    fn delete_category_keeps_unrelated_filter() {
        let state = apply(
            &AppState::default(),
            &Action::SetCategoryFilter {
                category_id: CategoryFilter::from("study"),
            },
            &stamp("x"),
        );
        let next = apply(&state, &Action::delete_category("work"), &stamp("y"));
        assert_eq!(next.category_filter.as_str(), "study");
    }

    #[test]
    fn unknown_action_is_identity() {
        let (state, _) = with_task("Report", Some("work"));
        let next = apply(&state, &Action::Unknown("UNKNOWN".into()), &stamp("x"));
        assert_eq!(next, state);
        assert!(Arc::ptr_eq(&state.tasks, &next.tasks));
        assert!(Arc::ptr_eq(&state.categories, &next.categories));
    }

    #[test]
    fn system_stamps_are_unique_within_a_tick() {
        let mut stamps = SystemStamps::new();
        let ids: std::collections::HashSet<String> =
            (0..256).map(|_| stamps.next_stamp().id).collect();
        assert_eq!(ids.len(), 256);
    }

    #[derive(Debug, Clone)]
    enum Step {
        AddTask(Option<usize>),
        AddCategory,
        DeleteCategory(usize),
        UpdateTask(usize, Option<usize>),
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            proptest::option::of(0usize..12).prop_map(Step::AddTask),
            Just(Step::AddCategory),
            (0usize..12).prop_map(Step::DeleteCategory),
            (0usize..12, proptest::option::of(0usize..12))
                .prop_map(|(task, category)| Step::UpdateTask(task, category)),
        ]
    }

    fn category_at(state: &AppState, index: usize) -> String {
        // Indices past the end name ids that do not exist.
        state
            .categories
            .get(index)
            .map(|category| category.id.clone())
            .unwrap_or_else(|| format!("missing-{index}"))
    }

    proptest! {
        #[test]
        fn task_references_stay_consistent(steps in proptest::collection::vec(step(), 1..40)) {
            let mut state = AppState::default();
            for (n, step) in steps.into_iter().enumerate() {
                let action = match step {
                    Step::AddTask(category) => Action::AddTask {
                        text: format!("task {n}"),
                        description: None,
                        category_id: category.map(|index| category_at(&state, index)),
                    },
                    Step::AddCategory => Action::add_category(format!("category {n}")),
                    Step::DeleteCategory(index) => Action::delete_category(category_at(&state, index)),
                    Step::UpdateTask(task, category) => Action::UpdateTask {
                        id: state
                            .tasks
                            .get(task)
                            .map(|task| task.id.clone())
                            .unwrap_or_default(),
                        text: String::new(),
                        description: None,
                        category_id: category.map(|index| category_at(&state, index)),
                    },
                };
                state = apply(&state, &action, &stamp(&format!("id-{n}")));
                prop_assert!(state.references_are_consistent());
            }
        }
    }
}
