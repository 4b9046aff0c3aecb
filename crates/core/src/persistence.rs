//! Hydrates `tasks` and `categories` from storage and writes them back when a
//! transition changes them.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::model::{default_categories, is_reserved_category_id, AppState, Category, Task, UNCATEGORIZED};
use crate::storage::KeyValueStorage;

pub const TASKS_KEY: &str = "tasks";
pub const CATEGORIES_KEY: &str = "categories";

/// Which collections a call to [`PersistenceBridge::persist`] wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Written {
    pub tasks: bool,
    pub categories: bool,
}

pub struct PersistenceBridge {
    storage: Box<dyn KeyValueStorage>,
}

impl PersistenceBridge {
    pub fn new(storage: Box<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &dyn KeyValueStorage {
        self.storage.as_ref()
    }

    /// Build the session's initial state. Never fails: anything missing or
    /// unreadable falls back to defaults.
    pub fn hydrate(&self) -> AppState {
        let tasks = self.load_tasks(Utc::now());
        let categories = self.load_categories();
        let (tasks, categories) = repair(tasks, categories);
        tracing::debug!(
            storage = self.storage.describe(),
            tasks = tasks.len(),
            categories = categories.len(),
            "hydrated state"
        );
        AppState::with_collections(tasks, categories)
    }

    /// Overwrite each collection that differs between `previous` and `next`.
    ///
    /// Write failures are logged; the in-memory state stays authoritative.
    pub fn persist(&mut self, previous: &AppState, next: &AppState) -> Written {
        let mut written = Written::default();
        if changed(&previous.tasks, &next.tasks) {
            written.tasks = self.write(TASKS_KEY, encode_tasks(&next.tasks));
        }
        if changed(&previous.categories, &next.categories) {
            written.categories = self.write(CATEGORIES_KEY, encode_categories(&next.categories));
        }
        written
    }

    fn write(&mut self, key: &str, encoded: serde_json::Result<String>) -> bool {
        let payload = match encoded {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(key, error = %err, "failed to serialize collection");
                return false;
            }
        };
        match self.storage.set(key, &payload) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(
                    key,
                    storage = self.storage.describe(),
                    error = %err,
                    "failed to persist collection"
                );
                false
            }
        }
    }

    fn load_tasks(&self, loaded_at: DateTime<Utc>) -> Vec<Task> {
        match self.read(TASKS_KEY) {
            Some(raw) => decode_tasks(&raw, loaded_at).unwrap_or_else(|err| {
                tracing::warn!(key = TASKS_KEY, error = %err, "failed to parse saved tasks");
                Vec::new()
            }),
            None => Vec::new(),
        }
    }

    fn load_categories(&self) -> Vec<Category> {
        match self.read(CATEGORIES_KEY) {
            Some(raw) => decode_categories(&raw).unwrap_or_else(|err| {
                tracing::warn!(key = CATEGORIES_KEY, error = %err, "failed to parse saved categories");
                default_categories()
            }),
            None => default_categories(),
        }
    }

    fn read(&self, key: &str) -> Option<String> {
        self.storage.get(key).unwrap_or_else(|err| {
            tracing::warn!(
                key,
                storage = self.storage.describe(),
                error = %err,
                "failed to read saved collection"
            );
            None
        })
    }
}

fn changed<T: PartialEq>(previous: &Arc<Vec<T>>, next: &Arc<Vec<T>>) -> bool {
    !Arc::ptr_eq(previous, next) && previous != next
}

pub fn encode_tasks(tasks: &[Task]) -> serde_json::Result<String> {
    serde_json::to_string(tasks)
}

/// Decode a saved task list. Entries without a readable `createdAt` are
/// stamped with `loaded_at`; entries that still fail to parse are skipped.
pub fn decode_tasks(raw: &str, loaded_at: DateTime<Utc>) -> serde_json::Result<Vec<Task>> {
    decode_each(raw, TASKS_KEY, |entry| {
        let Value::Object(fields) = entry else {
            return;
        };
        let readable = fields
            .get("createdAt")
            .and_then(Value::as_str)
            .is_some_and(|raw| raw.parse::<DateTime<Utc>>().is_ok());
        if !readable {
            fields.insert("createdAt".into(), Value::String(loaded_at.to_rfc3339()));
        }
    })
}

pub fn encode_categories(categories: &[Category]) -> serde_json::Result<String> {
    serde_json::to_string(categories)
}

/// Decode a saved category list, skipping entries that fail to parse.
pub fn decode_categories(raw: &str) -> serde_json::Result<Vec<Category>> {
    decode_each(raw, CATEGORIES_KEY, |_| {})
}

// Only a payload that is not a JSON array fails as a whole.
fn decode_each<T: DeserializeOwned>(
    raw: &str,
    key: &str,
    mut backfill: impl FnMut(&mut Value),
) -> serde_json::Result<Vec<T>> {
    let entries: Vec<Value> = serde_json::from_str(raw)?;
    Ok(entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, mut entry)| {
            backfill(&mut entry);
            match serde_json::from_value(entry) {
                Ok(item) => Some(item),
                Err(err) => {
                    tracing::warn!(key, index, error = %err, "skipping unreadable saved entry");
                    None
                }
            }
        })
        .collect())
}

/// Restore the id invariants a hand-edited or foreign save may break.
fn repair(tasks: Vec<Task>, categories: Vec<Category>) -> (Vec<Task>, Vec<Category>) {
    let mut seen = HashSet::new();
    let categories: Vec<Category> = categories
        .into_iter()
        .filter(|category| {
            if is_reserved_category_id(&category.id) {
                tracing::warn!(id = category.id.as_str(), "dropping category with reserved id");
                return false;
            }
            if !seen.insert(category.id.clone()) {
                tracing::warn!(id = category.id.as_str(), "dropping duplicate category");
                return false;
            }
            true
        })
        .collect();

    let tasks = tasks
        .into_iter()
        .map(|mut task| {
            if !task.is_uncategorized() && !seen.contains(&task.category_id) {
                tracing::warn!(
                    task = task.id.as_str(),
                    category = task.category_id.as_str(),
                    "task references a missing category, marking uncategorized"
                );
                task.category_id = UNCATEGORIZED.to_string();
            }
            task
        })
        .collect();

    (tasks, categories)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::reducer::{apply, Stamp};
    use crate::storage::{MemoryStorage, StorageError};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn stamp(id: &str) -> Stamp {
        Stamp::new(id, Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap())
    }

    fn bridge_with(entries: &[(&str, &str)]) -> PersistenceBridge {
        PersistenceBridge::new(Box::new(MemoryStorage::with_entries(
            entries.iter().map(|(k, v)| (*k, *v)),
        )))
    }

    /// Records every write so tests can assert on persistence traffic.
    #[derive(Clone, Default)]
    struct RecordingStorage {
        inner: MemoryStorage,
        writes: Rc<RefCell<Vec<String>>>,
        fail_reads: bool,
        fail_writes: bool,
    }

    impl KeyValueStorage for RecordingStorage {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            if self.fail_reads {
                return Err(StorageError::Unavailable("storage locked".into()));
            }
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
            if self.fail_writes {
                return Err(StorageError::Unavailable("quota exceeded".into()));
            }
            self.writes.borrow_mut().push(key.to_string());
            self.inner.set(key, value)
        }

        fn describe(&self) -> &'static str {
            "recording"
        }
    }

    #[test]
    fn empty_storage_hydrates_defaults() {
        let state = bridge_with(&[]).hydrate();
        assert!(state.tasks.is_empty());
        assert_eq!(*state.categories, default_categories());
        assert_eq!(state, AppState::default());
    }

    #[test]
    fn malformed_entries_fall_back_per_collection() {
        let state = bridge_with(&[(TASKS_KEY, "{not json"), (CATEGORIES_KEY, "42")]).hydrate();
        assert!(state.tasks.is_empty());
        assert_eq!(*state.categories, default_categories());
    }

    #[test]
    fn saved_empty_category_list_is_respected() {
        let state = bridge_with(&[(CATEGORIES_KEY, "[]")]).hydrate();
        assert!(state.categories.is_empty());
    }

    #[test]
    fn legacy_tasks_are_backfilled() {
        let legacy = r#"[{"id":"1700000000000","text":"Legacy","completed":false,"createdAt":"2023-11-14T22:13:20.000Z"}]"#;
        let state = bridge_with(&[(TASKS_KEY, legacy)]).hydrate();
        let task = &state.tasks[0];
        assert_eq!(task.category_id, UNCATEGORIZED);
        assert_eq!(task.description, "");
        assert_eq!(
            task.created_at,
            Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap()
        );
    }

    #[test]
    fn unreadable_entries_are_skipped_not_the_whole_collection() {
        let categories = r##"[
            {"id":"errands","name":"Errands","color":"#0ea5e9"},
            {"id":"x"}
        ]"##;
        let tasks = r#"[
            {"id":"1","text":"keep me","categoryId":"errands","completed":true,"createdAt":"2024-05-01T09:00:00Z"},
            {"id":"2","text":"no timestamp","categoryId":"errands","completed":false},
            {"id":"3","text":"bad timestamp","completed":false,"createdAt":"yesterday"},
            {"text":"no id","createdAt":"2024-05-01T09:00:00Z"},
            7
        ]"#;
        let state = bridge_with(&[(TASKS_KEY, tasks), (CATEGORIES_KEY, categories)]).hydrate();

        let ids: Vec<&str> = state.categories.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["errands"]);

        let ids: Vec<&str> = state.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(state.tasks[0].category_id, "errands");
        assert!(state.tasks[0].completed);
        assert_eq!(state.tasks[1].category_id, "errands");
    }

    #[test]
    fn missing_timestamps_take_the_load_time() {
        let loaded_at = Utc.with_ymd_and_hms(2025, 7, 4, 12, 0, 0).unwrap();
        let raw = r#"[{"id":"a","text":"a"},{"id":"b","text":"b","createdAt":null}]"#;
        let tasks = decode_tasks(raw, loaded_at).unwrap();
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|task| task.created_at == loaded_at));
    }

    #[test]
    fn failed_reads_hydrate_defaults() {
        let saved = r#"[{"id":"1","text":"x","createdAt":"2024-01-01T00:00:00Z"}]"#;
        let storage = RecordingStorage {
            inner: MemoryStorage::with_entries([(TASKS_KEY, saved)]),
            fail_reads: true,
            ..RecordingStorage::default()
        };
        let bridge = PersistenceBridge::new(Box::new(storage));
        assert_eq!(bridge.hydrate(), AppState::default());
    }

    #[test]
    fn hydration_repairs_reserved_duplicate_and_dangling_ids() {
        let categories = r##"[
            {"id":"work","name":"Work","color":"#3b82f6"},
            {"id":"none","name":"Nothing","color":"#000"},
            {"id":"work","name":"Work again","color":"#fff"}
        ]"##;
        let tasks = r#"[
            {"id":"1","text":"a","categoryId":"work","completed":false,"createdAt":"2024-01-01T00:00:00Z"},
            {"id":"2","text":"b","categoryId":"gone","completed":false,"createdAt":"2024-01-01T00:00:00Z"}
        ]"#;
        let state = bridge_with(&[(TASKS_KEY, tasks), (CATEGORIES_KEY, categories)]).hydrate();
        assert_eq!(state.categories.len(), 1);
        assert_eq!(state.categories[0].name, "Work");
        assert_eq!(state.tasks[0].category_id, "work");
        assert_eq!(state.tasks[1].category_id, UNCATEGORIZED);
        assert!(state.references_are_consistent());
    }

    #[test]
    fn collections_round_trip_through_storage() {
        let mut bridge = bridge_with(&[]);
        let initial = bridge.hydrate();
        let mut state = apply(&initial, &Action::add_category("Errands"), &stamp("c1"));
        state = apply(
            &state,
            &Action::AddTask {
                text: "Post letter".into(),
                description: Some("Before noon".into()),
                category_id: Some("c1".into()),
            },
            &stamp("t1"),
        );
        state = apply(&state, &Action::toggle_task("t1"), &stamp("x"));
        bridge.persist(&initial, &state);

        let rehydrated = bridge.hydrate();
        assert_eq!(rehydrated.tasks, state.tasks);
        assert_eq!(rehydrated.categories, state.categories);
    }

    #[test]
    fn persists_only_changed_collections() {
        let storage = RecordingStorage::default();
        let writes = Rc::clone(&storage.writes);
        let mut bridge = PersistenceBridge::new(Box::new(storage));
        let state = bridge.hydrate();

        let filtered = apply(
            &state,
            &Action::SetFilter {
                filter: crate::model::StatusFilter::Active,
            },
            &stamp("x"),
        );
        assert_eq!(bridge.persist(&state, &filtered), Written::default());

        let added = apply(&filtered, &Action::add_task("Water plants"), &stamp("t1"));
        let written = bridge.persist(&filtered, &added);
        assert!(written.tasks);
        assert!(!written.categories);

        let dropped = apply(&added, &Action::delete_category("work"), &stamp("y"));
        let written = bridge.persist(&added, &dropped);
        assert!(!written.tasks, "no task referenced the deleted category");
        assert!(written.categories);

        assert_eq!(*writes.borrow(), vec![TASKS_KEY, CATEGORIES_KEY]);
    }

    #[test]
    fn value_equal_collections_are_not_rewritten() {
        let mut bridge = bridge_with(&[]);
        let state = bridge.hydrate();
        let copy = AppState {
            tasks: Arc::new((*state.tasks).clone()),
            ..state.clone()
        };
        assert_eq!(bridge.persist(&state, &copy), Written::default());
    }

    #[test]
    fn failed_writes_are_reported_not_raised() {
        let storage = RecordingStorage {
            fail_writes: true,
            ..RecordingStorage::default()
        };
        let mut bridge = PersistenceBridge::new(Box::new(storage));
        let state = bridge.hydrate();
        let next = apply(&state, &Action::add_task("Call bank"), &stamp("t1"));
        assert_eq!(bridge.persist(&state, &next), Written::default());
    }

    #[test]
    fn tasks_serialize_with_camel_case_fields() {
        let state = apply(&AppState::default(), &Action::add_task("Read"), &stamp("t1"));
        let encoded = encode_tasks(&state.tasks).unwrap();
        assert!(encoded.contains(r#""categoryId":"none""#));
        assert!(encoded.contains(r#""createdAt":"2025-01-02T03:04:05Z""#));
    }
}
