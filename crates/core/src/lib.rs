pub mod action;
pub mod config;
pub mod dashboard;
pub mod model;
pub mod persistence;
pub mod reducer;
pub mod storage;
pub mod store;
pub mod views;

pub use action::{Action, ActionParseError};
pub use config::{AppConfig, StorageHost};
pub use dashboard::Dashboard;
pub use model::*;
pub use persistence::PersistenceBridge;
pub use reducer::{apply, Stamp, StampSource, SystemStamps};
#[cfg(feature = "native")]
pub use storage::SqliteStorage;
pub use storage::{open_storage, KeyValueStorage, MemoryStorage, StorageError};
pub use store::{Store, SubscriptionId};
pub use views::{visible_tasks, TaskStats};
