//! Key-value hosts the persistence bridge writes through.

use std::collections::HashMap;

#[cfg(feature = "native")]
use chrono::Utc;
#[cfg(feature = "native")]
use rusqlite::{named_params, Connection, OptionalExtension};
use thiserror::Error;

use crate::config::{AppConfig, StorageHost};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage is unavailable: {0}")]
    Unavailable(String),
    #[cfg(feature = "native")]
    #[error("sqlite storage failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("browser storage failed: {0}")]
    Browser(String),
}

/// String-keyed, string-valued durable storage.
pub trait KeyValueStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Short label used in logs.
    fn describe(&self) -> &'static str;
}

/// Process-local storage; nothing survives a restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn describe(&self) -> &'static str {
        "memory"
    }
}

/// A single `kv` table inside the data directory's SQLite file.
#[cfg(feature = "native")]
pub struct SqliteStorage {
    conn: Connection,
}

#[cfg(feature = "native")]
impl SqliteStorage {
    pub fn open(config: &AppConfig) -> Result<Self, StorageError> {
        let conn = Connection::open(config.storage_path())?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let storage = Self { conn };
        storage.apply_migrations()?;
        Ok(storage)
    }

    fn apply_migrations(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
             );",
        )?;
        Ok(())
    }
}

#[cfg(feature = "native")]
impl KeyValueStorage for SqliteStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv WHERE key = :key",
                named_params![":key": key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (:key, :value, :updated_at)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            named_params![
                ":key": key,
                ":value": value,
                ":updated_at": Utc::now(),
            ],
        )?;
        Ok(())
    }

    fn describe(&self) -> &'static str {
        "sqlite"
    }
}

/// `window.localStorage`, for wasm builds.
#[cfg(feature = "web")]
pub struct BrowserStorage {
    inner: web_sys::Storage,
}

#[cfg(feature = "web")]
impl BrowserStorage {
    pub fn open() -> Result<Self, StorageError> {
        let window = web_sys::window()
            .ok_or_else(|| StorageError::Unavailable("no window".into()))?;
        let inner = window
            .local_storage()
            .map_err(|err| StorageError::Unavailable(format!("{err:?}")))?
            .ok_or_else(|| StorageError::Unavailable("localStorage disabled".into()))?;
        Ok(Self { inner })
    }
}

#[cfg(feature = "web")]
impl KeyValueStorage for BrowserStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner
            .get_item(key)
            .map_err(|err| StorageError::Browser(format!("{err:?}")))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.inner
            .set_item(key, value)
            .map_err(|err| StorageError::Browser(format!("{err:?}")))
    }

    fn describe(&self) -> &'static str {
        "localStorage"
    }
}

/// Open the storage `config` asks for. A durable host that cannot be opened
/// degrades to [`MemoryStorage`].
pub fn open_storage(config: &AppConfig) -> Box<dyn KeyValueStorage> {
    match config.host() {
        StorageHost::Memory => Box::new(MemoryStorage::new()),
        StorageHost::Durable => open_durable(config).unwrap_or_else(|err| {
            tracing::warn!(
                path = %config.storage_path().display(),
                error = %err,
                "durable storage unavailable, keeping state in memory"
            );
            Box::new(MemoryStorage::new())
        }),
    }
}

#[cfg(feature = "native")]
fn open_durable(config: &AppConfig) -> Result<Box<dyn KeyValueStorage>, StorageError> {
    Ok(Box::new(SqliteStorage::open(config)?))
}

#[cfg(all(feature = "web", not(feature = "native")))]
fn open_durable(_config: &AppConfig) -> Result<Box<dyn KeyValueStorage>, StorageError> {
    Ok(Box::new(BrowserStorage::open()?))
}

#[cfg(not(any(feature = "native", feature = "web")))]
fn open_durable(_config: &AppConfig) -> Result<Box<dyn KeyValueStorage>, StorageError> {
    Err(StorageError::Unavailable(
        "built without a durable storage host".into(),
    ))
}
