//! Where a session keeps its collections.

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::anyhow;
use clap::ValueEnum;
use directories::{BaseDirs, ProjectDirs};

static STORAGE_FILE_NAME: &str = "taskdeck.sqlite3";
pub static ENV_DATA_DIR: &str = "TASKDECK_DATA_DIR";
pub static ENV_STORAGE: &str = "TASKDECK_STORAGE";

/// Which key-value host backs the persistence bridge.
///
/// `Durable` is SQLite on native builds and `localStorage` in the browser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StorageHost {
    #[default]
    Durable,
    Memory,
}

impl StorageHost {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageHost::Durable => "durable",
            StorageHost::Memory => "memory",
        }
    }
}

impl fmt::Display for StorageHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageHost {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "durable" | "sqlite" | "local" => Ok(StorageHost::Durable),
            "memory" | "mem" => Ok(StorageHost::Memory),
            other => Err(anyhow!(
                "Unknown storage '{}': expected durable|memory",
                other
            )),
        }
    }
}

impl ValueEnum for StorageHost {
    fn value_variants<'a>() -> &'a [Self] {
        &[StorageHost::Durable, StorageHost::Memory]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        let value = clap::builder::PossibleValue::new(self.as_str());
        Some(match self {
            StorageHost::Durable => value.alias("sqlite"),
            StorageHost::Memory => value,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    data_dir: PathBuf,
    host: StorageHost,
}

impl AppConfig {
    /// Resolve the data directory and storage host from the overrides, the
    /// environment and platform defaults.
    ///
    /// Never fails. A durable host whose directory cannot be created is
    /// downgraded to [`StorageHost::Memory`] with a warning.
    pub fn discover(data_dir_override: Option<PathBuf>, host_override: Option<StorageHost>) -> Self {
        let data_dir = resolve_data_dir(data_dir_override);
        let host = host_override.unwrap_or_else(host_from_env);
        let config = Self { data_dir, host };
        if config.host == StorageHost::Durable && cfg!(not(target_arch = "wasm32")) {
            if let Err(err) = fs::create_dir_all(&config.data_dir) {
                tracing::warn!(
                    path = %config.data_dir.display(),
                    error = %err,
                    "data directory unusable, keeping state in memory"
                );
                return config.with_host(StorageHost::Memory);
            }
        }
        config
    }

    /// Durable storage rooted at an already-resolved directory.
    pub fn from_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            host: StorageHost::Durable,
        }
    }

    pub fn with_host(mut self, host: StorageHost) -> Self {
        self.host = host;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn storage_path(&self) -> PathBuf {
        self.data_dir.join(STORAGE_FILE_NAME)
    }

    pub fn host(&self) -> StorageHost {
        self.host
    }
}

fn host_from_env() -> StorageHost {
    match env::var(ENV_STORAGE) {
        Ok(raw) => raw.parse().unwrap_or_else(|err: anyhow::Error| {
            tracing::warn!(variable = ENV_STORAGE, error = %err, "ignoring storage override");
            StorageHost::default()
        }),
        Err(_) => StorageHost::default(),
    }
}

fn resolve_data_dir(data_dir_override: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = data_dir_override {
        return dir;
    }

    if let Some(dir) = env::var_os(ENV_DATA_DIR).filter(|dir| !dir.is_empty()) {
        return PathBuf::from(dir);
    }

    if let Some(project) = ProjectDirs::from("dev", "taskdeck", "taskdeck") {
        return project.data_dir().to_path_buf();
    }

    if let Some(base) = BaseDirs::new() {
        return base.home_dir().join(".taskdeck");
    }

    PathBuf::from(".taskdeck")
}
