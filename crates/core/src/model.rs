use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Category id stored on tasks that belong to no category.
pub const UNCATEGORIZED: &str = "none";
/// Category filter value that disables category filtering.
pub const ALL_CATEGORIES: &str = "all";
/// Colour for new categories without one and for uncategorised tasks.
pub const DEFAULT_CATEGORY_COLOR: &str = "#6b7280";
/// Display name for tasks whose category is `"none"`.
pub const UNCATEGORIZED_LABEL: &str = "No Category";

static COLOR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("valid color regex"));

const DEFAULT_CATEGORIES: [(&str, &str, &str); 5] = [
    ("work", "Work", "#3b82f6"),
    ("personal", "Personal", "#10b981"),
    ("study", "Study", "#8b5cf6"),
    ("health", "Health", "#ef4444"),
    ("finance", "Finance", "#f59e0b"),
];

/// Ids that can never name a real category.
pub fn is_reserved_category_id(id: &str) -> bool {
    id == UNCATEGORIZED || id == ALL_CATEGORIES
}

pub fn is_valid_color(value: &str) -> bool {
    COLOR_PATTERN.is_match(value)
}

pub fn default_categories() -> Vec<Category> {
    DEFAULT_CATEGORIES
        .iter()
        .map(|(id, name, color)| Category {
            id: (*id).to_string(),
            name: (*name).to_string(),
            color: (*color).to_string(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub text: String,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub description: String,
    #[serde(default = "uncategorized", deserialize_with = "category_or_none")]
    pub category_id: String,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn is_uncategorized(&self) -> bool {
        self.category_id == UNCATEGORIZED
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default = "default_color")]
    pub color: String,
}

fn uncategorized() -> String {
    UNCATEGORIZED.to_string()
}

fn default_color() -> String {
    DEFAULT_CATEGORY_COLOR.to_string()
}

// Older saves predate categories; null and "" mean uncategorized too.
fn category_or_none<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(match raw {
        Some(value) if !value.is_empty() => value,
        _ => uncategorized(),
    })
}

fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl StatusFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Active => "active",
            StatusFilter::Completed => "completed",
        }
    }

    pub fn admits(&self, task: &Task) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Active => !task.completed,
            StatusFilter::Completed => task.completed,
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StatusFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "active" => Ok(StatusFilter::Active),
            "completed" | "done" => Ok(StatusFilter::Completed),
            other => Err(anyhow!(
                "Unknown filter '{}': expected all|active|completed",
                other
            )),
        }
    }
}

impl ValueEnum for StatusFilter {
    fn value_variants<'a>() -> &'a [Self] {
        const VARIANTS: [StatusFilter; 3] = [
            StatusFilter::All,
            StatusFilter::Active,
            StatusFilter::Completed,
        ];
        &VARIANTS
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        let value = clap::builder::PossibleValue::new(self.as_str());
        Some(match self {
            StatusFilter::Completed => value.alias("done"),
            _ => value,
        })
    }
}

/// Category narrowing applied on top of the status filter.
///
/// Serialized as a bare string: `"all"`, `"none"`, or a category id. Ids that
/// match no category are kept as-is; the filtered view is then empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum CategoryFilter {
    #[default]
    All,
    Uncategorized,
    Category(String),
}

impl CategoryFilter {
    pub fn as_str(&self) -> &str {
        match self {
            CategoryFilter::All => ALL_CATEGORIES,
            CategoryFilter::Uncategorized => UNCATEGORIZED,
            CategoryFilter::Category(id) => id,
        }
    }

    pub fn admits(&self, task: &Task) -> bool {
        match self {
            CategoryFilter::All => true,
            other => task.category_id == other.as_str(),
        }
    }

    pub fn targets(&self, category_id: &str) -> bool {
        matches!(self, CategoryFilter::Category(id) if id == category_id)
    }
}

impl From<&str> for CategoryFilter {
    fn from(value: &str) -> Self {
        match value {
            ALL_CATEGORIES => CategoryFilter::All,
            UNCATEGORIZED => CategoryFilter::Uncategorized,
            id => CategoryFilter::Category(id.to_string()),
        }
    }
}

impl From<String> for CategoryFilter {
    fn from(value: String) -> Self {
        CategoryFilter::from(value.as_str())
    }
}

impl FromStr for CategoryFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(CategoryFilter::from(s))
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CategoryFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CategoryFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(CategoryFilter::from(raw))
    }
}

/// The single aggregate the reducer transitions.
///
/// Collections sit behind `Arc` so an untouched collection keeps its identity
/// from one snapshot to the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub tasks: Arc<Vec<Task>>,
    pub categories: Arc<Vec<Category>>,
    pub filter: StatusFilter,
    pub category_filter: CategoryFilter,
    pub editing_task_id: Option<String>,
    pub editing_category_id: Option<String>,
}

impl AppState {
    pub fn with_collections(tasks: Vec<Task>, categories: Vec<Category>) -> Self {
        Self {
            tasks: Arc::new(tasks),
            categories: Arc::new(categories),
            filter: StatusFilter::default(),
            category_filter: CategoryFilter::default(),
            editing_task_id: None,
            editing_category_id: None,
        }
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|category| category.id == id)
    }

    pub fn has_category(&self, id: &str) -> bool {
        self.category(id).is_some()
    }

    pub fn editing_task(&self) -> Option<&Task> {
        self.editing_task_id.as_deref().and_then(|id| self.task(id))
    }

    pub fn editing_category(&self) -> Option<&Category> {
        self.editing_category_id
            .as_deref()
            .and_then(|id| self.category(id))
    }

    /// True when every task points at `"none"` or at a present category.
    pub fn references_are_consistent(&self) -> bool {
        self.tasks
            .iter()
            .all(|task| task.is_uncategorized() || self.has_category(&task.category_id))
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::with_collections(Vec::new(), default_categories())
    }
}
