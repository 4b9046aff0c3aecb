//! Closed set of transitions collaborators may request from the store.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{CategoryFilter, StatusFilter};

/// A requested state transition.
///
/// The wire form is string-tagged: `{"type": "ADD_TASK", "payload": {...}}`.
/// Tags the store does not recognise parse to [`Action::Unknown`], which the
/// reducer treats as identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Action {
    AddTask {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        category_id: Option<String>,
    },
    ToggleTask {
        id: String,
    },
    DeleteTask {
        id: String,
    },
    SetFilter {
        filter: StatusFilter,
    },
    SetCategoryFilter {
        category_id: CategoryFilter,
    },
    SetEditingTask {
        id: String,
    },
    UpdateTask {
        id: String,
        #[serde(default)]
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        category_id: Option<String>,
    },
    CancelEdit,
    AddCategory {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<String>,
    },
    UpdateCategory {
        id: String,
        name: String,
        color: String,
    },
    DeleteCategory {
        id: String,
    },
    SetEditingCategory {
        id: String,
    },
    #[serde(skip)]
    Unknown(String),
}

#[derive(Debug, Error)]
pub enum ActionParseError {
    #[error("malformed action: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
}

impl Action {
    pub const KINDS: [&'static str; 12] = [
        "ADD_TASK",
        "TOGGLE_TASK",
        "DELETE_TASK",
        "SET_FILTER",
        "SET_CATEGORY_FILTER",
        "SET_EDITING_TASK",
        "UPDATE_TASK",
        "CANCEL_EDIT",
        "ADD_CATEGORY",
        "UPDATE_CATEGORY",
        "DELETE_CATEGORY",
        "SET_EDITING_CATEGORY",
    ];

    /// Parse the string-tagged wire form.
    pub fn from_json(raw: &str) -> Result<Self, ActionParseError> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        let envelope = Envelope::deserialize(&value)?;
        if !Self::KINDS.contains(&envelope.kind.as_str()) {
            return Ok(Action::Unknown(envelope.kind));
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn kind(&self) -> &str {
        match self {
            Action::AddTask { .. } => "ADD_TASK",
            Action::ToggleTask { .. } => "TOGGLE_TASK",
            Action::DeleteTask { .. } => "DELETE_TASK",
            Action::SetFilter { .. } => "SET_FILTER",
            Action::SetCategoryFilter { .. } => "SET_CATEGORY_FILTER",
            Action::SetEditingTask { .. } => "SET_EDITING_TASK",
            Action::UpdateTask { .. } => "UPDATE_TASK",
            Action::CancelEdit => "CANCEL_EDIT",
            Action::AddCategory { .. } => "ADD_CATEGORY",
            Action::UpdateCategory { .. } => "UPDATE_CATEGORY",
            Action::DeleteCategory { .. } => "DELETE_CATEGORY",
            Action::SetEditingCategory { .. } => "SET_EDITING_CATEGORY",
            Action::Unknown(kind) => kind,
        }
    }

    pub fn add_task(text: impl Into<String>) -> Self {
        Action::AddTask {
            text: text.into(),
            description: None,
            category_id: None,
        }
    }

    pub fn toggle_task(id: impl Into<String>) -> Self {
        Action::ToggleTask { id: id.into() }
    }

    pub fn delete_task(id: impl Into<String>) -> Self {
        Action::DeleteTask { id: id.into() }
    }

    pub fn add_category(name: impl Into<String>) -> Self {
        Action::AddCategory {
            name: name.into(),
            color: None,
        }
    }

    pub fn delete_category(id: impl Into<String>) -> Self {
        Action::DeleteCategory { id: id.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_tagged_add_task() {
        let action = Action::from_json(
            r#"{"type":"ADD_TASK","payload":{"text":"Buy milk","categoryId":"personal"}}"#,
        )
        .unwrap();
        assert_eq!(
            action,
            Action::AddTask {
                text: "Buy milk".into(),
                description: None,
                category_id: Some("personal".into()),
            }
        );
    }

    #[test]
    fn parses_payloadless_cancel_edit() {
        let action = Action::from_json(r#"{"type":"CANCEL_EDIT"}"#).unwrap();
        assert_eq!(action, Action::CancelEdit);
    }

    #[test]
    fn unrecognised_tag_becomes_unknown() {
        let action = Action::from_json(r#"{"type":"UNKNOWN","payload":{"id":"1"}}"#).unwrap();
        assert_eq!(action, Action::Unknown("UNKNOWN".into()));
        assert_eq!(action.kind(), "UNKNOWN");
    }

    #[test]
    fn known_tag_with_bad_payload_is_an_error() {
        let err = Action::from_json(r#"{"type":"TOGGLE_TASK","payload":{}}"#).unwrap_err();
        assert!(err.to_string().contains("id"));
    }

    #[test]
    fn category_filter_payload_accepts_any_string() {
        let action =
            Action::from_json(r#"{"type":"SET_CATEGORY_FILTER","payload":{"categoryId":"ghost"}}"#)
                .unwrap();
        assert_eq!(
            action,
            Action::SetCategoryFilter {
                category_id: CategoryFilter::Category("ghost".into())
            }
        );
    }

    #[test]
    fn serialized_kind_matches_kind_table() {
        let actions = [
            Action::add_task("x"),
            Action::toggle_task("1"),
            Action::delete_task("1"),
            Action::SetFilter {
                filter: StatusFilter::Active,
            },
            Action::CancelEdit,
            Action::add_category("Errands"),
            Action::delete_category("work"),
        ];
        for action in actions {
            let value = serde_json::to_value(&action).unwrap();
            assert_eq!(value["type"], action.kind());
            assert!(Action::KINDS.contains(&action.kind()));
        }
    }
}
