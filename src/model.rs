//! Tracker-side domain types
//!
//! The reconciliation engine works on these rather than on JIRA wire types.
//! Desk-side types come from the `zendesk` crate.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A tracker user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerUser {
    /// Identity used for assignment and ownership checks
    pub name: String,
    pub display_name: String,
}

impl TrackerUser {
    pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
        }
    }
}

/// A comment on a tracker issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueComment {
    pub id: String,
    pub author: TrackerUser,
    pub body: String,
    pub created: String,
}

/// A tracker issue snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub key: String,
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub assignee: Option<TrackerUser>,
    #[serde(default)]
    pub creator: Option<TrackerUser>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub comments: Vec<IssueComment>,
    /// Remaining fields (custom fields included) keyed by field id
    #[serde(default)]
    pub fields: HashMap<String, serde_json::Value>,
}

impl Issue {
    pub fn assignee_name(&self) -> Option<&str> {
        self.assignee.as_ref().map(|a| a.name.as_str())
    }

    /// Value of an extra field rendered as text; empty and null count as absent
    pub fn field_text(&self, field: &str) -> Option<String> {
        match self.fields.get(field)? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) if s.is_empty() => None,
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => match n.as_f64() {
                // Numeric custom fields come back as floats
                Some(f) if n.is_f64() && f.fract() == 0.0 => Some(format!("{}", f as i64)),
                _ => Some(n.to_string()),
            },
            other => Some(other.to_string()),
        }
    }
}

/// A workflow transition currently available on an issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub id: String,
    pub name: String,
}
