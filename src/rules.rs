//! Status action rule tables
//!
//! A rule table is an ordered list of action definitions:
//!
//! ```yaml
//! tracker_status_actions:
//!   - description: Resolve ticket when the issue is done
//!     tracker_status: [Done]
//!     desk_status: [new, open, pending]
//!     force: false
//!     actions:
//!       - type: update_ticket
//!         description: Mark the ticket solved
//!         only_once: true
//!         status: solved
//!       - type: add_ticket_tags
//!         description: Tag as resolved by engineering
//!         tags: [resolved_by_eng]
//! ```
//!
//! Every key of an action besides `type`, `description` and `only_once` is a
//! handler parameter. Action types form a closed set; unknown types and
//! missing parameters are rejected when the table is parsed.

use crate::integrations::TicketStatus;
use crate::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An action definition as written in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDefinitionConfig {
    #[serde(default)]
    pub description: String,

    /// Tracker statuses this rule applies to
    #[serde(alias = "jira_status")]
    pub tracker_status: Vec<String>,

    /// Desk statuses this rule applies to
    #[serde(alias = "zd_status")]
    pub desk_status: Vec<String>,

    /// Apply even when the issue is not owned by the bot
    #[serde(default)]
    pub force: bool,

    pub actions: Vec<ActionConfig>,
}

/// An action as written in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionConfig {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub only_once: bool,

    /// Handler-specific parameters
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

/// The built-in action handlers
#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    /// Apply arbitrary ticket attribute updates (status, priority, group_id, ...)
    UpdateTicket { fields: Map<String, Value> },

    /// Perform the named workflow transition, forwarding any extra fields
    TransitionIssue {
        name: String,
        fields: Map<String, Value>,
    },

    AddTicketTags { tags: Vec<String> },

    RemoveTicketTags { tags: Vec<String> },
}

impl ActionKind {
    /// Type tags accepted in configuration
    pub const TAGS: [&'static str; 4] = [
        "update_ticket",
        "transition_issue",
        "add_ticket_tags",
        "remove_ticket_tags",
    ];

    /// Build a handler from its type tag and parameters
    pub fn parse(kind: &str, params: &Map<String, Value>) -> Result<Self> {
        match kind {
            "update_ticket" => {
                if params.is_empty() {
                    return Err(BridgeError::Config(
                        "update_ticket action has no ticket fields to set".to_string(),
                    ));
                }
                Ok(ActionKind::UpdateTicket {
                    fields: params.clone(),
                })
            }
            "transition_issue" => {
                let mut fields = params.clone();
                let name = match fields.remove("name") {
                    Some(Value::String(name)) if !name.is_empty() => name,
                    _ => {
                        return Err(BridgeError::Config(
                            "transition_issue action requires a transition 'name'".to_string(),
                        ))
                    }
                };
                Ok(ActionKind::TransitionIssue { name, fields })
            }
            "add_ticket_tags" => Ok(ActionKind::AddTicketTags {
                tags: parse_tags(kind, params)?,
            }),
            "remove_ticket_tags" => Ok(ActionKind::RemoveTicketTags {
                tags: parse_tags(kind, params)?,
            }),
            other => Err(BridgeError::Config(format!(
                "Unknown action type '{}'. Must be one of: {}",
                other,
                Self::TAGS.join(", ")
            ))),
        }
    }

    /// Type tag of this handler, as used in configuration and metrics
    pub fn tag(&self) -> &'static str {
        match self {
            ActionKind::UpdateTicket { .. } => "update_ticket",
            ActionKind::TransitionIssue { .. } => "transition_issue",
            ActionKind::AddTicketTags { .. } => "add_ticket_tags",
            ActionKind::RemoveTicketTags { .. } => "remove_ticket_tags",
        }
    }
}

fn parse_tags(kind: &str, params: &Map<String, Value>) -> Result<Vec<String>> {
    let missing = || BridgeError::Config(format!("{} action requires a list of 'tags'", kind));

    let tags = params.get("tags").and_then(Value::as_array).ok_or_else(missing)?;
    let tags: Vec<String> = tags
        .iter()
        .map(|t| t.as_str().map(str::to_string))
        .collect::<Option<_>>()
        .ok_or_else(missing)?;

    if tags.is_empty() {
        return Err(missing());
    }
    Ok(tags)
}

/// A parsed action
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub kind: ActionKind,
    pub description: String,
    /// Only run on the pass where the status change is first observed
    pub only_once: bool,
}

impl Action {
    pub fn from_config(config: &ActionConfig) -> Result<Self> {
        Ok(Self {
            kind: ActionKind::parse(&config.kind, &config.params)?,
            description: config.description.clone(),
            only_once: config.only_once,
        })
    }
}

/// A parsed rule
#[derive(Debug, Clone, PartialEq)]
pub struct ActionDefinition {
    pub tracker_status: Vec<String>,
    pub desk_status: Vec<TicketStatus>,
    pub actions: Vec<Action>,
    pub description: String,
    pub force: bool,
}

impl ActionDefinition {
    pub fn from_config(config: &ActionDefinitionConfig) -> Result<Self> {
        let desk_status = config
            .desk_status
            .iter()
            .map(|s| {
                s.parse::<TicketStatus>().map_err(|e| {
                    BridgeError::Config(format!("Rule '{}': {}", config.description, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let actions = config
            .actions
            .iter()
            .map(|a| {
                Action::from_config(a).map_err(|e| match e {
                    BridgeError::Config(msg) => {
                        BridgeError::Config(format!("Rule '{}': {}", config.description, msg))
                    }
                    other => other,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            tracker_status: config.tracker_status.clone(),
            desk_status,
            actions,
            description: config.description.clone(),
            force: config.force,
        })
    }

    /// Whether this rule applies to the current status pair
    pub fn matches(&self, tracker_status: &str, desk_status: TicketStatus, owned: bool) -> bool {
        (owned || self.force)
            && self.tracker_status.iter().any(|s| s == tracker_status)
            && self.desk_status.contains(&desk_status)
    }
}

/// Parse a whole rule table, preserving order
pub fn parse_action_definitions(configs: &[ActionDefinitionConfig]) -> Result<Vec<ActionDefinition>> {
    configs.iter().map(ActionDefinition::from_config).collect()
}
