//! Deskbridge configuration file handling
//!
//! Loads and manages the ~/.config/deskbridge/config.yaml file.

use crate::escalation::EscalationStrategyConfig;
use crate::field_mapper::FieldMapping;
use crate::rules::ActionDefinitionConfig;
use crate::store::StoreConfig;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Which JIRA user attribute identifies a user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityField {
    /// Server/Data Center usernames
    #[default]
    Name,
    /// Cloud account ids
    AccountId,
}

/// JIRA settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// JIRA base URL
    pub url: String,

    pub username: String,

    /// Environment variable holding the password or API token
    #[serde(default)]
    pub password_env: Option<String>,

    #[serde(default)]
    pub identity_field: IdentityField,

    /// JQL selecting the issues bridged on every pass
    pub issue_query: String,

    /// Statuses that make an untracked issue ineligible for a ticket
    #[serde(default)]
    pub solved_statuses: Vec<String>,

    /// JIRA priority name to Zendesk priority
    #[serde(default)]
    pub priority_map: BTreeMap<String, String>,

    /// Zendesk priority for unmapped JIRA priorities
    #[serde(default = "default_fallback_priority")]
    pub fallback_priority: String,

    /// Custom field that receives the Zendesk ticket id
    #[serde(default)]
    pub reference_field: Option<String>,

    /// Template for Zendesk comments copied into JIRA
    #[serde(default = "default_tracker_comment_format")]
    pub comment_format: String,
}

fn default_fallback_priority() -> String {
    "normal".to_string()
}

fn default_tracker_comment_format() -> String {
    "*{{ author }}* ({{ created }}):\n\n{{ stripped_body }}".to_string()
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: String::new(),
            password_env: None,
            identity_field: IdentityField::default(),
            issue_query: String::new(),
            solved_statuses: Vec::new(),
            priority_map: BTreeMap::new(),
            fallback_priority: default_fallback_priority(),
            reference_field: None,
            comment_format: default_tracker_comment_format(),
        }
    }
}

/// Zendesk settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeskConfig {
    /// Zendesk base URL
    pub url: String,

    /// Agent email the API token belongs to
    pub username: String,

    /// Environment variable holding the API token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Search template locating the ticket for an issue
    #[serde(default = "default_ticket_query")]
    pub ticket_query: String,

    #[serde(default = "default_subject_format")]
    pub subject_format: String,

    #[serde(default = "default_initial_comment_format")]
    pub initial_comment_format: String,

    #[serde(default = "default_followup_comment_format")]
    pub followup_comment_format: String,

    /// Template for JIRA comments copied into Zendesk
    #[serde(default = "default_desk_comment_format")]
    pub comment_format: String,

    /// Text from the last occurrence of this delimiter on is dropped from
    /// comments copied into JIRA
    #[serde(default = "default_signature_delimiter")]
    pub signature_delimiter: String,

    /// Custom fields set on every new ticket
    #[serde(default)]
    pub initial_fields: Vec<FieldMapping>,

    /// Group new tickets are assigned to
    pub support_group: String,

    /// Form new tickets are created with
    #[serde(default)]
    pub ticket_form: Option<String>,
}

fn default_token_env() -> String {
    "ZENDESK_API_TOKEN".to_string()
}

fn default_ticket_query() -> String {
    "type:ticket external_id:\"{{ issue.key }}\"".to_string()
}

fn default_subject_format() -> String {
    "[{{ issue.key }}] {{ issue.summary }}".to_string()
}

fn default_initial_comment_format() -> String {
    "{{ issue.description }}\n\n{{ tracker_url }}/browse/{{ issue.key }}".to_string()
}

fn default_followup_comment_format() -> String {
    "{{ issue.key }} was reopened.\n\n{{ tracker_url }}/browse/{{ issue.key }}".to_string()
}

fn default_desk_comment_format() -> String {
    "{{ comment.author.display_name }} commented:\n\n{{ comment.body }}".to_string()
}

fn default_signature_delimiter() -> String {
    "--".to_string()
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: String::new(),
            token_env: default_token_env(),
            ticket_query: default_ticket_query(),
            subject_format: default_subject_format(),
            initial_comment_format: default_initial_comment_format(),
            followup_comment_format: default_followup_comment_format(),
            comment_format: default_desk_comment_format(),
            signature_delimiter: default_signature_delimiter(),
            initial_fields: Vec::new(),
            support_group: String::new(),
            ticket_form: None,
        }
    }
}

/// Idempotency state settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Path to SQLite database file
    #[serde(default = "crate::store::default_path")]
    pub path: PathBuf,

    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

fn default_wal_mode() -> bool {
    true
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: crate::store::default_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

impl From<&StateConfig> for StoreConfig {
    fn from(state: &StateConfig) -> Self {
        StoreConfig {
            path: state.path.clone(),
            wal_mode: state.wal_mode,
        }
    }
}

/// Deskbridge configuration
///
/// Represents the complete ~/.config/deskbridge/config.yaml file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub tracker: TrackerConfig,

    pub desk: DeskConfig,

    #[serde(default)]
    pub state: StateConfig,

    /// Rules evaluated for changes on the JIRA side
    #[serde(default, alias = "jira_status_actions")]
    pub tracker_status_actions: Vec<ActionDefinitionConfig>,

    /// Rules evaluated for changes on the Zendesk side
    #[serde(default, alias = "zd_status_actions")]
    pub desk_status_actions: Vec<ActionDefinitionConfig>,

    #[serde(default)]
    pub escalation_strategies: Vec<EscalationStrategyConfig>,

    /// Seconds between passes in watch mode
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
}

impl BridgeConfig {
    /// Load configuration from the default path (~/.config/deskbridge/config.yaml)
    pub fn load_default() -> Result<Self> {
        Self::load(Self::default_path())
    }

    /// Load configuration from a specific path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(crate::BridgeError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading Deskbridge configuration");

        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;

        tracing::debug!(
            tracker_rules = config.tracker_status_actions.len(),
            desk_rules = config.desk_status_actions.len(),
            escalation_strategies = config.escalation_strategies.len(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "Saving Deskbridge configuration");

        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;

        Ok(())
    }

    /// Get the default config path (~/.config/deskbridge/config.yaml)
    pub fn default_path() -> PathBuf {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".config");
        path.push("deskbridge");
        path.push("config.yaml");
        path
    }

    /// Map a JIRA priority name to a Zendesk priority
    pub fn desk_priority_for(&self, tracker_priority: Option<&str>) -> &str {
        tracker_priority
            .and_then(|p| self.tracker.priority_map.get(p))
            .unwrap_or(&self.tracker.fallback_priority)
    }
}
