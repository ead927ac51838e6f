//! Configuration system
//!
//! Loads ~/.config/deskbridge/config.yaml with:
//! - JIRA and Zendesk connection settings
//! - Templates for subjects, bodies, comments and the ticket search
//! - Status action rule tables
//! - Escalation strategies
//! - Idempotency state location

mod bridge_config;
pub mod validation;

pub use bridge_config::{BridgeConfig, DeskConfig, IdentityField, StateConfig, TrackerConfig};
pub use validation::{validate_config, validate_config_result, ValidationError};
