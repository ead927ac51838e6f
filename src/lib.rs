//! Deskbridge - JIRA and Zendesk reconciliation
//!
//! Deskbridge keeps engineering issues in JIRA and customer tickets in
//! Zendesk in step. Each poll pass walks the issues selected by a JQL query
//! and, per issue, resolves or creates the matching ticket, copies new
//! comments both ways, follows assignee and group changes (escalating to a
//! configured contact when agents hand the ticket on) and runs a rule table
//! of status actions until it settles.
//!
//! # Architecture
//!
//! - **bridge**: Reconciliation engine (ticket lifecycle, comments, assignee, status rules)
//! - **config**: YAML configuration and validation
//! - **integrations**: `Tracker`/`Desk` traits with JIRA and Zendesk adapters
//! - **store**: Idempotency records (SQLite, in-memory)
//! - **rules**: Status action definitions
//! - **escalation**: Group-pattern escalation strategies
//! - **runner**: One-shot and watch-mode pass driver

pub mod bridge;
pub mod config;
pub mod error;
pub mod escalation;
pub mod field_mapper;
pub mod integrations;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod rules;
pub mod runner;
pub mod store;
pub mod template;

// Re-exports
pub use bridge::{Bridge, PassSummary};
pub use error::{BridgeError, Result};
