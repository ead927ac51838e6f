//! External Integrations
//!
//! The reconciliation engine talks to the outside world only through the
//! [`Tracker`] and [`Desk`] traits defined here.
//!
//! # Built-in Integrations
//!
//! - **JIRA**: REST API v2 adapter implementing [`Tracker`]
//! - **Zendesk**: [`Desk`] implemented for the `zendesk` crate's client
//!
//! Every method is a suspension point that may block or be rate limited.
//! Adapters apply per-request timeouts and report failures as errors; the
//! engine never retries writes itself.

pub mod jira;
pub mod retry;
pub mod zendesk;

use crate::model::{Issue, Transition, TrackerUser};
use crate::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

pub use ::zendesk::{
    Comment as TicketComment, CustomField, Group, NewComment, NewTicket, SortOrder, Ticket,
    TicketField, TicketForm, TicketStatus, User as DeskUser,
};
pub use jira::{JiraAdapter, JiraError};

/// The issue-tracking system
#[async_trait]
pub trait Tracker: Send + Sync {
    /// The identity the bridge acts as
    async fn current_user(&self) -> Result<TrackerUser>;

    /// All issues matching a free-form query, iterated until exhausted
    async fn search_issues(&self, query: &str) -> Result<Vec<Issue>>;

    /// Fresh snapshot of a single issue, comments included
    async fn issue(&self, key: &str) -> Result<Issue>;

    async fn assign_issue(&self, key: &str, assignee: &str) -> Result<()>;

    async fn add_comment(&self, key: &str, body: &str) -> Result<()>;

    /// Set a single field to a text value
    async fn update_field(&self, key: &str, field: &str, value: &str) -> Result<()>;

    /// Workflow transitions available from the issue's current status
    async fn transitions(&self, key: &str) -> Result<Vec<Transition>>;

    async fn transition_issue(
        &self,
        key: &str,
        transition_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<()>;
}

/// The helpdesk system
#[async_trait]
pub trait Desk: Send + Sync {
    /// The identity the bridge acts as
    async fn current_user(&self) -> Result<DeskUser>;

    async fn user(&self, id: u64) -> Result<DeskUser>;

    async fn ticket(&self, id: u64) -> Result<Ticket>;

    /// Comments on a ticket in the order the desk returns them
    async fn ticket_comments(&self, id: u64) -> Result<Vec<TicketComment>>;

    /// First ticket matching `query` under the given sort
    async fn find_first(
        &self,
        query: &str,
        sort_by: &str,
        sort_order: SortOrder,
    ) -> Result<Option<Ticket>>;

    async fn create_ticket(&self, ticket: &NewTicket) -> Result<Ticket>;

    /// Apply arbitrary ticket attribute updates
    async fn update_ticket(&self, id: u64, fields: &Map<String, Value>) -> Result<Ticket>;

    async fn add_comment(&self, id: u64, comment: NewComment) -> Result<()>;

    async fn add_tags(&self, id: u64, tags: &[String]) -> Result<()>;

    async fn remove_tags(&self, id: u64, tags: &[String]) -> Result<()>;

    async fn assignable_groups(&self) -> Result<Vec<Group>>;

    async fn ticket_fields(&self) -> Result<Vec<TicketField>>;

    async fn ticket_forms(&self) -> Result<Vec<TicketForm>>;
}
