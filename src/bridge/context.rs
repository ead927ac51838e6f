//! Per-issue reconciliation state

use crate::integrations::Ticket;
use crate::model::Issue;
use crate::{BridgeError, Result};

/// Issue/ticket pair for one reconciliation of one issue
///
/// The ticket is filled in once resolved and replaced whenever a step
/// refreshes it. Nothing here outlives the issue's reconciliation.
#[derive(Debug, Clone)]
pub struct SyncContext {
    pub issue: Issue,
    pub ticket: Option<Ticket>,
}

impl SyncContext {
    pub fn new(issue: Issue) -> Self {
        Self {
            issue,
            ticket: None,
        }
    }

    /// The resolved ticket
    pub fn ticket(&self) -> Result<&Ticket> {
        self.ticket.as_ref().ok_or_else(|| {
            BridgeError::Other(format!("No ticket resolved for issue {}", self.issue.key))
        })
    }

    pub fn ticket_id(&self) -> Result<u64> {
        Ok(self.ticket()?.id)
    }
}
