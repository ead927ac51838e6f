//! Ticket lifecycle: find, create, or follow up

use super::{Bridge, SyncContext};
use crate::integrations::{Desk, NewComment, NewTicket, SortOrder, Ticket, TicketStatus, Tracker};
use crate::metrics;
use crate::model::Issue;
use crate::store::{keys, IdempotencyStore};
use crate::template::Bindings;
use crate::{BridgeError, Result};
use tracing::{debug, info, warn};

/// Whether an untracked or previously closed issue should get a ticket
///
/// Issues already in a solved status, and issues assigned to someone other
/// than the bot, are left alone.
pub fn is_issue_eligible(
    status: &str,
    assignee: Option<&str>,
    bot_identity: &str,
    solved_statuses: &[String],
) -> bool {
    if solved_statuses.iter().any(|s| s == status) {
        return false;
    }

    match assignee {
        Some(assignee) => assignee == bot_identity,
        None => true,
    }
}

impl<T, D, S> Bridge<T, D, S>
where
    T: Tracker,
    D: Desk,
    S: IdempotencyStore,
{
    /// Resolve the ticket for the issue, creating one if the issue is eligible
    ///
    /// Returns `false` when the issue should not be bridged this pass.
    pub(super) async fn ensure_ticket_if_eligible(&self, ctx: &mut SyncContext) -> Result<bool> {
        let cache_key = keys::ticket_for_issue(&ctx.issue.key);

        let ticket = match self.cached_ticket(&cache_key).await? {
            Some(ticket) => Some(ticket),
            None => {
                let query = self
                    .templates
                    .ticket_query
                    .render(&Bindings::new().bind("issue", &ctx.issue)?);
                debug!(query = %query, "Searching Zendesk for ticket");
                self.desk
                    .find_first(&query, "created_at", SortOrder::Desc)
                    .await?
            }
        };

        let ticket = match ticket {
            None => {
                if !self.is_eligible(&ctx.issue) {
                    debug!("Skipping previously untracked, ineligible issue");
                    return Ok(false);
                }
                info!("Creating Zendesk ticket for JIRA issue");
                self.create_ticket(&ctx.issue, None).await?
            }
            Some(previous) if previous.status == TicketStatus::Closed => {
                if !self.is_eligible(&ctx.issue) {
                    debug!(ticket = previous.id, "Skipping previously closed, ineligible issue");
                    return Ok(false);
                }
                info!(ticket = previous.id, "Creating followup Zendesk ticket for JIRA issue");
                self.create_ticket(&ctx.issue, Some(&previous)).await?
            }
            Some(ticket) => ticket,
        };

        // Zendesk search is strictly rate limited
        self.store.set(&cache_key, &ticket.id.to_string())?;
        ctx.ticket = Some(ticket);

        Ok(true)
    }

    fn is_eligible(&self, issue: &Issue) -> bool {
        is_issue_eligible(
            &issue.status,
            issue.assignee_name(),
            &self.tracker_identity.name,
            &self.config.tracker.solved_statuses,
        )
    }

    /// Ticket recorded for the issue on an earlier pass, if it still exists
    async fn cached_ticket(&self, cache_key: &str) -> Result<Option<Ticket>> {
        let Some(cached) = self.store.get(cache_key)? else {
            return Ok(None);
        };

        let Ok(id) = cached.parse::<u64>() else {
            warn!(value = %cached, "Ignoring unparsable cached ticket id");
            return Ok(None);
        };

        match self.desk.ticket(id).await {
            Ok(ticket) => Ok(Some(ticket)),
            Err(BridgeError::Zendesk(::zendesk::Error::NotFound(_))) => {
                warn!(ticket = id, "Cached ticket no longer exists, searching instead");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Create a ticket for the issue, as a followup when `previous` is given
    async fn create_ticket(&self, issue: &Issue, previous: Option<&Ticket>) -> Result<Ticket> {
        let bindings = Bindings::new()
            .bind("issue", issue)?
            .bind("tracker_url", &self.config.tracker.url.trim_end_matches('/'))?;

        let body = match previous {
            Some(_) => self.templates.followup_comment.render(&bindings),
            None => self.templates.initial_comment.render(&bindings),
        };

        let request = NewTicket {
            subject: self.templates.subject.render(&bindings),
            comment: Some(NewComment { body, public: None }),
            external_id: Some(issue.key.clone()),
            custom_fields: self.initial_fields.clone(),
            group_id: Some(self.support_group.id),
            ticket_form_id: self.ticket_form.as_ref().map(|f| f.id),
            via_followup_source_id: previous.map(|t| t.id),
        };

        let ticket = self.desk.create_ticket(&request).await?;
        metrics::record_ticket_created(if previous.is_some() { "followup" } else { "initial" });
        info!(ticket = ticket.id, "Created Zendesk ticket");

        Ok(ticket)
    }
}
