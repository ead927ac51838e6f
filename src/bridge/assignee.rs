//! Assignee and group change detection, and escalation
//!
//! Changes are detected against the values recorded on the previous pass.
//! At most one corrective branch fires per pass, tested top to bottom:
//!
//! 1. unassigned issue: claim it for the bot
//! 2. assignee changed: if it is now the bot, pull the ticket back into the
//!    support group
//! 3. group changed: if it is no longer the support group, escalate
//!
//! When nothing changed the recorded values are left as they are.

use super::{Bridge, SyncContext};
use crate::integrations::{Desk, Tracker};
use crate::metrics;
use crate::store::{keys, IdempotencyStore};
use crate::Result;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

impl<T, D, S> Bridge<T, D, S>
where
    T: Tracker,
    D: Desk,
    S: IdempotencyStore,
{
    pub(super) async fn sync_assignee(&self, ctx: &mut SyncContext) -> Result<()> {
        let (ticket_id, group_id) = {
            let ticket = ctx.ticket()?;
            (ticket.id, ticket.group_id)
        };
        let assignee_key = keys::last_seen_assignee(&ctx.issue.key);
        let group_key = keys::last_seen_group(ticket_id);

        let last_seen_assignee = self.store.get(&assignee_key)?;
        let last_seen_group = self.store.get(&group_key)?;
        let current_group = group_id.map(|id| id.to_string()).unwrap_or_default();

        match ctx.issue.assignee_name().map(str::to_string) {
            None => {
                info!("Assigning previously unassigned JIRA issue to bot");
                self.tracker
                    .assign_issue(&ctx.issue.key, &self.tracker_identity.name)
                    .await?;
                self.refresh_issue(ctx).await?;
            }
            Some(assignee) if last_seen_assignee.as_deref() != Some(assignee.as_str()) => {
                debug!(assignee = %assignee, "JIRA assignee changed");
                if assignee == self.tracker_identity.name && group_id != Some(self.support_group.id) {
                    info!(group = %self.support_group.name, "Assigning Zendesk ticket to group");
                    let mut fields = Map::new();
                    fields.insert("group_id".to_string(), Value::from(self.support_group.id));
                    ctx.ticket = Some(self.desk.update_ticket(ticket_id, &fields).await?);
                }
            }
            Some(_) if last_seen_group.as_deref() != Some(current_group.as_str()) => {
                debug!(group = %current_group, "Zendesk group changed");
                if group_id != Some(self.support_group.id) {
                    self.handle_escalation(ctx, group_id).await?;
                }
            }
            Some(_) => return Ok(()),
        }

        let assignee = ctx.issue.assignee_name().unwrap_or_default().to_string();
        let group = ctx
            .ticket()?
            .group_id
            .map(|id| id.to_string())
            .unwrap_or_default();
        self.store.set(&assignee_key, &assignee)?;
        self.store.set(&group_key, &group)?;

        Ok(())
    }

    /// Reassign the issue according to the first strategy matching the group
    async fn handle_escalation(&self, ctx: &mut SyncContext, group_id: Option<u64>) -> Result<()> {
        let Some(group_id) = group_id else {
            debug!("Zendesk ticket has no group, nothing to escalate to");
            return Ok(());
        };
        let group = self.find_group_by_id(group_id)?;

        debug!(group = %group.name, "Zendesk ticket assigned to group");

        let Some(definition) = self.escalation.resolve(&group.name) else {
            warn!(group = %group.name, "Could not match group to escalation strategy");
            return Ok(());
        };

        let assignee = definition.strategy.escalation_contact()?;

        info!(assignee = %assignee, group = %group.name, "Assigning JIRA issue to user");
        self.tracker.assign_issue(&ctx.issue.key, &assignee).await?;
        self.refresh_issue(ctx).await?;
        metrics::record_escalation(&group.name);

        if let Err(e) = definition.strategy.post_escalation().await {
            warn!(error = %e, "Failed to call post-escalation hook on strategy");
        }

        Ok(())
    }
}
