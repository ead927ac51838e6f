//! Reference field and priority sync

use super::{Bridge, SyncContext};
use crate::integrations::{Desk, Tracker};
use crate::store::IdempotencyStore;
use crate::{BridgeError, Result};
use serde_json::{Map, Value};
use tracing::{debug, info};

impl<T, D, S> Bridge<T, D, S>
where
    T: Tracker,
    D: Desk,
    S: IdempotencyStore,
{
    /// Write the ticket id into the issue's reference field
    ///
    /// An existing value pointing at some other ticket is a consistency
    /// error, unless it is the ticket the current one follows up on.
    pub(super) async fn sync_reference(&self, ctx: &mut SyncContext) -> Result<()> {
        let Some(ref field) = self.config.tracker.reference_field else {
            return Ok(());
        };

        let ticket = ctx.ticket()?;
        let ticket_id = ticket.id.to_string();

        match ctx.issue.field_text(field) {
            Some(current) if current == ticket_id => {
                debug!(field = %field, "JIRA reference already up to date");
                return Ok(());
            }
            Some(current)
                if ticket.followup_source_id().map(|id| id.to_string()) == Some(current.clone()) =>
            {
                info!(previous = %current, ticket = %ticket_id, "Pointing JIRA reference at followup ticket");
            }
            Some(current) => {
                return Err(BridgeError::Consistency(format!(
                    "Issue {} field {} references ticket {} but the bridged ticket is {}",
                    ctx.issue.key, field, current, ticket_id
                )));
            }
            None => {
                info!(ticket = %ticket_id, "Updating JIRA reference for ticket");
            }
        }

        self.tracker
            .update_field(&ctx.issue.key, field, &ticket_id)
            .await
    }

    /// Set the ticket priority from the issue priority
    pub(super) async fn sync_priority(&self, ctx: &mut SyncContext) -> Result<()> {
        let ticket = ctx.ticket()?;
        let desired = self.config.desk_priority_for(ctx.issue.priority.as_deref());

        debug!(
            jira_priority = ctx.issue.priority.as_deref().unwrap_or(""),
            zendesk_priority = %desired,
            "Mapped JIRA priority"
        );

        if ticket.priority.as_deref() == Some(desired) {
            return Ok(());
        }

        info!(from = ?ticket.priority, to = %desired, "Updating Zendesk ticket priority");
        let mut fields = Map::new();
        fields.insert("priority".to_string(), Value::String(desired.to_string()));
        self.desk.update_ticket(ticket.id, &fields).await?;

        self.refresh_ticket(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::fakes::{self, DeskCall, FakeDesk, FakeTracker, TrackerCall};
    use super::*;
    use crate::integrations::TicketStatus;

    async fn bridge_with_ticket(
        ticket: crate::integrations::Ticket,
    ) -> (Bridge<FakeTracker, FakeDesk, crate::store::MemoryStore>, SyncContext) {
        let desk = FakeDesk::new();
        desk.insert_ticket(ticket.clone());
        let bridge = fakes::bridge(FakeTracker::new(), desk, fakes::config()).await;
        let mut ctx = SyncContext::new(fakes::issue("OPS-1", "Open", Some(fakes::TRACKER_BOT)));
        ctx.ticket = Some(ticket);
        (bridge, ctx)
    }

    #[tokio::test]
    async fn test_reference_written_when_absent() {
        let (bridge, mut ctx) = bridge_with_ticket(fakes::ticket(700, "OPS-1", TicketStatus::Open)).await;
        bridge.sync_reference(&mut ctx).await.unwrap();
        assert_eq!(
            bridge.tracker.writes(),
            vec![TrackerCall::UpdateField {
                key: "OPS-1".to_string(),
                field: fakes::REFERENCE_FIELD.to_string(),
                value: "700".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_reference_mismatch_is_consistency_error() {
        let (bridge, mut ctx) = bridge_with_ticket(fakes::ticket(700, "OPS-1", TicketStatus::Open)).await;
        ctx.issue
            .fields
            .insert(fakes::REFERENCE_FIELD.to_string(), Value::from("123"));

        let err = bridge.sync_reference(&mut ctx).await.unwrap_err();
        assert!(matches!(err, BridgeError::Consistency(_)));
        assert!(bridge.tracker.writes().is_empty());
    }

    #[tokio::test]
    async fn test_reference_moves_to_followup_ticket() {
        let mut ticket = fakes::ticket(701, "OPS-1", TicketStatus::New);
        ticket.via = Some(fakes::followup_via(650));
        let (bridge, mut ctx) = bridge_with_ticket(ticket).await;
        ctx.issue
            .fields
            .insert(fakes::REFERENCE_FIELD.to_string(), Value::from("650"));

        bridge.sync_reference(&mut ctx).await.unwrap();
        assert_eq!(bridge.tracker.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_priority_updated_only_on_mismatch() {
        let mut ticket = fakes::ticket(702, "OPS-1", TicketStatus::Open);
        ticket.priority = Some("normal".to_string());
        let (bridge, mut ctx) = bridge_with_ticket(ticket).await;

        // Unmapped priority falls back to "normal", which already matches
        ctx.issue.priority = Some("Trivial".to_string());
        bridge.sync_priority(&mut ctx).await.unwrap();
        assert!(bridge.desk.writes().is_empty());

        ctx.issue.priority = Some("Blocker".to_string());
        bridge.sync_priority(&mut ctx).await.unwrap();
        assert_eq!(bridge.desk.writes().len(), 1);
        assert!(matches!(
            &bridge.desk.writes()[0],
            DeskCall::UpdateTicket { id: 702, fields } if fields["priority"] == "urgent"
        ));
        assert_eq!(ctx.ticket().unwrap().priority.as_deref(), Some("urgent"));
    }
}
