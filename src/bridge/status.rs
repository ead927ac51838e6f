//! Status action engine
//!
//! Each side (JIRA-triggered and Zendesk-triggered) has its own rule table.
//! A table is applied repeatedly: the first rule matching the current status
//! pair runs its actions, then the table is scanned again against the
//! updated state. Scanning stops when no rule matches, or when the first
//! match is a rule that already ran in this invocation, so a table with N
//! rules runs at most N rules per side per pass.

use super::{Bridge, SyncContext};
use crate::integrations::{Desk, Tracker};
use crate::metrics;
use crate::rules::{ActionDefinition, ActionKind};
use crate::store::{keys, IdempotencyStore};
use crate::{BridgeError, Result};
use serde_json::{Map, Value};
use tracing::{debug, error, info};

impl<T, D, S> Bridge<T, D, S>
where
    T: Tracker,
    D: Desk,
    S: IdempotencyStore,
{
    /// Run both rule tables, then record the resulting statuses
    pub(super) async fn sync_status(&self, ctx: &mut SyncContext) -> Result<()> {
        let ticket_id = ctx.ticket_id()?;
        let tracker_key = keys::last_seen_tracker_status(&ctx.issue.key);
        let desk_key = keys::last_seen_desk_status(ticket_id);

        let last_seen_tracker_status = self.store.get(&tracker_key)?;
        let last_seen_desk_status = self.store.get(&desk_key)?;

        let desk_status = ctx.ticket()?.status;
        debug!(
            jira_status = %ctx.issue.status,
            zendesk_status = %desk_status,
            "Evaluating status actions"
        );

        let owned = ctx.issue.assignee_name() == Some(self.tracker_identity.name.as_str());
        if !owned {
            debug!("Issue not owned by us, action defs without \"force\" will not apply");
        }

        let tracker_changed = last_seen_tracker_status.as_deref() != Some(ctx.issue.status.as_str());
        if tracker_changed {
            debug!("JIRA status changed");
        }

        let desk_changed = last_seen_desk_status.as_deref() != Some(desk_status.as_str());
        if desk_changed {
            debug!("Zendesk status changed");
        }

        self.process_status_actions(ctx, &self.tracker_rules, tracker_changed, owned)
            .await?;
        self.process_status_actions(ctx, &self.desk_rules, desk_changed, owned)
            .await?;

        self.store.set(&tracker_key, &ctx.issue.status)?;
        self.store.set(&desk_key, ctx.ticket()?.status.as_str())?;

        Ok(())
    }

    /// Apply one rule table until it reaches a fixed point
    ///
    /// A failing action is logged and ends this table's processing; it is not
    /// an error for the issue. Returns the number of rules that ran.
    pub(super) async fn process_status_actions(
        &self,
        ctx: &mut SyncContext,
        rules: &[ActionDefinition],
        changed: bool,
        owned: bool,
    ) -> Result<usize> {
        let mut applied: Vec<usize> = Vec::new();

        loop {
            let desk_status = ctx.ticket()?.status;
            let Some(index) = rules
                .iter()
                .position(|r| r.matches(&ctx.issue.status, desk_status, owned))
            else {
                debug!("No action defs matched");
                break;
            };

            let rule = &rules[index];
            if applied.contains(&index) {
                debug!(rule = %rule.description, "Action def already applied this pass");
                break;
            }
            applied.push(index);

            debug!(rule = %rule.description, "Matched action def");

            for action in &rule.actions {
                if action.only_once && !changed {
                    debug!(action = %action.description, "Skipping action marked only_once");
                    continue;
                }

                info!(action = %action.description, handler = action.kind.tag(), "Performing action");
                match self.perform_action(ctx, &action.kind).await {
                    Ok(()) => metrics::record_action(action.kind.tag(), true),
                    Err(e) => {
                        error!(
                            action = %action.description,
                            error = %e,
                            "Failed to perform action"
                        );
                        metrics::record_action(action.kind.tag(), false);
                        return Ok(applied.len());
                    }
                }
            }
        }

        Ok(applied.len())
    }

    async fn perform_action(&self, ctx: &mut SyncContext, kind: &ActionKind) -> Result<()> {
        match kind {
            ActionKind::UpdateTicket { fields } => self.handle_update_ticket(ctx, fields).await,
            ActionKind::TransitionIssue { name, fields } => {
                self.handle_transition_issue(ctx, name, fields).await
            }
            ActionKind::AddTicketTags { tags } => self.handle_add_ticket_tags(ctx, tags).await,
            ActionKind::RemoveTicketTags { tags } => {
                self.handle_remove_ticket_tags(ctx, tags).await
            }
        }
    }

    async fn handle_update_ticket(
        &self,
        ctx: &mut SyncContext,
        fields: &Map<String, Value>,
    ) -> Result<()> {
        let ticket_id = ctx.ticket_id()?;
        ctx.ticket = Some(self.desk.update_ticket(ticket_id, fields).await?);
        Ok(())
    }

    async fn handle_transition_issue(
        &self,
        ctx: &mut SyncContext,
        name: &str,
        fields: &Map<String, Value>,
    ) -> Result<()> {
        let transitions = self.tracker.transitions(&ctx.issue.key).await?;
        let transition = transitions
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| BridgeError::Config(format!("Could not find transition: {}", name)))?;

        self.tracker
            .transition_issue(&ctx.issue.key, &transition.id, fields)
            .await?;
        self.refresh_issue(ctx).await
    }

    async fn handle_add_ticket_tags(&self, ctx: &mut SyncContext, tags: &[String]) -> Result<()> {
        let ticket = ctx.ticket()?;
        let absent: Vec<String> = tags.iter().filter(|t| !ticket.has_tag(t)).cloned().collect();

        if absent.is_empty() {
            return Ok(());
        }

        self.desk.add_tags(ticket.id, &absent).await?;
        self.refresh_ticket(ctx).await
    }

    async fn handle_remove_ticket_tags(
        &self,
        ctx: &mut SyncContext,
        tags: &[String],
    ) -> Result<()> {
        let ticket = ctx.ticket()?;
        let present: Vec<String> = tags.iter().filter(|t| ticket.has_tag(t)).cloned().collect();

        if present.is_empty() {
            return Ok(());
        }

        self.desk.remove_tags(ticket.id, &present).await?;
        self.refresh_ticket(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::fakes::{self, DeskCall, FakeDesk, FakeTracker, TrackerCall};
    use super::*;
    use crate::integrations::TicketStatus;
    use crate::rules::{parse_action_definitions, ActionDefinitionConfig};
    use crate::store::MemoryStore;

    fn rules(yaml: &str) -> Vec<ActionDefinition> {
        let configs: Vec<ActionDefinitionConfig> = serde_yaml::from_str(yaml).unwrap();
        parse_action_definitions(&configs).unwrap()
    }

    async fn setup(
        status: &str,
        assignee: Option<&str>,
        desk_status: TicketStatus,
    ) -> (Bridge<FakeTracker, FakeDesk, MemoryStore>, SyncContext) {
        let tracker = FakeTracker::new();
        tracker.insert_issue(fakes::issue("OPS-1", status, assignee));
        let desk = FakeDesk::new();
        desk.insert_ticket(fakes::ticket(1000, "OPS-1", desk_status));

        let bridge = fakes::bridge(tracker, desk, fakes::config()).await;
        let mut ctx = SyncContext::new(bridge.tracker.issue_snapshot("OPS-1"));
        ctx.ticket = Some(bridge.desk.ticket_snapshot(1000));
        (bridge, ctx)
    }

    const CHAIN: &str = r#"
- description: Issue done, solve the ticket
  tracker_status: [Done]
  desk_status: [open]
  actions:
    - type: update_ticket
      description: solve
      status: solved
- description: Ticket solved, tag it
  tracker_status: [Done]
  desk_status: [solved]
  actions:
    - type: add_ticket_tags
      description: tag
      tags: [eng_resolved]
"#;

    #[tokio::test]
    async fn test_rules_chain_to_fixed_point() {
        let (bridge, mut ctx) = setup("Done", Some(fakes::TRACKER_BOT), TicketStatus::Open).await;
        let applied = bridge
            .process_status_actions(&mut ctx, &rules(CHAIN), true, true)
            .await
            .unwrap();

        assert_eq!(applied, 2);
        let ticket = ctx.ticket().unwrap();
        assert_eq!(ticket.status, TicketStatus::Solved);
        assert!(ticket.has_tag("eng_resolved"));
    }

    #[tokio::test]
    async fn test_unowned_issue_needs_force() {
        let (bridge, mut ctx) = setup("Done", Some("pat"), TicketStatus::Open).await;
        let applied = bridge
            .process_status_actions(&mut ctx, &rules(CHAIN), true, false)
            .await
            .unwrap();
        assert_eq!(applied, 0);
        assert!(bridge.desk.writes().is_empty());
    }

    #[tokio::test]
    async fn test_self_matching_rule_terminates() {
        let table = rules(
            r#"
- description: Always matches and changes nothing
  tracker_status: [Open]
  desk_status: [open]
  force: true
  actions:
    - type: add_ticket_tags
      description: tag
      tags: [seen]
- description: Also matches
  tracker_status: [Open]
  desk_status: [open]
  force: true
  actions: []
"#,
        );
        let (bridge, mut ctx) = setup("Open", None, TicketStatus::Open).await;
        let applied = bridge
            .process_status_actions(&mut ctx, &table, true, false)
            .await
            .unwrap();

        assert!(applied <= table.len());
        assert_eq!(applied, 1);
        assert_eq!(bridge.desk.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_tag_actions_skip_noop_calls() {
        let table = rules(
            r#"
- description: tags
  tracker_status: [Open]
  desk_status: [open]
  force: true
  actions:
    - type: add_ticket_tags
      description: add present tag
      tags: [already]
    - type: remove_ticket_tags
      description: remove absent tag
      tags: [missing]
"#,
        );
        let (bridge, mut ctx) = setup("Open", None, TicketStatus::Open).await;
        bridge.desk.set_tags(1000, &["already"]);
        ctx.ticket = Some(bridge.desk.ticket_snapshot(1000));

        bridge
            .process_status_actions(&mut ctx, &table, true, false)
            .await
            .unwrap();
        assert!(bridge.desk.writes().is_empty());
    }

    #[tokio::test]
    async fn test_only_once_actions_need_a_change() {
        let table = rules(
            r#"
- description: notify
  tracker_status: [Open]
  desk_status: [open]
  force: true
  actions:
    - type: add_ticket_tags
      description: once
      only_once: true
      tags: [notified]
"#,
        );
        let (bridge, mut ctx) = setup("Open", None, TicketStatus::Open).await;

        let applied = bridge
            .process_status_actions(&mut ctx, &table, false, false)
            .await
            .unwrap();
        assert_eq!(applied, 1);
        assert!(bridge.desk.writes().is_empty());

        bridge
            .process_status_actions(&mut ctx, &table, true, false)
            .await
            .unwrap();
        assert_eq!(bridge.desk.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_action_stops_only_that_table() {
        let table = rules(
            r#"
- description: reopen
  tracker_status: [Done]
  desk_status: [open]
  actions:
    - type: transition_issue
      description: missing transition
      name: Teleport
    - type: add_ticket_tags
      description: never reached
      tags: [unreachable]
"#,
        );
        let (bridge, mut ctx) = setup("Done", Some(fakes::TRACKER_BOT), TicketStatus::Open).await;

        let applied = bridge
            .process_status_actions(&mut ctx, &table, true, true)
            .await
            .unwrap();
        assert_eq!(applied, 1);
        assert!(bridge.desk.writes().is_empty());
    }

    #[tokio::test]
    async fn test_transition_issue_with_fields() {
        let table = rules(
            r#"
- description: ticket solved, resolve issue
  tracker_status: [In Progress]
  desk_status: [solved]
  actions:
    - type: transition_issue
      description: resolve
      name: Resolve Issue
      resolution:
        name: Fixed
"#,
        );
        let (bridge, mut ctx) =
            setup("In Progress", Some(fakes::TRACKER_BOT), TicketStatus::Solved).await;

        bridge
            .process_status_actions(&mut ctx, &table, true, true)
            .await
            .unwrap();

        assert!(matches!(
            &bridge.tracker.writes()[..],
            [TrackerCall::Transition { key, transition_id, fields }]
                if key == "OPS-1" && transition_id == fakes::RESOLVE_TRANSITION_ID
                    && fields["resolution"]["name"] == "Fixed"
        ));
        assert_eq!(ctx.issue.status, "Resolved");
    }

    #[tokio::test]
    async fn test_sync_status_records_post_action_statuses() {
        let tracker = FakeTracker::new();
        tracker.insert_issue(fakes::issue("OPS-1", "Done", Some(fakes::TRACKER_BOT)));
        let desk = FakeDesk::new();
        desk.insert_ticket(fakes::ticket(1000, "OPS-1", TicketStatus::Open));
        let mut config = fakes::config();
        config.tracker_status_actions = serde_yaml::from_str(CHAIN).unwrap();

        let bridge = fakes::bridge(tracker, desk, config).await;
        let mut ctx = SyncContext::new(bridge.tracker.issue_snapshot("OPS-1"));
        ctx.ticket = Some(bridge.desk.ticket_snapshot(1000));

        bridge.sync_status(&mut ctx).await.unwrap();

        assert_eq!(
            bridge.store().get("last-seen-status-tracker:OPS-1").unwrap().as_deref(),
            Some("Done")
        );
        assert_eq!(
            bridge.store().get("last-seen-status-desk:1000").unwrap().as_deref(),
            Some("solved")
        );
        assert!(bridge
            .desk
            .writes()
            .iter()
            .any(|c| matches!(c, DeskCall::AddTags { id: 1000, .. })));
    }
}
