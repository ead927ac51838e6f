//! Reconciliation engine
//!
//! A [`Bridge`] keeps every JIRA issue matched by the configured query in
//! step with a Zendesk ticket. Each pass walks the issues one at a time and,
//! per issue, in this order:
//!
//! 1. resolves (or creates) the ticket
//! 2. writes the ticket id back into the issue's reference field
//! 3. syncs the ticket priority from the issue priority
//! 4. reacts to assignee and group changes, escalating when needed
//! 5. copies new comments in both directions
//! 6. runs the status action rules
//!
//! Every step checks recorded state before acting, so a pass interrupted at
//! any point can simply be run again. A failure in one issue is logged and
//! the pass moves on to the next.

mod assignee;
mod comments;
mod context;
mod fields;
mod lifecycle;
mod status;

#[cfg(test)]
pub(crate) mod fakes;

pub use context::SyncContext;
pub use lifecycle::is_issue_eligible;

use crate::config::BridgeConfig;
use crate::escalation::EscalationResolver;
use crate::field_mapper::TicketFieldMapper;
use crate::integrations::{CustomField, Desk, DeskUser, Group, TicketForm, Tracker};
use crate::metrics;
use crate::model::TrackerUser;
use crate::rules::{parse_action_definitions, ActionDefinition};
use crate::store::IdempotencyStore;
use crate::template::Template;
use crate::{BridgeError, Result};
use std::time::Instant;
use tracing::{debug, error, info, info_span, Instrument};

/// Parsed templates, one per configured format string
#[derive(Debug, Clone)]
struct Templates {
    ticket_query: Template,
    subject: Template,
    initial_comment: Template,
    followup_comment: Template,
    desk_comment: Template,
    tracker_comment: Template,
}

impl Templates {
    fn from_config(config: &BridgeConfig) -> Result<Self> {
        Ok(Self {
            ticket_query: Template::parse(&config.desk.ticket_query)?,
            subject: Template::parse(&config.desk.subject_format)?,
            initial_comment: Template::parse(&config.desk.initial_comment_format)?,
            followup_comment: Template::parse(&config.desk.followup_comment_format)?,
            desk_comment: Template::parse(&config.desk.comment_format)?,
            tracker_comment: Template::parse(&config.tracker.comment_format)?,
        })
    }
}

/// Outcome counts of one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub synced: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl PassSummary {
    pub fn total(&self) -> usize {
        self.synced + self.skipped + self.failed
    }
}

/// The reconciliation engine
///
/// Everything resolved from the remote systems at startup (bot identities,
/// groups, ticket form, initial field ids) and everything parsed from
/// configuration (rules, strategies, templates) is fixed for the lifetime of
/// the bridge.
pub struct Bridge<T, D, S> {
    tracker: T,
    desk: D,
    store: S,
    config: BridgeConfig,
    issue_query: String,
    templates: Templates,
    tracker_identity: TrackerUser,
    desk_identity: DeskUser,
    assignable_groups: Vec<Group>,
    support_group: Group,
    ticket_form: Option<TicketForm>,
    initial_fields: Vec<CustomField>,
    tracker_rules: Vec<ActionDefinition>,
    desk_rules: Vec<ActionDefinition>,
    escalation: EscalationResolver,
}

impl<T, D, S> Bridge<T, D, S>
where
    T: Tracker,
    D: Desk,
    S: IdempotencyStore,
{
    /// Resolve identities, groups, fields and forms, and parse configuration
    ///
    /// Anything that cannot be resolved is a configuration error.
    pub async fn connect(tracker: T, desk: D, store: S, config: BridgeConfig) -> Result<Self> {
        let templates = Templates::from_config(&config)?;
        let tracker_rules = parse_action_definitions(&config.tracker_status_actions)?;
        let desk_rules = parse_action_definitions(&config.desk_status_actions)?;
        let escalation = EscalationResolver::from_config(&config.escalation_strategies)?;

        let tracker_identity = tracker.current_user().await?;
        let desk_identity = desk.current_user().await?;
        info!(
            tracker_identity = %tracker_identity.name,
            desk_identity = desk_identity.id,
            "Resolved bot identities"
        );

        let assignable_groups = desk.assignable_groups().await?;
        let support_group = find_group_by_name(&assignable_groups, &config.desk.support_group)?;

        let initial_fields = TicketFieldMapper::new(desk.ticket_fields().await?)
            .map_fields(&config.desk.initial_fields)?;

        let ticket_form = match config.desk.ticket_form {
            Some(ref name) => Some(find_ticket_form_by_name(desk.ticket_forms().await?, name)?),
            None => None,
        };

        Ok(Self {
            issue_query: config.tracker.issue_query.clone(),
            tracker,
            desk,
            store,
            config,
            templates,
            tracker_identity,
            desk_identity,
            assignable_groups,
            support_group,
            ticket_form,
            initial_fields,
            tracker_rules,
            desk_rules,
            escalation,
        })
    }

    /// Replace the configured issue query
    pub fn with_issue_query(mut self, query: impl Into<String>) -> Self {
        self.issue_query = query.into();
        self
    }

    /// Replace the strategies parsed from configuration
    pub fn with_escalation_resolver(mut self, resolver: EscalationResolver) -> Self {
        self.escalation = resolver;
        self
    }

    pub fn issue_query(&self) -> &str {
        &self.issue_query
    }

    pub fn tracker_identity(&self) -> &TrackerUser {
        &self.tracker_identity
    }

    pub fn support_group(&self) -> &Group {
        &self.support_group
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one reconciliation pass over every issue matching the query
    ///
    /// Only the initial search can fail the pass; per-issue failures are
    /// logged and counted.
    pub async fn sync(&self) -> Result<PassSummary> {
        let started = Instant::now();

        debug!(jql = %self.issue_query, "Querying JIRA");
        let issues = self.tracker.search_issues(&self.issue_query).await?;

        let mut summary = PassSummary::default();
        for issue in issues {
            let key = issue.key.clone();
            let span = info_span!("sync_issue", issue = %key);

            match self.sync_issue(SyncContext::new(issue)).instrument(span).await {
                Ok(true) => {
                    summary.synced += 1;
                    metrics::record_issue("synced");
                }
                Ok(false) => {
                    summary.skipped += 1;
                    metrics::record_issue("skipped");
                }
                Err(e) => {
                    error!(issue = %key, error = %e, kind = e.kind(), "Failed to sync issue");
                    summary.failed += 1;
                    metrics::record_issue("failed");
                    metrics::record_issue_error(e.kind());
                }
            }
        }

        metrics::record_pass_duration(started.elapsed().as_secs_f64());
        info!(
            synced = summary.synced,
            skipped = summary.skipped,
            failed = summary.failed,
            "Reconciliation pass complete"
        );

        Ok(summary)
    }

    /// Reconcile a single issue; `Ok(false)` means it was skipped
    pub async fn sync_issue(&self, mut ctx: SyncContext) -> Result<bool> {
        debug!("Syncing JIRA issue");

        if !self.ensure_ticket_if_eligible(&mut ctx).await? {
            return Ok(false);
        }

        self.sync_reference(&mut ctx).await?;
        self.sync_priority(&mut ctx).await?;
        self.sync_assignee(&mut ctx).await?;
        self.sync_desk_comments_to_tracker(&mut ctx).await?;
        self.sync_tracker_comments_to_desk(&mut ctx).await?;
        self.sync_status(&mut ctx).await?;

        Ok(true)
    }

    async fn refresh_issue(&self, ctx: &mut SyncContext) -> Result<()> {
        ctx.issue = self.tracker.issue(&ctx.issue.key).await?;
        Ok(())
    }

    async fn refresh_ticket(&self, ctx: &mut SyncContext) -> Result<()> {
        if let Some(ref ticket) = ctx.ticket {
            ctx.ticket = Some(self.desk.ticket(ticket.id).await?);
        }
        Ok(())
    }

    fn find_group_by_id(&self, id: u64) -> Result<&Group> {
        self.assignable_groups
            .iter()
            .find(|g| g.id == id)
            .ok_or_else(|| BridgeError::Config(format!("Could not find group by id: {}", id)))
    }
}

fn find_group_by_name(groups: &[Group], name: &str) -> Result<Group> {
    groups
        .iter()
        .find(|g| g.name == name)
        .cloned()
        .ok_or_else(|| BridgeError::Config(format!("Could not find group by name: {}", name)))
}

fn find_ticket_form_by_name(forms: Vec<TicketForm>, name: &str) -> Result<TicketForm> {
    forms
        .into_iter()
        .find(|f| f.name == name)
        .ok_or_else(|| BridgeError::Config(format!("Could not find ticket form by name: {}", name)))
}
