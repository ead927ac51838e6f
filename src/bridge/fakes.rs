//! In-process stand-ins for JIRA and Zendesk
//!
//! Both fakes keep their state behind a mutex, apply writes the way the
//! real systems would, and record every write so tests can assert on the
//! exact calls a pass made.

use super::Bridge;
use crate::config::{BridgeConfig, DeskConfig, TrackerConfig};
use crate::escalation::EscalationStrategyConfig;
use crate::field_mapper::FieldMapping;
use crate::integrations::{
    Desk, DeskUser, Group, NewComment, NewTicket, SortOrder, Ticket, TicketComment, TicketField,
    TicketForm, TicketStatus, Tracker,
};
use crate::model::{Issue, IssueComment, Transition, TrackerUser};
use crate::store::MemoryStore;
use crate::{BridgeError, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use ::zendesk::{Via, ViaEndpoint, ViaSource};

pub const TRACKER_BOT: &str = "bridge-bot";
pub const DESK_BOT: u64 = 9000;

pub const SUPPORT_GROUP: u64 = 100;
pub const TIER2_GROUP: u64 = 200;
pub const BILLING_GROUP: u64 = 300;
pub const TIER2_CONTACT: &str = "oncall-eng";

pub const TICKET_FORM: u64 = 40;
pub const PRODUCT_FIELD: u64 = 111;
pub const REFERENCE_FIELD: &str = "customfield_10050";
pub const RESOLVE_TRANSITION_ID: &str = "31";
const START_TRANSITION_ID: &str = "21";

fn timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 9, 30, 0).unwrap()
}

/// Configuration wired to the fixtures below
pub fn config() -> BridgeConfig {
    let mut priority_map = BTreeMap::new();
    priority_map.insert("Blocker".to_string(), "urgent".to_string());

    let mut params = Map::new();
    params.insert("assignee".to_string(), Value::from(TIER2_CONTACT));

    BridgeConfig {
        tracker: TrackerConfig {
            url: "https://jira.example.com/".to_string(),
            username: TRACKER_BOT.to_string(),
            issue_query: "project = OPS".to_string(),
            solved_statuses: vec!["Resolved".to_string(), "Closed".to_string()],
            priority_map,
            reference_field: Some(REFERENCE_FIELD.to_string()),
            comment_format: "{{ author }} wrote:\n{{ stripped_body }}".to_string(),
            ..TrackerConfig::default()
        },
        desk: DeskConfig {
            url: "https://acme.zendesk.com".to_string(),
            username: "bot@acme.example".to_string(),
            ticket_query: "external_id:{{ issue.key }}".to_string(),
            subject_format: "[{{ issue.key }}] {{ issue.summary }}".to_string(),
            initial_comment_format: "Initial: {{ issue.key }} at {{ tracker_url }}/browse/{{ issue.key }}"
                .to_string(),
            followup_comment_format: "Followup: {{ issue.key }}".to_string(),
            comment_format: "{{ comment.author.name }}: {{ comment.body }}".to_string(),
            initial_fields: vec![FieldMapping::by_name("Product", "widgets")],
            support_group: "Support".to_string(),
            ticket_form: Some("Engineering Escalation".to_string()),
            ..DeskConfig::default()
        },
        escalation_strategies: vec![EscalationStrategyConfig {
            kind: "simple".to_string(),
            group: "Tier 2".to_string(),
            params,
        }],
        ..BridgeConfig::default()
    }
}

pub async fn bridge(
    tracker: FakeTracker,
    desk: FakeDesk,
    config: BridgeConfig,
) -> Bridge<FakeTracker, FakeDesk, MemoryStore> {
    Bridge::connect(tracker, desk, MemoryStore::new(), config)
        .await
        .unwrap()
}

pub fn issue(key: &str, status: &str, assignee: Option<&str>) -> Issue {
    Issue {
        key: key.to_string(),
        summary: format!("Summary of {}", key),
        description: Some("Something is broken".to_string()),
        status: status.to_string(),
        priority: None,
        assignee: assignee.map(|a| TrackerUser::new(a, a)),
        creator: None,
        created: Some("2026-01-05T09:00:00.000+0000".to_string()),
        comments: Vec::new(),
        fields: HashMap::new(),
    }
}

pub fn issue_comment(id: &str, author: &str, body: &str) -> IssueComment {
    IssueComment {
        id: id.to_string(),
        author: TrackerUser::new(author, author),
        body: body.to_string(),
        created: "2026-01-05T09:30:00.000+0000".to_string(),
    }
}

/// A ticket in the support group
pub fn ticket(id: u64, external_id: &str, status: TicketStatus) -> Ticket {
    Ticket {
        id,
        subject: Some(format!("[{}] Summary of {}", external_id, external_id)),
        status,
        priority: None,
        group_id: Some(SUPPORT_GROUP),
        assignee_id: None,
        external_id: Some(external_id.to_string()),
        tags: Vec::new(),
        ticket_form_id: Some(TICKET_FORM),
        via: None,
        created_at: Some(timestamp()),
        updated_at: None,
    }
}

pub fn ticket_comment(id: u64, author_id: u64, body: &str, public: bool) -> TicketComment {
    TicketComment {
        id,
        author_id,
        body: body.to_string(),
        public,
        created_at: timestamp(),
    }
}

pub fn followup_via(source_id: u64) -> Via {
    Via {
        channel: Some("api".to_string()),
        source: Some(ViaSource {
            rel: Some("follow_up".to_string()),
            from: Some(ViaEndpoint {
                ticket_id: Some(source_id),
            }),
        }),
    }
}

/// A write made against the fake tracker
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerCall {
    Assign {
        key: String,
        assignee: String,
    },
    AddComment {
        key: String,
        body: String,
    },
    UpdateField {
        key: String,
        field: String,
        value: String,
    },
    Transition {
        key: String,
        transition_id: String,
        fields: Map<String, Value>,
    },
}

#[derive(Debug, Default)]
struct TrackerState {
    issues: BTreeMap<String, Issue>,
    failing_assign: HashSet<String>,
    writes: Vec<TrackerCall>,
    searches: Vec<String>,
    next_comment_id: u64,
}

#[derive(Debug, Default)]
pub struct FakeTracker {
    state: Mutex<TrackerState>,
}

impl FakeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_issue(&self, issue: Issue) {
        let mut state = self.state.lock().unwrap();
        state.issues.insert(issue.key.clone(), issue);
    }

    pub fn insert_comment(&self, key: &str, comment: IssueComment) {
        let mut state = self.state.lock().unwrap();
        state.issues.get_mut(key).unwrap().comments.push(comment);
    }

    pub fn issue_snapshot(&self, key: &str) -> Issue {
        self.state.lock().unwrap().issues[key].clone()
    }

    /// Make every assignment of `key` fail
    pub fn fail_assign_for(&self, key: &str) {
        self.state.lock().unwrap().failing_assign.insert(key.to_string());
    }

    pub fn writes(&self) -> Vec<TrackerCall> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn searches(&self) -> Vec<String> {
        self.state.lock().unwrap().searches.clone()
    }

    fn with_issue<R>(&self, key: &str, f: impl FnOnce(&mut TrackerState) -> R) -> Result<R> {
        let mut state = self.state.lock().unwrap();
        if !state.issues.contains_key(key) {
            return Err(BridgeError::Integration(format!(
                "JIRA API error: HTTP 404: Issue Does Not Exist: {}",
                key
            )));
        }
        Ok(f(&mut state))
    }
}

#[async_trait]
impl Tracker for FakeTracker {
    async fn current_user(&self) -> Result<TrackerUser> {
        Ok(TrackerUser::new(TRACKER_BOT, "Bridge Bot"))
    }

    async fn search_issues(&self, query: &str) -> Result<Vec<Issue>> {
        let mut state = self.state.lock().unwrap();
        state.searches.push(query.to_string());

        let issues = match query.strip_prefix("key = ") {
            Some(key) => state.issues.get(key).cloned().into_iter().collect(),
            None => state.issues.values().cloned().collect(),
        };
        Ok(issues)
    }

    async fn issue(&self, key: &str) -> Result<Issue> {
        self.with_issue(key, |state| state.issues[key].clone())
    }

    async fn assign_issue(&self, key: &str, assignee: &str) -> Result<()> {
        if self.state.lock().unwrap().failing_assign.contains(key) {
            return Err(BridgeError::Integration(format!(
                "JIRA API error: HTTP 400: User '{}' cannot be assigned issues",
                assignee
            )));
        }

        self.with_issue(key, |state| {
            state.writes.push(TrackerCall::Assign {
                key: key.to_string(),
                assignee: assignee.to_string(),
            });
            if let Some(issue) = state.issues.get_mut(key) {
                issue.assignee = Some(TrackerUser::new(assignee, assignee));
            }
        })
    }

    async fn add_comment(&self, key: &str, body: &str) -> Result<()> {
        self.with_issue(key, |state| {
            state.writes.push(TrackerCall::AddComment {
                key: key.to_string(),
                body: body.to_string(),
            });
            state.next_comment_id += 1;
            let comment = issue_comment(
                &format!("bot-{}", state.next_comment_id),
                TRACKER_BOT,
                body,
            );
            if let Some(issue) = state.issues.get_mut(key) {
                issue.comments.push(comment);
            }
        })
    }

    async fn update_field(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.writes.push(TrackerCall::UpdateField {
            key: key.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        });
        if let Some(issue) = state.issues.get_mut(key) {
            issue.fields.insert(field.to_string(), Value::from(value));
        }
        Ok(())
    }

    async fn transitions(&self, key: &str) -> Result<Vec<Transition>> {
        self.with_issue(key, |_| {
            vec![
                Transition {
                    id: START_TRANSITION_ID.to_string(),
                    name: "Start Progress".to_string(),
                },
                Transition {
                    id: RESOLVE_TRANSITION_ID.to_string(),
                    name: "Resolve Issue".to_string(),
                },
            ]
        })
    }

    async fn transition_issue(
        &self,
        key: &str,
        transition_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<()> {
        let status = match transition_id {
            RESOLVE_TRANSITION_ID => "Resolved",
            START_TRANSITION_ID => "In Progress",
            other => {
                return Err(BridgeError::Integration(format!(
                    "JIRA API error: HTTP 400: Transition id '{}' is not valid",
                    other
                )))
            }
        };

        self.with_issue(key, |state| {
            state.writes.push(TrackerCall::Transition {
                key: key.to_string(),
                transition_id: transition_id.to_string(),
                fields: fields.clone(),
            });
            if let Some(issue) = state.issues.get_mut(key) {
                issue.status = status.to_string();
            }
        })
    }
}

/// A write made against the fake desk
#[derive(Debug, Clone, PartialEq)]
pub enum DeskCall {
    UpdateTicket {
        id: u64,
        fields: Map<String, Value>,
    },
    AddComment {
        id: u64,
        body: String,
        public: Option<bool>,
    },
    AddTags {
        id: u64,
        tags: Vec<String>,
    },
    RemoveTags {
        id: u64,
        tags: Vec<String>,
    },
}

#[derive(Debug)]
struct DeskState {
    tickets: BTreeMap<u64, Ticket>,
    comments: HashMap<u64, Vec<TicketComment>>,
    users: HashMap<u64, DeskUser>,
    created: Vec<NewTicket>,
    writes: Vec<DeskCall>,
    searches: Vec<String>,
    next_ticket_id: u64,
    next_comment_id: u64,
}

impl Default for DeskState {
    fn default() -> Self {
        Self {
            tickets: BTreeMap::new(),
            comments: HashMap::new(),
            users: HashMap::new(),
            created: Vec::new(),
            writes: Vec::new(),
            searches: Vec::new(),
            next_ticket_id: 5000,
            next_comment_id: 70000,
        }
    }
}

impl DeskState {
    fn ticket_mut(&mut self, id: u64) -> Result<&mut Ticket> {
        self.tickets
            .get_mut(&id)
            .ok_or_else(|| not_found(&format!("ticket {}", id)))
    }

    fn push_bot_comment(&mut self, id: u64, body: &str, public: bool) {
        self.next_comment_id += 1;
        let comment = ticket_comment(self.next_comment_id, DESK_BOT, body, public);
        self.comments.entry(id).or_default().push(comment);
    }
}

fn not_found(what: &str) -> BridgeError {
    BridgeError::Zendesk(::zendesk::Error::NotFound(what.to_string()))
}

#[derive(Debug, Default)]
pub struct FakeDesk {
    state: Mutex<DeskState>,
}

impl FakeDesk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_ticket(&self, ticket: Ticket) -> u64 {
        let id = ticket.id;
        self.state.lock().unwrap().tickets.insert(id, ticket);
        id
    }

    pub fn insert_user(&self, id: u64, name: &str) {
        let user = DeskUser {
            id,
            name: name.to_string(),
            email: None,
        };
        self.state.lock().unwrap().users.insert(id, user);
    }

    pub fn insert_comment(&self, ticket_id: u64, comment: TicketComment) {
        let mut state = self.state.lock().unwrap();
        state.comments.entry(ticket_id).or_default().push(comment);
    }

    pub fn ticket_snapshot(&self, id: u64) -> Ticket {
        self.state.lock().unwrap().tickets[&id].clone()
    }

    /// Overwrite a ticket's tags without recording a write
    pub fn set_tags(&self, id: u64, tags: &[&str]) {
        let mut state = self.state.lock().unwrap();
        if let Some(ticket) = state.tickets.get_mut(&id) {
            ticket.tags = tags.iter().map(|t| t.to_string()).collect();
        }
    }

    /// Move a ticket to another group the way an agent would, unrecorded
    pub fn move_to_group(&self, id: u64, group_id: u64) {
        let mut state = self.state.lock().unwrap();
        if let Some(ticket) = state.tickets.get_mut(&id) {
            ticket.group_id = Some(group_id);
        }
    }

    pub fn ticket_ids(&self) -> Vec<u64> {
        self.state.lock().unwrap().tickets.keys().copied().collect()
    }

    pub fn created(&self) -> Vec<NewTicket> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn writes(&self) -> Vec<DeskCall> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn searches(&self) -> Vec<String> {
        self.state.lock().unwrap().searches.clone()
    }
}

#[async_trait]
impl Desk for FakeDesk {
    async fn current_user(&self) -> Result<DeskUser> {
        Ok(DeskUser {
            id: DESK_BOT,
            name: "Bridge Bot".to_string(),
            email: Some("bot@acme.example".to_string()),
        })
    }

    async fn user(&self, id: u64) -> Result<DeskUser> {
        self.state
            .lock()
            .unwrap()
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(&format!("user {}", id)))
    }

    async fn ticket(&self, id: u64) -> Result<Ticket> {
        let mut state = self.state.lock().unwrap();
        Ok(state.ticket_mut(id)?.clone())
    }

    async fn ticket_comments(&self, id: u64) -> Result<Vec<TicketComment>> {
        let mut state = self.state.lock().unwrap();
        state.ticket_mut(id)?;
        Ok(state.comments.get(&id).cloned().unwrap_or_default())
    }

    async fn find_first(
        &self,
        query: &str,
        _sort_by: &str,
        _sort_order: SortOrder,
    ) -> Result<Option<Ticket>> {
        let mut state = self.state.lock().unwrap();
        state.searches.push(query.to_string());

        let Some(external_id) = query.strip_prefix("external_id:") else {
            return Ok(None);
        };
        Ok(state
            .tickets
            .values()
            .filter(|t| t.external_id.as_deref() == Some(external_id))
            .max_by_key(|t| t.id)
            .cloned())
    }

    async fn create_ticket(&self, request: &NewTicket) -> Result<Ticket> {
        let mut state = self.state.lock().unwrap();
        state.created.push(request.clone());

        state.next_ticket_id += 1;
        let id = state.next_ticket_id;
        let ticket = Ticket {
            id,
            subject: Some(request.subject.clone()),
            status: TicketStatus::New,
            priority: None,
            group_id: request.group_id,
            assignee_id: None,
            external_id: request.external_id.clone(),
            tags: Vec::new(),
            ticket_form_id: request.ticket_form_id,
            via: request.via_followup_source_id.map(followup_via),
            created_at: Some(timestamp()),
            updated_at: None,
        };
        state.tickets.insert(id, ticket.clone());

        if let Some(ref comment) = request.comment {
            state.push_bot_comment(id, &comment.body, comment.public.unwrap_or(true));
        }

        Ok(ticket)
    }

    async fn update_ticket(&self, id: u64, fields: &Map<String, Value>) -> Result<Ticket> {
        let mut state = self.state.lock().unwrap();
        let ticket = state.ticket_mut(id)?;

        if let Some(status) = fields.get("status") {
            ticket.status = serde_json::from_value(status.clone())?;
        }
        if let Some(priority) = fields.get("priority") {
            ticket.priority = priority.as_str().map(str::to_string);
        }
        if let Some(group_id) = fields.get("group_id") {
            ticket.group_id = group_id.as_u64();
        }
        let ticket = ticket.clone();

        state.writes.push(DeskCall::UpdateTicket {
            id,
            fields: fields.clone(),
        });
        Ok(ticket)
    }

    async fn add_comment(&self, id: u64, comment: NewComment) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.ticket_mut(id)?;
        state.push_bot_comment(id, &comment.body, comment.public.unwrap_or(true));
        state.writes.push(DeskCall::AddComment {
            id,
            body: comment.body,
            public: comment.public,
        });
        Ok(())
    }

    async fn add_tags(&self, id: u64, tags: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let ticket = state.ticket_mut(id)?;
        for tag in tags {
            if !ticket.has_tag(tag) {
                ticket.tags.push(tag.clone());
            }
        }
        state.writes.push(DeskCall::AddTags {
            id,
            tags: tags.to_vec(),
        });
        Ok(())
    }

    async fn remove_tags(&self, id: u64, tags: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let ticket = state.ticket_mut(id)?;
        ticket.tags.retain(|t| !tags.contains(t));
        state.writes.push(DeskCall::RemoveTags {
            id,
            tags: tags.to_vec(),
        });
        Ok(())
    }

    async fn assignable_groups(&self) -> Result<Vec<Group>> {
        Ok(vec![
            Group {
                id: SUPPORT_GROUP,
                name: "Support".to_string(),
            },
            Group {
                id: TIER2_GROUP,
                name: "Tier 2".to_string(),
            },
            Group {
                id: BILLING_GROUP,
                name: "Billing".to_string(),
            },
        ])
    }

    async fn ticket_fields(&self) -> Result<Vec<TicketField>> {
        Ok(vec![
            TicketField {
                id: 110,
                title: "Product".to_string(),
                active: false,
            },
            TicketField {
                id: PRODUCT_FIELD,
                title: "Product".to_string(),
                active: true,
            },
        ])
    }

    async fn ticket_forms(&self) -> Result<Vec<TicketForm>> {
        Ok(vec![TicketForm {
            id: TICKET_FORM,
            name: "Engineering Escalation".to_string(),
            active: true,
        }])
    }
}
