//! Zendesk Support REST API client for Rust
//!
//! A typed, async interface to the subset of the Zendesk Support API needed to
//! mirror work between a helpdesk and an issue tracker: tickets, comments,
//! tags, groups, ticket fields and ticket forms.
//!
//! # Example
//!
//! ```no_run
//! use zendesk::{Client, SortOrder};
//!
//! # async fn demo() -> zendesk::Result<()> {
//! let zd = Client::new("https://acme.zendesk.com", "bot@acme.com", "secret")?;
//!
//! let me = zd.me().await?;
//! println!("Signed in as {}", me.name);
//!
//! if let Some(ticket) = zd
//!     .find_first("type:ticket external_id:OPS-42", "created_at", SortOrder::Desc)
//!     .await?
//! {
//!     println!("Ticket {} is {}", ticket.id, ticket.status);
//! }
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Per-request timeout for search operations (paginated, rate limited)
const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);
/// Per-request timeout for single resource fetches
const GET_TIMEOUT: Duration = Duration::from_secs(10);
/// Per-request timeout for create/update operations
const WRITE_TIMEOUT: Duration = Duration::from_secs(15);

/// Errors that can occur when talking to Zendesk
#[derive(Error, Debug)]
pub enum Error {
    #[error("Zendesk authentication failed: {0}")]
    Auth(String),

    #[error("Zendesk resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    #[error("Zendesk API error: HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid Zendesk URL: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the request may succeed if repeated later
    pub fn is_transient(&self) -> bool {
        match self {
            Error::RateLimited(_) => true,
            Error::Api { status, .. } => *status >= 500,
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Result type for Zendesk operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ticket status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    New,
    Open,
    Pending,
    Hold,
    Solved,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::New => "new",
            TicketStatus::Open => "open",
            TicketStatus::Pending => "pending",
            TicketStatus::Hold => "hold",
            TicketStatus::Solved => "solved",
            TicketStatus::Closed => "closed",
        }
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "new" => Ok(TicketStatus::New),
            "open" => Ok(TicketStatus::Open),
            "pending" => Ok(TicketStatus::Pending),
            "hold" => Ok(TicketStatus::Hold),
            "solved" => Ok(TicketStatus::Solved),
            "closed" => Ok(TicketStatus::Closed),
            other => Err(format!("unknown ticket status '{}'", other)),
        }
    }
}

/// A Zendesk user (agent or end user)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Where a ticket came from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Via {
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub source: Option<ViaSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViaSource {
    #[serde(default)]
    pub rel: Option<String>,
    #[serde(default)]
    pub from: Option<ViaEndpoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViaEndpoint {
    #[serde(default)]
    pub ticket_id: Option<u64>,
}

/// A Zendesk ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: u64,
    #[serde(default)]
    pub subject: Option<String>,
    pub status: TicketStatus,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub group_id: Option<u64>,
    #[serde(default)]
    pub assignee_id: Option<u64>,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub ticket_form_id: Option<u64>,
    #[serde(default)]
    pub via: Option<Via>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// Id of the closed ticket this one was opened as a followup to
    pub fn followup_source_id(&self) -> Option<u64> {
        let source = self.via.as_ref()?.source.as_ref()?;
        if source.rel.as_deref() != Some("follow_up") {
            return None;
        }
        source.from.as_ref()?.ticket_id
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// A comment on a ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub author_id: u64,
    pub body: String,
    #[serde(default = "default_public")]
    pub public: bool,
    pub created_at: DateTime<Utc>,
}

fn default_public() -> bool {
    true
}

/// An agent group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: u64,
    pub name: String,
}

/// A ticket field definition (custom or system)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketField {
    pub id: u64,
    #[serde(alias = "name")]
    pub title: String,
    #[serde(default)]
    pub active: bool,
}

/// A ticket form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketForm {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub active: bool,
}

/// Value of a custom field on ticket creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomField {
    pub id: u64,
    pub value: serde_json::Value,
}

/// Comment attached to a create/update request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewComment {
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
}

/// Request body for ticket creation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewTicket {
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<NewComment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub custom_fields: Vec<CustomField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_form_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via_followup_source_id: Option<u64>,
}

/// Search sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    user: User,
}

#[derive(Debug, Deserialize)]
struct TicketEnvelope {
    ticket: Ticket,
}

#[derive(Debug, Deserialize)]
struct CommentsPage {
    comments: Vec<Comment>,
    #[serde(default)]
    next_page: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    results: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GroupsPage {
    groups: Vec<Group>,
    #[serde(default)]
    next_page: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TicketFieldsPage {
    ticket_fields: Vec<TicketField>,
}

#[derive(Debug, Deserialize)]
struct TicketFormsPage {
    ticket_forms: Vec<TicketForm>,
}

#[derive(Debug, Deserialize)]
struct TagsEnvelope {
    tags: Vec<String>,
}

#[derive(Debug, Serialize)]
struct TagsRequest<'a> {
    tags: &'a [String],
}

/// Zendesk API client
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl Client {
    /// Create a client authenticating with a username and password
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        let url = url.into();
        let base_url = url.trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::InvalidUrl(url));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url,
            username: username.into(),
            password: password.into(),
        })
    }

    /// Create a client authenticating with an API token
    pub fn with_api_token(
        url: impl Into<String>,
        email: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self> {
        Self::new(url, format!("{}/token", email.into()), token)
    }

    /// Base URL of the Zendesk instance
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v2{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder, timeout: Duration) -> Result<Response> {
        let response = request
            .basic_auth(&self.username, Some(&self.password))
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().path().to_string();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Error::Auth(url)),
            StatusCode::NOT_FOUND => Err(Error::NotFound(url)),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60);
                Err(Error::RateLimited(retry_after))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(Error::Api {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, timeout: Duration) -> Result<T> {
        let response = self.send(self.http.get(url), timeout).await?;
        Ok(response.json().await?)
    }

    /// The authenticated user
    pub async fn me(&self) -> Result<User> {
        let envelope: UserEnvelope = self.get_json(&self.url("/users/me.json"), GET_TIMEOUT).await?;
        Ok(envelope.user)
    }

    /// Fetch a user by id
    pub async fn user(&self, id: u64) -> Result<User> {
        let url = self.url(&format!("/users/{}.json", id));
        let envelope: UserEnvelope = self.get_json(&url, GET_TIMEOUT).await?;
        Ok(envelope.user)
    }

    /// Fetch a ticket by id
    pub async fn ticket(&self, id: u64) -> Result<Ticket> {
        debug!(ticket = id, "Fetching Zendesk ticket");
        let url = self.url(&format!("/tickets/{}.json", id));
        let envelope: TicketEnvelope = self.get_json(&url, GET_TIMEOUT).await?;
        Ok(envelope.ticket)
    }

    /// All comments on a ticket, oldest first
    pub async fn ticket_comments(&self, id: u64) -> Result<Vec<Comment>> {
        let mut url = self.url(&format!("/tickets/{}/comments.json?sort_order=asc", id));
        let mut comments = Vec::new();

        loop {
            let page: CommentsPage = self.get_json(&url, GET_TIMEOUT).await?;
            comments.extend(page.comments);
            match page.next_page {
                Some(next) => url = next,
                None => return Ok(comments),
            }
        }
    }

    /// First ticket matching a search, fetching a single result
    pub async fn find_first(
        &self,
        query: &str,
        sort_by: &str,
        sort_order: SortOrder,
    ) -> Result<Option<Ticket>> {
        let page = self
            .search_page(query, sort_by, sort_order, 1)
            .await?;
        Ok(tickets_from_results(page.results)?.into_iter().next())
    }

    async fn search_page(
        &self,
        query: &str,
        sort_by: &str,
        sort_order: SortOrder,
        per_page: u32,
    ) -> Result<SearchPage> {
        debug!(query = %query, sort_by = %sort_by, "Searching Zendesk");

        let params = [
            ("query", query.to_string()),
            ("sort_by", sort_by.to_string()),
            ("sort_order", sort_order.as_str().to_string()),
            ("per_page", per_page.to_string()),
        ];

        let request = self.http.get(self.url("/search.json")).query(&params);
        let response = self.send(request, SEARCH_TIMEOUT).await?;
        Ok(response.json().await?)
    }

    /// Create a ticket
    pub async fn create_ticket(&self, ticket: &NewTicket) -> Result<Ticket> {
        let body = serde_json::json!({ "ticket": ticket });
        let request = self.http.post(self.url("/tickets.json")).json(&body);
        let response = self.send(request, WRITE_TIMEOUT).await?;
        let envelope: TicketEnvelope = response.json().await?;

        info!(ticket = envelope.ticket.id, "Created Zendesk ticket");
        Ok(envelope.ticket)
    }

    /// Update a ticket with an arbitrary set of ticket attributes
    pub async fn update_ticket(
        &self,
        id: u64,
        fields: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Ticket> {
        let body = serde_json::json!({ "ticket": fields });
        let url = self.url(&format!("/tickets/{}.json", id));
        let response = self.send(self.http.put(url).json(&body), WRITE_TIMEOUT).await?;
        let envelope: TicketEnvelope = response.json().await?;
        Ok(envelope.ticket)
    }

    /// Add a comment to a ticket
    pub async fn add_comment(&self, id: u64, comment: NewComment) -> Result<Ticket> {
        let mut fields = serde_json::Map::new();
        fields.insert("comment".to_string(), serde_json::to_value(comment)?);
        self.update_ticket(id, &fields).await
    }

    /// Add tags to a ticket, returning the resulting tag set
    pub async fn add_tags(&self, id: u64, tags: &[String]) -> Result<Vec<String>> {
        let url = self.url(&format!("/tickets/{}/tags.json", id));
        let request = self.http.put(url).json(&TagsRequest { tags });
        let response = self.send(request, WRITE_TIMEOUT).await?;
        let envelope: TagsEnvelope = response.json().await?;
        Ok(envelope.tags)
    }

    /// Remove tags from a ticket, returning the resulting tag set
    pub async fn remove_tags(&self, id: u64, tags: &[String]) -> Result<Vec<String>> {
        let url = self.url(&format!("/tickets/{}/tags.json", id));
        let request = self.http.delete(url).json(&TagsRequest { tags });
        let response = self.send(request, WRITE_TIMEOUT).await?;
        let envelope: TagsEnvelope = response.json().await?;
        Ok(envelope.tags)
    }

    /// Groups the authenticated agent can assign tickets to
    pub async fn assignable_groups(&self) -> Result<Vec<Group>> {
        let mut url = self.url("/groups/assignable.json");
        let mut groups = Vec::new();

        loop {
            let page: GroupsPage = self.get_json(&url, GET_TIMEOUT).await?;
            groups.extend(page.groups);
            match page.next_page {
                Some(next) => url = next,
                None => return Ok(groups),
            }
        }
    }

    /// All ticket field definitions
    pub async fn ticket_fields(&self) -> Result<Vec<TicketField>> {
        let page: TicketFieldsPage = self
            .get_json(&self.url("/ticket_fields.json"), GET_TIMEOUT)
            .await?;
        Ok(page.ticket_fields)
    }

    /// All ticket forms
    pub async fn ticket_forms(&self) -> Result<Vec<TicketForm>> {
        let page: TicketFormsPage = self
            .get_json(&self.url("/ticket_forms.json"), GET_TIMEOUT)
            .await?;
        Ok(page.ticket_forms)
    }
}

/// Keep only ticket results from a mixed search response
fn tickets_from_results(results: Vec<serde_json::Value>) -> Result<Vec<Ticket>> {
    results
        .into_iter()
        .filter(|r| r.get("result_type").and_then(|t| t.as_str()).unwrap_or("ticket") == "ticket")
        .map(|r| serde_json::from_value(r).map_err(Error::from))
        .collect()
}
