//! JIRA Integration Adapter
//!
//! Implements [`Tracker`] against the JIRA REST API v2.

use super::retry::{with_retry, RetryConfig};
use super::Tracker;
use crate::config::{IdentityField, TrackerConfig};
use crate::model::{Issue, IssueComment, Transition, TrackerUser};
use crate::{BridgeError, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

/// Per-request timeout for search/query operations (large result sets)
const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);
/// Per-request timeout for single issue fetches
const GET_TIMEOUT: Duration = Duration::from_secs(10);
/// Per-request timeout for create/update operations
const WRITE_TIMEOUT: Duration = Duration::from_secs(15);
/// Page size for JQL searches
const SEARCH_PAGE_SIZE: u32 = 50;
/// Fields requested for every issue snapshot
const ISSUE_FIELDS: &str = "*navigable,comment";

/// JIRA API client
pub struct JiraAdapter {
    client: Client,
    base_url: String,
    username: String,
    password: Option<String>,
    identity_field: IdentityField,
    read_retry: RetryConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum JiraError {
    #[error("JIRA API error: HTTP {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("JIRA authentication failed")]
    Auth,
    #[error("JIRA resource not found: {0}")]
    NotFound(String),
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),
}

impl From<JiraError> for BridgeError {
    fn from(e: JiraError) -> Self {
        match e {
            JiraError::RateLimited(secs) => BridgeError::RateLimited(secs),
            other => BridgeError::Integration(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct JiraUser {
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "accountId", default)]
    account_id: Option<String>,
    #[serde(rename = "displayName", default)]
    display_name: Option<String>,
}

impl JiraUser {
    fn into_user(self, identity_field: IdentityField) -> TrackerUser {
        let name = match identity_field {
            IdentityField::Name => self.name.clone().or(self.account_id.clone()),
            IdentityField::AccountId => self.account_id.clone().or(self.name.clone()),
        }
        .unwrap_or_default();
        let display_name = self.display_name.unwrap_or_else(|| name.clone());
        TrackerUser { name, display_name }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct JiraNamed {
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct JiraComment {
    id: String,
    #[serde(default)]
    body: String,
    author: JiraUser,
    created: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct JiraCommentPage {
    #[serde(default)]
    comments: Vec<JiraComment>,
}

#[derive(Debug, Clone, Deserialize)]
struct JiraFields {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    description: Option<String>,
    status: JiraNamed,
    #[serde(default)]
    priority: Option<JiraNamed>,
    #[serde(default)]
    assignee: Option<JiraUser>,
    #[serde(default)]
    creator: Option<JiraUser>,
    #[serde(default)]
    created: Option<String>,
    #[serde(default)]
    comment: Option<JiraCommentPage>,
    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct JiraIssue {
    key: String,
    fields: JiraFields,
}

impl JiraIssue {
    fn into_issue(self, identity_field: IdentityField) -> Issue {
        let fields = self.fields;
        Issue {
            key: self.key,
            summary: fields.summary,
            description: fields.description,
            status: fields.status.name,
            priority: fields.priority.map(|p| p.name),
            assignee: fields.assignee.map(|u| u.into_user(identity_field)),
            creator: fields.creator.map(|u| u.into_user(identity_field)),
            created: fields.created,
            comments: fields
                .comment
                .unwrap_or_default()
                .comments
                .into_iter()
                .map(|c| IssueComment {
                    id: c.id,
                    author: c.author.into_user(identity_field),
                    body: c.body,
                    created: c.created,
                })
                .collect(),
            fields: fields.extra,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct JiraSearchResponse {
    #[serde(default)]
    total: u32,
    #[serde(rename = "startAt", default)]
    start_at: u32,
    issues: Vec<JiraIssue>,
}

#[derive(Debug, Clone, Deserialize)]
struct JiraTransitionsResponse {
    transitions: Vec<Transition>,
}

#[derive(Debug, Clone, Serialize)]
struct JiraTransitionRequest<'a> {
    transition: JiraTransitionId<'a>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    fields: &'a Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
struct JiraTransitionId<'a> {
    id: &'a str,
}

impl JiraAdapter {
    /// Create a new JIRA adapter
    ///
    /// The password is read from the environment variable named by
    /// `password_env`, if any.
    pub fn new(config: &TrackerConfig) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        let base_url = format!("{}/rest/api/2", config.url.trim_end_matches('/'));

        let password = config
            .password_env
            .as_ref()
            .and_then(|env_var| std::env::var(env_var.trim_start_matches('$')).ok());

        Ok(Self {
            client,
            base_url,
            username: config.username.clone(),
            password,
            identity_field: config.identity_field,
            read_retry: RetryConfig::default(),
        })
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_read_retry(mut self, retry: RetryConfig) -> Self {
        self.read_retry = retry;
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.password.is_some()
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        match self.password {
            Some(ref password) => request.basic_auth(&self.username, Some(password)),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, timeout: Duration) -> Result<Response> {
        let response = self.authed(request).timeout(timeout).send().await?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(JiraError::Auth.into()),
            StatusCode::NOT_FOUND => {
                Err(JiraError::NotFound(response.url().path().to_string()).into())
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60);
                Err(JiraError::RateLimited(retry_after).into())
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(JiraError::Api { status, body }.into())
            }
        }
    }

    async fn search_page(&self, jql: &str, start_at: u32) -> Result<JiraSearchResponse> {
        let url = format!("{}/search", self.base_url);
        let params = [
            ("jql", jql.to_string()),
            ("startAt", start_at.to_string()),
            ("maxResults", SEARCH_PAGE_SIZE.to_string()),
            ("fields", ISSUE_FIELDS.to_string()),
        ];

        with_retry(&self.read_retry, "jira_search", || async {
            let response = self
                .send(self.client.get(&url).query(&params), SEARCH_TIMEOUT)
                .await?;
            Ok(response.json::<JiraSearchResponse>().await?)
        })
        .await
    }

    fn identity_body(&self, assignee: &str) -> Value {
        match self.identity_field {
            IdentityField::Name => serde_json::json!({ "name": assignee }),
            IdentityField::AccountId => serde_json::json!({ "accountId": assignee }),
        }
    }
}

#[async_trait]
impl Tracker for JiraAdapter {
    async fn current_user(&self) -> Result<TrackerUser> {
        let url = format!("{}/myself", self.base_url);
        let user: JiraUser = with_retry(&self.read_retry, "jira_myself", || async {
            let response = self.send(self.client.get(&url), GET_TIMEOUT).await?;
            Ok::<_, BridgeError>(response.json::<JiraUser>().await?)
        })
        .await?;
        Ok(user.into_user(self.identity_field))
    }

    async fn search_issues(&self, query: &str) -> Result<Vec<Issue>> {
        debug!(jql = %query, "Searching JIRA issues");

        let mut issues = Vec::new();
        loop {
            let page = self.search_page(query, issues.len() as u32).await?;
            let returned = page.issues.len() as u32;
            issues.extend(
                page.issues
                    .into_iter()
                    .map(|i| i.into_issue(self.identity_field)),
            );

            if returned == 0 || page.start_at + returned >= page.total {
                break;
            }
        }

        info!(total = issues.len(), "JIRA search complete");
        Ok(issues)
    }

    async fn issue(&self, key: &str) -> Result<Issue> {
        let url = format!("{}/issue/{}", self.base_url, key);
        debug!(key = %key, "Fetching JIRA issue");

        let issue: JiraIssue = with_retry(&self.read_retry, "jira_issue", || async {
            let request = self.client.get(&url).query(&[("fields", ISSUE_FIELDS)]);
            let response = self.send(request, GET_TIMEOUT).await?;
            Ok::<_, BridgeError>(response.json::<JiraIssue>().await?)
        })
        .await?;
        Ok(issue.into_issue(self.identity_field))
    }

    async fn assign_issue(&self, key: &str, assignee: &str) -> Result<()> {
        let url = format!("{}/issue/{}/assignee", self.base_url, key);
        info!(key = %key, assignee = %assignee, "Assigning JIRA issue");

        let request = self.client.put(&url).json(&self.identity_body(assignee));
        self.send(request, WRITE_TIMEOUT).await?;
        Ok(())
    }

    async fn add_comment(&self, key: &str, body: &str) -> Result<()> {
        let url = format!("{}/issue/{}/comment", self.base_url, key);
        info!(key = %key, "Adding comment to JIRA issue");

        let request = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "body": body }));
        self.send(request, WRITE_TIMEOUT).await?;
        Ok(())
    }

    async fn update_field(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let url = format!("{}/issue/{}", self.base_url, key);
        info!(key = %key, field = %field, "Updating JIRA issue field");

        let mut fields = Map::new();
        fields.insert(field.to_string(), Value::String(value.to_string()));
        let request = self
            .client
            .put(&url)
            .json(&serde_json::json!({ "fields": fields }));
        self.send(request, WRITE_TIMEOUT).await?;
        Ok(())
    }

    async fn transitions(&self, key: &str) -> Result<Vec<Transition>> {
        let url = format!("{}/issue/{}/transitions", self.base_url, key);

        let result: JiraTransitionsResponse =
            with_retry(&self.read_retry, "jira_transitions", || async {
                let response = self.send(self.client.get(&url), GET_TIMEOUT).await?;
                Ok::<_, BridgeError>(response.json::<JiraTransitionsResponse>().await?)
            })
            .await?;
        Ok(result.transitions)
    }

    async fn transition_issue(
        &self,
        key: &str,
        transition_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<()> {
        let url = format!("{}/issue/{}/transitions", self.base_url, key);
        info!(key = %key, transition_id = %transition_id, "Transitioning JIRA issue");

        let body = JiraTransitionRequest {
            transition: JiraTransitionId { id: transition_id },
            fields,
        };
        self.send(self.client.post(&url).json(&body), WRITE_TIMEOUT)
            .await?;
        Ok(())
    }
}
