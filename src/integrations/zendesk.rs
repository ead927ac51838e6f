//! Zendesk Integration Adapter
//!
//! Implements [`Desk`] on top of the `zendesk` client crate. Reads are
//! retried, writes go out exactly once.

use super::retry::{with_retry, RetryConfig};
use super::{Desk, DeskUser, Group, NewComment, NewTicket, SortOrder, Ticket, TicketComment};
use super::{TicketField, TicketForm};
use crate::config::DeskConfig;
use crate::{BridgeError, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info};

/// Zendesk-backed desk
pub struct ZendeskDesk {
    client: ::zendesk::Client,
    read_retry: RetryConfig,
    search_retry: RetryConfig,
}

impl ZendeskDesk {
    /// Build a desk from configuration
    ///
    /// The API token is read from the environment variable named by
    /// `token_env`.
    pub fn new(config: &DeskConfig) -> Result<Self> {
        let env_var = config.token_env.trim_start_matches('$');
        let token = std::env::var(env_var).map_err(|_| {
            BridgeError::Config(format!(
                "Zendesk API token not set: export {} first",
                env_var
            ))
        })?;

        let client = ::zendesk::Client::with_api_token(&config.url, &config.username, token)?;
        Ok(Self::from_client(client))
    }

    pub fn from_client(client: ::zendesk::Client) -> Self {
        Self {
            client,
            read_retry: RetryConfig::default(),
            search_retry: RetryConfig::for_search(),
        }
    }

    pub fn with_retry_config(mut self, read: RetryConfig, search: RetryConfig) -> Self {
        self.read_retry = read;
        self.search_retry = search;
        self
    }

    pub fn base_url(&self) -> &str {
        self.client.base_url()
    }
}

#[async_trait]
impl Desk for ZendeskDesk {
    async fn current_user(&self) -> Result<DeskUser> {
        with_retry(&self.read_retry, "zendesk_me", || async {
            Ok(self.client.me().await?)
        })
        .await
    }

    async fn user(&self, id: u64) -> Result<DeskUser> {
        with_retry(&self.read_retry, "zendesk_user", || async {
            Ok(self.client.user(id).await?)
        })
        .await
    }

    async fn ticket(&self, id: u64) -> Result<Ticket> {
        debug!(ticket = id, "Fetching Zendesk ticket");
        with_retry(&self.read_retry, "zendesk_ticket", || async {
            Ok(self.client.ticket(id).await?)
        })
        .await
    }

    async fn ticket_comments(&self, id: u64) -> Result<Vec<TicketComment>> {
        with_retry(&self.read_retry, "zendesk_comments", || async {
            Ok(self.client.ticket_comments(id).await?)
        })
        .await
    }

    async fn find_first(
        &self,
        query: &str,
        sort_by: &str,
        sort_order: SortOrder,
    ) -> Result<Option<Ticket>> {
        with_retry(&self.search_retry, "zendesk_search", || async {
            Ok(self.client.find_first(query, sort_by, sort_order).await?)
        })
        .await
    }

    async fn create_ticket(&self, ticket: &NewTicket) -> Result<Ticket> {
        info!(
            external_id = ticket.external_id.as_deref().unwrap_or(""),
            followup_of = ?ticket.via_followup_source_id,
            "Creating Zendesk ticket"
        );
        Ok(self.client.create_ticket(ticket).await?)
    }

    async fn update_ticket(&self, id: u64, fields: &Map<String, Value>) -> Result<Ticket> {
        info!(ticket = id, fields = ?fields.keys().collect::<Vec<_>>(), "Updating Zendesk ticket");
        Ok(self.client.update_ticket(id, fields).await?)
    }

    async fn add_comment(&self, id: u64, comment: NewComment) -> Result<()> {
        info!(ticket = id, "Adding comment to Zendesk ticket");
        self.client.add_comment(id, comment).await?;
        Ok(())
    }

    async fn add_tags(&self, id: u64, tags: &[String]) -> Result<()> {
        info!(ticket = id, tags = ?tags, "Adding Zendesk ticket tags");
        self.client.add_tags(id, tags).await?;
        Ok(())
    }

    async fn remove_tags(&self, id: u64, tags: &[String]) -> Result<()> {
        info!(ticket = id, tags = ?tags, "Removing Zendesk ticket tags");
        self.client.remove_tags(id, tags).await?;
        Ok(())
    }

    async fn assignable_groups(&self) -> Result<Vec<Group>> {
        with_retry(&self.read_retry, "zendesk_groups", || async {
            Ok(self.client.assignable_groups().await?)
        })
        .await
    }

    async fn ticket_fields(&self) -> Result<Vec<TicketField>> {
        with_retry(&self.read_retry, "zendesk_ticket_fields", || async {
            Ok(self.client.ticket_fields().await?)
        })
        .await
    }

    async fn ticket_forms(&self) -> Result<Vec<TicketForm>> {
        with_retry(&self.read_retry, "zendesk_ticket_forms", || async {
            Ok(self.client.ticket_forms().await?)
        })
        .await
    }
}
