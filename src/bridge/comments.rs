//! Bidirectional comment propagation
//!
//! Each side's comments are copied in the order that side returns them.
//! A comment id enters the seen set only after its copy was written, so a
//! failed write is retried on the next pass.

use super::{Bridge, SyncContext};
use crate::integrations::{Desk, NewComment, Tracker};
use crate::metrics;
use crate::store::{IdempotencyStore, DESK_COMMENTS, TRACKER_COMMENTS};
use crate::template::Bindings;
use crate::Result;
use std::collections::HashMap;
use tracing::{debug, info};

/// Drop everything from the last signature delimiter on
pub fn strip_signature<'a>(body: &'a str, delimiter: &str) -> &'a str {
    if delimiter.is_empty() {
        return body;
    }
    body.rsplit_once(delimiter).map_or(body, |(head, _)| head)
}

impl<T, D, S> Bridge<T, D, S>
where
    T: Tracker,
    D: Desk,
    S: IdempotencyStore,
{
    /// Copy new public Zendesk comments onto the JIRA issue
    pub(super) async fn sync_desk_comments_to_tracker(&self, ctx: &mut SyncContext) -> Result<()> {
        let ticket_id = ctx.ticket_id()?;
        let comments = self.desk.ticket_comments(ticket_id).await?;
        let mut authors: HashMap<u64, String> = HashMap::new();
        let mut copied = false;

        for comment in comments {
            let comment_id = comment.id.to_string();

            if !comment.public {
                debug!(comment = comment.id, "Skipping private Zendesk comment");
                continue;
            }

            if comment.author_id == self.desk_identity.id {
                debug!(comment = comment.id, "Skipping my own Zendesk comment");
                continue;
            }

            if self.store.is_seen(DESK_COMMENTS, &comment_id)? {
                debug!(comment = comment.id, "Skipping seen Zendesk comment");
                continue;
            }

            info!(comment = comment.id, "Copying Zendesk comment to JIRA issue");

            let author = match authors.get(&comment.author_id) {
                Some(name) => name.clone(),
                None => {
                    let name = self.desk.user(comment.author_id).await?.name;
                    authors.insert(comment.author_id, name.clone());
                    name
                }
            };
            let stripped_body = strip_signature(&comment.body, &self.config.desk.signature_delimiter);

            let bindings = Bindings::new()
                .bind("comment", &comment)?
                .bind("author", &author)?
                .bind("created", &comment.created_at)?
                .bind("stripped_body", &stripped_body)?;
            let body = self.templates.tracker_comment.render(&bindings);

            self.tracker.add_comment(&ctx.issue.key, &body).await?;
            self.store.mark_seen(DESK_COMMENTS, &comment_id)?;
            metrics::record_comment_copied("desk_to_tracker");

            copied = true;
        }

        if copied {
            self.refresh_issue(ctx).await?;
        }

        Ok(())
    }

    /// Copy new JIRA comments onto the Zendesk ticket as public replies
    pub(super) async fn sync_tracker_comments_to_desk(&self, ctx: &mut SyncContext) -> Result<()> {
        let ticket_id = ctx.ticket_id()?;

        for comment in &ctx.issue.comments {
            if comment.author.name == self.tracker_identity.name {
                debug!(comment = %comment.id, "Skipping my own JIRA comment");
                continue;
            }

            if self.store.is_seen(TRACKER_COMMENTS, &comment.id)? {
                debug!(comment = %comment.id, "Skipping seen JIRA comment");
                continue;
            }

            info!(comment = %comment.id, "Copying JIRA comment to Zendesk ticket");

            let body = self
                .templates
                .desk_comment
                .render(&Bindings::new().bind("comment", comment)?);
            let reply = NewComment {
                body,
                public: Some(true),
            };

            self.desk.add_comment(ticket_id, reply).await?;
            self.store.mark_seen(TRACKER_COMMENTS, &comment.id)?;
            metrics::record_comment_copied("tracker_to_desk");
        }

        Ok(())
    }
}
