//! Idempotency bookkeeping
//!
//! Two kinds of records make a reconciliation pass resumable after a restart:
//!
//! - **seen sets**: comment ids already copied to the other side. Insert-only.
//! - **last-seen scalars**: the ticket id resolved for an issue, plus the
//!   assignee, group and statuses observed on the previous pass.
//!
//! Every operation is a single-key read or write, so stores only need to be
//! atomic per key.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{default_path, SqliteStore, StoreConfig};

use crate::Result;

/// Seen-set namespace for comments copied from the desk to the tracker
pub const DESK_COMMENTS: &str = "desk";
/// Seen-set namespace for comments copied from the tracker to the desk
pub const TRACKER_COMMENTS: &str = "tracker";

/// Key/value store backing the seen sets and last-seen values
pub trait IdempotencyStore: Send + Sync {
    /// Whether `id` is a member of the seen set `namespace`
    fn is_seen(&self, namespace: &str, id: &str) -> Result<bool>;

    /// Add `id` to the seen set `namespace`
    fn mark_seen(&self, namespace: &str, id: &str) -> Result<()>;

    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Overwrite the scalar stored under `key`
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Store key layout
pub mod keys {
    pub fn seen(namespace: &str, id: &str) -> String {
        format!("seen:{}:{}", namespace, id)
    }

    pub fn ticket_for_issue(issue_key: &str) -> String {
        format!("ticket-for-issue:{}", issue_key)
    }

    pub fn last_seen_assignee(issue_key: &str) -> String {
        format!("last-seen-assignee:{}", issue_key)
    }

    pub fn last_seen_group(ticket_id: u64) -> String {
        format!("last-seen-group:{}", ticket_id)
    }

    pub fn last_seen_tracker_status(issue_key: &str) -> String {
        format!("last-seen-status-tracker:{}", issue_key)
    }

    pub fn last_seen_desk_status(ticket_id: u64) -> String {
        format!("last-seen-status-desk:{}", ticket_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(keys::seen(DESK_COMMENTS, "17"), "seen:desk:17");
        assert_eq!(keys::ticket_for_issue("OPS-1"), "ticket-for-issue:OPS-1");
        assert_eq!(keys::last_seen_assignee("OPS-1"), "last-seen-assignee:OPS-1");
        assert_eq!(keys::last_seen_group(42), "last-seen-group:42");
        assert_eq!(
            keys::last_seen_tracker_status("OPS-1"),
            "last-seen-status-tracker:OPS-1"
        );
        assert_eq!(keys::last_seen_desk_status(42), "last-seen-status-desk:42");
    }
}
