//! Prometheus metrics for reconciliation passes

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram, CounterVec, Encoder, Histogram, TextEncoder,
};

lazy_static! {
    /// Counter: reconciliation passes by result
    pub static ref PASSES: CounterVec = register_counter_vec!(
        "deskbridge_passes_total",
        "Reconciliation passes by result",
        &["result"]
    )
    .expect("Failed to create passes metric");

    /// Histogram: duration of a full reconciliation pass (seconds)
    pub static ref PASS_DURATION: Histogram = register_histogram!(
        "deskbridge_pass_duration_seconds",
        "Duration of full reconciliation passes",
        vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]
    )
    .expect("Failed to create pass_duration metric");

    /// Counter: per-issue outcomes (synced, skipped, failed)
    pub static ref ISSUE_OUTCOMES: CounterVec = register_counter_vec!(
        "deskbridge_issues_total",
        "Issues processed by outcome",
        &["outcome"]
    )
    .expect("Failed to create issues metric");

    /// Counter: per-issue failures by error kind
    pub static ref ISSUE_ERRORS: CounterVec = register_counter_vec!(
        "deskbridge_issue_errors_total",
        "Per-issue failures by error kind",
        &["kind"]
    )
    .expect("Failed to create issue_errors metric");

    /// Counter: comments copied by direction
    pub static ref COMMENTS_COPIED: CounterVec = register_counter_vec!(
        "deskbridge_comments_copied_total",
        "Comments copied between systems",
        &["direction"]
    )
    .expect("Failed to create comments_copied metric");

    /// Counter: tickets created (initial or followup)
    pub static ref TICKETS_CREATED: CounterVec = register_counter_vec!(
        "deskbridge_tickets_created_total",
        "Tickets created by kind",
        &["kind"]
    )
    .expect("Failed to create tickets_created metric");

    /// Counter: escalations by desk group
    pub static ref ESCALATIONS: CounterVec = register_counter_vec!(
        "deskbridge_escalations_total",
        "Issues reassigned after a desk group escalation",
        &["group"]
    )
    .expect("Failed to create escalations metric");

    /// Counter: status actions executed, by handler
    pub static ref ACTIONS_EXECUTED: CounterVec = register_counter_vec!(
        "deskbridge_actions_total",
        "Status actions executed by handler and result",
        &["handler", "result"]
    )
    .expect("Failed to create actions metric");
}

pub fn record_pass(ok: bool) {
    PASSES
        .with_label_values(&[if ok { "ok" } else { "error" }])
        .inc();
}

pub fn record_pass_duration(duration_secs: f64) {
    PASS_DURATION.observe(duration_secs);
}

pub fn record_issue(outcome: &str) {
    ISSUE_OUTCOMES.with_label_values(&[outcome]).inc();
}

pub fn record_issue_error(kind: &str) {
    ISSUE_ERRORS.with_label_values(&[kind]).inc();
}

pub fn record_comment_copied(direction: &str) {
    COMMENTS_COPIED.with_label_values(&[direction]).inc();
}

pub fn record_ticket_created(kind: &str) {
    TICKETS_CREATED.with_label_values(&[kind]).inc();
}

pub fn record_escalation(group: &str) {
    ESCALATIONS.with_label_values(&[group]).inc();
}

pub fn record_action(handler: &str, ok: bool) {
    ACTIONS_EXECUTED
        .with_label_values(&[handler, if ok { "ok" } else { "error" }])
        .inc();
}

/// Encode all metrics as Prometheus text format
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
