//! Configuration validation
//!
//! Validates Deskbridge configuration for correctness before any remote call:
//! - URLs and queries are present
//! - Templates parse
//! - Rule tables and escalation strategies parse
//! - Secrets are available in the environment

use super::bridge_config::BridgeConfig;
use crate::escalation::EscalationStrategyDefinition;
use crate::rules::ActionDefinition;
use crate::template::Template;
use crate::BridgeError;

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub context: Option<String>,
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            context: None,
            field: field.into(),
            message: message.into(),
        }
    }

    fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref ctx) = self.context {
            write!(f, "[{}] {}: {}", ctx, self.field, self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

/// Validation result
pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;

/// Validate a Deskbridge configuration, collecting every problem found
pub fn validate_config(config: &BridgeConfig) -> ValidationResult {
    let mut errors = Vec::new();

    check_url(&mut errors, "tracker.url", &config.tracker.url);
    check_url(&mut errors, "desk.url", &config.desk.url);
    check_not_empty(&mut errors, "tracker.username", &config.tracker.username);
    check_not_empty(&mut errors, "tracker.issue_query", &config.tracker.issue_query);
    check_not_empty(&mut errors, "desk.username", &config.desk.username);
    check_not_empty(&mut errors, "desk.support_group", &config.desk.support_group);
    check_not_empty(&mut errors, "desk.signature_delimiter", &config.desk.signature_delimiter);

    if let Some(ref field) = config.tracker.reference_field {
        check_not_empty(&mut errors, "tracker.reference_field", field);
    }

    for (field, source) in [
        ("tracker.comment_format", &config.tracker.comment_format),
        ("desk.ticket_query", &config.desk.ticket_query),
        ("desk.subject_format", &config.desk.subject_format),
        ("desk.initial_comment_format", &config.desk.initial_comment_format),
        ("desk.followup_comment_format", &config.desk.followup_comment_format),
        ("desk.comment_format", &config.desk.comment_format),
    ] {
        if let Err(e) = Template::parse(source) {
            errors.push(ValidationError::new(field, e.to_string()));
        }
    }

    for (i, mapping) in config.desk.initial_fields.iter().enumerate() {
        if mapping.id.is_none() && mapping.name.is_none() {
            errors.push(
                ValidationError::new("desk.initial_fields", "Mapping needs an id or a name")
                    .with_context(format!("#{}", i)),
            );
        }
        if mapping.value.is_none() {
            errors.push(
                ValidationError::new("desk.initial_fields", "Mapping has no value")
                    .with_context(format!("#{}", i)),
            );
        }
    }

    for (table, rules) in [
        ("tracker_status_actions", &config.tracker_status_actions),
        ("desk_status_actions", &config.desk_status_actions),
    ] {
        for (i, rule) in rules.iter().enumerate() {
            if let Err(e) = ActionDefinition::from_config(rule) {
                errors.push(ValidationError::new(table, message(e)).with_context(format!("#{}", i)));
            }
        }
    }

    for (i, strategy) in config.escalation_strategies.iter().enumerate() {
        if let Err(e) = EscalationStrategyDefinition::from_config(strategy) {
            errors.push(
                ValidationError::new("escalation_strategies", message(e))
                    .with_context(format!("#{}", i)),
            );
        }
    }

    if config.poll_interval_secs == Some(0) {
        errors.push(ValidationError::new(
            "poll_interval_secs",
            "Poll interval must be greater than 0",
        ));
    }

    if let Some(ref env_var) = config.tracker.password_env {
        warn_if_unset(env_var);
    }
    warn_if_unset(&config.desk.token_env);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &str, url: &str) {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        errors.push(ValidationError::new(field, format!("Invalid URL: '{}'", url)));
    }
}

fn check_not_empty(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(ValidationError::new(field, "Must not be empty"));
    }
}

fn message(e: BridgeError) -> String {
    match e {
        BridgeError::Config(msg) | BridgeError::Template(msg) => msg,
        other => other.to_string(),
    }
}

fn warn_if_unset(env_var: &str) {
    let env_var = env_var.trim_start_matches('$');
    if std::env::var(env_var).is_err() {
        tracing::warn!(
            env_var = %env_var,
            "Environment variable not set (this may be intentional if set at runtime)"
        );
    }
}

/// Validate configuration and return a Result
pub fn validate_config_result(config: &BridgeConfig) -> crate::Result<()> {
    validate_config(config).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        BridgeError::Config(format!(
            "Configuration validation failed:\n  - {}",
            messages.join("\n  - ")
        ))
    })
}
