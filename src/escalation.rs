//! Escalation strategies
//!
//! When desk agents move a ticket out of the support group, the matching
//! strategy decides who the tracker issue gets assigned to:
//!
//! ```yaml
//! escalation_strategies:
//!   - type: simple
//!     group: "^Tier 2"
//!     assignee: oncall-eng
//! ```
//!
//! Definitions are tried in order and the first pattern matching the group
//! name wins. Patterns match from the start of the group name.

use crate::{BridgeError, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Capability every escalation strategy provides
#[async_trait]
pub trait EscalationStrategy: Send + Sync + fmt::Debug {
    /// Tracker identity the issue should be assigned to
    fn escalation_contact(&self) -> Result<String>;

    /// Hook run after the issue was reassigned
    async fn post_escalation(&self) -> Result<()>;
}

/// Always escalates to one fixed assignee
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleStrategy {
    pub assignee: String,
}

impl SimpleStrategy {
    pub fn new(assignee: impl Into<String>) -> Self {
        Self {
            assignee: assignee.into(),
        }
    }
}

#[async_trait]
impl EscalationStrategy for SimpleStrategy {
    fn escalation_contact(&self) -> Result<String> {
        Ok(self.assignee.clone())
    }

    async fn post_escalation(&self) -> Result<()> {
        Ok(())
    }
}

/// A strategy definition as written in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationStrategyConfig {
    #[serde(rename = "type")]
    pub kind: String,

    /// Regex tested against the desk group name
    pub group: String,

    /// Strategy-specific parameters
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

/// Strategy type tags accepted in configuration
pub const STRATEGY_TYPES: [&str; 1] = ["simple"];

/// Construct a strategy from its type tag and parameters
pub fn build_strategy(
    kind: &str,
    params: &Map<String, Value>,
) -> Result<Box<dyn EscalationStrategy>> {
    match kind {
        "simple" => {
            let assignee = params
                .get("assignee")
                .and_then(Value::as_str)
                .filter(|a| !a.is_empty())
                .ok_or_else(|| {
                    BridgeError::Config("simple escalation strategy requires an 'assignee'".to_string())
                })?;
            Ok(Box::new(SimpleStrategy::new(assignee)))
        }
        other => Err(BridgeError::Config(format!(
            "Unknown escalation strategy type '{}'. Must be one of: {}",
            other,
            STRATEGY_TYPES.join(", ")
        ))),
    }
}

/// A group pattern paired with the strategy it selects
#[derive(Debug)]
pub struct EscalationStrategyDefinition {
    pub group_pattern: Regex,
    pub strategy: Box<dyn EscalationStrategy>,
}

impl EscalationStrategyDefinition {
    pub fn new(group: &str, strategy: Box<dyn EscalationStrategy>) -> Result<Self> {
        Ok(Self {
            group_pattern: Regex::new(&format!("^(?:{})", group))?,
            strategy,
        })
    }

    pub fn from_config(config: &EscalationStrategyConfig) -> Result<Self> {
        Self::new(&config.group, build_strategy(&config.kind, &config.params)?)
    }
}

/// Ordered pattern rules mapping a desk group to a strategy
#[derive(Debug, Default)]
pub struct EscalationResolver {
    definitions: Vec<EscalationStrategyDefinition>,
}

impl EscalationResolver {
    pub fn new(definitions: Vec<EscalationStrategyDefinition>) -> Self {
        Self { definitions }
    }

    pub fn from_config(configs: &[EscalationStrategyConfig]) -> Result<Self> {
        let definitions = configs
            .iter()
            .map(EscalationStrategyDefinition::from_config)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(definitions))
    }

    /// First definition whose pattern matches `group_name`
    pub fn resolve(&self, group_name: &str) -> Option<&EscalationStrategyDefinition> {
        self.definitions
            .iter()
            .find(|d| d.group_pattern.is_match(group_name))
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
