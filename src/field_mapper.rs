//! Ticket field mapping
//!
//! Turns a declarative list of `{id|name, value}` mappings into the
//! `custom_fields` list Zendesk accepts on ticket creation:
//!
//! ```yaml
//! initial_fields:
//!   - id: 111
//!     value: XXX
//!   - name: Product
//!     value: YYY
//! ```
//!
//! Names are resolved against the desk's field catalog, considering active
//! fields only.

use crate::integrations::{CustomField, TicketField};
use crate::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One configured field mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl FieldMapping {
    pub fn by_id(id: u64, value: impl Into<Value>) -> Self {
        Self {
            id: Some(id),
            name: None,
            value: Some(value.into()),
        }
    }

    pub fn by_name(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
            value: Some(value.into()),
        }
    }

    fn describe(&self) -> String {
        match (&self.id, &self.name) {
            (Some(id), _) => format!("id {}", id),
            (None, Some(name)) => format!("name '{}'", name),
            (None, None) => "unnamed mapping".to_string(),
        }
    }
}

/// Resolves field mappings against the desk's field catalog
#[derive(Debug, Clone)]
pub struct TicketFieldMapper {
    ticket_fields: Vec<TicketField>,
}

impl TicketFieldMapper {
    pub fn new(ticket_fields: Vec<TicketField>) -> Self {
        Self { ticket_fields }
    }

    /// Map every mapping, failing on the first one that cannot be resolved
    pub fn map_fields(&self, mappings: &[FieldMapping]) -> Result<Vec<CustomField>> {
        mappings
            .iter()
            .map(|mapping| {
                Ok(CustomField {
                    id: self.map_field_id(mapping)?,
                    value: map_field_value(mapping)?,
                })
            })
            .collect()
    }

    /// An explicit id wins over a name
    pub fn map_field_id(&self, mapping: &FieldMapping) -> Result<u64> {
        match (mapping.id, &mapping.name) {
            (Some(id), _) => Ok(id),
            (None, Some(name)) => Ok(self.find_active_ticket_field(name)?.id),
            (None, None) => Err(BridgeError::Config(
                "Ticket field mapping needs an id or a name".to_string(),
            )),
        }
    }

    pub fn find_active_ticket_field(&self, name: &str) -> Result<&TicketField> {
        self.ticket_fields
            .iter()
            .find(|f| f.title == name && f.active)
            .ok_or_else(|| {
                BridgeError::Config(format!("Could not find active ticket field by name: {}", name))
            })
    }
}

fn map_field_value(mapping: &FieldMapping) -> Result<Value> {
    mapping.value.clone().ok_or_else(|| {
        BridgeError::Config(format!(
            "Ticket field mapping for {} has no value",
            mapping.describe()
        ))
    })
}
