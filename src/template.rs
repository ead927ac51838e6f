//! Text templates for ticket subjects, ticket bodies and copied comments
//!
//! Templates contain `{{ path.to.value }}` placeholders resolved against a set
//! of named bindings (any `Serialize` value). Missing values render as empty
//! text, strings render without quotes, and arrays are indexed numerically
//! (`{{ issue.comments.0.body }}`).

use crate::{BridgeError, Result};
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Path(Vec<String>),
}

/// A parsed template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a template, rejecting unterminated or malformed placeholders
    pub fn parse(source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut rest = source;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                segments.push(Segment::Text(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or_else(|| {
                BridgeError::Template(format!("unterminated placeholder in '{}'", source))
            })?;
            segments.push(Segment::Path(parse_path(after[..end].trim(), source)?));
            rest = &after[end + 2..];
        }

        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Names of the top-level bindings this template refers to
    pub fn binding_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .segments
            .iter()
            .filter_map(|s| match s {
                Segment::Path(path) => path.first().map(String::as_str),
                Segment::Text(_) => None,
            })
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    pub fn render(&self, bindings: &Bindings) -> String {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Path(path) => {
                    if let Some(value) = bindings.lookup(path) {
                        push_value(&mut out, value);
                    }
                }
            }
        }
        out
    }
}

fn parse_path(expr: &str, source: &str) -> Result<Vec<String>> {
    let valid = |part: &str| {
        !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    };

    let parts: Vec<String> = expr.split('.').map(str::to_string).collect();
    if parts.iter().all(|p| valid(p)) {
        Ok(parts)
    } else {
        Err(BridgeError::Template(format!(
            "invalid placeholder '{{{{ {} }}}}' in '{}'",
            expr, source
        )))
    }
}

fn push_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => {}
        Value::String(s) => out.push_str(s),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        other => out.push_str(&other.to_string()),
    }
}

/// Named values a template is rendered against
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: Map<String, Value>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a serializable value under `name`
    pub fn bind(mut self, name: &str, value: &impl Serialize) -> Result<Self> {
        self.values
            .insert(name.to_string(), serde_json::to_value(value)?);
        Ok(self)
    }

    fn lookup(&self, path: &[String]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.values.get(first)?;
        for part in rest {
            current = match current {
                Value::Object(map) => map.get(part)?,
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}
