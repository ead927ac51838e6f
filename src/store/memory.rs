//! In-memory idempotency store, for tests and dry runs

use super::{keys, IdempotencyStore};
use crate::{BridgeError, Result};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct State {
    seen: HashSet<String>,
    values: HashMap<String, String>,
}

/// Process-local [`IdempotencyStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| BridgeError::Other("memory store lock poisoned".to_string()))
    }
}

impl IdempotencyStore for MemoryStore {
    fn is_seen(&self, namespace: &str, id: &str) -> Result<bool> {
        Ok(self.state()?.seen.contains(&keys::seen(namespace, id)))
    }

    fn mark_seen(&self, namespace: &str, id: &str) -> Result<()> {
        self.state()?.seen.insert(keys::seen(namespace, id));
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.state()?.values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.state()?
            .values
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
