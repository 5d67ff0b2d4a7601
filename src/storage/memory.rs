//! In-memory storage.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::KeyValueStore;
use crate::error::{Error, Result};

/// In-memory key/value storage.
///
/// Clone shares the same map. Useful for tests and throwaway sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> Error {
    Error::Storage("memory store lock poisoned".into())
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let guard = self.inner.read().map_err(|_| poisoned())?;
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut guard = self.inner.write().map_err(|_| poisoned())?;
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut guard = self.inner.write().map_err(|_| poisoned())?;
        guard.remove(key);
        Ok(())
    }

    fn contains(&self, key: &str) -> Result<bool> {
        let guard = self.inner.read().map_err(|_| poisoned())?;
        Ok(guard.contains_key(key))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
