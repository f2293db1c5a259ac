use std::collections::HashMap;
use std::sync::RwLock;

use super::{StateStore, StoreError};

/// In-memory store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStateStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> StoreError {
        StoreError::Database("memory store lock poisoned".to_string())
    }
}

impl StateStore for MemoryStateStore {
    fn load_raw(&self, key: &str) -> Result<Option<String>, StoreError> {
        let values = self.values.read().map_err(|_| Self::poisoned())?;
        Ok(values.get(key).cloned())
    }

    fn save_raw(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut values = self.values.write().map_err(|_| Self::poisoned())?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut values = self.values.write().map_err(|_| Self::poisoned())?;
        Ok(values.remove(key).is_some())
    }
}
