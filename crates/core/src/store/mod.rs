//! Local persisted state, stored as JSON blobs under well-known keys.

mod memory;
mod sqlite;

pub use memory::MemoryStateStore;
pub use sqlite::SqliteStateStore;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Key holding the serialized [`Session`](crate::session::Session).
pub const SESSION_KEY: &str = "session";
/// Key holding the serialized lead list.
pub const LEADS_KEY: &str = "leads";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Key-value storage for application state.
pub trait StateStore: Send + Sync {
    fn load_raw(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn save_raw(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Returns whether the key existed.
    fn delete(&self, key: &str) -> Result<bool, StoreError>;
}

/// Typed helpers over any [`StateStore`].
pub trait StateStoreExt: StateStore {
    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.load_raw(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| StoreError::Serialization(format!("{}: {}", key, e))),
            None => Ok(None),
        }
    }

    fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)
            .map_err(|e| StoreError::Serialization(format!("{}: {}", key, e)))?;
        self.save_raw(key, &raw)
    }
}

impl<S: StateStore + ?Sized> StateStoreExt for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lead::Lead;

    #[test]
    fn test_typed_roundtrip_through_dyn_store() {
        let store: Box<dyn StateStore> = Box::new(MemoryStateStore::new());
        let leads = vec![Lead::provisional("Acme", None, "İzmir", "Lojistik")];

        store.save(LEADS_KEY, &leads).unwrap();
        let loaded: Vec<Lead> = store.load(LEADS_KEY).unwrap().unwrap();
        assert_eq!(loaded, leads);
    }

    #[test]
    fn test_load_corrupt_value_is_serialization_error() {
        let store = MemoryStateStore::new();
        store.save_raw(SESSION_KEY, "{not json").unwrap();
        let result: Result<Option<crate::session::Session>, _> = store.load(SESSION_KEY);
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }

    #[test]
    fn test_load_missing_is_none() {
        let store = MemoryStateStore::new();
        let loaded: Option<Vec<Lead>> = store.load(LEADS_KEY).unwrap();
        assert!(loaded.is_none());
    }
}
