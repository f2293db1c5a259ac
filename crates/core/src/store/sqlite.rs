//! SQLite-backed state store.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{StateStore, StoreError};

pub struct SqliteStateStore {
    conn: Mutex<Connection>,
}

impl SqliteStateStore {
    /// Open (or create) the database file and its schema.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Database(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".to_string()))
    }
}

impl StateStore for SqliteStateStore {
    fn load_raw(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.lock()?;
        conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
            row.get(0)
        })
        .optional()
        .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn save_raw(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let removed = conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SenderProfile, Session};
    use crate::store::{StateStoreExt, SESSION_KEY};
    use tempfile::tempdir;

    #[test]
    fn test_upsert_and_delete() {
        let store = SqliteStateStore::in_memory().unwrap();
        assert!(store.load_raw("leads").unwrap().is_none());

        store.save_raw("leads", "[]").unwrap();
        store.save_raw("leads", "[1]").unwrap();
        assert_eq!(store.load_raw("leads").unwrap().as_deref(), Some("[1]"));

        assert!(store.delete("leads").unwrap());
        assert!(!store.delete("leads").unwrap());
    }

    #[test]
    fn test_file_based_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("prospector.db");

        let mut session = Session::new("demo", SenderProfile::default(), 12);
        session.rotation_cursor = 3;
        {
            let store = SqliteStateStore::new(&path).unwrap();
            store.save(SESSION_KEY, &session).unwrap();
        }

        let store = SqliteStateStore::new(&path).unwrap();
        let loaded: Session = store.load(SESSION_KEY).unwrap().unwrap();
        assert_eq!(loaded, session);
    }
}
