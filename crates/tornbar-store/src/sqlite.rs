use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::debug;

use crate::kv::KeyValueStore;

const UPSERT: &str = "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at";

/// Key-value store backed by a single SQLite table
///
/// SQLite because it is embedded, needs no setup and survives a crash
/// halfway through a write.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        debug!("Opening store at {}", path.display());

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        Ok(Self { conn })
    }

    pub fn in_memory() -> crate::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    fn init_schema(conn: &Connection) -> crate::Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> crate::Result<Option<Vec<u8>>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &[u8]) -> crate::Result<()> {
        self.conn.execute(UPSERT, params![key, value, Utc::now().timestamp()])?;
        Ok(())
    }

    fn set_many(&self, entries: &[(&str, Vec<u8>)]) -> crate::Result<()> {
        // Dropping the transaction without commit rolls it back
        let tx = self.conn.unchecked_transaction()?;
        let now = Utc::now().timestamp();
        {
            let mut stmt = tx.prepare(UPSERT)?;
            for (key, value) in entries {
                stmt.execute(params![key, value, now])?;
            }
        }
        tx.commit()?;
        debug!("Wrote {} entries", entries.len());
        Ok(())
    }

    fn remove(&self, key: &str) -> crate::Result<()> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_and_get() {
        let store = SqliteStore::in_memory().unwrap();

        store.set("refreshInterval", b"30").unwrap();
        assert_eq!(store.get("refreshInterval").unwrap(), Some(b"30".to_vec()));
        assert_eq!(store.get("missing").unwrap(), None);
    }

    #[test]
    fn test_overwrite() {
        let store = SqliteStore::in_memory().unwrap();

        store.set("apiKey", b"first").unwrap();
        store.set("apiKey", b"second").unwrap();

        assert_eq!(store.get("apiKey").unwrap(), Some(b"second".to_vec()));
    }

    #[test]
    fn test_remove() {
        let store = SqliteStore::in_memory().unwrap();

        store.set("watchlist", b"[]").unwrap();
        store.remove("watchlist").unwrap();
        store.remove("watchlist").unwrap();

        assert_eq!(store.get("watchlist").unwrap(), None);
    }

    #[test]
    fn test_set_many() {
        let store = SqliteStore::in_memory().unwrap();
        store.set("apiKey", b"old").unwrap();

        store
            .set_many(&[("apiKey", b"new".to_vec()), ("refreshInterval", b"60".to_vec())])
            .unwrap();

        assert_eq!(store.get("apiKey").unwrap(), Some(b"new".to_vec()));
        assert_eq!(store.get("refreshInterval").unwrap(), Some(b"60".to_vec()));
    }

    #[test]
    fn test_set_many_rolls_back_on_failure() {
        let store = SqliteStore::in_memory().unwrap();
        store.set("apiKey", b"old").unwrap();
        store
            .conn
            .execute_batch(
                "CREATE TRIGGER reject_alerts BEFORE INSERT ON kv WHEN NEW.key = 'alerts'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let result = store.set_many(&[("apiKey", b"new".to_vec()), ("alerts", b"{}".to_vec())]);

        assert!(result.is_err());
        assert_eq!(store.get("apiKey").unwrap(), Some(b"old".to_vec()));
        assert_eq!(store.get("alerts").unwrap(), None);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tornbar.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.set("apiKey", b"persisted").unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get("apiKey").unwrap(), Some(b"persisted".to_vec()));
    }
}
