use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::kv::{KeyValueStore, StoreError};

/// In-memory store. Clones share the same map, so a test can hand one clone
/// to the code under test and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> crate::Result<Option<Vec<u8>>> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> crate::Result<()> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn set_many(&self, entries: &[(&str, Vec<u8>)]) -> crate::Result<()> {
        let mut map = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        for (key, value) in entries {
            map.insert(key.to_string(), value.clone());
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> crate::Result<()> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_entries() {
        let store = MemoryStore::new();
        let other = store.clone();

        store.set("apiKey", b"abc").unwrap();
        assert_eq!(other.get("apiKey").unwrap(), Some(b"abc".to_vec()));

        other.remove("apiKey").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_set_many() {
        let store = MemoryStore::new();
        store
            .set_many(&[("apiKey", b"abc".to_vec()), ("refreshInterval", b"30".to_vec())])
            .unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get("refreshInterval").unwrap(), Some(b"30".to_vec()));
    }

    #[test]
    fn test_missing_key() {
        let store = MemoryStore::new();
        assert_eq!(store.get("nope").unwrap(), None);
    }
}
