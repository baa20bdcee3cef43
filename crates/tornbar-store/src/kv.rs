use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Store lock poisoned")]
    Poisoned,
}

/// Opaque byte storage keyed by string
///
/// Callers own the encoding. A missing key is `Ok(None)`, never an error.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> crate::Result<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: &[u8]) -> crate::Result<()>;
    /// Write several entries at once. Either all of them land or none do.
    fn set_many(&self, entries: &[(&str, Vec<u8>)]) -> crate::Result<()>;
    fn remove(&self, key: &str) -> crate::Result<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> crate::Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> crate::Result<()> {
        (**self).set(key, value)
    }

    fn set_many(&self, entries: &[(&str, Vec<u8>)]) -> crate::Result<()> {
        (**self).set_many(entries)
    }

    fn remove(&self, key: &str) -> crate::Result<()> {
        (**self).remove(key)
    }
}
