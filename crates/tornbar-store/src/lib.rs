// Key-value persistence for settings and the watchlist.
// SQLite on disk, a HashMap in tests.

pub mod kv;
pub mod memory;
pub mod sqlite;

pub use kv::{KeyValueStore, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub type Result<T> = std::result::Result<T, StoreError>;
