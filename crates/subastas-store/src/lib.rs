//! # subastas-store
//!
//! Small key-value storage capability injected wherever the client needs
//! state to survive a restart (today: the session identity).

#![deny(unsafe_code)]

pub mod error;
pub mod memory;
pub mod sqlite;

pub use error::StoreError;
pub use memory::MemoryKeyValueStore;
pub use sqlite::SqliteKeyValueStore;

/// String key-value storage. Writes overwrite.
pub trait KeyValueStore: Send + Sync {
    /// Value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    /// Store `value` under `key`.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    /// Remove `key`; returns whether it existed.
    fn remove(&self, key: &str) -> Result<bool, StoreError>;
}
