//! Record stores backing orders and settings
//!
//! The persistent store is an external concern; the application only sees
//! these traits. Writes are full-record overwrites, so concurrent
//! reconciliation of the same order is a harmless last-writer-wins race.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::shared::errors::StoreError;
use crate::shared::types::{OrderRecord, ProviderKind};

/// Durable store for exchange order records
pub trait OrderStore: Send + Sync {
    /// Insert a new record; the id must not exist yet
    fn insert(&self, record: &OrderRecord) -> Result<(), StoreError>;

    /// Full-record overwrite; inserts when the id is unknown
    fn upsert(&self, record: &OrderRecord) -> Result<(), StoreError>;

    fn get(&self, id: &str) -> Result<Option<OrderRecord>, StoreError>;

    fn find_by_provider_id(
        &self,
        provider: ProviderKind,
        provider_id: &str,
    ) -> Result<Option<OrderRecord>, StoreError>;

    /// All records, newest first
    fn list(&self) -> Result<Vec<OrderRecord>, StoreError>;
}

/// Single-value settings store
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}
