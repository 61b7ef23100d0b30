//! Log storage trait and in-memory implementation.
//!
//! The query engine works over a snapshot of entries, so the store only has to
//! append, count and hand out copies.

use lql::models::LogEntry;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Errors that can occur during log store operations.
#[derive(Debug, Error)]
pub enum LogStoreError {
    /// Failed to acquire lock on the store.
    #[error("Failed to acquire lock on log store")]
    LockError,
}

/// Trait for log storage implementations.
///
/// Implementations assign each entry an `id` that increases in ingestion
/// order, replacing whatever the caller put there.
pub trait LogStore: Send + Sync {
    /// Inserts a single log entry and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn insert(&self, entry: LogEntry) -> Result<u64, LogStoreError>;

    /// Inserts multiple log entries, keeping their order.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn insert_batch(&self, entries: Vec<LogEntry>) -> Result<(), LogStoreError>;

    /// Returns every stored entry in ingestion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn snapshot(&self) -> Result<Vec<LogEntry>, LogStoreError>;

    /// Returns the total number of logs in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the count operation fails.
    fn count(&self) -> Result<usize, LogStoreError>;

    /// Clears all logs from the store. Ids keep increasing afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the clear operation fails.
    fn clear(&self) -> Result<(), LogStoreError>;
}

#[derive(Debug, Default)]
struct Entries {
    logs: Vec<LogEntry>,
    last_id: u64,
}

impl Entries {
    fn push(&mut self, mut entry: LogEntry) -> u64 {
        self.last_id += 1;
        entry.id = self.last_id;
        self.logs.push(entry);
        self.last_id
    }
}

/// In-memory log store implementation.
///
/// Stores logs in a `Vec` protected by a `RwLock`. Data is not persisted
/// across restarts.
///
/// # Example
///
/// ```
/// use api::store::{InMemoryLogStore, LogStore};
/// use lql::models::{LogEntry, Severity};
///
/// let store = InMemoryLogStore::new();
/// let id = store
///     .insert(LogEntry::new(0, Severity::Info, "rabbit@a", "started"))
///     .unwrap();
///
/// assert_eq!(id, 1);
/// assert_eq!(store.snapshot().unwrap()[0].id, 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryLogStore {
    entries: Arc<RwLock<Entries>>,
}

impl InMemoryLogStore {
    /// Creates a new empty in-memory log store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogStore for InMemoryLogStore {
    fn insert(&self, entry: LogEntry) -> Result<u64, LogStoreError> {
        let mut entries = self.entries.write().map_err(|_| LogStoreError::LockError)?;
        Ok(entries.push(entry))
    }

    fn insert_batch(&self, batch: Vec<LogEntry>) -> Result<(), LogStoreError> {
        let mut entries = self.entries.write().map_err(|_| LogStoreError::LockError)?;
        for entry in batch {
            entries.push(entry);
        }
        Ok(())
    }

    fn snapshot(&self) -> Result<Vec<LogEntry>, LogStoreError> {
        let entries = self.entries.read().map_err(|_| LogStoreError::LockError)?;
        Ok(entries.logs.clone())
    }

    fn count(&self) -> Result<usize, LogStoreError> {
        let entries = self.entries.read().map_err(|_| LogStoreError::LockError)?;
        Ok(entries.logs.len())
    }

    fn clear(&self) -> Result<(), LogStoreError> {
        let mut entries = self.entries.write().map_err(|_| LogStoreError::LockError)?;
        entries.logs.clear();
        Ok(())
    }
}
