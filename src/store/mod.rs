//! Work queue and product persistence.
//!
//! Both live in one SQLite database (see [`sqlite::SqliteStore`]). The queue's
//! claim is a single transaction so an item is handed to at most one caller,
//! even across processes sharing the database file.

pub mod schema;
pub mod sqlite;

pub use sqlite::SqliteStore;

use crate::types::{FinishedProduct, NewQueueItem, QueueItem};

/// Errors from the storage layer. Callers may retry any of them; a failed
/// claim leaves the queue unchanged.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("lock poisoned: {0}")]
    Lock(String),

    /// A write-once record already exists.
    #[error("record already exists: {0}")]
    Duplicate(String),

    /// A stored row could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Ordered staging of pending ideas.
pub trait WorkQueue: Send + Sync {
    /// Append an item. No deduplication.
    fn enqueue(&self, item: &NewQueueItem) -> Result<QueueItem, StorageError>;

    /// Append several items; either all are stored or none.
    fn enqueue_many(&self, items: &[NewQueueItem]) -> Result<Vec<QueueItem>, StorageError>;

    /// Atomically remove and return the item with the earliest `enqueued_at`
    /// (ties broken by id), or `None` when the queue is empty.
    fn claim_oldest(&self) -> Result<Option<QueueItem>, StorageError>;

    /// Pending items. Advisory under concurrent writers.
    fn count(&self) -> Result<u64, StorageError>;
}

/// Write-once store of finished products keyed by product id.
pub trait ProductStore: Send + Sync {
    /// Insert a product; fails with [`StorageError::Duplicate`] if the id exists.
    fn put_product(&self, product: &FinishedProduct) -> Result<(), StorageError>;

    fn get_product(&self, product_id: &str) -> Result<Option<FinishedProduct>, StorageError>;

    fn count_products(&self) -> Result<u64, StorageError>;

    /// Cheap read proving the store is reachable.
    fn healthcheck(&self) -> Result<(), StorageError>;
}
