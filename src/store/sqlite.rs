//! SQLite-backed work queue and product store.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, TransactionBehavior, params};

use super::schema::{apply_schema, read_schema_version};
use super::{ProductStore, StorageError, WorkQueue};
use crate::types::{FinishedProduct, NewQueueItem, QueueItem};

/// How long a writer waits for another connection's lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Queue and product store backed by one SQLite file.
///
/// Several `SqliteStore`s (or processes) may open the same file; claims
/// stay exclusive because each runs inside a `BEGIN IMMEDIATE` transaction.
pub struct SqliteStore {
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
}

type QueueRow = (i64, String, u32, i64);

impl SqliteStore {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn, Some(path.to_path_buf()))
    }

    /// Private in-memory database, for tests and dry runs.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?, None)
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>) -> Result<Self, StorageError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        apply_schema(&conn)?;
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Database file, or `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn schema_version(&self) -> Result<Option<u32>, StorageError> {
        let conn = self.lock()?;
        Ok(read_schema_version(&conn)?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))
    }
}

fn insert_item(conn: &Connection, item: &NewQueueItem) -> Result<QueueItem, StorageError> {
    conn.execute(
        "INSERT INTO product_queue (idea, patterns, enqueued_at) VALUES (?1, ?2, ?3)",
        params![item.idea, item.patterns, item.enqueued_at.timestamp_micros()],
    )?;
    Ok(QueueItem {
        id: conn.last_insert_rowid(),
        idea: item.idea.clone(),
        patterns: item.patterns,
        enqueued_at: item.enqueued_at,
    })
}

fn decode_item((id, idea, patterns, micros): QueueRow) -> Result<QueueItem, StorageError> {
    let enqueued_at: DateTime<Utc> = DateTime::from_timestamp_micros(micros).ok_or_else(|| {
        StorageError::Corrupt(format!("queue item {id}: bad timestamp {micros}"))
    })?;
    Ok(QueueItem {
        id,
        idea,
        patterns,
        enqueued_at,
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation)
}

impl WorkQueue for SqliteStore {
    fn enqueue(&self, item: &NewQueueItem) -> Result<QueueItem, StorageError> {
        let conn = self.lock()?;
        let stored = insert_item(&conn, item)?;
        tracing::debug!(id = stored.id, patterns = stored.patterns, "queue item enqueued");
        Ok(stored)
    }

    fn enqueue_many(&self, items: &[NewQueueItem]) -> Result<Vec<QueueItem>, StorageError> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let mut stored = Vec::with_capacity(items.len());
        for item in items {
            stored.push(insert_item(&tx, item)?);
        }
        tx.commit()?;
        tracing::debug!(count = stored.len(), "queue batch enqueued");
        Ok(stored)
    }

    fn claim_oldest(&self) -> Result<Option<QueueItem>, StorageError> {
        let mut conn = self.lock()?;
        // IMMEDIATE takes the write lock up front, so no other connection can
        // select the same row between our read and our delete.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let row: Option<QueueRow> = tx
            .query_row(
                "DELETE FROM product_queue
                 WHERE id = (
                     SELECT id FROM product_queue
                     ORDER BY enqueued_at ASC, id ASC
                     LIMIT 1
                 )
                 RETURNING id, idea, patterns, enqueued_at",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;
        tx.commit()?;

        match row {
            Some(row) => {
                let item = decode_item(row)?;
                tracing::info!(id = item.id, idea = %item.idea, "claimed queue item");
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    fn count(&self) -> Result<u64, StorageError> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM product_queue", [], |row| row.get(0))?;
        Ok(n.max(0) as u64)
    }
}

impl ProductStore for SqliteStore {
    fn put_product(&self, product: &FinishedProduct) -> Result<(), StorageError> {
        let record =
            serde_json::to_string(product).map_err(|e| StorageError::Corrupt(e.to_string()))?;
        let conn = self.lock()?;
        let result = conn.execute(
            "INSERT INTO products (product_id, pattern_id, record, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                product.product_id,
                product.pattern_id.to_string(),
                record,
                Utc::now().timestamp_micros()
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => {
                Err(StorageError::Duplicate(product.product_id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn get_product(&self, product_id: &str) -> Result<Option<FinishedProduct>, StorageError> {
        let conn = self.lock()?;
        let record: Option<String> = conn
            .query_row(
                "SELECT record FROM products WHERE product_id = ?1",
                params![product_id],
                |row| row.get(0),
            )
            .optional()?;
        record
            .map(|r| serde_json::from_str(&r).map_err(|e| StorageError::Corrupt(e.to_string())))
            .transpose()
    }

    fn count_products(&self) -> Result<u64, StorageError> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;
        Ok(n.max(0) as u64)
    }

    fn healthcheck(&self) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.query_row("SELECT COUNT(*) FROM healthcheck", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}
