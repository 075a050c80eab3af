//! SQLite DDL for the patternpress store.

use rusqlite::Connection;

/// Bumped when the DDL changes shape.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Complete DDL. Uses `IF NOT EXISTS` throughout so `apply_schema` is idempotent.
pub(crate) const SCHEMA_SQL: &str = r#"
-- WAL lets count/healthcheck reads proceed while a claim holds the write lock.
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Pending ideas. AUTOINCREMENT keeps ids monotonic so they order ties.
CREATE TABLE IF NOT EXISTS product_queue (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    idea        TEXT NOT NULL,
    patterns    INTEGER NOT NULL,
    enqueued_at INTEGER NOT NULL      -- microseconds since the Unix epoch, UTC
);

CREATE INDEX IF NOT EXISTS idx_queue_order ON product_queue(enqueued_at, id);

-- Finished products, written once per product_id.
CREATE TABLE IF NOT EXISTS products (
    product_id  TEXT PRIMARY KEY,
    pattern_id  TEXT NOT NULL,
    record      TEXT NOT NULL,        -- JSON FinishedProduct
    created_at  INTEGER NOT NULL
);

-- Target of the health probe.
CREATE TABLE IF NOT EXISTS healthcheck (
    id INTEGER PRIMARY KEY
);
"#;

/// Apply the schema and seed the version row.
pub(crate) fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        rusqlite::params![CURRENT_SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

/// Read the stored schema version, if any.
pub(crate) fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<u32>> {
    use rusqlite::OptionalExtension;
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM schema_meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value.and_then(|v| v.parse().ok()))
}
