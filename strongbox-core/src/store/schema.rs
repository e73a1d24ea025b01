//! Local cache schema.

use rusqlite::Connection;

/// Current schema version, stored in `PRAGMA user_version`.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

pub(crate) fn initialize(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS records (
            id TEXT PRIMARY KEY,
            name TEXT,
            kind TEXT NOT NULL CHECK (kind IN ('credential', 'card', 'text', 'binary')),
            content BLOB,
            updated_at INTEGER NOT NULL,
            first_synced INTEGER NOT NULL DEFAULT 0,
            deleted INTEGER NOT NULL DEFAULT 0
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_records_live_name
            ON records(name) WHERE deleted = 0;

        CREATE INDEX IF NOT EXISTS idx_records_first_synced
            ON records(first_synced);

        CREATE TABLE IF NOT EXISTS sync_state (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            last_sync_at INTEGER
        );",
    )?;
    conn.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)?;
    Ok(())
}
