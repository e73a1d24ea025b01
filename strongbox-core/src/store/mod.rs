//! Client-side record cache.
//!
//! Holds every record of the logged-in profile (ciphertext only) plus the
//! sync bookkeeping: the per-record `first_synced` flag and the
//! `last_sync_at` watermark.

mod schema;

pub use schema::CURRENT_SCHEMA_VERSION;

use crate::models::{now_millis, Record, RecordKind, RecordSummary, SyncDigest, RECORD_COLUMNS};
use crate::{Result, StrongboxError};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Thread-safe handle to one profile's cache database.
#[derive(Clone)]
pub struct LocalStore {
    conn: Arc<Mutex<Connection>>,
}

impl LocalStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        Self::with_connection(conn)
    }

    /// In-memory cache, for tests and throwaway sessions.
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        schema::initialize(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a brand-new, never-synced record.
    pub fn create_record(&self, name: &str, kind: RecordKind, content: Vec<u8>) -> Result<Record> {
        let record = Record {
            id: Uuid::new_v4(),
            name: Some(name.to_string()),
            kind,
            content: Some(content),
            updated_at: now_millis(),
            deleted: false,
        };

        self.conn()
            .execute(
                "INSERT INTO records (id, name, kind, content, updated_at, first_synced, deleted)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, 0)",
                params![
                    record.id.to_string(),
                    record.name,
                    record.kind,
                    record.content,
                    record.updated_at
                ],
            )
            .map_err(|e| name_conflict(e, name))?;

        Ok(record)
    }

    /// Replace the ciphertext of a live record, bumping `updated_at`.
    pub fn update_record(&self, name: &str, content: Vec<u8>) -> Result<Record> {
        let mut record = self.get_by_name(name)?;
        record.updated_at = next_timestamp(record.updated_at);
        record.content = Some(content);

        let affected = self.conn().execute(
            "UPDATE records SET content = ?1, updated_at = ?2 WHERE id = ?3 AND deleted = 0",
            params![record.content, record.updated_at, record.id.to_string()],
        )?;
        if affected == 0 {
            return Err(StrongboxError::RecordNotFound(name.to_string()));
        }
        Ok(record)
    }

    pub fn get_by_name(&self, name: &str) -> Result<Record> {
        self.conn()
            .query_row(
                &format!("SELECT {} FROM records WHERE name = ?1 AND deleted = 0", RECORD_COLUMNS),
                [name],
                Record::from_row,
            )
            .optional()?
            .ok_or_else(|| StrongboxError::RecordNotFound(name.to_string()))
    }

    pub fn get_by_id(&self, id: &Uuid) -> Result<Option<Record>> {
        Ok(self
            .conn()
            .query_row(
                &format!("SELECT {} FROM records WHERE id = ?1", RECORD_COLUMNS),
                [id.to_string()],
                Record::from_row,
            )
            .optional()?)
    }

    /// Names and kinds of live records, sorted by name.
    pub fn list_summaries(&self) -> Result<Vec<RecordSummary>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT name, kind FROM records WHERE deleted = 0 ORDER BY name")?;
        let summaries = stmt
            .query_map([], |row| {
                Ok(RecordSummary {
                    name: row.get(0)?,
                    kind: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(summaries)
    }

    /// Tombstone a live record: clear name and content, set `deleted`.
    ///
    /// The tombstone is queued with the next create batch even when the
    /// record was already acknowledged, so the server frees the name before
    /// any new record reusing it arrives.
    pub fn delete_by_name(&self, name: &str) -> Result<()> {
        let current = self.get_by_name(name)?;
        let affected = self.conn().execute(
            "UPDATE records SET name = NULL, content = NULL, deleted = 1, first_synced = 0,
                updated_at = ?1
             WHERE id = ?2 AND deleted = 0",
            params![next_timestamp(current.updated_at), current.id.to_string()],
        )?;
        if affected == 0 {
            return Err(StrongboxError::RecordNotFound(name.to_string()));
        }
        Ok(())
    }

    /// Records awaiting acknowledgement: never-sent records and pending
    /// tombstones. Tombstones come first.
    pub fn new_records(&self) -> Result<Vec<Record>> {
        self.select_records("WHERE first_synced = 0 ORDER BY deleted DESC, updated_at", [])
    }

    /// Mark records as acknowledged. Fails without changes if any id is unknown.
    pub fn mark_synced(&self, ids: &[Uuid]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for id in ids {
            let affected = tx.execute(
                "UPDATE records SET first_synced = 1 WHERE id = ?1",
                [id.to_string()],
            )?;
            if affected == 0 {
                return Err(StrongboxError::StorageConstraint(format!(
                    "cannot acknowledge unknown record {}",
                    id
                )));
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Digests of every record the server has acknowledged.
    pub fn sync_digests(&self) -> Result<Vec<SyncDigest>> {
        Ok(self
            .select_records("WHERE first_synced = 1", [])?
            .iter()
            .map(Record::digest)
            .collect())
    }

    /// Take server records as-is, all or nothing. A local tombstone is never
    /// replaced by a live record.
    pub fn apply_push_down(&self, records: &[Record]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for record in records {
            tx.execute(
                "INSERT INTO records (id, name, kind, content, updated_at, first_synced, deleted)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    kind = excluded.kind,
                    content = excluded.content,
                    updated_at = excluded.updated_at,
                    first_synced = 1,
                    deleted = excluded.deleted
                 WHERE records.deleted = 0 OR excluded.deleted = 1",
                params![
                    record.id.to_string(),
                    record.name,
                    record.kind,
                    record.content,
                    record.updated_at,
                    record.deleted
                ],
            )
            .map_err(|e| name_conflict(e, record.name.as_deref().unwrap_or_default()))?;
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// Full records for the given ids. Fails with `NoData` if any is missing.
    pub fn records_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Record>> {
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            let record = self
                .get_by_id(id)?
                .ok_or_else(|| StrongboxError::NoData(format!("record {} not in local cache", id)))?;
            records.push(record);
        }
        Ok(records)
    }

    pub fn last_sync_at(&self) -> Result<Option<i64>> {
        let value = self
            .conn()
            .query_row("SELECT last_sync_at FROM sync_state WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value.flatten())
    }

    pub fn set_last_sync_at(&self, at: i64) -> Result<()> {
        self.conn().execute(
            "INSERT INTO sync_state (id, last_sync_at) VALUES (1, ?1)
             ON CONFLICT(id) DO UPDATE SET last_sync_at = excluded.last_sync_at",
            [at],
        )?;
        Ok(())
    }

    fn select_records<P: rusqlite::Params>(&self, clause: &str, params: P) -> Result<Vec<Record>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("SELECT {} FROM records {}", RECORD_COLUMNS, clause))?;
        let records = stmt
            .query_map(params, Record::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

/// Mutation timestamp that never goes backwards for a record.
fn next_timestamp(previous: i64) -> i64 {
    now_millis().max(previous + 1)
}

fn name_conflict(err: rusqlite::Error, name: &str) -> StrongboxError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
            StrongboxError::NameTaken(name.to_string())
        }
        _ => err.into(),
    }
}
