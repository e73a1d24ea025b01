//! Per-owner record storage.

use super::{is_constraint_violation, RemoteStore};
use crate::error::ServerError;
use rusqlite::{params, OptionalExtension};
use strongbox_core::models::RECORD_COLUMNS;
use strongbox_core::rpc::RecordContent;
use strongbox_core::{Record, RecordSummary};
use uuid::Uuid;

const UPSERT_RECORD: &str = "INSERT INTO records (id, user_id, name, kind, content, updated_at, deleted)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
     ON CONFLICT(id) DO UPDATE SET
        name = excluded.name,
        kind = excluded.kind,
        content = excluded.content,
        updated_at = excluded.updated_at,
        deleted = excluded.deleted
     WHERE records.user_id = excluded.user_id
       AND (records.deleted = 0 OR excluded.deleted = 1)";

impl RemoteStore {
    /// Insert or overwrite a batch of records for `owner` in one transaction.
    ///
    /// Every record must land. A record owned by someone else, a live write
    /// over a tombstone, or a live-name collision rolls the whole batch back.
    pub fn upsert_records(&self, owner: Uuid, records: &[Record]) -> Result<usize, ServerError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let owner = owner.to_string();
        let mut affected = 0;

        {
            let mut stmt = tx.prepare(UPSERT_RECORD)?;
            for record in records {
                let changed = stmt
                    .execute(params![
                        record.id.to_string(),
                        owner,
                        record.name,
                        record.kind,
                        record.content,
                        record.updated_at,
                        record.deleted
                    ])
                    .map_err(|e| {
                        if is_constraint_violation(&e) {
                            ServerError::Constraint(format!(
                                "name of record {} is already in use",
                                record.id
                            ))
                        } else {
                            e.into()
                        }
                    })?;
                if changed == 0 {
                    return Err(ServerError::Constraint(format!(
                        "record {} cannot be written",
                        record.id
                    )));
                }
                affected += changed;
            }
        }

        tx.commit()?;
        Ok(affected)
    }

    /// Every record `owner` has, tombstones included.
    pub fn records_for_owner(&self, owner: Uuid) -> Result<Vec<Record>, ServerError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM records WHERE user_id = ?1",
            RECORD_COLUMNS
        ))?;
        let records = stmt
            .query_map([owner.to_string()], Record::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    pub fn summaries(&self, owner: Uuid) -> Result<Vec<RecordSummary>, ServerError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT name, kind FROM records
             WHERE user_id = ?1 AND deleted = 0
             ORDER BY name",
        )?;
        let summaries = stmt
            .query_map([owner.to_string()], |row| {
                Ok(RecordSummary {
                    name: row.get(0)?,
                    kind: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(summaries)
    }

    pub fn content_by_name(&self, owner: Uuid, name: &str) -> Result<RecordContent, ServerError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT content, kind FROM records
             WHERE user_id = ?1 AND name = ?2 AND deleted = 0",
            params![owner.to_string(), name],
            |row| {
                Ok(RecordContent {
                    content: row.get(0)?,
                    kind: row.get(1)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| ServerError::NotFound(format!("record '{}'", name)))
    }

    /// Tombstone the live record called `name`.
    ///
    /// The new timestamp is strictly after the previous one even if the
    /// server clock is behind the writer's.
    pub fn delete_by_name(&self, owner: Uuid, name: &str, now: i64) -> Result<(), ServerError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE records
             SET name = NULL, content = NULL, deleted = 1,
                 updated_at = MAX(?3, updated_at + 1)
             WHERE user_id = ?1 AND name = ?2 AND deleted = 0",
            params![owner.to_string(), name, now],
        )?;
        if changed == 0 {
            return Err(ServerError::NotFound(format!("record '{}'", name)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::users::tests::user;
    use strongbox_core::RecordKind;

    fn setup() -> (RemoteStore, Uuid) {
        let store = RemoteStore::in_memory().unwrap();
        let alice = user("alice");
        store.insert_user(&alice).unwrap();
        (store, alice.user_id)
    }

    fn live(name: &str, updated_at: i64) -> Record {
        Record {
            id: Uuid::new_v4(),
            name: Some(name.to_string()),
            kind: RecordKind::Credential,
            content: Some(vec![1, 2, 3]),
            updated_at,
            deleted: false,
        }
    }

    fn tombstone(mut record: Record, updated_at: i64) -> Record {
        record.name = None;
        record.content = None;
        record.deleted = true;
        record.updated_at = updated_at;
        record
    }

    #[test]
    fn upsert_is_idempotent() {
        let (store, owner) = setup();
        let mail = live("mail", 10);
        assert_eq!(store.upsert_records(owner, &[mail.clone()]).unwrap(), 1);
        assert_eq!(store.upsert_records(owner, &[mail.clone()]).unwrap(), 1);
        assert_eq!(store.records_for_owner(owner).unwrap(), vec![mail]);
    }

    #[test]
    fn live_name_collision_rolls_back_batch() {
        let (store, owner) = setup();
        store.upsert_records(owner, &[live("mail", 10)]).unwrap();

        let batch = [live("bank", 11), live("mail", 12)];
        assert!(matches!(
            store.upsert_records(owner, &batch),
            Err(ServerError::Constraint(_))
        ));
        assert_eq!(store.records_for_owner(owner).unwrap().len(), 1);
    }

    #[test]
    fn tombstone_frees_name_and_stays_deleted() {
        let (store, owner) = setup();
        let mail = live("mail", 10);
        store.upsert_records(owner, &[mail.clone()]).unwrap();
        store
            .upsert_records(owner, &[tombstone(mail.clone(), 11)])
            .unwrap();

        let mut revived = mail.clone();
        revived.updated_at = 12;
        assert!(matches!(
            store.upsert_records(owner, &[revived]),
            Err(ServerError::Constraint(_))
        ));

        store.upsert_records(owner, &[live("mail", 13)]).unwrap();
        assert_eq!(store.summaries(owner).unwrap().len(), 1);
        assert_eq!(store.records_for_owner(owner).unwrap().len(), 2);

        // Re-sending the same tombstone is harmless.
        store.upsert_records(owner, &[tombstone(mail, 11)]).unwrap();
    }

    #[test]
    fn foreign_record_id_is_refused() {
        let (store, alice) = setup();
        let bob = user("bob");
        store.insert_user(&bob).unwrap();

        let mail = live("mail", 10);
        store.upsert_records(alice, &[mail.clone()]).unwrap();
        assert!(matches!(
            store.upsert_records(bob.user_id, &[mail]),
            Err(ServerError::Constraint(_))
        ));
        assert!(store.records_for_owner(bob.user_id).unwrap().is_empty());
    }

    #[test]
    fn summaries_and_content_are_scoped_to_owner() {
        let (store, alice) = setup();
        let bob = user("bob");
        store.insert_user(&bob).unwrap();
        store.upsert_records(alice, &[live("mail", 10)]).unwrap();

        let summaries = store.summaries(alice).unwrap();
        assert_eq!(summaries[0].name, "mail");
        assert_eq!(summaries[0].kind, RecordKind::Credential);

        let content = store.content_by_name(alice, "mail").unwrap();
        assert_eq!(content.content, Some(vec![1, 2, 3]));
        assert!(matches!(
            store.content_by_name(bob.user_id, "mail"),
            Err(ServerError::NotFound(_))
        ));
    }

    #[test]
    fn delete_by_name_advances_timestamp() {
        let (store, owner) = setup();
        let mail = live("mail", 5_000);
        store.upsert_records(owner, &[mail.clone()]).unwrap();

        store.delete_by_name(owner, "mail", 1_000).unwrap();
        let stored = &store.records_for_owner(owner).unwrap()[0];
        assert!(stored.deleted);
        assert_eq!(stored.name, None);
        assert_eq!(stored.content, None);
        assert_eq!(stored.updated_at, 5_001);

        assert!(matches!(
            store.delete_by_name(owner, "mail", 2_000),
            Err(ServerError::NotFound(_))
        ));
    }
}
