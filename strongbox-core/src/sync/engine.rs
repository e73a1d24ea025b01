//! Client half of reconciliation.

use crate::models::now_millis;
use crate::rpc::{CallContext, RemoteClient};
use crate::store::LocalStore;
use crate::{Result, StrongboxError};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// What one sync cycle moved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Never-synced records sent as a create batch.
    pub created: usize,
    /// Server records taken into the local cache.
    pub pushed_down: usize,
    /// Local records sent back on request.
    pub pulled_up: usize,
}

impl SyncReport {
    pub fn is_empty(&self) -> bool {
        self.created == 0 && self.pushed_down == 0 && self.pulled_up == 0
    }
}

/// Drives sync cycles for one profile. Cycles never overlap.
pub struct SyncEngine {
    store: LocalStore,
    remote: Arc<RemoteClient>,
    cycle: Mutex<()>,
}

impl SyncEngine {
    pub fn new(store: LocalStore, remote: Arc<RemoteClient>) -> Self {
        Self {
            store,
            remote,
            cycle: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn remote(&self) -> &Arc<RemoteClient> {
        &self.remote
    }

    /// Run one full cycle: push new records and pending tombstones, reconcile
    /// digests, apply the push-down set, answer the pull-up request.
    ///
    /// Any failure aborts the cycle; local state is only changed by steps
    /// whose remote half already succeeded.
    pub async fn sync(&self, cx: &CallContext) -> Result<SyncReport> {
        let _cycle = self.cycle.lock().await;
        let mut report = SyncReport::default();

        let new_records = self.store.new_records()?;
        if !new_records.is_empty() {
            let ids: Vec<Uuid> = new_records.iter().map(|r| r.id).collect();
            report.created = ids.len();
            debug!("Pushing {} new records", ids.len());

            let affected = self.remote.create_record_batch(new_records, cx).await?;
            expect_affected("create", affected, ids.len())?;
            self.store.mark_synced(&ids)?;
        }

        let digests = self.store.sync_digests()?;
        debug!("Reconciling {} digests", digests.len());
        let plan = self.remote.reconcile(digests, cx).await?;

        report.pushed_down = self.store.apply_push_down(&plan.push_down)?;

        if !plan.pull_up.is_empty() {
            let records = self.store.records_by_ids(&plan.pull_up)?;
            report.pulled_up = records.len();
            let affected = self.remote.update_record_batch(records, cx).await?;
            expect_affected("update", affected, report.pulled_up)?;
        }

        self.store.set_last_sync_at(now_millis())?;
        if !report.is_empty() {
            info!(
                "Sync complete: {} created, {} pushed down, {} pulled up",
                report.created, report.pushed_down, report.pulled_up
            );
        }
        Ok(report)
    }
}

fn expect_affected(batch: &str, affected: usize, expected: usize) -> Result<()> {
    if affected != expected {
        return Err(StrongboxError::StorageConstraint(format!(
            "{} batch affected {} of {} records",
            batch, affected, expected
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{encrypt, EncryptionKey};
    use crate::models::{Record, RecordKind};
    use crate::rpc::{
        Ack, Metadata, Operation, RecordBatch, ReconcileRequest, RetryPolicy, RpcError,
        TokenPair, Transport,
    };
    use crate::session::ClientSession;
    use crate::sync::planner;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// In-process stand-in for the server's record endpoints.
    #[derive(Default)]
    struct FakeServer {
        records: std::sync::Mutex<HashMap<Uuid, Record>>,
        fail_batches: AtomicBool,
        reconcile_calls: AtomicUsize,
        last_reconcile_payload: std::sync::Mutex<usize>,
    }

    impl FakeServer {
        fn put(&self, record: Record) {
            self.records.lock().unwrap().insert(record.id, record);
        }

        fn get(&self, id: &Uuid) -> Option<Record> {
            self.records.lock().unwrap().get(id).cloned()
        }

        fn len(&self) -> usize {
            self.records.lock().unwrap().len()
        }

        fn upsert_batch(&self, body: &[u8]) -> std::result::Result<Vec<u8>, RpcError> {
            if self.fail_batches.load(Ordering::SeqCst) {
                return Err(RpcError::FailedPrecondition("zero rows affected".into()));
            }
            let batch: RecordBatch = serde_json::from_slice(body).unwrap();
            let affected = batch.records.len();
            for record in batch.records {
                self.put(record);
            }
            Ok(serde_json::to_vec(&Ack { affected }).unwrap())
        }
    }

    #[async_trait]
    impl Transport for FakeServer {
        async fn call(
            &self,
            op: Operation,
            _metadata: &Metadata,
            body: Vec<u8>,
        ) -> std::result::Result<Vec<u8>, RpcError> {
            match op {
                Operation::CreateRecordBatch | Operation::UpdateRecordBatch => self.upsert_batch(&body),
                Operation::Reconcile => {
                    self.reconcile_calls.fetch_add(1, Ordering::SeqCst);
                    let req: ReconcileRequest = serde_json::from_slice(&body).unwrap();
                    let all: Vec<Record> = self.records.lock().unwrap().values().cloned().collect();
                    let plan = planner::plan(all, &req.digests);
                    *self.last_reconcile_payload.lock().unwrap() =
                        plan.push_down.len() + plan.pull_up.len();
                    Ok(serde_json::to_vec(&plan).unwrap())
                }
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    fn engine(server: Arc<FakeServer>) -> SyncEngine {
        let session = Arc::new(ClientSession::new(None));
        session.log_in(
            "alice",
            EncryptionKey::from_bytes([7; 32]),
            TokenPair {
                auth_token: "a".into(),
                refresh_token: "r".into(),
            },
        );
        let policy = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            jitter: 0.0,
        };
        let remote = Arc::new(RemoteClient::new(server, session, policy));
        SyncEngine::new(LocalStore::in_memory().unwrap(), remote)
    }

    fn ciphertext(plaintext: &[u8]) -> Vec<u8> {
        encrypt(&EncryptionKey::from_bytes([7; 32]), plaintext).unwrap()
    }

    #[tokio::test]
    async fn first_sync_pushes_new_records_and_acknowledges() {
        let server = Arc::new(FakeServer::default());
        let engine = engine(server.clone());
        let record = engine
            .store()
            .create_record("mail", RecordKind::Credential, ciphertext(b"{}"))
            .unwrap();

        let report = engine.sync(&CallContext::new()).await.unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(server.get(&record.id), Some(record));
        assert!(engine.store().new_records().unwrap().is_empty());
        assert!(engine.store().last_sync_at().unwrap().is_some());
    }

    #[tokio::test]
    async fn second_cycle_is_idempotent() {
        let server = Arc::new(FakeServer::default());
        let engine = engine(server.clone());
        engine
            .store()
            .create_record("a", RecordKind::Text, ciphertext(b"1"))
            .unwrap();
        server.put(Record {
            id: Uuid::new_v4(),
            name: Some("b".into()),
            kind: RecordKind::Text,
            content: Some(ciphertext(b"2")),
            updated_at: 5,
            deleted: false,
        });

        let first = engine.sync(&CallContext::new()).await.unwrap();
        assert_eq!(first.created, 1);
        assert_eq!(first.pushed_down, 1);

        let second = engine.sync(&CallContext::new()).await.unwrap();
        assert!(second.is_empty());
        assert_eq!(*server.last_reconcile_payload.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn newer_server_record_converges_locally() {
        let server = Arc::new(FakeServer::default());
        let engine = engine(server.clone());
        let local = engine
            .store()
            .create_record("mail", RecordKind::Text, ciphertext(b"v1"))
            .unwrap();
        engine.sync(&CallContext::new()).await.unwrap();

        let remote_version = Record {
            content: Some(ciphertext(b"v2")),
            updated_at: local.updated_at + 10_000,
            ..local.clone()
        };
        server.put(remote_version.clone());

        let report = engine.sync(&CallContext::new()).await.unwrap();
        assert_eq!(report.pushed_down, 1);
        assert_eq!(engine.store().get_by_id(&local.id).unwrap(), Some(remote_version));
    }

    #[tokio::test]
    async fn newer_client_record_is_pulled_up() {
        let server = Arc::new(FakeServer::default());
        let engine = engine(server.clone());
        engine
            .store()
            .create_record("mail", RecordKind::Text, ciphertext(b"v1"))
            .unwrap();
        engine.sync(&CallContext::new()).await.unwrap();

        let edited = engine.store().update_record("mail", ciphertext(b"v2")).unwrap();
        let report = engine.sync(&CallContext::new()).await.unwrap();
        assert_eq!(report.pulled_up, 1);
        assert_eq!(server.get(&edited.id), Some(edited));
    }

    #[tokio::test]
    async fn equal_timestamp_conflict_takes_server_version() {
        let server = Arc::new(FakeServer::default());
        let engine = engine(server.clone());
        let local = engine
            .store()
            .create_record("mail", RecordKind::Text, ciphertext(b"v1"))
            .unwrap();
        engine.sync(&CallContext::new()).await.unwrap();

        let edited = engine.store().update_record("mail", ciphertext(b"client")).unwrap();
        let server_version = Record {
            content: Some(ciphertext(b"server")),
            updated_at: edited.updated_at,
            ..local.clone()
        };
        server.put(server_version.clone());

        engine.sync(&CallContext::new()).await.unwrap();
        assert_eq!(engine.store().get_by_id(&local.id).unwrap(), Some(server_version.clone()));
        assert_eq!(server.get(&local.id), Some(server_version));
    }

    #[tokio::test]
    async fn local_delete_propagates_tombstone() {
        let server = Arc::new(FakeServer::default());
        let engine = engine(server.clone());
        let record = engine
            .store()
            .create_record("mail", RecordKind::Credential, ciphertext(b"{}"))
            .unwrap();
        engine.sync(&CallContext::new()).await.unwrap();

        engine.store().delete_by_name("mail").unwrap();
        engine.sync(&CallContext::new()).await.unwrap();

        let on_server = server.get(&record.id).unwrap();
        assert!(on_server.deleted);
        assert!(on_server.content.is_none());
        assert!(on_server.name.is_none());

        engine
            .store()
            .create_record("mail", RecordKind::Credential, ciphertext(b"{}"))
            .unwrap();
        engine.sync(&CallContext::new()).await.unwrap();
        assert_eq!(server.len(), 2);
    }

    #[tokio::test]
    async fn failed_batch_leaves_records_unacknowledged() {
        let server = Arc::new(FakeServer::default());
        let engine = engine(server.clone());
        engine
            .store()
            .create_record("mail", RecordKind::Text, ciphertext(b"x"))
            .unwrap();

        server.fail_batches.store(true, Ordering::SeqCst);
        let err = engine.sync(&CallContext::new()).await.unwrap_err();
        assert!(matches!(err, StrongboxError::Rpc(RpcError::FailedPrecondition(_))));
        assert_eq!(engine.store().new_records().unwrap().len(), 1);
        assert_eq!(server.reconcile_calls.load(Ordering::SeqCst), 0);
        assert!(engine.store().last_sync_at().unwrap().is_none());

        server.fail_batches.store(false, Ordering::SeqCst);
        let report = engine.sync(&CallContext::new()).await.unwrap();
        assert_eq!(report.created, 1);
        assert!(engine.store().new_records().unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_syncs_are_serialized() {
        let server = Arc::new(FakeServer::default());
        let engine = Arc::new(engine(server.clone()));
        for i in 0..5 {
            engine
                .store()
                .create_record(&format!("r{}", i), RecordKind::Text, ciphertext(b"x"))
                .unwrap();
        }

        let a = tokio::spawn({
            let engine = engine.clone();
            async move { engine.sync(&CallContext::new()).await }
        });
        let b = tokio::spawn({
            let engine = engine.clone();
            async move { engine.sync(&CallContext::new()).await }
        });
        let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());

        // Exactly one of the two cycles saw the new records.
        assert_eq!(a.created + b.created, 5);
        assert_eq!(server.len(), 5);
    }
}
