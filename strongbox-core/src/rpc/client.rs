//! Typed wrappers for every remote operation.

use crate::models::{Record, RecordSummary, SyncDigest};
use crate::rpc::{
    Ack, CallContext, Connectivity, Empty, Interceptor, LoginRequest, LoginResponse, NameRequest,
    Operation, RecordBatch, RecordContent, ReconcileRequest, ReconcileResponse, RegisterRequest,
    RetryPolicy, RpcError, SummaryList, TokenPair, Transport,
};
use crate::session::ClientSession;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

pub struct RemoteClient {
    interceptor: Interceptor,
}

impl RemoteClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        session: Arc<ClientSession>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            interceptor: Interceptor::new(transport, session, policy, Arc::new(Connectivity::default())),
        }
    }

    pub fn connectivity(&self) -> Arc<Connectivity> {
        self.interceptor.connectivity().clone()
    }

    /// Reachability check that bypasses retries; updates connectivity.
    pub async fn probe(&self) -> bool {
        let online = self.interceptor.transport().probe().await.is_ok();
        self.interceptor.connectivity().set_online(online);
        online
    }

    pub async fn create_user(&self, req: &RegisterRequest, cx: &CallContext) -> Result<TokenPair, RpcError> {
        self.invoke(Operation::CreateUser, req, cx).await
    }

    pub async fn log_in(&self, req: &LoginRequest, cx: &CallContext) -> Result<LoginResponse, RpcError> {
        self.invoke(Operation::LogIn, req, cx).await
    }

    pub async fn refresh_session(&self, cx: &CallContext) -> Result<TokenPair, RpcError> {
        self.invoke(Operation::RefreshSession, &Empty {}, cx).await
    }

    pub async fn create_record_batch(&self, records: Vec<Record>, cx: &CallContext) -> Result<usize, RpcError> {
        let ack: Ack = self
            .invoke(Operation::CreateRecordBatch, &RecordBatch { records }, cx)
            .await?;
        Ok(ack.affected)
    }

    pub async fn update_record_batch(&self, records: Vec<Record>, cx: &CallContext) -> Result<usize, RpcError> {
        let ack: Ack = self
            .invoke(Operation::UpdateRecordBatch, &RecordBatch { records }, cx)
            .await?;
        Ok(ack.affected)
    }

    pub async fn reconcile(&self, digests: Vec<SyncDigest>, cx: &CallContext) -> Result<ReconcileResponse, RpcError> {
        self.invoke(Operation::Reconcile, &ReconcileRequest { digests }, cx)
            .await
    }

    pub async fn list_record_summaries(&self, cx: &CallContext) -> Result<Vec<RecordSummary>, RpcError> {
        let list: SummaryList = self
            .invoke(Operation::ListRecordSummaries, &Empty {}, cx)
            .await?;
        Ok(list.records)
    }

    pub async fn get_record_content(&self, name: &str, cx: &CallContext) -> Result<RecordContent, RpcError> {
        let req = NameRequest {
            name: name.to_string(),
        };
        self.invoke(Operation::GetRecordContent, &req, cx).await
    }

    pub async fn delete_record(&self, name: &str, cx: &CallContext) -> Result<(), RpcError> {
        let req = NameRequest {
            name: name.to_string(),
        };
        let _: Ack = self.invoke(Operation::DeleteRecord, &req, cx).await?;
        Ok(())
    }

    async fn invoke<Req, Resp>(&self, op: Operation, req: &Req, cx: &CallContext) -> Result<Resp, RpcError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let body = serde_json::to_vec(req).map_err(|e| RpcError::Protocol(e.to_string()))?;
        let resp = self.interceptor.call(op, body, cx).await?;
        serde_json::from_slice(&resp)
            .map_err(|e| RpcError::Protocol(format!("invalid {:?} response: {}", op, e)))
    }
}
