//! Request and response bodies for every remote operation.

use crate::models::{Record, RecordKind, RecordSummary, SyncDigest};
use crate::rpc::ErrorCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub auth_token: String,
    pub refresh_token: String,
}

/// Body for operations that take no arguments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Empty {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub login: String,
    pub password_hash: String,
    /// Base64 key-derivation salt chosen by the client.
    pub salt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub salt: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordBatch {
    pub records: Vec<Record>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Ack {
    pub affected: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileRequest {
    pub digests: Vec<SyncDigest>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileResponse {
    /// Records the client must take as-is.
    pub push_down: Vec<Record>,
    /// Ids the client must send back in full.
    pub pull_up: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryList {
    pub records: Vec<RecordSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordContent {
    #[serde(with = "crate::models::base64_opt", default)]
    pub content: Option<Vec<u8>>,
    pub kind: RecordKind,
}

/// JSON error body returned with every non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: ErrorCode,
}
