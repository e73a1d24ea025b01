//! Request/response call layer between client and server.
//!
//! Every remote operation is a single JSON exchange. Tokens never travel in
//! the body: authorized calls carry an `auth_token` header, and the refresh
//! operation alone carries a `refresh_token` header.

pub mod client;
pub mod http;
pub mod interceptor;
pub mod messages;

pub use client::RemoteClient;
pub use http::HttpTransport;
pub use interceptor::{Interceptor, RetryPolicy};
pub use messages::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const AUTH_TOKEN_HEADER: &str = "auth_token";
pub const REFRESH_TOKEN_HEADER: &str = "refresh_token";

/// Remote operations exposed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateUser,
    LogIn,
    RefreshSession,
    CreateRecordBatch,
    UpdateRecordBatch,
    Reconcile,
    ListRecordSummaries,
    GetRecordContent,
    DeleteRecord,
}

/// Which token, if any, an operation must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    None,
    Auth,
    Refresh,
}

impl Operation {
    pub const ALL: [Operation; 9] = [
        Operation::CreateUser,
        Operation::LogIn,
        Operation::RefreshSession,
        Operation::CreateRecordBatch,
        Operation::UpdateRecordBatch,
        Operation::Reconcile,
        Operation::ListRecordSummaries,
        Operation::GetRecordContent,
        Operation::DeleteRecord,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Self::CreateUser => "/api/v1/users/register",
            Self::LogIn => "/api/v1/users/login",
            Self::RefreshSession => "/api/v1/users/refresh",
            Self::CreateRecordBatch => "/api/v1/records/create-batch",
            Self::UpdateRecordBatch => "/api/v1/records/update-batch",
            Self::Reconcile => "/api/v1/records/reconcile",
            Self::ListRecordSummaries => "/api/v1/records/list",
            Self::GetRecordContent => "/api/v1/records/get",
            Self::DeleteRecord => "/api/v1/records/delete",
        }
    }

    pub fn token_kind(&self) -> TokenKind {
        match self {
            Self::CreateUser | Self::LogIn => TokenKind::None,
            Self::RefreshSession => TokenKind::Refresh,
            _ => TokenKind::Auth,
        }
    }
}

/// Out-of-band call metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Metadata {
    None,
    AuthToken(String),
    RefreshToken(String),
}

impl Metadata {
    pub fn header(&self) -> Option<(&'static str, &str)> {
        match self {
            Self::None => None,
            Self::AuthToken(t) => Some((AUTH_TOKEN_HEADER, t.as_str())),
            Self::RefreshToken(t) => Some((REFRESH_TOKEN_HEADER, t.as_str())),
        }
    }
}

/// Machine-readable error code carried in server error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidArgument,
    InvalidCredentials,
    AlreadyExists,
    PermissionDenied,
    TokenExpired,
    InvalidToken,
    NotFound,
    FailedPrecondition,
    PayloadTooLarge,
    Internal,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    #[error("call cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("token is expired")]
    TokenExpired,

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("internal server error: {0}")]
    Internal(String),
}

impl RpcError {
    pub fn from_code(code: ErrorCode, message: String) -> Self {
        match code {
            ErrorCode::InvalidArgument | ErrorCode::PayloadTooLarge => Self::InvalidArgument(message),
            ErrorCode::InvalidCredentials => Self::InvalidCredentials,
            ErrorCode::AlreadyExists => Self::AlreadyExists(message),
            ErrorCode::PermissionDenied | ErrorCode::InvalidToken => Self::PermissionDenied(message),
            ErrorCode::TokenExpired => Self::TokenExpired,
            ErrorCode::NotFound => Self::NotFound(message),
            ErrorCode::FailedPrecondition => Self::FailedPrecondition(message),
            ErrorCode::Internal => Self::Internal(message),
        }
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }

    /// Errors worth another attempt, unless the caller itself gave up.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded | Self::Unavailable(_))
    }
}

/// Caller-owned cancellation and deadline for one logical call.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The error the caller's own context would produce right now, if any.
    pub fn done(&self) -> Option<RpcError> {
        if self.cancel.is_cancelled() {
            return Some(RpcError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(RpcError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Drive `fut` unless the caller cancels or the deadline passes first.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, RpcError>
    where
        F: Future<Output = Result<T, RpcError>>,
    {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(RpcError::Cancelled),
            _ = sleep_until(self.deadline) => Err(RpcError::DeadlineExceeded),
            result = fut => result,
        }
    }

    pub async fn sleep(&self, duration: Duration) -> Result<(), RpcError> {
        self.run(async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// One request/response exchange with the server.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(&self, op: Operation, metadata: &Metadata, body: Vec<u8>) -> Result<Vec<u8>, RpcError>;

    /// Cheap reachability check.
    async fn probe(&self) -> Result<(), RpcError> {
        Ok(())
    }
}

/// Whether the server is believed reachable.
#[derive(Debug)]
pub struct Connectivity {
    online: AtomicBool,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Relaxed);
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}
