//! Token attachment, retry with jittered backoff, and transparent refresh.
//!
//! Every remote call goes through [`Interceptor::call`]:
//! - registration and login go out bare
//! - the refresh operation carries the refresh token, everything else the
//!   auth token of the current session
//! - cancellation or deadline errors the caller did not cause, and
//!   unreachable-server errors, are retried up to the attempt cap
//! - a `token_expired` answer triggers one refresh, after which the original
//!   call is attempted again with the new pair

use crate::rpc::{
    CallContext, Connectivity, Empty, Metadata, Operation, RpcError, TokenKind, TokenPair,
    Transport,
};
use crate::session::ClientSession;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Retry schedule for transient failures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Fractional jitter applied to `base_delay`, e.g. `0.1` for ±10%.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_millis(50),
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Wait before the next attempt: `base_delay` scaled by a random factor
    /// in `[1 - jitter, 1 + jitter]`.
    pub fn backoff(&self) -> Duration {
        let jitter = self.jitter.clamp(0.0, 1.0);
        let factor = 1.0 + rand::thread_rng().gen_range(-jitter..=jitter);
        self.base_delay.mul_f64(factor)
    }
}

pub struct Interceptor {
    transport: Arc<dyn Transport>,
    session: Arc<ClientSession>,
    policy: RetryPolicy,
    connectivity: Arc<Connectivity>,
}

impl Interceptor {
    pub fn new(
        transport: Arc<dyn Transport>,
        session: Arc<ClientSession>,
        policy: RetryPolicy,
        connectivity: Arc<Connectivity>,
    ) -> Self {
        Self {
            transport,
            session,
            policy,
            connectivity,
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn connectivity(&self) -> &Arc<Connectivity> {
        &self.connectivity
    }

    /// Perform `op` with `body`, refreshing the session at most once.
    pub async fn call(&self, op: Operation, body: Vec<u8>, cx: &CallContext) -> Result<Vec<u8>, RpcError> {
        let mut refreshed = false;
        loop {
            match self.call_with_retry(op, &body, cx).await {
                Err(RpcError::TokenExpired) if op != Operation::RefreshSession && !refreshed => {
                    refreshed = true;
                    info!("Auth token expired during {:?}, refreshing session", op);
                    self.refresh(cx).await?;
                }
                result => return result,
            }
        }
    }

    async fn refresh(&self, cx: &CallContext) -> Result<(), RpcError> {
        let body = serde_json::to_vec(&Empty {}).map_err(|e| RpcError::Protocol(e.to_string()))?;
        let resp = self.call_with_retry(Operation::RefreshSession, &body, cx).await?;
        let tokens: TokenPair =
            serde_json::from_slice(&resp).map_err(|e| RpcError::Protocol(e.to_string()))?;
        self.session.update_tokens(tokens);
        debug!("Session refreshed");
        Ok(())
    }

    async fn call_with_retry(&self, op: Operation, body: &[u8], cx: &CallContext) -> Result<Vec<u8>, RpcError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut last_err = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                cx.sleep(self.policy.backoff()).await?;
            }

            let metadata = self.metadata_for(op)?;
            match cx.run(self.transport.call(op, &metadata, body.to_vec())).await {
                Ok(resp) => {
                    self.connectivity.set_online(true);
                    return Ok(resp);
                }
                Err(err) if err.is_transient() => {
                    if let Some(own) = cx.done() {
                        return Err(own);
                    }
                    warn!(
                        "{:?} attempt {}/{} failed: {}",
                        op,
                        attempt + 1,
                        attempts,
                        err
                    );
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        self.connectivity.set_online(false);
        Err(last_err.unwrap_or_else(|| RpcError::Unavailable("no attempts made".to_string())))
    }

    fn metadata_for(&self, op: Operation) -> Result<Metadata, RpcError> {
        let kind = op.token_kind();
        if kind == TokenKind::None {
            return Ok(Metadata::None);
        }

        let tokens = self
            .session
            .tokens()
            .ok_or_else(|| RpcError::PermissionDenied("no active session".to_string()))?;
        Ok(match kind {
            TokenKind::Refresh => Metadata::RefreshToken(tokens.refresh_token),
            _ => Metadata::AuthToken(tokens.auth_token),
        })
    }
}
