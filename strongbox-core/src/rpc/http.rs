//! JSON-over-HTTP transport.

use crate::rpc::{ErrorBody, Metadata, Operation, RpcError, Transport};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

const HEALTH_PATH: &str = "/health";

/// HTTP client for the strongbox server.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| RpcError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, op: Operation, metadata: &Metadata, body: Vec<u8>) -> Result<Vec<u8>, RpcError> {
        let url = format!("{}{}", self.base_url, op.path());

        let mut request = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        if let Some((name, value)) = metadata.header() {
            request = request.header(name, value);
        }

        let resp = request.send().await.map_err(map_send_error)?;
        let status = resp.status();
        let bytes = resp.bytes().await.map_err(map_send_error)?;

        if status.is_success() {
            Ok(bytes.to_vec())
        } else {
            Err(error_from_response(status, &bytes))
        }
    }

    async fn probe(&self) -> Result<(), RpcError> {
        let url = format!("{}{}", self.base_url, HEALTH_PATH);
        let resp = self.client.get(&url).send().await.map_err(map_send_error)?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(RpcError::Unavailable(format!("health check returned {}", resp.status())))
        }
    }
}

fn map_send_error(e: reqwest::Error) -> RpcError {
    if e.is_timeout() {
        RpcError::DeadlineExceeded
    } else {
        RpcError::Unavailable(e.to_string())
    }
}

fn error_from_response(status: StatusCode, body: &[u8]) -> RpcError {
    if let Ok(err) = serde_json::from_slice::<ErrorBody>(body) {
        return RpcError::from_code(err.code, err.error);
    }

    let text = String::from_utf8_lossy(body).into_owned();
    match status {
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            RpcError::Unavailable(format!("{}: {}", status, text))
        }
        StatusCode::PAYLOAD_TOO_LARGE => RpcError::InvalidArgument(format!("{}: {}", status, text)),
        _ => RpcError::Internal(format!("{}: {}", status, text)),
    }
}
