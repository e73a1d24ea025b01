//! Auth-token middleware for record routes.

use crate::error::ServerError;
use crate::server::AppState;
use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use strongbox_core::rpc::AUTH_TOKEN_HEADER;
use uuid::Uuid;

/// Identity of the caller, inserted into request extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub Uuid);

/// Verifies the `auth_token` header and attaches the caller's user id.
///
/// An expired token is reported with its own code so the client knows to
/// refresh; anything else is an invalid token.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ServerError> {
    let token = request
        .headers()
        .get(AUTH_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServerError::InvalidToken("missing auth token".to_string()))?;

    let user_id = state.sessions.verify_token(token)?;
    request.extensions_mut().insert(AuthUser(user_id));

    Ok(next.run(request).await)
}
