//! Registration, login and session refresh.

use super::blocking;
use crate::error::ServerError;
use crate::server::AppState;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use strongbox_core::rpc::{LoginRequest, LoginResponse, RegisterRequest, REFRESH_TOKEN_HEADER};
use strongbox_core::TokenPair;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<TokenPair>, ServerError> {
    let sessions = state.sessions.clone();
    let session =
        blocking(move || sessions.create_user(&req.login, &req.password_hash, &req.salt)).await?;
    Ok(Json(session.tokens))
}

pub async fn log_in(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ServerError> {
    let sessions = state.sessions.clone();
    let (session, salt) = blocking(move || sessions.log_in(&req.login, &req.password_hash)).await?;
    tracing::info!(user_id = %session.user_id, "User logged in");
    Ok(Json(LoginResponse {
        tokens: session.tokens,
        salt,
    }))
}

pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TokenPair>, ServerError> {
    let token = headers
        .get(REFRESH_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ServerError::SessionNotFound)?;
    let session = state.sessions.refresh_session(token)?;
    Ok(Json(session.tokens))
}
