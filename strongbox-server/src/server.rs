//! Axum router setup.

use crate::auth::auth_middleware;
use crate::config::ServerConfig;
use crate::handlers::{records, users};
use crate::session::SessionService;
use crate::storage::RemoteStore;
use crate::token::TokenIssuer;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use strongbox_core::rpc::Operation;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub storage: RemoteStore,
    pub sessions: SessionService,
}

impl AppState {
    pub fn new(storage: RemoteStore, config: &ServerConfig) -> anyhow::Result<Self> {
        let tokens = TokenIssuer::new(
            config.token_secret.as_bytes(),
            config.auth_token_ttl_secs,
            config.refresh_token_ttl_secs,
        );
        let sessions = SessionService::new(storage.clone(), tokens, config.verifier_kdf)?;
        Ok(Self { storage, sessions })
    }
}

pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    // Authenticated routes
    let authenticated = Router::new()
        .route(
            Operation::CreateRecordBatch.path(),
            post(records::create_batch),
        )
        .route(
            Operation::UpdateRecordBatch.path(),
            post(records::update_batch),
        )
        .route(Operation::Reconcile.path(), post(records::reconcile))
        .route(Operation::ListRecordSummaries.path(), post(records::list))
        .route(Operation::GetRecordContent.path(), post(records::get))
        .route(Operation::DeleteRecord.path(), post(records::delete))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Unauthenticated routes; refresh checks its own token
    let public = Router::new()
        .route(Operation::CreateUser.path(), post(users::register))
        .route(Operation::LogIn.path(), post(users::log_in))
        .route(Operation::RefreshSession.path(), post(users::refresh))
        .route("/health", get(health));

    Router::new()
        .merge(authenticated)
        .merge(public)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.max_payload_size))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
