//! strongbox remote store and session service.
//!
//! The server keeps only login verifiers, sessions and opaque record
//! ciphertexts. It never possesses encryption keys or plaintext data.

pub mod auth;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod handlers;
pub mod server;
pub mod session;
pub mod storage;
pub mod token;

pub use config::ServerConfig;
pub use error::ServerError;
pub use server::{build_router, AppState};
pub use session::SessionService;
pub use storage::RemoteStore;
pub use token::{TokenIssuer, TokenType};
