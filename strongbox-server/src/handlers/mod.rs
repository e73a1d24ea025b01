pub mod records;
pub mod users;

use crate::error::ServerError;

/// Run CPU-heavy work (password hashing) off the async workers.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ServerError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ServerError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServerError::Internal(format!("worker failed: {}", e)))?
}
