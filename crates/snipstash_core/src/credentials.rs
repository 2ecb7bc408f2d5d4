//! Password digests (bcrypt), computed off the async runtime.

use crate::error::AppError;

/// Hash `password` with bcrypt at `cost`.
///
/// # Errors
/// Returns an error for an invalid cost or when the blocking task fails.
pub async fn hash_password(password: String, cost: u32) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|err| {
            tracing::error!("Password hashing task failed: {}", err);
            AppError::Internal
        })?
        .map_err(AppError::from)
}

/// Check `password` against a stored digest. An empty or malformed digest
/// never matches.
pub async fn verify_password(password: String, digest: String) -> bool {
    if digest.is_empty() {
        return false;
    }
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &digest).unwrap_or(false))
        .await
        .unwrap_or(false)
}
