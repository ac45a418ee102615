use std::sync::Arc;

use crate::auth::password::PasswordHasher;
use crate::error::RpcError;

/// Emails are compared trimmed and lower-cased everywhere.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    !email.is_empty() && email.contains('@')
}

pub(crate) fn check_credentials(username: &str, password: &str) -> Result<(), RpcError> {
    if username.is_empty() {
        return Err(RpcError::invalid_argument("username is required"));
    }
    if password.is_empty() {
        return Err(RpcError::invalid_argument("password is required"));
    }
    Ok(())
}

// Argon2 with 64 MiB is CPU bound, keep it off the reactor threads.

pub(crate) async fn hash_password(
    hasher: Arc<dyn PasswordHasher>,
    plain: String,
) -> Result<String, RpcError> {
    let hash = tokio::task::spawn_blocking(move || hasher.hash(&plain))
        .await
        .map_err(RpcError::internal)??;
    Ok(hash)
}

pub(crate) async fn verify_password(
    hasher: Arc<dyn PasswordHasher>,
    plain: String,
    hash: String,
) -> Result<bool, RpcError> {
    let ok = tokio::task::spawn_blocking(move || hasher.verify(&plain, &hash))
        .await
        .map_err(RpcError::internal)??;
    Ok(ok)
}
