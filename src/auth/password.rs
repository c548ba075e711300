use crate::error::{AppError, AppResult};

pub const MIN_PASSWORD_LEN: usize = 6;

/// Hash a password with bcrypt off the async runtime.
pub async fn hash(plaintext: String, cost: u32) -> AppResult<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(plaintext, cost))
        .await
        .map_err(|e| AppError::Internal(format!("Hashing task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against a stored hash. Malformed hashes never verify.
pub async fn verify(plaintext: String, hashed: String) -> bool {
    tokio::task::spawn_blocking(move || bcrypt::verify(plaintext, &hashed).unwrap_or(false))
        .await
        .unwrap_or(false)
}
