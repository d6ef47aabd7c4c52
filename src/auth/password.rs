use crate::error::{AppError, AppResult};

pub const MIN_PASSWORD_LENGTH: usize = 8;

pub fn hash(plaintext: &str) -> AppResult<String> {
    if plaintext.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::BadRequest(format!(
            "รหัสผ่านต้องมีอย่างน้อย {} ตัวอักษร",
            MIN_PASSWORD_LENGTH
        )));
    }
    bcrypt::hash(plaintext, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("bcrypt hash failed: {e}")))
}

/// Constant-time check via bcrypt. A malformed stored hash never verifies.
pub fn verify(plaintext: &str, stored_hash: &str) -> bool {
    bcrypt::verify(plaintext, stored_hash).unwrap_or(false)
}
