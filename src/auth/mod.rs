pub mod cookies;
pub mod guard;
pub mod handlers;
pub mod password;
pub mod session;

use crate::db::users;
use crate::state::DbPool;

/// Ensure the configured administrator account exists.
pub fn bootstrap_admin(pool: &DbPool, email: &str, plaintext: &str) -> anyhow::Result<i64> {
    let hash = password::hash(plaintext)?;
    let conn = pool.get()?;
    let id = users::ensure_admin(&conn, email.trim(), &hash)?;
    tracing::info!("Administrator account ready: {}", email);
    Ok(id)
}
