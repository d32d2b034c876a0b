pub mod answers;
pub mod questions;
pub mod tags;
pub mod users;

use rusqlite::Connection;

use crate::error::{AppError, AppResult};
use crate::state::DbPool;

pub const MAX_TITLE_CHARS: usize = 150;
pub const MAX_BODY_CHARS: usize = 30_000;

/// Trim `value` and check it is non-empty and at most `max` characters.
pub fn require_text(field: &str, value: &str, max: usize) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(format!("{} is required", field)));
    }
    if trimmed.chars().count() > max {
        return Err(AppError::BadRequest(format!(
            "{} must be {} characters or less",
            field, max
        )));
    }
    Ok(trimmed.to_string())
}

/// Only the author may edit or delete their content.
pub fn ensure_owner(author_id: &str, requester_id: &str) -> AppResult<()> {
    if author_id != requester_id {
        return Err(AppError::Forbidden(
            "Only the author can change this content".into(),
        ));
    }
    Ok(())
}

/// Run store work on the blocking pool. Writers may wait on SQLite's lock
/// for up to `busy_timeout`, which must not happen on an async worker.
pub async fn blocking<T, F>(pool: &DbPool, f: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> AppResult<T> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        f(&mut conn)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}
