use rusqlite::{params, Connection, OptionalExtension};

use crate::db::{self, models::User};
use crate::error::{AppError, AppResult};

pub const MIN_PASSWORD_CHARS: usize = 8;

pub fn validate_username(raw: &str) -> AppResult<String> {
    let username = raw.trim();
    let len = username.chars().count();
    if !(3..=32).contains(&len) {
        return Err(AppError::BadRequest(
            "Username must be between 3 and 32 characters".into(),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(AppError::BadRequest(
            "Username may only contain letters, digits, '_' and '-'".into(),
        ));
    }
    Ok(username.to_string())
}

pub fn validate_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(AppError::BadRequest("A valid email is required".into())),
    }
}

pub fn validate_password(raw: &str) -> AppResult<()> {
    if raw.chars().count() < MIN_PASSWORD_CHARS {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_CHARS
        )));
    }
    Ok(())
}

pub fn create_user(
    conn: &Connection,
    username: &str,
    email: &str,
    password_hash: &str,
) -> AppResult<User> {
    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO users (id, username, email, password_hash) VALUES (?1, ?2, ?3, ?4)",
        params![id, username, email, password_hash],
    )
    .map_err(|e| {
        if db::is_unique_violation(&e) {
            AppError::Conflict("Username or email is already taken".into())
        } else {
            AppError::Database(e)
        }
    })?;

    find_by_id(conn, &id)?.ok_or(AppError::NotFound)
}

pub fn find_by_id(conn: &Connection, id: &str) -> AppResult<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", User::COLUMNS),
            params![id],
            User::from_row,
        )
        .optional()?;
    Ok(user)
}

pub fn find_by_username(conn: &Connection, username: &str) -> AppResult<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE username = ?1", User::COLUMNS),
            params![username],
            User::from_row,
        )
        .optional()?;
    Ok(user)
}
