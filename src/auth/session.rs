use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};

/// SQLite `datetime('now')` format, so stored expiries compare as text.
const SQLITE_DATETIME: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone)]
pub struct NewSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Create a new session for a user.
pub fn create_session(
    conn: &Connection,
    user_id: &str,
    hours: u64,
) -> Result<NewSession, rusqlite::Error> {
    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();
    let expires_at = Utc::now() + Duration::hours(hours as i64);

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            id,
            user_id,
            token,
            expires_at.format(SQLITE_DATETIME).to_string()
        ],
    )?;

    Ok(NewSession { token, expires_at })
}

/// User id and username behind a live session, if any.
pub fn session_user(
    conn: &Connection,
    token: &str,
) -> Result<Option<(String, String)>, rusqlite::Error> {
    conn.query_row(
        "SELECT u.id, u.username FROM sessions s \
         JOIN users u ON u.id = s.user_id \
         WHERE s.token = ?1 AND s.expires_at > datetime('now')",
        params![token],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()
}

/// Delete a session by token.
pub fn delete_session(conn: &Connection, token: &str) -> Result<(), rusqlite::Error> {
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Drop every expired session. Returns how many were removed.
pub fn purge_expired(conn: &Connection) -> Result<usize, rusqlite::Error> {
    conn.execute(
        "DELETE FROM sessions WHERE expires_at <= datetime('now')",
        [],
    )
}

/// Generate a cryptographically random 32-byte hex token.
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn setup() -> (crate::state::DbPool, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let pool = db::create_pool(&tmp.path().join("test.db"), 2).unwrap();
        db::run_migrations(&pool).unwrap();
        pool.get()
            .unwrap()
            .execute(
                "INSERT INTO users (id, username, email, password_hash)
                 VALUES ('u1', 'alice', 'alice@example.com', 'x')",
                [],
            )
            .unwrap();
        (pool, tmp)
    }

    #[test]
    fn generate_token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generate_token_is_unique() {
        let t1 = generate_token();
        let t2 = generate_token();
        assert_ne!(t1, t2);
    }

    #[test]
    fn created_session_resolves_to_its_user() {
        let (pool, _tmp) = setup();
        let conn = pool.get().unwrap();
        let session = create_session(&conn, "u1", 24).unwrap();
        assert!(session.expires_at > Utc::now());

        let user = session_user(&conn, &session.token).unwrap();
        assert_eq!(user, Some(("u1".to_string(), "alice".to_string())));
    }

    #[test]
    fn deleted_session_no_longer_resolves() {
        let (pool, _tmp) = setup();
        let conn = pool.get().unwrap();
        let session = create_session(&conn, "u1", 24).unwrap();
        delete_session(&conn, &session.token).unwrap();
        assert_eq!(session_user(&conn, &session.token).unwrap(), None);
    }

    #[test]
    fn expired_session_is_ignored_and_purged() {
        let (pool, _tmp) = setup();
        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO sessions (id, user_id, token, expires_at)
             VALUES ('s1', 'u1', 'stale', datetime('now', '-1 hour'))",
            [],
        )
        .unwrap();
        create_session(&conn, "u1", 1).unwrap();

        assert_eq!(session_user(&conn, "stale").unwrap(), None);
        assert_eq!(purge_expired(&conn).unwrap(), 1);

        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(remaining, 1);
    }
}
