use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::token::TokenKeys;
use crate::config::Config;
use crate::votes::{DynVoteLedger, SqliteVoteLedger};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub ledger: DynVoteLedger,
    pub tokens: Arc<TokenKeys>,
}

impl AppState {
    /// Wire up the SQLite-backed collaborators around one pool.
    pub fn new(db: DbPool, mut config: Config) -> Self {
        let tokens = Arc::new(TokenKeys::new(config.ensure_jwt_secret().as_bytes()));
        let ledger: DynVoteLedger = Arc::new(SqliteVoteLedger::new(db.clone()));
        Self {
            db,
            config,
            ledger,
            tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn default_config_never_signs_with_an_empty_key() {
        let tmp = tempfile::tempdir().unwrap();
        let pool = crate::db::create_pool(&tmp.path().join("test.db"), 1).unwrap();
        let state = AppState::new(pool, Config::default());

        let secret = state.config.auth.jwt_secret.as_deref().unwrap();
        assert!(!secret.is_empty());

        let token = state
            .tokens
            .issue("u1", "sid", Utc::now() + Duration::hours(1))
            .unwrap();
        assert!(TokenKeys::new(b"").verify(&token).is_err());
        assert!(state.tokens.verify(&token).is_ok());
    }
}
