// Vote ledger - every counter mutation happens in the same transaction as
// the ledger row it derives from.
use async_trait::async_trait;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;
use thiserror::Error;

use super::domain::{LedgerChange, TargetKind, VoteOutcome, VotePlan, VoteValue};
use crate::db;
use crate::state::DbPool;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cannot vote on your own content")]
    SelfVote,

    #[error("Requester does not own the question")]
    NotQuestionOwner,

    /// Lost an insert race on the (user, target) key. Re-running the cast
    /// will see the winning row.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Ledger operations exposed to the HTTP layer.
#[async_trait]
pub trait VoteLedger: Send + Sync {
    /// Create, flip or toggle off the caller's vote on a target.
    async fn cast_vote(
        &self,
        user_id: &str,
        kind: TargetKind,
        target_id: &str,
        value: VoteValue,
    ) -> Result<VoteOutcome, LedgerError>;

    /// Current vote counter of a target.
    async fn tally(&self, kind: TargetKind, target_id: &str) -> Result<i64, LedgerError>;

    /// The caller's vote on a target, if any.
    async fn user_vote(
        &self,
        user_id: &str,
        kind: TargetKind,
        target_id: &str,
    ) -> Result<Option<VoteValue>, LedgerError>;

    /// Mark an answer as the accepted one for its question.
    async fn accept_answer(&self, answer_id: &str, requester_id: &str)
        -> Result<(), LedgerError>;

    /// Withdraw acceptance from an answer. No-op if it was not accepted.
    async fn revoke_acceptance(
        &self,
        answer_id: &str,
        requester_id: &str,
    ) -> Result<(), LedgerError>;

    /// Count one view of a question. Returns the new view count.
    async fn record_question_view(&self, question_id: &str) -> Result<i64, LedgerError>;
}

/// Type alias for Arc-wrapped ledger (for AppState)
pub type DynVoteLedger = Arc<dyn VoteLedger>;

/// SQLite implementation. Work runs on the blocking pool so a dropped
/// request future never abandons a transaction halfway.
pub struct SqliteVoteLedger {
    pool: DbPool,
}

impl SqliteVoteLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, LedgerError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, LedgerError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await?
    }
}

#[async_trait]
impl VoteLedger for SqliteVoteLedger {
    async fn cast_vote(
        &self,
        user_id: &str,
        kind: TargetKind,
        target_id: &str,
        value: VoteValue,
    ) -> Result<VoteOutcome, LedgerError> {
        let user_id = user_id.to_string();
        let target_id = target_id.to_string();
        self.with_conn(move |conn| cast_vote(conn, &user_id, kind, &target_id, value))
            .await
    }

    async fn tally(&self, kind: TargetKind, target_id: &str) -> Result<i64, LedgerError> {
        let target_id = target_id.to_string();
        self.with_conn(move |conn| {
            kind.target()
                .current_votes(conn, &target_id)?
                .ok_or_else(|| not_found(kind, &target_id))
        })
        .await
    }

    async fn user_vote(
        &self,
        user_id: &str,
        kind: TargetKind,
        target_id: &str,
    ) -> Result<Option<VoteValue>, LedgerError> {
        let user_id = user_id.to_string();
        let target_id = target_id.to_string();
        self.with_conn(move |conn| {
            if kind.target().author_id(conn, &target_id)?.is_none() {
                return Err(not_found(kind, &target_id));
            }
            Ok(existing_vote(conn, &user_id, kind, &target_id)?)
        })
        .await
    }

    async fn accept_answer(
        &self,
        answer_id: &str,
        requester_id: &str,
    ) -> Result<(), LedgerError> {
        let answer_id = answer_id.to_string();
        let requester_id = requester_id.to_string();
        self.with_conn(move |conn| accept_answer(conn, &answer_id, &requester_id))
            .await
    }

    async fn revoke_acceptance(
        &self,
        answer_id: &str,
        requester_id: &str,
    ) -> Result<(), LedgerError> {
        let answer_id = answer_id.to_string();
        let requester_id = requester_id.to_string();
        self.with_conn(move |conn| revoke_acceptance(conn, &answer_id, &requester_id))
            .await
    }

    async fn record_question_view(&self, question_id: &str) -> Result<i64, LedgerError> {
        let question_id = question_id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "UPDATE questions SET views = views + 1 WHERE id = ?1 RETURNING views",
                params![question_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| not_found(TargetKind::Question, &question_id))
        })
        .await
    }
}

impl ToSql for VoteValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_i64()))
    }
}

impl FromSql for VoteValue {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = i64::column_result(value)?;
        VoteValue::try_from(raw).map_err(|_| FromSqlError::OutOfRange(raw))
    }
}

fn not_found(kind: TargetKind, id: &str) -> LedgerError {
    LedgerError::NotFound(format!("{} {}", kind, id))
}

fn existing_vote(
    conn: &Connection,
    user_id: &str,
    kind: TargetKind,
    target_id: &str,
) -> rusqlite::Result<Option<VoteValue>> {
    conn.query_row(
        "SELECT value FROM votes WHERE user_id = ?1 AND target_type = ?2 AND target_id = ?3",
        params![user_id, kind.as_str(), target_id],
        |row| row.get(0),
    )
    .optional()
}

/// Read the caller's vote, decide the transition, and write the ledger row
/// and every counter it feeds, all under one write lock.
pub fn cast_vote(
    conn: &mut Connection,
    user_id: &str,
    kind: TargetKind,
    target_id: &str,
    value: VoteValue,
) -> Result<VoteOutcome, LedgerError> {
    db::immediate(conn, |tx| {
        let target = kind.target();
        let author_id = target
            .author_id(tx, target_id)?
            .ok_or_else(|| not_found(kind, target_id))?;
        if author_id == user_id {
            return Err(LedgerError::SelfVote);
        }

        let existing = existing_vote(tx, user_id, kind, target_id)?;
        let plan = VotePlan::decide(existing, value);

        match plan.change {
            LedgerChange::Insert(v) => {
                let vote_id = uuid::Uuid::now_v7().to_string();
                tx.execute(
                    "INSERT INTO votes (id, user_id, target_type, target_id, value)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![vote_id, user_id, kind.as_str(), target_id, v],
                )
                .map_err(|e| {
                    if db::is_unique_violation(&e) {
                        LedgerError::Conflict(format!(
                            "vote by {} on {} {} already exists",
                            user_id, kind, target_id
                        ))
                    } else {
                        e.into()
                    }
                })?;
            }
            LedgerChange::Delete => {
                tx.execute(
                    "DELETE FROM votes WHERE user_id = ?1 AND target_type = ?2 AND target_id = ?3",
                    params![user_id, kind.as_str(), target_id],
                )?;
            }
            LedgerChange::Update(v) => {
                tx.execute(
                    "UPDATE votes SET value = ?1, updated_at = datetime('now')
                     WHERE user_id = ?2 AND target_type = ?3 AND target_id = ?4",
                    params![v, user_id, kind.as_str(), target_id],
                )?;
            }
        }

        target.apply_vote_delta(tx, target_id, plan.delta)?;
        if target.credits_author() {
            tx.execute(
                "UPDATE users SET reputation = reputation + ?1, updated_at = datetime('now')
                 WHERE id = ?2",
                params![plan.delta, author_id],
            )?;
        }

        tracing::debug!(
            user_id,
            target = %kind,
            target_id,
            action = ?plan.outcome.action,
            delta = plan.delta,
            "vote cast"
        );
        Ok(plan.outcome)
    })
}

/// Question id and question author for an answer.
fn answer_question(
    conn: &Connection,
    answer_id: &str,
) -> Result<(String, String, bool), LedgerError> {
    conn.query_row(
        "SELECT a.question_id, q.author_id, a.is_accepted
         FROM answers a JOIN questions q ON q.id = a.question_id
         WHERE a.id = ?1",
        params![answer_id],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )
    .optional()?
    .ok_or_else(|| not_found(TargetKind::Answer, answer_id))
}

pub fn accept_answer(
    conn: &mut Connection,
    answer_id: &str,
    requester_id: &str,
) -> Result<(), LedgerError> {
    db::immediate(conn, |tx| {
        let (question_id, question_author, already_accepted) = answer_question(tx, answer_id)?;
        if question_author != requester_id {
            return Err(LedgerError::NotQuestionOwner);
        }

        if !already_accepted {
            // Clear before set: the partial unique index forbids two at once.
            tx.execute(
                "UPDATE answers SET is_accepted = 0, updated_at = datetime('now')
                 WHERE question_id = ?1 AND is_accepted = 1",
                params![question_id],
            )?;
            tx.execute(
                "UPDATE answers SET is_accepted = 1, updated_at = datetime('now') WHERE id = ?1",
                params![answer_id],
            )?;
        }
        tx.execute(
            "UPDATE questions SET is_answered = 1 WHERE id = ?1",
            params![question_id],
        )?;

        tracing::debug!(answer_id, question_id = %question_id, "answer accepted");
        Ok(())
    })
}

pub fn revoke_acceptance(
    conn: &mut Connection,
    answer_id: &str,
    requester_id: &str,
) -> Result<(), LedgerError> {
    db::immediate(conn, |tx| {
        let (question_id, question_author, accepted) = answer_question(tx, answer_id)?;
        if question_author != requester_id {
            return Err(LedgerError::NotQuestionOwner);
        }
        if accepted {
            tx.execute(
                "UPDATE answers SET is_accepted = 0, updated_at = datetime('now') WHERE id = ?1",
                params![answer_id],
            )?;
            tx.execute(
                "UPDATE questions SET is_answered = 0 WHERE id = ?1",
                params![question_id],
            )?;
        }
        Ok(())
    })
}

/// Drop every vote on a target that is about to be deleted, taking back the
/// reputation those votes granted. Must run inside the deleting transaction.
/// Returns the sum of the removed votes.
pub fn retract_target_votes(
    conn: &Connection,
    kind: TargetKind,
    target_id: &str,
) -> rusqlite::Result<i64> {
    let total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(value), 0) FROM votes WHERE target_type = ?1 AND target_id = ?2",
        params![kind.as_str(), target_id],
        |row| row.get(0),
    )?;

    let target = kind.target();
    if total != 0 && target.credits_author() {
        if let Some(author_id) = target.author_id(conn, target_id)? {
            conn.execute(
                "UPDATE users SET reputation = reputation - ?1, updated_at = datetime('now')
                 WHERE id = ?2",
                params![total, author_id],
            )?;
        }
    }

    conn.execute(
        "DELETE FROM votes WHERE target_type = ?1 AND target_id = ?2",
        params![kind.as_str(), target_id],
    )?;
    Ok(total)
}
