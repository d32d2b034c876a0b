use rusqlite::{params, Connection, OptionalExtension};

use super::domain::TargetKind;

/// What the ledger needs from a votable table.
pub trait Votable: Send + Sync {
    /// Author of the target, or `None` if it does not exist.
    fn author_id(&self, conn: &Connection, id: &str) -> rusqlite::Result<Option<String>>;

    /// Add `delta` to the target's vote counter. Returns rows touched.
    fn apply_vote_delta(&self, conn: &Connection, id: &str, delta: i64) -> rusqlite::Result<usize>;

    /// The stored vote counter, or `None` if the target does not exist.
    fn current_votes(&self, conn: &Connection, id: &str) -> rusqlite::Result<Option<i64>>;

    /// Whether votes on this target move the author's reputation.
    fn credits_author(&self) -> bool;
}

pub struct QuestionTarget;

pub struct AnswerTarget;

impl Votable for QuestionTarget {
    fn author_id(&self, conn: &Connection, id: &str) -> rusqlite::Result<Option<String>> {
        conn.query_row(
            "SELECT author_id FROM questions WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()
    }

    fn apply_vote_delta(&self, conn: &Connection, id: &str, delta: i64) -> rusqlite::Result<usize> {
        conn.execute(
            "UPDATE questions SET votes = votes + ?1 WHERE id = ?2",
            params![delta, id],
        )
    }

    fn current_votes(&self, conn: &Connection, id: &str) -> rusqlite::Result<Option<i64>> {
        conn.query_row(
            "SELECT votes FROM questions WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()
    }

    fn credits_author(&self) -> bool {
        false
    }
}

impl Votable for AnswerTarget {
    fn author_id(&self, conn: &Connection, id: &str) -> rusqlite::Result<Option<String>> {
        conn.query_row(
            "SELECT author_id FROM answers WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()
    }

    fn apply_vote_delta(&self, conn: &Connection, id: &str, delta: i64) -> rusqlite::Result<usize> {
        conn.execute(
            "UPDATE answers SET votes = votes + ?1 WHERE id = ?2",
            params![delta, id],
        )
    }

    fn current_votes(&self, conn: &Connection, id: &str) -> rusqlite::Result<Option<i64>> {
        conn.query_row(
            "SELECT votes FROM answers WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()
    }

    fn credits_author(&self) -> bool {
        true
    }
}

impl TargetKind {
    pub fn target(&self) -> &'static dyn Votable {
        match self {
            TargetKind::Question => &QuestionTarget,
            TargetKind::Answer => &AnswerTarget,
        }
    }
}
