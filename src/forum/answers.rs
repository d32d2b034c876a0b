use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;

use super::{ensure_owner, require_text, MAX_BODY_CHARS};
use crate::db::{self, models::Answer};
use crate::error::{AppError, AppResult};
use crate::votes::ledger::retract_target_votes;
use crate::votes::TargetKind;

#[derive(Debug, Clone, Deserialize)]
pub struct AnswerBody {
    pub body: String,
}

pub fn create_answer(
    conn: &Connection,
    question_id: &str,
    author_id: &str,
    input: &AnswerBody,
) -> AppResult<Answer> {
    let body = require_text("body", &input.body, MAX_BODY_CHARS)?;
    ensure_question_exists(conn, question_id)?;

    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO answers (id, question_id, author_id, body) VALUES (?1, ?2, ?3, ?4)",
        params![id, question_id, author_id, body],
    )?;
    get_answer(conn, &id)
}

pub fn get_answer(conn: &Connection, id: &str) -> AppResult<Answer> {
    conn.query_row(
        &format!(
            "SELECT {} FROM answers a JOIN users u ON u.id = a.author_id WHERE a.id = ?1",
            Answer::COLUMNS
        ),
        params![id],
        Answer::from_row,
    )
    .optional()?
    .ok_or(AppError::NotFound)
}

/// Accepted answer first, then highest voted, then oldest.
pub fn list_answers(conn: &Connection, question_id: &str) -> AppResult<Vec<Answer>> {
    ensure_question_exists(conn, question_id)?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM answers a
         JOIN users u ON u.id = a.author_id
         WHERE a.question_id = ?1
         ORDER BY a.is_accepted DESC, a.votes DESC, a.created_at ASC, a.rowid ASC",
        Answer::COLUMNS
    ))?;
    let answers = stmt
        .query_map(params![question_id], Answer::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(answers)
}

pub fn update_answer(
    conn: &mut Connection,
    id: &str,
    editor_id: &str,
    input: &AnswerBody,
) -> AppResult<Answer> {
    let body = require_text("body", &input.body, MAX_BODY_CHARS)?;
    db::immediate(conn, |tx| {
        let author_id: String = tx
            .query_row(
                "SELECT author_id FROM answers WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(AppError::NotFound)?;
        ensure_owner(&author_id, editor_id)?;

        tx.execute(
            "UPDATE answers SET body = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![body, id],
        )?;
        Ok::<_, AppError>(())
    })?;
    get_answer(conn, id)
}

/// Delete an answer, its votes and the reputation they earned. Deleting the
/// accepted answer leaves its question unanswered.
pub fn delete_answer(conn: &mut Connection, id: &str, requester_id: &str) -> AppResult<()> {
    db::immediate(conn, |tx| {
        let (question_id, author_id, accepted): (String, String, bool) = tx
            .query_row(
                "SELECT question_id, author_id, is_accepted FROM answers WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?
            .ok_or(AppError::NotFound)?;
        ensure_owner(&author_id, requester_id)?;

        let retracted = retract_target_votes(tx, TargetKind::Answer, id)?;
        tx.execute("DELETE FROM answers WHERE id = ?1", params![id])?;
        if accepted {
            tx.execute(
                "UPDATE questions SET is_answered = 0 WHERE id = ?1",
                params![question_id],
            )?;
        }

        tracing::info!(answer_id = id, retracted, "answer deleted");
        Ok(())
    })
}

fn ensure_question_exists(conn: &Connection, question_id: &str) -> AppResult<()> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM questions WHERE id = ?1",
        params![question_id],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(AppError::NotFound);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forum::{questions, users};
    use crate::votes::{ledger, VoteValue};

    struct Seed {
        pool: crate::state::DbPool,
        _tmp: tempfile::TempDir,
        asker: String,
        alice: String,
        bob: String,
        question: String,
    }

    fn seed() -> Seed {
        let tmp = tempfile::tempdir().unwrap();
        let pool = db::create_pool(&tmp.path().join("test.db"), 2).unwrap();
        db::run_migrations(&pool).unwrap();
        let mut conn = pool.get().unwrap();
        let asker = users::create_user(&conn, "asker", "q@example.com", "h").unwrap().id;
        let alice = users::create_user(&conn, "alice", "a@example.com", "h").unwrap().id;
        let bob = users::create_user(&conn, "bob", "b@example.com", "h").unwrap().id;
        let question = questions::create_question(
            &mut conn,
            &asker,
            &questions::NewQuestion {
                title: "Why?".into(),
                body: "Because.".into(),
                tags: vec![],
            },
        )
        .unwrap()
        .id;
        drop(conn);
        Seed {
            pool,
            _tmp: tmp,
            asker,
            alice,
            bob,
            question,
        }
    }

    fn body(text: &str) -> AnswerBody {
        AnswerBody {
            body: text.to_string(),
        }
    }

    fn reputation(conn: &Connection, user: &str) -> i64 {
        conn.query_row(
            "SELECT reputation FROM users WHERE id = ?1",
            params![user],
            |r| r.get(0),
        )
        .unwrap()
    }

    #[test]
    fn answering_a_missing_question_is_not_found() {
        let s = seed();
        let conn = s.pool.get().unwrap();
        let err = create_answer(&conn, "missing", &s.alice, &body("hi")).unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[test]
    fn answers_are_listed_accepted_first_then_by_votes() {
        let s = seed();
        let mut conn = s.pool.get().unwrap();
        let first = create_answer(&conn, &s.question, &s.alice, &body("first")).unwrap();
        let second = create_answer(&conn, &s.question, &s.bob, &body("second")).unwrap();
        let third = create_answer(&conn, &s.question, &s.alice, &body("third")).unwrap();

        ledger::cast_vote(&mut conn, &s.asker, TargetKind::Answer, &third.id, VoteValue::Up)
            .unwrap();
        ledger::accept_answer(&mut conn, &second.id, &s.asker).unwrap();

        let listed: Vec<String> = list_answers(&conn, &s.question)
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(listed, vec![second.id, third.id, first.id]);
    }

    #[test]
    fn only_author_may_edit() {
        let s = seed();
        let mut conn = s.pool.get().unwrap();
        let answer = create_answer(&conn, &s.question, &s.alice, &body("draft")).unwrap();

        let err = update_answer(&mut conn, &answer.id, &s.bob, &body("hijack")).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(get_answer(&conn, &answer.id).unwrap().body, "draft");

        let edited = update_answer(&mut conn, &answer.id, &s.alice, &body("final")).unwrap();
        assert_eq!(edited.body, "final");

        let err = update_answer(&mut conn, "missing", &s.alice, &body("x")).unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[test]
    fn deleting_accepted_answer_restores_reputation_and_unanswers() {
        let s = seed();
        let mut conn = s.pool.get().unwrap();
        let answer = create_answer(&conn, &s.question, &s.alice, &body("answer")).unwrap();

        ledger::cast_vote(&mut conn, &s.asker, TargetKind::Answer, &answer.id, VoteValue::Up)
            .unwrap();
        ledger::cast_vote(&mut conn, &s.bob, TargetKind::Answer, &answer.id, VoteValue::Up)
            .unwrap();
        ledger::accept_answer(&mut conn, &answer.id, &s.asker).unwrap();
        assert_eq!(reputation(&conn, &s.alice), 2);

        assert!(matches!(
            delete_answer(&mut conn, &answer.id, &s.bob),
            Err(AppError::Forbidden(_))
        ));
        delete_answer(&mut conn, &answer.id, &s.alice).unwrap();

        assert_eq!(reputation(&conn, &s.alice), 0);
        let question = questions::get_question(&conn, &s.question).unwrap();
        assert!(!question.is_answered);
        assert_eq!(question.answer_count, 0);
        let votes: i64 = conn
            .query_row("SELECT COUNT(*) FROM votes", [], |r| r.get(0))
            .unwrap();
        assert_eq!(votes, 0);
    }

    #[test]
    fn deleting_question_retracts_answer_reputation() {
        let s = seed();
        let mut conn = s.pool.get().unwrap();
        let answer = create_answer(&conn, &s.question, &s.alice, &body("answer")).unwrap();
        ledger::cast_vote(&mut conn, &s.bob, TargetKind::Answer, &answer.id, VoteValue::Up)
            .unwrap();
        assert_eq!(reputation(&conn, &s.alice), 1);

        questions::delete_question(&mut conn, &s.question, &s.asker).unwrap();
        assert_eq!(reputation(&conn, &s.alice), 0);
        assert!(matches!(get_answer(&conn, &answer.id), Err(AppError::NotFound)));
    }
}
