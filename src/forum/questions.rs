use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;

use super::{ensure_owner, require_text, tags, MAX_BODY_CHARS, MAX_TITLE_CHARS};
use crate::db::{self, models::Question};
use crate::error::{AppError, AppResult};
use crate::votes::ledger::retract_target_votes;
use crate::votes::TargetKind;

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct NewQuestion {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionUpdate {
    pub title: Option<String>,
    pub body: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub tag: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ListParams {
    /// (page, per_page) after defaults and bounds checks.
    pub fn resolve(&self) -> AppResult<(u32, u32)> {
        let page = self.page.unwrap_or(1);
        let per_page = self.per_page.unwrap_or(DEFAULT_PER_PAGE);
        if page == 0 {
            return Err(AppError::BadRequest("page starts at 1".into()));
        }
        if per_page == 0 || per_page > MAX_PER_PAGE {
            return Err(AppError::BadRequest(format!(
                "perPage must be between 1 and {}",
                MAX_PER_PAGE
            )));
        }
        Ok((page, per_page))
    }
}

pub fn create_question(
    conn: &mut Connection,
    author_id: &str,
    input: &NewQuestion,
) -> AppResult<Question> {
    let title = require_text("title", &input.title, MAX_TITLE_CHARS)?;
    let body = require_text("body", &input.body, MAX_BODY_CHARS)?;
    let tag_names = tags::normalize_tags(&input.tags)?;

    let id = uuid::Uuid::now_v7().to_string();
    db::immediate(conn, |tx| {
        tx.execute(
            "INSERT INTO questions (id, author_id, title, body) VALUES (?1, ?2, ?3, ?4)",
            params![id, author_id, title, body],
        )?;
        tags::set_question_tags(tx, &id, &tag_names)
    })?;

    get_question(conn, &id)
}

pub fn get_question(conn: &Connection, id: &str) -> AppResult<Question> {
    let mut question = conn
        .query_row(
            &format!(
                "SELECT {} FROM questions q JOIN users u ON u.id = q.author_id WHERE q.id = ?1",
                Question::COLUMNS
            ),
            params![id],
            Question::from_row,
        )
        .optional()?
        .ok_or(AppError::NotFound)?;
    question.tags = tags::tags_for_question(conn, id)?;
    Ok(question)
}

/// Newest first, optionally restricted to one tag.
pub fn list_questions(conn: &Connection, list: &ListParams) -> AppResult<Vec<Question>> {
    let (page, per_page) = list.resolve()?;
    let offset = i64::from(page - 1) * i64::from(per_page);
    let tag = list.tag.as_deref().map(|t| t.trim().to_lowercase());

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM questions q
         JOIN users u ON u.id = q.author_id
         WHERE ?1 IS NULL OR q.id IN (
             SELECT qt.question_id FROM question_tags qt
             JOIN tags t ON t.id = qt.tag_id
             WHERE t.name = ?1
         )
         ORDER BY q.created_at DESC, q.rowid DESC
         LIMIT ?2 OFFSET ?3",
        Question::COLUMNS
    ))?;

    let mut questions = stmt
        .query_map(
            params![tag, i64::from(per_page), offset],
            Question::from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;

    for question in &mut questions {
        question.tags = tags::tags_for_question(conn, &question.id)?;
    }
    Ok(questions)
}

pub fn update_question(
    conn: &mut Connection,
    id: &str,
    editor_id: &str,
    update: &QuestionUpdate,
) -> AppResult<Question> {
    let title = update
        .title
        .as_deref()
        .map(|t| require_text("title", t, MAX_TITLE_CHARS))
        .transpose()?;
    let body = update
        .body
        .as_deref()
        .map(|b| require_text("body", b, MAX_BODY_CHARS))
        .transpose()?;
    let tag_names = update
        .tags
        .as_deref()
        .map(tags::normalize_tags)
        .transpose()?;

    db::immediate(conn, |tx| {
        let author_id = question_author(tx, id)?;
        ensure_owner(&author_id, editor_id)?;

        if let Some(title) = &title {
            tx.execute(
                "UPDATE questions SET title = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![title, id],
            )?;
        }
        if let Some(body) = &body {
            tx.execute(
                "UPDATE questions SET body = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![body, id],
            )?;
        }
        if let Some(tag_names) = &tag_names {
            tags::set_question_tags(tx, id, tag_names)?;
        }
        Ok::<_, AppError>(())
    })?;

    get_question(conn, id)
}

/// Delete a question with its answers, tags and every vote on them.
pub fn delete_question(conn: &mut Connection, id: &str, requester_id: &str) -> AppResult<()> {
    db::immediate(conn, |tx| {
        let author_id = question_author(tx, id)?;
        ensure_owner(&author_id, requester_id)?;

        let answer_ids: Vec<String> = {
            let mut stmt = tx.prepare("SELECT id FROM answers WHERE question_id = ?1")?;
            let ids = stmt
                .query_map(params![id], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            ids
        };
        for answer_id in &answer_ids {
            retract_target_votes(tx, TargetKind::Answer, answer_id)?;
        }
        retract_target_votes(tx, TargetKind::Question, id)?;

        // answers and question_tags cascade
        tx.execute("DELETE FROM questions WHERE id = ?1", params![id])?;
        tracing::info!(question_id = id, answers = answer_ids.len(), "question deleted");
        Ok(())
    })
}

fn question_author(conn: &Connection, id: &str) -> AppResult<String> {
    conn.query_row(
        "SELECT author_id FROM questions WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or(AppError::NotFound)
}
