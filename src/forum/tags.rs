use rusqlite::{params, Connection};

use crate::db::models::Tag;
use crate::error::{AppError, AppResult};

pub const MAX_TAGS_PER_QUESTION: usize = 5;
pub const MAX_TAG_CHARS: usize = 35;

/// Lowercase, trim and de-duplicate tags, keeping first-seen order.
pub fn normalize_tags(raw: &[String]) -> AppResult<Vec<String>> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() || tags.contains(&tag) {
            continue;
        }
        if tag.chars().count() > MAX_TAG_CHARS {
            return Err(AppError::BadRequest(format!(
                "Tag '{}' is longer than {} characters",
                tag, MAX_TAG_CHARS
            )));
        }
        if !tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '#' | '.' | '-'))
        {
            return Err(AppError::BadRequest(format!(
                "Tag '{}' contains invalid characters",
                tag
            )));
        }
        tags.push(tag);
    }

    if tags.len() > MAX_TAGS_PER_QUESTION {
        return Err(AppError::BadRequest(format!(
            "A question can have at most {} tags",
            MAX_TAGS_PER_QUESTION
        )));
    }
    Ok(tags)
}

/// Replace a question's tags. Tags are created on first use.
pub fn set_question_tags(conn: &Connection, question_id: &str, tags: &[String]) -> AppResult<()> {
    conn.execute(
        "DELETE FROM question_tags WHERE question_id = ?1",
        params![question_id],
    )?;
    for tag in tags {
        conn.execute("INSERT OR IGNORE INTO tags (name) VALUES (?1)", params![tag])?;
        conn.execute(
            "INSERT INTO question_tags (question_id, tag_id)
             SELECT ?1, id FROM tags WHERE name = ?2",
            params![question_id, tag],
        )?;
    }
    Ok(())
}

pub fn tags_for_question(conn: &Connection, question_id: &str) -> AppResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT t.name FROM question_tags qt
         JOIN tags t ON t.id = qt.tag_id
         WHERE qt.question_id = ?1
         ORDER BY t.name",
    )?;
    let tags = stmt
        .query_map(params![question_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(tags)
}

/// All tags in use, most used first.
pub fn list_tags(conn: &Connection) -> AppResult<Vec<Tag>> {
    let mut stmt = conn.prepare(
        "SELECT t.name, COUNT(qt.question_id) AS question_count
         FROM tags t
         JOIN question_tags qt ON qt.tag_id = t.id
         GROUP BY t.id
         ORDER BY question_count DESC, t.name ASC",
    )?;
    let tags = stmt
        .query_map([], |row| {
            Ok(Tag {
                name: row.get(0)?,
                question_count: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tags)
}
