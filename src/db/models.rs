use rusqlite::Row;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub reputation: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub const COLUMNS: &'static str =
        "id, username, email, password_hash, reputation, created_at, updated_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            reputation: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    pub fn profile(&self) -> PublicProfile {
        PublicProfile {
            id: self.id.clone(),
            username: self.username.clone(),
            reputation: self.reputation,
            created_at: self.created_at.clone(),
        }
    }
}

/// What other users get to see.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: String,
    pub username: String,
    pub reputation: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub author_id: String,
    pub author_username: String,
    pub title: String,
    pub body: String,
    pub votes: i64,
    pub views: i64,
    pub is_answered: bool,
    pub answer_count: i64,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Question {
    /// Select list for `FROM questions q JOIN users u ON u.id = q.author_id`.
    /// Tags are loaded separately.
    pub const COLUMNS: &'static str = "q.id, q.author_id, u.username, q.title, q.body, q.votes, \
         q.views, q.is_answered, \
         (SELECT COUNT(*) FROM answers a WHERE a.question_id = q.id), \
         q.created_at, q.updated_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            author_id: row.get(1)?,
            author_username: row.get(2)?,
            title: row.get(3)?,
            body: row.get(4)?,
            votes: row.get(5)?,
            views: row.get(6)?,
            is_answered: row.get(7)?,
            answer_count: row.get(8)?,
            tags: Vec::new(),
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub id: String,
    pub question_id: String,
    pub author_id: String,
    pub author_username: String,
    pub body: String,
    pub votes: i64,
    pub is_accepted: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Answer {
    /// Select list for `FROM answers a JOIN users u ON u.id = a.author_id`.
    pub const COLUMNS: &'static str = "a.id, a.question_id, a.author_id, u.username, a.body, \
         a.votes, a.is_accepted, a.created_at, a.updated_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            question_id: row.get(1)?,
            author_id: row.get(2)?,
            author_username: row.get(3)?,
            body: row.get(4)?,
            votes: row.get(5)?,
            is_accepted: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub name: String,
    pub question_count: i64,
}
