//! Database module for Cogitatio
//!
//! Provides persistence for sessions and their message threads.

mod coalesce;
mod schema;

pub use coalesce::{plan_append, AppendPlan};
pub use schema::*;

use crate::llm::{ContentBlock, MessageRole};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Refusing to append a message with no content")]
    EmptyContent,
    #[error("Session not found: {0}")]
    SessionNotFound(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn.lock();
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Session Operations ====================

    /// Create a new session that expires after `ttl`
    pub fn create_session(&self, ttl: Duration) -> DbResult<Session> {
        let conn = self.conn.lock();
        let now = Utc::now();
        let session = Session {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: now,
            expires_at: now + ttl,
        };

        conn.execute(
            "INSERT INTO sessions (id, created_at, expires_at) VALUES (?1, ?2, ?3)",
            params![
                session.id,
                session.created_at.to_rfc3339(),
                session.expires_at.to_rfc3339()
            ],
        )?;

        Ok(session)
    }

    /// Look up a live session and push its expiry out by `ttl`
    pub fn touch_session(&self, id: &str, ttl: Duration) -> DbResult<Session> {
        let conn = self.conn.lock();
        let now = Utc::now();

        let session = conn
            .query_row(
                "SELECT id, created_at, expires_at FROM sessions WHERE id = ?1",
                params![id],
                parse_session_row,
            )
            .optional()?
            .filter(|s| !s.is_expired(now))
            .ok_or_else(|| DbError::SessionNotFound(id.to_string()))?;

        let expires_at = now + ttl;
        conn.execute(
            "UPDATE sessions SET expires_at = ?1 WHERE id = ?2",
            params![expires_at.to_rfc3339(), id],
        )?;

        Ok(Session {
            expires_at,
            ..session
        })
    }

    /// Delete a session and its thread
    pub fn destroy_session(&self, id: &str) -> DbResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM messages WHERE session_id = ?1", params![id])?;
        let deleted = tx.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        tx.commit()?;

        if deleted == 0 {
            return Err(DbError::SessionNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Remove every session that expired before `now`, with its messages.
    /// Returns the ids that were removed.
    pub fn cleanup_expired(&self, now: DateTime<Utc>) -> DbResult<Vec<String>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let cutoff = now.to_rfc3339();

        let expired: Vec<String> = {
            let mut stmt = tx.prepare("SELECT id FROM sessions WHERE expires_at <= ?1")?;
            let rows = stmt.query_map(params![cutoff], |row| row.get(0))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        for id in &expired {
            tx.execute("DELETE FROM messages WHERE session_id = ?1", params![id])?;
            tx.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        }
        let orphans = tx.execute(
            "DELETE FROM messages WHERE session_id NOT IN (SELECT id FROM sessions)",
            [],
        )?;
        tx.commit()?;

        if orphans > 0 {
            tracing::warn!(messages = orphans, "Removed messages with no session");
        }

        Ok(expired)
    }

    // ==================== Message Operations ====================

    /// Append blocks to a session's thread, coalescing consecutive free text
    /// into the trailing user message.
    pub fn append_message(
        &self,
        session_id: &str,
        role: MessageRole,
        blocks: &[ContentBlock],
    ) -> DbResult<Message> {
        if blocks.is_empty() {
            return Err(DbError::EmptyContent);
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let live: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM sessions WHERE id = ?1)",
            params![session_id],
            |row| row.get(0),
        )?;
        if !live {
            return Err(DbError::SessionNotFound(session_id.to_string()));
        }

        let trailing = tx
            .query_row(
                "SELECT message_id, session_id, sequence_id, role, content, created_at
                 FROM messages WHERE session_id = ?1 ORDER BY sequence_id DESC LIMIT 1",
                params![session_id],
                parse_message_row,
            )
            .optional()?;

        let message = match plan_append(trailing.as_ref(), role, blocks) {
            AppendPlan::Merge {
                message_id,
                content,
            } => {
                tx.execute(
                    "UPDATE messages SET content = ?1 WHERE message_id = ?2",
                    params![serde_json::to_string(&content)?, message_id],
                )?;
                let Some(last) = trailing else {
                    return Err(DbError::SessionNotFound(session_id.to_string()));
                };
                Message { content, ..last }
            }
            AppendPlan::Insert => {
                let sequence_id: i64 = tx.query_row(
                    "SELECT COALESCE(MAX(sequence_id), 0) + 1 FROM messages WHERE session_id = ?1",
                    params![session_id],
                    |row| row.get(0),
                )?;
                let message = Message {
                    message_id: uuid::Uuid::new_v4().to_string(),
                    session_id: session_id.to_string(),
                    sequence_id,
                    role,
                    content: blocks.to_vec(),
                    created_at: Utc::now(),
                };
                tx.execute(
                    "INSERT INTO messages (message_id, session_id, sequence_id, role, content, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        message.message_id,
                        message.session_id,
                        message.sequence_id,
                        message.role.as_str(),
                        serde_json::to_string(&message.content)?,
                        message.created_at.to_rfc3339(),
                    ],
                )?;
                message
            }
        };

        tx.commit()?;
        Ok(message)
    }

    /// Get the full thread for a session, ascending by sequence
    pub fn get_messages(&self, session_id: &str) -> DbResult<Vec<Message>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT message_id, session_id, sequence_id, role, content, created_at
             FROM messages WHERE session_id = ?1 ORDER BY sequence_id ASC",
        )?;

        let rows = stmt.query_map(params![session_id], parse_message_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }
}

/// Parse a message row from the database
fn parse_message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let role_str: String = row.get(3)?;
    let role = MessageRole::parse(&role_str)
        .ok_or_else(|| rusqlite::Error::InvalidColumnType(3, "role".to_string(), Type::Text))?;

    let content_str: String = row.get(4)?;
    let content: Vec<ContentBlock> = serde_json::from_str(&content_str)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

    Ok(Message {
        message_id: row.get(0)?,
        session_id: row.get(1)?,
        sequence_id: row.get(2)?,
        role,
        content,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

fn parse_session_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        created_at: parse_datetime(&row.get::<_, String>(1)?),
        expires_at: parse_datetime(&row.get::<_, String>(2)?),
    })
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
