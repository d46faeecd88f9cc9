//! Conversation history store.
//!
//! Sessions are opaque UUID tokens with a fixed time-to-live set at
//! creation; the window is not refreshed by appends. Messages are an
//! append-only, insertion-ordered list scoped to their session, and the
//! whole session expires atomically: reads of an expired session
//! return nothing, and expired rows are purged lazily.
//!
//! Append and read are fail-soft: storage errors degrade to a no-op or
//! an empty history with a warn-level log, so a session-store outage
//! never takes the chat flow down with it.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::warn;
use uuid::Uuid;

use crate::models::ChatMessage;

/// Session store over the relational database.
pub struct SessionStore {
    pool: SqlitePool,
    ttl_secs: i64,
}

impl SessionStore {
    pub fn new(pool: SqlitePool, ttl_secs: i64) -> Self {
        Self { pool, ttl_secs }
    }

    /// Create a new session and return its opaque id.
    ///
    /// Expired sessions are purged on the way in. Creation failures
    /// propagate, since without an id the caller has nothing to hold.
    pub async fn create_session(&self) -> Result<String> {
        let now = Utc::now().timestamp();

        // Lazy purge keeps the table bounded without a background task.
        sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;

        let session_id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO sessions (id, created_at, expires_at) VALUES (?, ?, ?)")
            .bind(&session_id)
            .bind(now)
            .bind(now + self.ttl_secs)
            .execute(&self.pool)
            .await?;

        Ok(session_id)
    }

    /// Append one message to a session's history.
    ///
    /// Appends to unknown or expired sessions are dropped with a
    /// warning; storage failures are swallowed the same way.
    pub async fn append(&self, session_id: &str, role: &str, content: &str) {
        if let Err(e) = self.try_append(session_id, role, content).await {
            warn!("failed to log {} message for session {}: {:#}", role, session_id, e);
        }
    }

    async fn try_append(&self, session_id: &str, role: &str, content: &str) -> Result<()> {
        let now = Utc::now().timestamp();

        let live: Option<(String,)> =
            sqlx::query_as("SELECT id FROM sessions WHERE id = ? AND expires_at > ?")
                .bind(session_id)
                .bind(now)
                .fetch_optional(&self.pool)
                .await?;

        if live.is_none() {
            warn!("dropping message for unknown or expired session {}", session_id);
            return Ok(());
        }

        sqlx::query(
            "INSERT INTO session_messages (session_id, role, content, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(session_id)
        .bind(role)
        .bind(content)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Ordered history for a session, oldest first. Unknown and expired
    /// sessions read as empty, as do storage failures.
    pub async fn history(&self, session_id: &str) -> Vec<ChatMessage> {
        match self.try_history(session_id).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!("failed to load history for session {}: {:#}", session_id, e);
                Vec::new()
            }
        }
    }

    async fn try_history(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        let now = Utc::now().timestamp();

        let live: Option<(String,)> =
            sqlx::query_as("SELECT id FROM sessions WHERE id = ? AND expires_at > ?")
                .bind(session_id)
                .bind(now)
                .fetch_optional(&self.pool)
                .await?;

        if live.is_none() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT role, content, created_at FROM session_messages
             WHERE session_id = ? ORDER BY id ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let created_at: i64 = row.get("created_at");
                ChatMessage {
                    role: row.get("role"),
                    content: row.get("content"),
                    timestamp: DateTime::from_timestamp(created_at, 0).unwrap_or_else(Utc::now),
                }
            })
            .collect())
    }
}
