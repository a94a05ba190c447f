use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::store::StoreError;
use crate::utils::datetime::from_unix;

/// Multi-step booking progress for one chat actor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookingDraft {
    pub service_id: Option<i64>,
    pub date: Option<NaiveDate>,
}

/// Conversation state persisted between updates, keyed by actor id.
///
/// Sessions are loaded and saved explicitly at the bot boundary and expire after
/// their TTL; an expired session is indistinguishable from a missing one.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSession {
    pub actor_id: i64,
    pub draft: BookingDraft,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct ChatSessionRow {
    actor_id: i64,
    state: String,
    expires_at: i64,
}

impl ChatSession {
    pub fn new(actor_id: i64, draft: BookingDraft, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            actor_id,
            draft,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Loads the live session for `actor_id`, deleting it if it has expired.
    pub async fn load(
        pool: &sqlx::SqlitePool,
        actor_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, StoreError> {
        let row = sqlx::query_as::<_, ChatSessionRow>(
            "SELECT actor_id, state, expires_at FROM chat_sessions WHERE actor_id = ?"
        )
        .bind(actor_id)
        .fetch_optional(pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let expires_at = from_unix(row.expires_at)
            .ok_or_else(|| StoreError::Corrupt(format!("bad session expiry for {}", row.actor_id)))?;
        if expires_at <= now {
            Self::clear(pool, actor_id).await?;
            return Ok(None);
        }

        let draft = serde_json::from_str(&row.state)
            .map_err(|e| StoreError::Corrupt(format!("bad session state for {}: {}", row.actor_id, e)))?;

        Ok(Some(Self {
            actor_id: row.actor_id,
            draft,
            expires_at,
        }))
    }

    /// Upserts the session; the TTL restarts from `now`.
    pub async fn save(
        &mut self,
        pool: &sqlx::SqlitePool,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.expires_at = now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
        let state = serde_json::to_string(&self.draft)
            .map_err(|e| StoreError::Corrupt(format!("cannot encode session state: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO chat_sessions (actor_id, state, expires_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (actor_id) DO UPDATE SET
                state = excluded.state,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at
            "#
        )
        .bind(self.actor_id)
        .bind(state)
        .bind(self.expires_at.timestamp())
        .bind(now.timestamp())
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn clear(pool: &sqlx::SqlitePool, actor_id: i64) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM chat_sessions WHERE actor_id = ?")
            .bind(actor_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Deletes every session that expired at or before `now`.
    pub async fn purge_expired(
        pool: &sqlx::SqlitePool,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM chat_sessions WHERE expires_at <= ?")
            .bind(now.timestamp())
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
