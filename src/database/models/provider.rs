use chrono::{FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Provider {
    pub id: i64,
    pub name: String,
    pub utc_offset_minutes: i64,
    pub created_at: i64,
}

impl Provider {
    /// The provider's reference timezone.
    pub fn offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(i32::try_from(self.utc_offset_minutes * 60).ok()?)
    }

    pub async fn create(
        pool: &sqlx::SqlitePool,
        name: &str,
        utc_offset_minutes: i64,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now().timestamp();
        let id = sqlx::query(
            "INSERT INTO providers (name, utc_offset_minutes, created_at) VALUES (?, ?, ?)"
        )
        .bind(name)
        .bind(utc_offset_minutes)
        .bind(now)
        .execute(pool)
        .await?
        .last_insert_rowid();

        Self::find_by_id(pool, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn find_by_id(
        pool: &sqlx::SqlitePool,
        provider_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Provider>(
            "SELECT id, name, utc_offset_minutes, created_at FROM providers WHERE id = ?"
        )
        .bind(provider_id)
        .fetch_optional(pool)
        .await
    }
}
