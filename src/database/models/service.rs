use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A bookable service. Read-only from the booking core's perspective.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Service {
    pub id: i64,
    pub provider_id: i64,
    pub name: String,
    pub duration_minutes: i64,
    pub price_cents: i64,
    pub active: bool,
}

impl Service {
    pub async fn create(
        pool: &sqlx::SqlitePool,
        provider_id: i64,
        name: &str,
        duration_minutes: i64,
        price_cents: i64,
    ) -> Result<Self, sqlx::Error> {
        let id = sqlx::query(
            "INSERT INTO services (provider_id, name, duration_minutes, price_cents, active) VALUES (?, ?, ?, ?, 1)"
        )
        .bind(provider_id)
        .bind(name)
        .bind(duration_minutes)
        .bind(price_cents)
        .execute(pool)
        .await?
        .last_insert_rowid();

        Self::find_by_id(pool, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn find_by_id(
        pool: &sqlx::SqlitePool,
        service_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Service>(
            "SELECT id, provider_id, name, duration_minutes, price_cents, active FROM services WHERE id = ?"
        )
        .bind(service_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_active(pool: &sqlx::SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Service>(
            "SELECT id, provider_id, name, duration_minutes, price_cents, active FROM services WHERE active = 1 ORDER BY id"
        )
        .fetch_all(pool)
        .await
    }

    pub async fn set_active(
        pool: &sqlx::SqlitePool,
        service_id: i64,
        active: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE services SET active = ? WHERE id = ?")
            .bind(active)
            .bind(service_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub fn display_price(&self) -> String {
        format!("{}.{:02}", self.price_cents / 100, self.price_cents % 100)
    }
}
