use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Durable record that the reminder `label` was issued for an appointment.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ReminderMark {
    pub appointment_id: i64,
    pub label: String,
    pub sent_at: i64,
}

impl ReminderMark {
    /// Writes the mark unless one already exists. Returns whether this call wrote it.
    pub async fn record(
        pool: &sqlx::SqlitePool,
        appointment_id: i64,
        label: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO reminder_marks (appointment_id, label, sent_at) VALUES (?, ?, ?)"
        )
        .bind(appointment_id)
        .bind(label)
        .bind(sent_at.timestamp())
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn exists(
        pool: &sqlx::SqlitePool,
        appointment_id: i64,
        label: &str,
    ) -> Result<bool, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM reminder_marks WHERE appointment_id = ? AND label = ?"
        )
        .bind(appointment_id)
        .bind(label)
        .fetch_one(pool)
        .await?;

        Ok(count > 0)
    }

    /// Batch fetch marks for multiple appointments to avoid N+1 queries
    pub async fn find_by_appointments(
        pool: &sqlx::SqlitePool,
        appointment_ids: &[i64],
    ) -> Result<Vec<Self>, sqlx::Error> {
        if appointment_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = appointment_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let query = format!(
            "SELECT appointment_id, label, sent_at FROM reminder_marks WHERE appointment_id IN ({placeholders}) ORDER BY appointment_id, sent_at"
        );

        let mut query_builder = sqlx::query_as::<_, ReminderMark>(&query);
        for appointment_id in appointment_ids {
            query_builder = query_builder.bind(*appointment_id);
        }

        query_builder.fetch_all(pool).await
    }
}
