//! Storage seam for the booking core.
//!
//! Every state change is a single conditional statement: the slot guard on
//! insert and the expected-status guard on updates run inside the same write,
//! so concurrent callers in different processes cannot both win.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::booking::conflict::Interval;
use crate::database::models::{
    Appointment, AppointmentRow, AppointmentStatus, CompletionResponse, CompletionStage,
    NewAppointment, ReminderMark, Service, APPOINTMENT_COLUMNS,
};
use crate::utils::datetime::from_unix;
use crate::utils::logging::log_database_operation;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Result of [`AppointmentStore::insert_if_slot_free`].
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    Inserted(Appointment),
    /// An active appointment already overlaps the candidate's interval.
    Conflict,
}

/// Fields written together with a status change.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub to: AppointmentStatus,
    pub actor_id: Option<i64>,
    pub at: DateTime<Utc>,
    pub note: Option<String>,
}

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Appointments of `provider_id` in one of `statuses` overlapping `range`, by start time.
    async fn provider_appointments(
        &self,
        provider_id: i64,
        range: Interval,
        statuses: &[AppointmentStatus],
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Inserts the candidate only if no active appointment of the same provider overlaps it.
    async fn insert_if_slot_free(&self, candidate: &NewAppointment) -> Result<InsertOutcome, StoreError>;

    /// Compare-and-swap on the status column. Returns the number of rows changed (0 or 1).
    async fn conditional_update_status(
        &self,
        appointment_id: Uuid,
        expected: AppointmentStatus,
        change: &StatusChange,
    ) -> Result<u64, StoreError>;

    async fn find_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError>;

    /// A client's appointments, newest first.
    async fn client_appointments(&self, client_id: i64) -> Result<Vec<Appointment>, StoreError>;

    async fn appointments_with_status(
        &self,
        statuses: &[AppointmentStatus],
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Appointments in `statuses` whose start lies in `[from, to]`.
    async fn appointments_starting_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        statuses: &[AppointmentStatus],
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Confirmed or in-progress appointments that ended before `now` and have no completion stage yet.
    async fn appointments_awaiting_completion(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Writes `reminder_sent[label]` once. Returns false if it was already set.
    async fn mark_reminder_sent(
        &self,
        appointment_id: i64,
        label: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Completion stage `NULL -> awaiting_confirmation`.
    async fn begin_completion(&self, appointment_id: Uuid, at: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Records the client's answer while awaiting confirmation and no answer was given yet.
    async fn record_completion_response(
        &self,
        appointment_id: Uuid,
        response: CompletionResponse,
        at: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    /// Stores the proof and completes the appointment in one write.
    async fn record_completion_proof(
        &self,
        appointment_id: Uuid,
        proof_ref: &str,
        at: DateTime<Utc>,
    ) -> Result<u64, StoreError>;
}

/// Read-only service lookups.
#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    async fn find_service(&self, service_id: i64) -> Result<Option<Service>, StoreError>;
    async fn list_services(&self) -> Result<Vec<Service>, StoreError>;
}

/// SQLite-backed store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(",")
}

fn active_status_literals() -> String {
    AppointmentStatus::ACTIVE
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(",")
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            db.code().as_deref() == Some("2067") || db.message().contains("UNIQUE constraint failed")
        }
        _ => false,
    }
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Converts rows and attaches their reminder marks.
    async fn hydrate(&self, rows: Vec<AppointmentRow>) -> Result<Vec<Appointment>, StoreError> {
        let mut appointments = rows
            .into_iter()
            .map(Appointment::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let ids: Vec<i64> = appointments.iter().map(|a| a.id).collect();
        let marks = ReminderMark::find_by_appointments(&self.pool, &ids).await?;
        for mark in marks {
            let sent_at = from_unix(mark.sent_at)
                .ok_or_else(|| StoreError::Corrupt(format!("bad reminder timestamp {}", mark.sent_at)))?;
            if let Some(appointment) = appointments.iter_mut().find(|a| a.id == mark.appointment_id) {
                appointment.reminder_sent.insert(mark.label, sent_at);
            }
        }

        Ok(appointments)
    }

    async fn fetch_where(
        &self,
        clause: &str,
        statuses: &[AppointmentStatus],
        leading_binds: &[i64],
        order: &str,
    ) -> Result<Vec<Appointment>, StoreError> {
        let status_clause = if statuses.is_empty() {
            String::new()
        } else {
            format!(" AND status IN ({})", placeholders(statuses.len()))
        };
        let query = format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE {clause}{status_clause} ORDER BY {order}"
        );

        let mut query_builder = sqlx::query_as::<_, AppointmentRow>(&query);
        for value in leading_binds {
            query_builder = query_builder.bind(*value);
        }
        for status in statuses {
            query_builder = query_builder.bind(status.as_str());
        }

        let rows = query_builder.fetch_all(&self.pool).await?;
        self.hydrate(rows).await
    }

    /// Appointment counts per status, for health reporting.
    pub async fn status_counts(&self) -> Result<Vec<(AppointmentStatus, i64)>, StoreError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM appointments GROUP BY status ORDER BY status"
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(status, count)| Ok((status.parse()?, count)))
            .collect()
    }
}

#[async_trait]
impl AppointmentStore for SqliteStore {
    async fn provider_appointments(
        &self,
        provider_id: i64,
        range: Interval,
        statuses: &[AppointmentStatus],
    ) -> Result<Vec<Appointment>, StoreError> {
        // Same half-open rule as ConflictDetector::overlaps.
        self.fetch_where(
            "provider_id = ? AND starts_at < ? AND ends_at > ?",
            statuses,
            &[provider_id, range.end.timestamp(), range.start.timestamp()],
            "starts_at",
        )
        .await
    }

    async fn insert_if_slot_free(&self, candidate: &NewAppointment) -> Result<InsertOutcome, StoreError> {
        let interval = candidate.interval();
        let now = candidate.created_at.timestamp();
        // Guard and insert are one statement, so they run under a single write lock.
        let query = format!(
            r#"
            INSERT INTO appointments (
                public_id, client_id, provider_id, service_id, starts_at, ends_at,
                duration_minutes, status, price_cents, created_at, updated_at
            )
            SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
            WHERE NOT EXISTS (
                SELECT 1 FROM appointments
                WHERE provider_id = ?
                  AND status IN ({})
                  AND starts_at < ?
                  AND ends_at > ?
            )
            "#,
            active_status_literals()
        );

        let result = sqlx::query(&query)
            .bind(candidate.public_id.to_string())
            .bind(candidate.client_id)
            .bind(candidate.provider_id)
            .bind(candidate.service_id)
            .bind(interval.start.timestamp())
            .bind(interval.end.timestamp())
            .bind(candidate.duration_minutes)
            .bind(candidate.status.as_str())
            .bind(candidate.price_cents)
            .bind(now)
            .bind(now)
            .bind(candidate.provider_id)
            .bind(interval.end.timestamp())
            .bind(interval.start.timestamp())
            .execute(&self.pool)
            .await;

        let affected = match result {
            Ok(result) => result.rows_affected(),
            Err(e) if is_unique_violation(&e) => 0,
            Err(e) => return Err(e.into()),
        };

        if affected == 0 {
            log_database_operation("INSERT", "appointments", Some("slot guard rejected candidate"));
            return Ok(InsertOutcome::Conflict);
        }

        let inserted = self
            .find_appointment(candidate.public_id)
            .await?
            .ok_or_else(|| StoreError::Corrupt(format!("inserted appointment {} vanished", candidate.public_id)))?;
        Ok(InsertOutcome::Inserted(inserted))
    }

    async fn conditional_update_status(
        &self,
        appointment_id: Uuid,
        expected: AppointmentStatus,
        change: &StatusChange,
    ) -> Result<u64, StoreError> {
        let decision = expected == AppointmentStatus::PendingApproval
            && matches!(change.to, AppointmentStatus::Confirmed | AppointmentStatus::Rejected);

        let extra = if change.to == AppointmentStatus::Cancelled {
            ", cancelled_at = ?, cancelled_by = ?, cancellation_reason = ?"
        } else if decision {
            ", decided_at = ?, decided_by = ?, decision_note = ?"
        } else {
            ""
        };
        let query = format!(
            "UPDATE appointments SET status = ?, updated_at = ?{extra} WHERE public_id = ? AND status = ?"
        );

        let mut query_builder = sqlx::query(&query)
            .bind(change.to.as_str())
            .bind(change.at.timestamp());
        if !extra.is_empty() {
            query_builder = query_builder
                .bind(change.at.timestamp())
                .bind(change.actor_id)
                .bind(change.note.clone());
        }

        let result = query_builder
            .bind(appointment_id.to_string())
            .bind(expected.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn find_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let query = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE public_id = ?");
        let row = sqlx::query_as::<_, AppointmentRow>(&query)
            .bind(appointment_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn client_appointments(&self, client_id: i64) -> Result<Vec<Appointment>, StoreError> {
        self.fetch_where("client_id = ?", &[], &[client_id], "starts_at DESC")
            .await
    }

    async fn appointments_with_status(
        &self,
        statuses: &[AppointmentStatus],
    ) -> Result<Vec<Appointment>, StoreError> {
        self.fetch_where("1 = 1", statuses, &[], "starts_at").await
    }

    async fn appointments_starting_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        statuses: &[AppointmentStatus],
    ) -> Result<Vec<Appointment>, StoreError> {
        self.fetch_where(
            "starts_at >= ? AND starts_at <= ?",
            statuses,
            &[from.timestamp(), to.timestamp()],
            "starts_at",
        )
        .await
    }

    async fn appointments_awaiting_completion(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.fetch_where(
            "ends_at < ? AND completion_stage IS NULL",
            &[AppointmentStatus::Confirmed, AppointmentStatus::InProgress],
            &[now.timestamp()],
            "ends_at",
        )
        .await
    }

    async fn mark_reminder_sent(
        &self,
        appointment_id: i64,
        label: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(ReminderMark::record(&self.pool, appointment_id, label, at).await?)
    }

    async fn begin_completion(&self, appointment_id: Uuid, at: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE appointments
            SET completion_stage = ?, updated_at = ?
            WHERE public_id = ?
              AND completion_stage IS NULL
              AND status IN ('confirmed', 'in_progress')
            "#
        )
        .bind(CompletionStage::AwaitingConfirmation.as_str())
        .bind(at.timestamp())
        .bind(appointment_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn record_completion_response(
        &self,
        appointment_id: Uuid,
        response: CompletionResponse,
        at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let confirmed = response == CompletionResponse::Yes;
        let next_stage = if confirmed {
            CompletionStage::AwaitingProof
        } else {
            CompletionStage::AwaitingConfirmation
        };

        let result = sqlx::query(
            r#"
            UPDATE appointments
            SET user_completion_response = ?,
                user_confirmed_completion = ?,
                awaiting_proof = ?,
                completion_stage = ?,
                updated_at = ?
            WHERE public_id = ?
              AND completion_stage = ?
              AND user_completion_response IS NULL
              AND status IN ('confirmed', 'in_progress')
            "#
        )
        .bind(response.as_str())
        .bind(confirmed)
        .bind(confirmed)
        .bind(next_stage.as_str())
        .bind(at.timestamp())
        .bind(appointment_id.to_string())
        .bind(CompletionStage::AwaitingConfirmation.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn record_completion_proof(
        &self,
        appointment_id: Uuid,
        proof_ref: &str,
        at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE appointments
            SET completion_proof_ref = ?,
                completion_proof_uploaded_at = ?,
                awaiting_proof = 0,
                completion_stage = ?,
                status = ?,
                updated_at = ?
            WHERE public_id = ?
              AND completion_stage = ?
              AND awaiting_proof = 1
              AND status IN ('confirmed', 'in_progress')
            "#
        )
        .bind(proof_ref)
        .bind(at.timestamp())
        .bind(CompletionStage::ProofReceived.as_str())
        .bind(AppointmentStatus::Completed.as_str())
        .bind(at.timestamp())
        .bind(appointment_id.to_string())
        .bind(CompletionStage::AwaitingProof.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ServiceCatalog for SqliteStore {
    async fn find_service(&self, service_id: i64) -> Result<Option<Service>, StoreError> {
        Ok(Service::find_by_id(&self.pool, service_id).await?)
    }

    async fn list_services(&self) -> Result<Vec<Service>, StoreError> {
        Ok(Service::list_active(&self.pool).await?)
    }
}
