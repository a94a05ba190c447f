use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::booking::conflict::Interval;
use crate::database::store::StoreError;
use crate::utils::datetime::from_unix;

/// Lifecycle status of an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    PendingApproval,
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    Rejected,
    NoShow,
}

impl AppointmentStatus {
    /// Statuses that occupy a provider's calendar.
    pub const ACTIVE: [AppointmentStatus; 4] = [
        AppointmentStatus::PendingApproval,
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::InProgress,
    ];

    pub const ALL: [AppointmentStatus; 8] = [
        AppointmentStatus::PendingApproval,
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::InProgress,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::Rejected,
        AppointmentStatus::NoShow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::PendingApproval => "pending_approval",
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::InProgress => "in_progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Rejected => "rejected",
            AppointmentStatus::NoShow => "no_show",
        }
    }

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed
                | AppointmentStatus::Cancelled
                | AppointmentStatus::Rejected
                | AppointmentStatus::NoShow
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown appointment status '{s}'")))
    }
}

/// Step of the post-appointment completion sub-flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStage {
    AwaitingConfirmation,
    AwaitingProof,
    ProofReceived,
}

impl CompletionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionStage::AwaitingConfirmation => "awaiting_confirmation",
            CompletionStage::AwaitingProof => "awaiting_proof",
            CompletionStage::ProofReceived => "proof_received",
        }
    }
}

impl FromStr for CompletionStage {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "awaiting_confirmation" => Ok(CompletionStage::AwaitingConfirmation),
            "awaiting_proof" => Ok(CompletionStage::AwaitingProof),
            "proof_received" => Ok(CompletionStage::ProofReceived),
            other => Err(StoreError::Corrupt(format!("unknown completion stage '{other}'"))),
        }
    }
}

/// The client's answer to "did your appointment take place?".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionResponse {
    Yes,
    No,
}

impl CompletionResponse {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionResponse::Yes => "yes",
            CompletionResponse::No => "no",
        }
    }
}

impl FromStr for CompletionResponse {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yes" => Ok(CompletionResponse::Yes),
            "no" => Ok(CompletionResponse::No),
            other => Err(StoreError::Corrupt(format!("unknown completion response '{other}'"))),
        }
    }
}

/// Completion bookkeeping layered on top of the main status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionState {
    pub stage: Option<CompletionStage>,
    pub user_confirmed_completion: bool,
    pub user_completion_response: Option<CompletionResponse>,
    pub awaiting_proof: bool,
    pub completion_proof_ref: Option<String>,
    pub completion_proof_uploaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub public_id: Uuid,
    pub client_id: i64,
    pub provider_id: i64,
    pub service_id: i64,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub status: AppointmentStatus,
    pub price_cents: i64,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<i64>,
    pub decided_by: Option<i64>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decision_note: Option<String>,
    /// Reminder label -> when it was sent. Each label is written at most once.
    pub reminder_sent: BTreeMap<String, DateTime<Utc>>,
    pub completion: CompletionState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Start plus duration, clamped to the latest representable instant.
    pub fn end_time(&self) -> DateTime<Utc> {
        end_of(self.start_time, self.duration_minutes)
    }

    pub fn interval(&self) -> Interval {
        Interval::new(self.start_time, self.end_time())
    }
}

fn end_of(start: DateTime<Utc>, duration_minutes: i64) -> DateTime<Utc> {
    Duration::try_minutes(duration_minutes)
        .and_then(|duration| start.checked_add_signed(duration))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Raw `appointments` row; instants are unix seconds.
#[derive(Debug, Clone, FromRow)]
pub struct AppointmentRow {
    pub id: i64,
    pub public_id: String,
    pub client_id: i64,
    pub provider_id: i64,
    pub service_id: i64,
    pub starts_at: i64,
    pub ends_at: i64,
    pub duration_minutes: i64,
    pub status: String,
    pub price_cents: i64,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<i64>,
    pub cancelled_by: Option<i64>,
    pub decided_by: Option<i64>,
    pub decided_at: Option<i64>,
    pub decision_note: Option<String>,
    pub completion_stage: Option<String>,
    pub user_confirmed_completion: bool,
    pub user_completion_response: Option<String>,
    pub awaiting_proof: bool,
    pub completion_proof_ref: Option<String>,
    pub completion_proof_uploaded_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Column list matching [`AppointmentRow`].
pub const APPOINTMENT_COLUMNS: &str = "id, public_id, client_id, provider_id, service_id, \
    starts_at, ends_at, duration_minutes, status, price_cents, cancellation_reason, \
    cancelled_at, cancelled_by, decided_by, decided_at, decision_note, completion_stage, \
    user_confirmed_completion, user_completion_response, awaiting_proof, \
    completion_proof_ref, completion_proof_uploaded_at, created_at, updated_at";

fn instant(secs: i64) -> Result<DateTime<Utc>, StoreError> {
    from_unix(secs).ok_or_else(|| StoreError::Corrupt(format!("timestamp out of range: {secs}")))
}

fn optional_instant(secs: Option<i64>) -> Result<Option<DateTime<Utc>>, StoreError> {
    secs.map(instant).transpose()
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = StoreError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        if row.duration_minutes <= 0 {
            return Err(StoreError::Corrupt(format!(
                "appointment {} has non-positive duration",
                row.public_id
            )));
        }
        let start_time = instant(row.starts_at)?;
        if Duration::try_minutes(row.duration_minutes)
            .and_then(|duration| start_time.checked_add_signed(duration))
            .is_none()
        {
            return Err(StoreError::Corrupt(format!(
                "appointment {} ends out of range",
                row.public_id
            )));
        }

        let public_id = Uuid::parse_str(&row.public_id)
            .map_err(|e| StoreError::Corrupt(format!("bad public id '{}': {}", row.public_id, e)))?;

        Ok(Appointment {
            id: row.id,
            public_id,
            client_id: row.client_id,
            provider_id: row.provider_id,
            service_id: row.service_id,
            start_time,
            duration_minutes: row.duration_minutes,
            status: row.status.parse()?,
            price_cents: row.price_cents,
            cancellation_reason: row.cancellation_reason,
            cancelled_at: optional_instant(row.cancelled_at)?,
            cancelled_by: row.cancelled_by,
            decided_by: row.decided_by,
            decided_at: optional_instant(row.decided_at)?,
            decision_note: row.decision_note,
            reminder_sent: BTreeMap::new(),
            completion: CompletionState {
                stage: row.completion_stage.as_deref().map(str::parse).transpose()?,
                user_confirmed_completion: row.user_confirmed_completion,
                user_completion_response: row
                    .user_completion_response
                    .as_deref()
                    .map(str::parse)
                    .transpose()?,
                awaiting_proof: row.awaiting_proof,
                completion_proof_ref: row.completion_proof_ref,
                completion_proof_uploaded_at: optional_instant(row.completion_proof_uploaded_at)?,
            },
            created_at: instant(row.created_at)?,
            updated_at: instant(row.updated_at)?,
        })
    }
}

/// A validated appointment about to be inserted.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub public_id: Uuid,
    pub client_id: i64,
    pub provider_id: i64,
    pub service_id: i64,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub status: AppointmentStatus,
    pub price_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl NewAppointment {
    pub fn interval(&self) -> Interval {
        Interval::new(self.start_time, end_of(self.start_time, self.duration_minutes))
    }
}
