//! Inline-button payloads.
//!
//! Telegram limits callback data to 64 bytes, so payloads are short
//! colon-separated strings: `svc:<service>`, `slot:<service>:<date>:<HHMM>`,
//! `confirm:<service>:<date>:<HHMM>`, `abort`, `admin:<approve|reject>:<uuid>`
//! and `done:<yes|no>:<uuid>`.

use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;
use uuid::Uuid;

use crate::booking::approval::Decision;
use crate::database::models::CompletionResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    PickService { service_id: i64 },
    PickSlot { service_id: i64, date: NaiveDate, time: NaiveTime },
    /// Client accepted the booking preview for this slot.
    ConfirmSlot { service_id: i64, date: NaiveDate, time: NaiveTime },
    /// Client dismissed the booking preview.
    AbortBooking,
    Resolve { decision: Decision, appointment_id: Uuid },
    Completion { response: CompletionResponse, appointment_id: Uuid },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CallbackParseError {
    #[error("unknown callback prefix '{0}'")]
    UnknownPrefix(String),
    #[error("malformed callback data '{0}'")]
    Malformed(String),
}

impl CallbackAction {
    pub fn encode(&self) -> String {
        match self {
            CallbackAction::PickService { service_id } => format!("svc:{service_id}"),
            CallbackAction::PickSlot { service_id, date, time } => format!(
                "slot:{}:{}:{}",
                service_id,
                date.format("%Y-%m-%d"),
                time.format("%H%M")
            ),
            CallbackAction::ConfirmSlot { service_id, date, time } => format!(
                "confirm:{}:{}:{}",
                service_id,
                date.format("%Y-%m-%d"),
                time.format("%H%M")
            ),
            CallbackAction::AbortBooking => "abort".to_string(),
            CallbackAction::Resolve { decision, appointment_id } => {
                format!("admin:{}:{}", decision.as_str(), appointment_id)
            }
            CallbackAction::Completion { response, appointment_id } => {
                format!("done:{}:{}", response.as_str(), appointment_id)
            }
        }
    }

    pub fn parse(data: &str) -> Result<Self, CallbackParseError> {
        let malformed = || CallbackParseError::Malformed(data.to_string());
        let parts: Vec<&str> = data.split(':').collect();

        match parts.as_slice() {
            ["svc", service_id] => Ok(CallbackAction::PickService {
                service_id: service_id.parse().map_err(|_| malformed())?,
            }),
            ["slot", service_id, date, time] => Ok(CallbackAction::PickSlot {
                service_id: service_id.parse().map_err(|_| malformed())?,
                date: NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| malformed())?,
                time: NaiveTime::parse_from_str(time, "%H%M").map_err(|_| malformed())?,
            }),
            ["confirm", service_id, date, time] => Ok(CallbackAction::ConfirmSlot {
                service_id: service_id.parse().map_err(|_| malformed())?,
                date: NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| malformed())?,
                time: NaiveTime::parse_from_str(time, "%H%M").map_err(|_| malformed())?,
            }),
            ["abort"] => Ok(CallbackAction::AbortBooking),
            ["admin", decision, id] => Ok(CallbackAction::Resolve {
                decision: decision.parse().map_err(|_| malformed())?,
                appointment_id: Uuid::parse_str(id).map_err(|_| malformed())?,
            }),
            ["done", response, id] => Ok(CallbackAction::Completion {
                response: response.parse().map_err(|_| malformed())?,
                appointment_id: Uuid::parse_str(id).map_err(|_| malformed())?,
            }),
            [prefix, ..] if !matches!(*prefix, "svc" | "slot" | "confirm" | "abort" | "admin" | "done") => {
                Err(CallbackParseError::UnknownPrefix(prefix.to_string()))
            }
            _ => Err(malformed()),
        }
    }
}
