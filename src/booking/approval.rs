use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::booking::clock::Clock;
use crate::database::models::{Appointment, AppointmentStatus};
use crate::database::store::{AppointmentStore, StatusChange};
use crate::error::BookingError;
use crate::utils::logging::{log_race_lost, log_transition};

/// An admin's answer to a pending booking request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Moves the request to `confirmed`.
    Approve,
    /// Moves the request to `rejected`.
    Reject,
}

impl Decision {
    /// Status the appointment ends up in.
    pub fn target(&self) -> AppointmentStatus {
        match self {
            Decision::Approve => AppointmentStatus::Confirmed,
            Decision::Reject => AppointmentStatus::Rejected,
        }
    }

    /// Wire name used in callback payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Reject => "reject",
        }
    }
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(Decision::Approve),
            "reject" => Ok(Decision::Reject),
            other => Err(format!("unknown decision '{other}'")),
        }
    }
}

/// Resolves pending approvals with a single compare-and-swap per call.
#[derive(Clone)]
pub struct ApprovalCoordinator {
    store: Arc<dyn AppointmentStore>,
    clock: Arc<dyn Clock>,
}

impl ApprovalCoordinator {
    pub fn new(store: Arc<dyn AppointmentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Succeeds exactly once per appointment. Losers get `AlreadyProcessed` and are not retried.
    pub async fn resolve(
        &self,
        appointment_id: Uuid,
        admin_id: i64,
        decision: Decision,
        note: Option<String>,
    ) -> Result<Appointment, BookingError> {
        let change = StatusChange {
            to: decision.target(),
            actor_id: Some(admin_id),
            at: self.clock.now(),
            note,
        };

        let rows = self
            .store
            .conditional_update_status(appointment_id, AppointmentStatus::PendingApproval, &change)
            .await?;

        let appointment = self
            .store
            .find_appointment(appointment_id)
            .await?
            .ok_or(BookingError::NotFound("appointment"))?;

        if rows == 0 {
            log_race_lost(decision.as_str(), &format!("{} is {}", appointment_id, appointment.status));
            return Err(BookingError::AlreadyProcessed);
        }

        log_transition(
            &appointment_id.to_string(),
            AppointmentStatus::PendingApproval.as_str(),
            appointment.status.as_str(),
            admin_id,
        );
        Ok(appointment)
    }
}
