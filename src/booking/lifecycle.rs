use chrono::Duration;
use std::sync::Arc;
use uuid::Uuid;

use crate::booking::clock::Clock;
use crate::booking::state_machine::{Actor, AppointmentStateMachine};
use crate::database::models::{Appointment, AppointmentStatus};
use crate::database::store::{AppointmentStore, StatusChange};
use crate::error::BookingError;
use crate::utils::logging::{log_race_lost, log_transition, log_transition_defect};

/// Re-reads allowed when the status moved between read and write.
const MAX_ATTEMPTS: usize = 3;

/// Guarded status changes other than approval: cancel, confirm, start, complete, no-show.
#[derive(Clone)]
pub struct LifecycleService {
    store: Arc<dyn AppointmentStore>,
    clock: Arc<dyn Clock>,
    cancellation_window: Duration,
}

impl LifecycleService {
    pub fn new(store: Arc<dyn AppointmentStore>, clock: Arc<dyn Clock>, cancellation_window: Duration) -> Self {
        Self {
            store,
            clock,
            cancellation_window,
        }
    }

    pub async fn cancel(
        &self,
        appointment_id: Uuid,
        actor: Actor,
        reason: Option<String>,
    ) -> Result<Appointment, BookingError> {
        self.transition(appointment_id, AppointmentStatus::Cancelled, actor, reason)
            .await
    }

    /// `scheduled -> confirmed` for bookings made without the approval gate.
    pub async fn confirm(&self, appointment_id: Uuid, actor: Actor) -> Result<Appointment, BookingError> {
        self.transition(appointment_id, AppointmentStatus::Confirmed, actor, None)
            .await
    }

    pub async fn start(&self, appointment_id: Uuid, actor: Actor) -> Result<Appointment, BookingError> {
        self.transition(appointment_id, AppointmentStatus::InProgress, actor, None)
            .await
    }

    pub async fn complete(&self, appointment_id: Uuid, actor: Actor) -> Result<Appointment, BookingError> {
        self.transition(appointment_id, AppointmentStatus::Completed, actor, None)
            .await
    }

    pub async fn mark_no_show(&self, appointment_id: Uuid, actor: Actor) -> Result<Appointment, BookingError> {
        self.transition(appointment_id, AppointmentStatus::NoShow, actor, None)
            .await
    }

    /// Read, check guards, then compare-and-swap on the status that was read.
    ///
    /// A lost CAS re-reads and re-checks, so a concurrent terminal move turns
    /// into `InvalidTransition` rather than a silent overwrite.
    pub async fn transition(
        &self,
        appointment_id: Uuid,
        to: AppointmentStatus,
        actor: Actor,
        note: Option<String>,
    ) -> Result<Appointment, BookingError> {
        for _ in 0..MAX_ATTEMPTS {
            let appointment = self
                .store
                .find_appointment(appointment_id)
                .await?
                .ok_or(BookingError::NotFound("appointment"))?;

            let now = self.clock.now();
            if let Err(e) =
                AppointmentStateMachine::check(&appointment, to, &actor, now, self.cancellation_window)
            {
                if let BookingError::InvalidTransition { from, to } = &e {
                    log_transition_defect(&appointment_id.to_string(), from.as_str(), to.as_str());
                }
                return Err(e);
            }

            let change = StatusChange {
                to,
                actor_id: Some(actor.id),
                at: now,
                note: note.clone(),
            };
            let rows = self
                .store
                .conditional_update_status(appointment_id, appointment.status, &change)
                .await?;

            if rows == 1 {
                log_transition(
                    &appointment_id.to_string(),
                    appointment.status.as_str(),
                    to.as_str(),
                    actor.id,
                );
                return self
                    .store
                    .find_appointment(appointment_id)
                    .await?
                    .ok_or(BookingError::NotFound("appointment"));
            }
        }

        log_race_lost(to.as_str(), &appointment_id.to_string());
        Err(BookingError::AlreadyProcessed)
    }
}
