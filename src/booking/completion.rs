//! Post-appointment completion sub-flow.
//!
//! `awaiting_confirmation -> awaiting_proof -> proof_received`, stored beside the
//! main status. The prompt that opens the flow is sent by the reminder tick;
//! the final proof upload also moves the appointment to `completed`.

use std::sync::Arc;
use uuid::Uuid;

use crate::booking::clock::Clock;
use crate::database::models::{Appointment, AppointmentStatus, CompletionResponse, CompletionStage};
use crate::database::store::AppointmentStore;
use crate::error::BookingError;
use crate::utils::logging::log_booking_event;

#[derive(Clone)]
pub struct CompletionService {
    store: Arc<dyn AppointmentStore>,
    clock: Arc<dyn Clock>,
}

impl CompletionService {
    pub fn new(store: Arc<dyn AppointmentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Records the client's yes/no once. "Yes" moves the flow to awaiting proof.
    pub async fn record_response(
        &self,
        appointment_id: Uuid,
        response: CompletionResponse,
    ) -> Result<Appointment, BookingError> {
        let rows = self
            .store
            .record_completion_response(appointment_id, response, self.clock.now())
            .await?;

        let appointment = self.load(appointment_id).await?;
        if rows == 0 {
            return Err(match appointment.completion.stage {
                _ if appointment.completion.user_completion_response.is_some() => {
                    BookingError::AlreadyProcessed
                }
                Some(CompletionStage::AwaitingProof) | Some(CompletionStage::ProofReceived) => {
                    BookingError::AlreadyProcessed
                }
                _ => BookingError::InvalidTransition {
                    from: appointment.status,
                    to: AppointmentStatus::Completed,
                },
            });
        }

        log_booking_event(
            "completion_response",
            &appointment_id.to_string(),
            Some(response.as_str()),
        );
        Ok(appointment)
    }

    /// Stores the admin's proof and completes the appointment in the same write.
    pub async fn record_proof(&self, appointment_id: Uuid, proof_ref: &str) -> Result<Appointment, BookingError> {
        let rows = self
            .store
            .record_completion_proof(appointment_id, proof_ref, self.clock.now())
            .await?;

        let appointment = self.load(appointment_id).await?;
        if rows == 0 {
            return Err(match appointment.completion.stage {
                Some(CompletionStage::ProofReceived) => BookingError::AlreadyProcessed,
                _ => BookingError::InvalidTransition {
                    from: appointment.status,
                    to: AppointmentStatus::Completed,
                },
            });
        }

        log_booking_event("proof_received", &appointment_id.to_string(), Some(proof_ref));
        Ok(appointment)
    }

    async fn load(&self, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        self.store
            .find_appointment(appointment_id)
            .await?
            .ok_or(BookingError::NotFound("appointment"))
    }
}
