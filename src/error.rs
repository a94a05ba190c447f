//! Error taxonomy for the booking core.
//!
//! Domain errors describe a decision (the slot is taken, the transition is not
//! allowed) and are never retried. Infrastructure errors wrap storage,
//! notification and timeout failures and may be retried by the caller.

use crate::database::models::AppointmentStatus;
use crate::database::store::StoreError;
use thiserror::Error;

/// Errors returned by the booking operations.
#[derive(Debug, Error)]
pub enum BookingError {
    /// Requested time is outside business hours, off the slot grid, on a closed date or in the past.
    #[error("Requested time is not bookable: {0}")]
    InvalidTimeRange(String),

    /// The slot is already taken or was taken while the request was in flight.
    #[error("Slot is no longer available")]
    SlotUnavailable,

    /// Another actor already resolved this appointment.
    #[error("Appointment was already processed")]
    AlreadyProcessed,

    /// The requested status change is not part of the lifecycle.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// Status the appointment was in.
        from: AppointmentStatus,
        /// Status that was requested.
        to: AppointmentStatus,
    },

    /// Unknown appointment, service or provider.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Client cancellation attempted inside the cancellation window.
    #[error("Too late to cancel this appointment")]
    TooLateToCancel,

    /// Service duration must be positive.
    #[error("Appointment duration must be positive")]
    InvalidDuration,

    /// Storage failure; safe to retry.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// Outbound notification failed; never affects appointment state.
    #[error("Notification error: {0}")]
    Notification(String),

    /// The operation did not finish in time; its atomic write either fully applied or not at all.
    #[error("Operation timed out: {0}")]
    Timeout(&'static str),
}

impl BookingError {
    /// True for errors that reflect a decision rather than a transient fault.
    pub fn is_domain(&self) -> bool {
        !self.is_retryable()
    }

    /// True for I/O failures the caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BookingError::Storage(_) | BookingError::Notification(_) | BookingError::Timeout(_)
        )
    }
}
