//! Slot engine and appointment lifecycle.

pub mod approval;
pub mod clock;
pub mod completion;
pub mod conflict;
pub mod engine;
pub mod hours;
pub mod lifecycle;
pub mod notifier;
pub mod reminders;
pub mod reservation;
pub mod slots;
pub mod state_machine;

pub use approval::{ApprovalCoordinator, Decision};
pub use clock::{Clock, FixedClock, SystemClock};
pub use conflict::{ConflictDetector, Interval};
pub use engine::BookingEngine;
pub use notifier::{MessageKind, NotificationRequest, Notifier, NotifyError, Recipient};
pub use reservation::ReservationRequest;
pub use slots::Slot;
pub use state_machine::{Actor, ActorRole, AppointmentStateMachine};
