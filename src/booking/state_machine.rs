use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::database::models::{Appointment, AppointmentStatus};
use crate::error::BookingError;

/// Who is asking for a change. Authorization happens before the core is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    Client,
    Provider,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: i64,
    pub role: ActorRole,
}

impl Actor {
    pub fn client(id: i64) -> Self {
        Self { id, role: ActorRole::Client }
    }

    pub fn admin(id: i64) -> Self {
        Self { id, role: ActorRole::Admin }
    }

    pub fn provider(id: i64) -> Self {
        Self { id, role: ActorRole::Provider }
    }
}

/// Legal status graph of an appointment and its guards.
pub struct AppointmentStateMachine;

impl AppointmentStateMachine {
    /// Valid transitions:
    /// - pending_approval → confirmed, rejected, cancelled
    /// - scheduled → confirmed, cancelled
    /// - confirmed → in_progress, cancelled, no_show, completed
    /// - in_progress → completed, no_show
    /// - completed, cancelled, rejected, no_show → none
    pub fn allowed_targets(from: AppointmentStatus) -> &'static [AppointmentStatus] {
        use AppointmentStatus::*;
        match from {
            PendingApproval => &[Confirmed, Rejected, Cancelled],
            Scheduled => &[Confirmed, Cancelled],
            Confirmed => &[InProgress, Cancelled, NoShow, Completed],
            InProgress => &[Completed, NoShow],
            Completed | Cancelled | Rejected | NoShow => &[],
        }
    }

    pub fn is_valid_transition(from: AppointmentStatus, to: AppointmentStatus) -> bool {
        Self::allowed_targets(from).contains(&to)
    }

    pub fn transition(from: AppointmentStatus, to: AppointmentStatus) -> Result<AppointmentStatus, BookingError> {
        if Self::is_valid_transition(from, to) {
            Ok(to)
        } else {
            Err(BookingError::InvalidTransition { from, to })
        }
    }

    /// Status a freshly reserved appointment starts in.
    pub fn initial_status(approval_required: bool) -> AppointmentStatus {
        if approval_required {
            AppointmentStatus::PendingApproval
        } else {
            AppointmentStatus::Scheduled
        }
    }

    /// Clients must cancel before `start - window`; admins and providers may cancel any non-terminal appointment.
    pub fn check_cancel(
        appointment: &Appointment,
        actor: &Actor,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<(), BookingError> {
        Self::transition(appointment.status, AppointmentStatus::Cancelled)?;

        if actor.role == ActorRole::Client {
            // A deadline before the earliest instant has always passed.
            let too_late = match appointment.start_time.checked_sub_signed(window) {
                Some(deadline) => now >= deadline,
                None => true,
            };
            if too_late {
                return Err(BookingError::TooLateToCancel);
            }
        }
        Ok(())
    }

    /// No-show needs a confirmed appointment whose start has passed.
    pub fn check_no_show(appointment: &Appointment, now: DateTime<Utc>) -> Result<(), BookingError> {
        let invalid = BookingError::InvalidTransition {
            from: appointment.status,
            to: AppointmentStatus::NoShow,
        };
        if appointment.status != AppointmentStatus::Confirmed || now <= appointment.start_time {
            return Err(invalid);
        }
        Ok(())
    }

    /// Runs the guard for `to`, then checks the graph.
    pub fn check(
        appointment: &Appointment,
        to: AppointmentStatus,
        actor: &Actor,
        now: DateTime<Utc>,
        cancellation_window: Duration,
    ) -> Result<(), BookingError> {
        match to {
            AppointmentStatus::Cancelled => Self::check_cancel(appointment, actor, now, cancellation_window),
            AppointmentStatus::NoShow => Self::check_no_show(appointment, now),
            _ => Self::transition(appointment.status, to).map(|_| ()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::CompletionState;
    use chrono::TimeZone;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn appointment(status: AppointmentStatus, start: DateTime<Utc>) -> Appointment {
        Appointment {
            id: 1,
            public_id: Uuid::new_v4(),
            client_id: 10,
            provider_id: 1,
            service_id: 1,
            start_time: start,
            duration_minutes: 60,
            status,
            price_cents: 0,
            cancellation_reason: None,
            cancelled_at: None,
            cancelled_by: None,
            decided_by: None,
            decided_at: None,
            decision_note: None,
            reminder_sent: BTreeMap::new(),
            completion: CompletionState::default(),
            created_at: start,
            updated_at: start,
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_window_reaching_before_the_calendar_start_blocks_clients() {
        let appt = appointment(AppointmentStatus::Confirmed, start());
        let window = Duration::try_days(100_000_000).unwrap();
        let now = start() - Duration::days(30);

        let result = AppointmentStateMachine::check_cancel(&appt, &Actor::client(10), now, window);
        assert!(matches!(result, Err(BookingError::TooLateToCancel)));
        assert!(AppointmentStateMachine::check_cancel(&appt, &Actor::admin(1), now, window).is_ok());
    }

    #[test]
    fn test_table_transitions() {
        use AppointmentStatus::*;
        assert!(AppointmentStateMachine::is_valid_transition(PendingApproval, Confirmed));
        assert!(AppointmentStateMachine::is_valid_transition(PendingApproval, Rejected));
        assert!(AppointmentStateMachine::is_valid_transition(Scheduled, Confirmed));
        assert!(AppointmentStateMachine::is_valid_transition(Confirmed, Completed));
        assert!(AppointmentStateMachine::is_valid_transition(InProgress, NoShow));
        assert!(!AppointmentStateMachine::is_valid_transition(Scheduled, Rejected));
        assert!(!AppointmentStateMachine::is_valid_transition(InProgress, Cancelled));
        assert!(!AppointmentStateMachine::is_valid_transition(Confirmed, Confirmed));
    }

    #[test]
    fn test_terminal_states_have_no_targets() {
        for status in AppointmentStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
            for target in AppointmentStatus::ALL {
                assert!(matches!(
                    AppointmentStateMachine::transition(status, target),
                    Err(BookingError::InvalidTransition { .. })
                ));
            }
        }
    }

    #[test]
    fn test_initial_status_follows_approval_gate() {
        assert_eq!(AppointmentStateMachine::initial_status(true), AppointmentStatus::PendingApproval);
        assert_eq!(AppointmentStateMachine::initial_status(false), AppointmentStatus::Scheduled);
    }

    #[test]
    fn test_client_cancel_inside_window_is_too_late() {
        let appt = appointment(AppointmentStatus::Confirmed, start());
        let now = start() - Duration::hours(2);
        let result = AppointmentStateMachine::check_cancel(&appt, &Actor::client(10), now, Duration::hours(24));
        assert!(matches!(result, Err(BookingError::TooLateToCancel)));
    }

    #[test]
    fn test_admin_cancel_ignores_window() {
        let appt = appointment(AppointmentStatus::Confirmed, start());
        let now = start() - Duration::hours(2);
        assert!(AppointmentStateMachine::check_cancel(&appt, &Actor::admin(1), now, Duration::hours(24)).is_ok());
    }

    #[test]
    fn test_cancel_completed_is_invalid_transition() {
        let appt = appointment(AppointmentStatus::Completed, start());
        let now = start() - Duration::days(3);
        let result = AppointmentStateMachine::check_cancel(&appt, &Actor::client(10), now, Duration::hours(24));
        assert!(matches!(result, Err(BookingError::InvalidTransition { .. })));
    }

    #[test]
    fn test_no_show_guard() {
        let confirmed = appointment(AppointmentStatus::Confirmed, start());
        assert!(AppointmentStateMachine::check_no_show(&confirmed, start() + Duration::minutes(5)).is_ok());
        assert!(AppointmentStateMachine::check_no_show(&confirmed, start()).is_err());

        let in_progress = appointment(AppointmentStatus::InProgress, start());
        assert!(AppointmentStateMachine::check_no_show(&in_progress, start() + Duration::hours(1)).is_err());
    }
}
