use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::config::ReminderLead;
use crate::booking::notifier::{MessageKind, NotificationRequest, Notifier, Recipient};
use crate::database::models::{Appointment, AppointmentStatus};
use crate::database::store::AppointmentStore;
use crate::error::BookingError;
use crate::utils::logging::{log_database_error, log_notification_failure, log_system_event};

/// Statuses that receive lead-time reminders.
pub const REMINDER_STATUSES: [AppointmentStatus; 2] =
    [AppointmentStatus::Scheduled, AppointmentStatus::Confirmed];

/// A notification together with the row it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedNotice {
    pub appointment_row_id: i64,
    pub request: NotificationRequest,
}

/// `now + lead`, clamped to the latest representable instant.
fn horizon(now: DateTime<Utc>, lead: Duration) -> DateTime<Utc> {
    now.checked_add_signed(lead).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Reminders whose lead window `[now, now + lead]` contains the start and whose label is unmarked.
pub fn due_reminders(
    appointments: &[Appointment],
    leads: &[ReminderLead],
    now: DateTime<Utc>,
) -> Vec<PlannedNotice> {
    let mut due = Vec::new();
    for appointment in appointments {
        if !REMINDER_STATUSES.contains(&appointment.status) {
            continue;
        }
        for lead in leads {
            let in_window = appointment.start_time >= now && appointment.start_time <= horizon(now, lead.lead);
            if in_window && !appointment.reminder_sent.contains_key(&lead.label) {
                due.push(PlannedNotice {
                    appointment_row_id: appointment.id,
                    request: NotificationRequest {
                        recipient: Recipient::Client(appointment.client_id),
                        kind: MessageKind::Reminder,
                        appointment_id: appointment.public_id,
                        label: Some(lead.label.clone()),
                        starts_at: appointment.start_time,
                    },
                });
            }
        }
    }
    due
}

/// Completion prompts for appointments that have ended and whose sub-flow has not started.
pub fn due_completion_prompts(appointments: &[Appointment], now: DateTime<Utc>) -> Vec<PlannedNotice> {
    appointments
        .iter()
        .filter(|a| matches!(a.status, AppointmentStatus::Confirmed | AppointmentStatus::InProgress))
        .filter(|a| a.end_time() < now && a.completion.stage.is_none())
        .map(|a| PlannedNotice {
            appointment_row_id: a.id,
            request: NotificationRequest {
                recipient: Recipient::Client(a.client_id),
                kind: MessageKind::CompletionPrompt,
                appointment_id: a.public_id,
                label: None,
                starts_at: a.start_time,
            },
        })
        .collect()
}

/// Periodic scan for lead-time reminders and completion prompts.
///
/// Delivery comes first and the durable mark second: a failed send leaves the
/// label unmarked for the next tick, and a failed mark may resend once.
#[derive(Clone)]
pub struct ReminderScheduler {
    store: Arc<dyn AppointmentStore>,
    notifier: Arc<dyn Notifier>,
    leads: Vec<ReminderLead>,
}

impl ReminderScheduler {
    pub fn new(store: Arc<dyn AppointmentStore>, notifier: Arc<dyn Notifier>, leads: Vec<ReminderLead>) -> Self {
        Self { store, notifier, leads }
    }

    /// Everything a tick at `now` would send, without sending it.
    pub async fn plan(&self, now: DateTime<Utc>) -> Result<Vec<PlannedNotice>, BookingError> {
        let mut planned = Vec::new();

        if let Some(max_lead) = self.leads.iter().map(|l| l.lead).max() {
            let upcoming = self
                .store
                .appointments_starting_between(now, horizon(now, max_lead), &REMINDER_STATUSES)
                .await?;
            planned.extend(due_reminders(&upcoming, &self.leads, now));
        }

        let finished = self.store.appointments_awaiting_completion(now).await?;
        planned.extend(due_completion_prompts(&finished, now));

        Ok(planned)
    }

    /// Sends what is due and records it. Returns the requests that were delivered.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<Vec<NotificationRequest>, BookingError> {
        let planned = self.plan(now).await?;
        let mut issued = Vec::with_capacity(planned.len());

        for notice in planned {
            let appointment_id = notice.request.appointment_id.to_string();

            if let Err(e) = self.notifier.notify(&notice.request).await {
                log_notification_failure(&format!("{:?}", notice.request.kind), &appointment_id, &e.to_string());
                continue;
            }

            let marked = match (&notice.request.kind, &notice.request.label) {
                (MessageKind::Reminder, Some(label)) => self
                    .store
                    .mark_reminder_sent(notice.appointment_row_id, label, now)
                    .await
                    .map(|_| ()),
                _ => self
                    .store
                    .begin_completion(notice.request.appointment_id, now)
                    .await
                    .map(|_| ()),
            };
            if let Err(e) = marked {
                log_database_error("mark", "appointments", &e.to_string(), Some(&appointment_id));
            }

            issued.push(notice.request);
        }

        if !issued.is_empty() {
            log_system_event("reminder tick", Some(&format!("issued {} notification(s)", issued.len())));
        }
        Ok(issued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::CompletionState;
    use chrono::{Duration, TimeZone};
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn appointment(status: AppointmentStatus, start: DateTime<Utc>) -> Appointment {
        Appointment {
            id: 7,
            public_id: Uuid::new_v4(),
            client_id: 42,
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

    fn leads() -> Vec<ReminderLead> {
        vec![
            ReminderLead { label: "24h".to_string(), lead: Duration::hours(24) },
            ReminderLead { label: "1h".to_string(), lead: Duration::hours(1) },
        ]
    }

    #[test]
    fn test_reminder_window_is_inclusive() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let appt = appointment(AppointmentStatus::Confirmed, now + Duration::hours(1));

        let labels: Vec<_> = due_reminders(&[appt], &leads(), now)
            .into_iter()
            .filter_map(|n| n.request.label)
            .collect();
        assert_eq!(labels, vec!["24h", "1h"]);
    }

    #[test]
    fn test_marked_labels_and_pending_appointments_are_skipped() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let mut marked = appointment(AppointmentStatus::Confirmed, now + Duration::hours(3));
        marked.reminder_sent.insert("24h".to_string(), now);
        let pending = appointment(AppointmentStatus::PendingApproval, now + Duration::hours(3));

        assert!(due_reminders(&[marked, pending], &leads(), now).is_empty());
    }

    #[test]
    fn test_completion_prompt_only_after_end() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let ended = appointment(AppointmentStatus::Confirmed, now - Duration::hours(2));
        let running = appointment(AppointmentStatus::InProgress, now - Duration::minutes(30));
        let mut prompted = appointment(AppointmentStatus::Confirmed, now - Duration::hours(3));
        prompted.completion.stage = Some(crate::database::models::CompletionStage::AwaitingConfirmation);

        let due = due_completion_prompts(&[ended.clone(), running, prompted], now);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].request.appointment_id, ended.public_id);
        assert_eq!(due[0].request.kind, MessageKind::CompletionPrompt);
    }

    #[test]
    fn test_lead_past_the_calendar_end_is_clamped() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let far = vec![ReminderLead {
            label: "far".to_string(),
            lead: Duration::try_days(100_000_000).unwrap(),
        }];
        let appt = appointment(AppointmentStatus::Confirmed, now + Duration::days(400));

        assert_eq!(horizon(now, far[0].lead), DateTime::<Utc>::MAX_UTC);
        let due = due_reminders(&[appt], &far, now);
        assert_eq!(due.len(), 1);
    }
}
