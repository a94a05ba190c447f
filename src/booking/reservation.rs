use chrono::{Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::booking::clock::Clock;
use crate::booking::conflict::ConflictDetector;
use crate::booking::hours::{BusinessHoursProvider, DayWindow};
use crate::booking::state_machine::AppointmentStateMachine;
use crate::database::models::{Appointment, AppointmentStatus, NewAppointment};
use crate::database::store::{AppointmentStore, InsertOutcome, ServiceCatalog};
use crate::error::BookingError;
use crate::utils::datetime::local_to_utc;
use crate::utils::logging::{log_booking_event, log_race_lost};

/// A client's request for a wall-clock slot in the provider's timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationRequest {
    pub client_id: i64,
    pub provider_id: i64,
    pub service_id: i64,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

#[derive(Clone)]
pub struct BookingReservationService {
    hours: Arc<dyn BusinessHoursProvider>,
    store: Arc<dyn AppointmentStore>,
    catalog: Arc<dyn ServiceCatalog>,
    clock: Arc<dyn Clock>,
    approval_required: bool,
}

impl BookingReservationService {
    pub fn new(
        hours: Arc<dyn BusinessHoursProvider>,
        store: Arc<dyn AppointmentStore>,
        catalog: Arc<dyn ServiceCatalog>,
        clock: Arc<dyn Clock>,
        approval_required: bool,
    ) -> Self {
        Self {
            hours,
            store,
            catalog,
            clock,
            approval_required,
        }
    }

    /// Validates the request against business hours, then inserts atomically.
    ///
    /// Hours and grid checks run before any appointment is read. The pre-insert
    /// availability read only short-circuits; the guarded insert decides.
    pub async fn reserve(&self, request: ReservationRequest) -> Result<Appointment, BookingError> {
        let offset = self
            .hours
            .timezone(request.provider_id)
            .await?
            .ok_or(BookingError::NotFound("provider"))?;

        let window = match self.hours.window(request.provider_id, request.date).await? {
            DayWindow::Closed => {
                return Err(BookingError::InvalidTimeRange(format!(
                    "closed on {}",
                    request.date
                )))
            }
            DayWindow::Open(window) => window,
        };

        if !window.is_on_grid(request.time) {
            return Err(BookingError::InvalidTimeRange(format!(
                "{} is not a slot start between {} and {}",
                request.time.format("%H:%M"),
                window.open.format("%H:%M"),
                window.close.format("%H:%M")
            )));
        }

        let local_start = request.date.and_time(request.time);
        let start_time = local_to_utc(local_start, offset)
            .ok_or_else(|| BookingError::InvalidTimeRange("time does not exist in provider timezone".to_string()))?;

        let now = self.clock.now();
        if start_time <= now {
            return Err(BookingError::InvalidTimeRange("slot is in the past".to_string()));
        }

        let service = match self.catalog.find_service(request.service_id).await? {
            Some(service) if service.active && service.provider_id == request.provider_id => service,
            _ => return Err(BookingError::NotFound("service")),
        };
        let local_end = Some(service.duration_minutes)
            .filter(|minutes| *minutes > 0)
            .and_then(Duration::try_minutes)
            .and_then(|duration| local_start.checked_add_signed(duration))
            .ok_or(BookingError::InvalidDuration)?;

        if local_end > request.date.and_time(window.close) {
            return Err(BookingError::InvalidTimeRange(format!(
                "{} minute service runs past closing at {}",
                service.duration_minutes,
                window.close.format("%H:%M")
            )));
        }

        let candidate = NewAppointment {
            public_id: Uuid::new_v4(),
            client_id: request.client_id,
            provider_id: request.provider_id,
            service_id: service.id,
            start_time,
            duration_minutes: service.duration_minutes,
            status: AppointmentStateMachine::initial_status(self.approval_required),
            price_cents: service.price_cents,
            created_at: now,
        };

        let interval = candidate.interval();
        let existing = self
            .store
            .provider_appointments(request.provider_id, interval, &AppointmentStatus::ACTIVE)
            .await?;
        if ConflictDetector::has_conflict(&interval, &existing) {
            return Err(BookingError::SlotUnavailable);
        }

        match self.store.insert_if_slot_free(&candidate).await? {
            InsertOutcome::Inserted(appointment) => {
                log_booking_event(
                    "reserved",
                    &appointment.public_id.to_string(),
                    Some(&format!(
                        "client {} provider {} at {} ({})",
                        appointment.client_id,
                        appointment.provider_id,
                        appointment.start_time.to_rfc3339(),
                        appointment.status
                    )),
                );
                Ok(appointment)
            }
            InsertOutcome::Conflict => {
                log_race_lost(
                    "reserve",
                    &format!("provider {} at {}", request.provider_id, start_time.to_rfc3339()),
                );
                Err(BookingError::SlotUnavailable)
            }
        }
    }
}
