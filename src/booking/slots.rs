use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::booking::conflict::{ConflictDetector, Interval};
use crate::booking::hours::{BusinessHoursProvider, DayWindow, OpeningWindow};
use crate::database::models::{Appointment, AppointmentStatus};
use crate::database::store::AppointmentStore;
use crate::error::BookingError;
use crate::utils::datetime::local_to_utc;

/// A presentable slot. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    /// First instant of the slot, in UTC.
    pub start: DateTime<Utc>,
    /// Exclusive end: start plus the service duration.
    pub end: DateTime<Utc>,
    /// False when an active appointment overlaps the slot.
    pub available: bool,
}

impl Slot {
    /// The slot as a half-open interval.
    pub fn interval(&self) -> Interval {
        Interval::new(self.start, self.end)
    }
}

/// Candidate intervals from `open` in steps of the window's grid, keeping those that end by `close`.
pub fn candidate_slots(
    date: NaiveDate,
    offset: FixedOffset,
    window: &OpeningWindow,
    duration_minutes: i64,
) -> Vec<Interval> {
    let (Some(duration), Some(step)) = (
        Duration::try_minutes(duration_minutes),
        Duration::try_minutes(window.step_minutes),
    ) else {
        return Vec::new();
    };
    if duration <= Duration::zero() || step <= Duration::zero() {
        return Vec::new();
    }
    let close = date.and_time(window.close);

    let mut candidates = Vec::new();
    let mut start = date.and_time(window.open);
    while let Some(end) = start.checked_add_signed(duration).filter(|end| *end <= close) {
        if let Some(utc_start) = local_to_utc(start, offset) {
            if let Some(utc_end) = utc_start.checked_add_signed(end - start) {
                candidates.push(Interval::new(utc_start, utc_end));
            }
        }
        let Some(next) = start.checked_add_signed(step) else {
            break;
        };
        start = next;
    }
    candidates
}

/// Flags each candidate that overlaps an active appointment.
pub fn mark_availability(candidates: &[Interval], existing: &[Appointment]) -> Vec<Slot> {
    candidates
        .iter()
        .map(|candidate| Slot {
            start: candidate.start,
            end: candidate.end,
            available: !ConflictDetector::has_conflict(candidate, existing),
        })
        .collect()
}

/// Opening window of `date` as UTC instants.
pub fn window_interval(date: NaiveDate, offset: FixedOffset, window: &OpeningWindow) -> Option<Interval> {
    Some(Interval::new(
        local_to_utc(date.and_time(window.open), offset)?,
        local_to_utc(date.and_time(window.close), offset)?,
    ))
}

#[derive(Clone)]
pub struct SlotAvailabilityCalculator {
    hours: Arc<dyn BusinessHoursProvider>,
    store: Arc<dyn AppointmentStore>,
}

impl SlotAvailabilityCalculator {
    pub fn new(hours: Arc<dyn BusinessHoursProvider>, store: Arc<dyn AppointmentStore>) -> Self {
        Self { hours, store }
    }

    /// Chronological slots for `date`. A closed day yields an empty list.
    pub async fn compute_slots(
        &self,
        provider_id: i64,
        date: NaiveDate,
        duration_minutes: i64,
    ) -> Result<Vec<Slot>, BookingError> {
        if duration_minutes <= 0 || Duration::try_minutes(duration_minutes).is_none() {
            return Err(BookingError::InvalidDuration);
        }

        let offset = self
            .hours
            .timezone(provider_id)
            .await?
            .ok_or(BookingError::NotFound("provider"))?;

        let window = match self.hours.window(provider_id, date).await? {
            DayWindow::Closed => return Ok(Vec::new()),
            DayWindow::Open(window) => window,
        };

        let candidates = candidate_slots(date, offset, &window, duration_minutes);
        let Some(range) = window_interval(date, offset, &window) else {
            return Ok(Vec::new());
        };

        let existing = self
            .store
            .provider_appointments(provider_id, range, &AppointmentStatus::ACTIVE)
            .await?;

        Ok(mark_availability(&candidates, &existing))
    }
}
