use async_trait::async_trait;
use chrono::{Datelike, FixedOffset, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::HashMap;
use thiserror::Error;

use crate::database::models::business_hours::{find_exception, find_weekly};
use crate::database::models::Provider;
use crate::database::store::StoreError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HoursError {
    #[error("opening time {open} is not before closing time {close}")]
    EmptyWindow { open: NaiveTime, close: NaiveTime },
    #[error("slot step must be positive, got {0}")]
    InvalidStep(i64),
}

/// Opening hours for a single day plus the slot grid step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningWindow {
    pub open: NaiveTime,
    pub close: NaiveTime,
    pub step_minutes: i64,
}

impl OpeningWindow {
    pub fn new(open: NaiveTime, close: NaiveTime, step_minutes: i64) -> Result<Self, HoursError> {
        if open >= close {
            return Err(HoursError::EmptyWindow { open, close });
        }
        if step_minutes <= 0 {
            return Err(HoursError::InvalidStep(step_minutes));
        }
        Ok(Self { open, close, step_minutes })
    }

    /// True when `time` is on the slot grid and inside `[open, close)`.
    pub fn is_on_grid(&self, time: NaiveTime) -> bool {
        if time < self.open || time >= self.close {
            return false;
        }
        let offset = (time - self.open).num_seconds();
        offset % (self.step_minutes * 60) == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayWindow {
    Closed,
    Open(OpeningWindow),
}

/// A date-specific override of the weekly hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateException {
    Closed,
    SpecialHours(OpeningWindow),
}

/// An exception for the date wins over the weekly hours; no weekly entry means closed.
pub fn resolve_window(weekly: Option<OpeningWindow>, exception: Option<DateException>) -> DayWindow {
    match exception {
        Some(DateException::Closed) => DayWindow::Closed,
        Some(DateException::SpecialHours(window)) => DayWindow::Open(window),
        None => weekly.map_or(DayWindow::Closed, DayWindow::Open),
    }
}

/// Source of provider timezones and opening hours.
#[async_trait]
pub trait BusinessHoursProvider: Send + Sync {
    /// `None` when the provider does not exist.
    async fn timezone(&self, provider_id: i64) -> Result<Option<FixedOffset>, StoreError>;

    async fn window(&self, provider_id: i64, date: NaiveDate) -> Result<DayWindow, StoreError>;
}

/// In-memory hours for one provider.
#[derive(Debug, Clone)]
pub struct BusinessHoursConfig {
    pub offset: FixedOffset,
    pub weekly: HashMap<Weekday, OpeningWindow>,
    pub exceptions: HashMap<NaiveDate, DateException>,
}

impl BusinessHoursConfig {
    pub fn new(offset: FixedOffset) -> Self {
        Self {
            offset,
            weekly: HashMap::new(),
            exceptions: HashMap::new(),
        }
    }

    pub fn with_weekly(mut self, weekday: Weekday, window: OpeningWindow) -> Self {
        self.weekly.insert(weekday, window);
        self
    }

    pub fn with_exception(mut self, date: NaiveDate, exception: DateException) -> Self {
        self.exceptions.insert(date, exception);
        self
    }

    pub fn resolve(&self, date: NaiveDate) -> DayWindow {
        resolve_window(
            self.weekly.get(&date.weekday()).copied(),
            self.exceptions.get(&date).copied(),
        )
    }
}

/// Fixed per-provider hours, used by tests and single-tenant setups.
#[derive(Debug, Clone, Default)]
pub struct StaticBusinessHours {
    providers: HashMap<i64, BusinessHoursConfig>,
}

impl StaticBusinessHours {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider_id: i64, config: BusinessHoursConfig) -> Self {
        self.providers.insert(provider_id, config);
        self
    }
}

#[async_trait]
impl BusinessHoursProvider for StaticBusinessHours {
    async fn timezone(&self, provider_id: i64) -> Result<Option<FixedOffset>, StoreError> {
        Ok(self.providers.get(&provider_id).map(|c| c.offset))
    }

    async fn window(&self, provider_id: i64, date: NaiveDate) -> Result<DayWindow, StoreError> {
        Ok(self
            .providers
            .get(&provider_id)
            .map_or(DayWindow::Closed, |c| c.resolve(date)))
    }
}

/// Hours read from the `business_hours` and `business_hour_exceptions` tables.
#[derive(Clone)]
pub struct SqliteBusinessHours {
    pool: SqlitePool,
}

impl SqliteBusinessHours {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BusinessHoursProvider for SqliteBusinessHours {
    async fn timezone(&self, provider_id: i64) -> Result<Option<FixedOffset>, StoreError> {
        let Some(provider) = Provider::find_by_id(&self.pool, provider_id).await? else {
            return Ok(None);
        };
        provider
            .offset()
            .map(Some)
            .ok_or_else(|| StoreError::Corrupt(format!("provider {provider_id} has an invalid UTC offset")))
    }

    async fn window(&self, provider_id: i64, date: NaiveDate) -> Result<DayWindow, StoreError> {
        let weekly = find_weekly(&self.pool, provider_id, date)
            .await?
            .map(|row| row.window())
            .transpose()?;
        let exception = find_exception(&self.pool, provider_id, date)
            .await?
            .map(|row| row.exception())
            .transpose()?;

        Ok(resolve_window(weekly, exception))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_window_rejects_empty_range_and_bad_step() {
        assert!(OpeningWindow::new(t(9, 0), t(9, 0), 30).is_err());
        assert!(OpeningWindow::new(t(10, 0), t(9, 0), 30).is_err());
        assert_eq!(
            OpeningWindow::new(t(9, 0), t(17, 0), 0),
            Err(HoursError::InvalidStep(0))
        );
    }

    #[test]
    fn test_grid_alignment() {
        let window = OpeningWindow::new(t(9, 0), t(17, 0), 30).unwrap();
        assert!(window.is_on_grid(t(9, 0)));
        assert!(window.is_on_grid(t(16, 30)));
        assert!(!window.is_on_grid(t(9, 15)));
        assert!(!window.is_on_grid(t(8, 30)));
        assert!(!window.is_on_grid(t(17, 0)));
    }

    #[test]
    fn test_exception_takes_precedence() {
        let weekly = OpeningWindow::new(t(9, 0), t(17, 0), 60).unwrap();
        let special = OpeningWindow::new(t(12, 0), t(14, 0), 60).unwrap();

        assert_eq!(resolve_window(Some(weekly), None), DayWindow::Open(weekly));
        assert_eq!(resolve_window(None, None), DayWindow::Closed);
        assert_eq!(
            resolve_window(Some(weekly), Some(DateException::Closed)),
            DayWindow::Closed
        );
        assert_eq!(
            resolve_window(None, Some(DateException::SpecialHours(special))),
            DayWindow::Open(special)
        );
    }

    #[test]
    fn test_config_resolves_by_weekday() {
        let window = OpeningWindow::new(t(9, 0), t(12, 0), 60).unwrap();
        let config = BusinessHoursConfig::new(FixedOffset::east_opt(0).unwrap())
            .with_weekly(Weekday::Mon, window);

        let monday = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(config.resolve(monday), DayWindow::Open(window));
        assert_eq!(config.resolve(tuesday), DayWindow::Closed);
    }
}
