use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::booking::hours::{DateException, OpeningWindow};
use crate::database::store::StoreError;
use crate::utils::datetime::{format_time, parse_time};

/// Weekly default opening hours for one provider and weekday.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BusinessHoursRow {
    pub provider_id: i64,
    pub weekday: i64,
    pub open_time: String,
    pub close_time: String,
    pub step_minutes: i64,
}

/// A date-specific override of the weekly hours.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BusinessHourExceptionRow {
    pub id: i64,
    pub provider_id: i64,
    pub date: String,
    pub closed: bool,
    pub open_time: Option<String>,
    pub close_time: Option<String>,
    pub step_minutes: Option<i64>,
}

fn window_from_parts(open: &str, close: &str, step: i64) -> Result<OpeningWindow, StoreError> {
    let open = parse_time(open).map_err(|e| StoreError::Corrupt(e.to_string()))?;
    let close = parse_time(close).map_err(|e| StoreError::Corrupt(e.to_string()))?;
    OpeningWindow::new(open, close, step).map_err(|e| StoreError::Corrupt(e.to_string()))
}

impl BusinessHoursRow {
    pub fn window(&self) -> Result<OpeningWindow, StoreError> {
        window_from_parts(&self.open_time, &self.close_time, self.step_minutes)
    }
}

impl BusinessHourExceptionRow {
    pub fn exception(&self) -> Result<DateException, StoreError> {
        if self.closed {
            return Ok(DateException::Closed);
        }
        match (&self.open_time, &self.close_time, self.step_minutes) {
            (Some(open), Some(close), Some(step)) => {
                Ok(DateException::SpecialHours(window_from_parts(open, close, step)?))
            }
            _ => Err(StoreError::Corrupt(format!(
                "exception {} is neither closed nor has complete special hours",
                self.id
            ))),
        }
    }
}

pub fn weekday_index(weekday: Weekday) -> i64 {
    i64::from(weekday.num_days_from_monday())
}

/// Sets the weekly window for a provider and weekday, replacing any previous one.
pub async fn set_weekly_hours(
    pool: &sqlx::SqlitePool,
    provider_id: i64,
    weekday: Weekday,
    open: NaiveTime,
    close: NaiveTime,
    step_minutes: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO business_hours (provider_id, weekday, open_time, close_time, step_minutes)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (provider_id, weekday) DO UPDATE SET
            open_time = excluded.open_time,
            close_time = excluded.close_time,
            step_minutes = excluded.step_minutes
        "#
    )
    .bind(provider_id)
    .bind(weekday_index(weekday))
    .bind(format_time(open))
    .bind(format_time(close))
    .bind(step_minutes)
    .execute(pool)
    .await?;

    Ok(())
}

/// Records a date-specific exception. Later exceptions for the same date win.
pub async fn add_exception(
    pool: &sqlx::SqlitePool,
    provider_id: i64,
    date: NaiveDate,
    exception: &DateException,
) -> Result<(), sqlx::Error> {
    let (closed, open, close, step) = match exception {
        DateException::Closed => (true, None, None, None),
        DateException::SpecialHours(window) => (
            false,
            Some(format_time(window.open)),
            Some(format_time(window.close)),
            Some(window.step_minutes),
        ),
    };

    sqlx::query(
        "INSERT INTO business_hour_exceptions (provider_id, date, closed, open_time, close_time, step_minutes) VALUES (?, ?, ?, ?, ?, ?)"
    )
    .bind(provider_id)
    .bind(date.format("%Y-%m-%d").to_string())
    .bind(closed)
    .bind(open)
    .bind(close)
    .bind(step)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn find_weekly(
    pool: &sqlx::SqlitePool,
    provider_id: i64,
    date: NaiveDate,
) -> Result<Option<BusinessHoursRow>, sqlx::Error> {
    sqlx::query_as::<_, BusinessHoursRow>(
        "SELECT provider_id, weekday, open_time, close_time, step_minutes FROM business_hours WHERE provider_id = ? AND weekday = ?"
    )
    .bind(provider_id)
    .bind(weekday_index(date.weekday()))
    .fetch_optional(pool)
    .await
}

pub async fn find_exception(
    pool: &sqlx::SqlitePool,
    provider_id: i64,
    date: NaiveDate,
) -> Result<Option<BusinessHourExceptionRow>, sqlx::Error> {
    sqlx::query_as::<_, BusinessHourExceptionRow>(
        "SELECT id, provider_id, date, closed, open_time, close_time, step_minutes FROM business_hour_exceptions WHERE provider_id = ? AND date = ? ORDER BY id DESC LIMIT 1"
    )
    .bind(provider_id)
    .bind(date.format("%Y-%m-%d").to_string())
    .fetch_optional(pool)
    .await
}
