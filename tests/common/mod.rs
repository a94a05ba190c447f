#![allow(dead_code)]

use anyhow::Result;
use appointment_booking_bot::booking::clock::FixedClock;
use appointment_booking_bot::booking::engine::BookingEngine;
use appointment_booking_bot::booking::notifier::{NotificationRequest, Notifier, NotifyError};
use appointment_booking_bot::booking::reservation::ReservationRequest;
use appointment_booking_bot::config::BookingConfig;
use appointment_booking_bot::database::connection::DatabaseManager;
use appointment_booking_bot::database::models::business_hours::set_weekly_hours;
use appointment_booking_bot::database::models::{Provider, Service};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::{tempdir, TempDir};

pub const CLIENT: i64 = 1001;
pub const OTHER_CLIENT: i64 = 1002;
pub const ADMIN: i64 = 9001;

pub async fn setup_test_db() -> Result<(DatabaseManager, TempDir)> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().join("test.db");
    let database_url = format!("sqlite:{}", db_path.display());

    let db_manager = DatabaseManager::new(&database_url).await?;
    db_manager.run_migrations().await?;

    Ok((db_manager, temp_dir))
}

pub fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

/// A Monday well in the future of [`initial_now`].
pub fn booking_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 3, 4).unwrap()
}

pub fn initial_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 3, 1, 12, 0, 0).unwrap()
}

pub fn at(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(time(hour, minute)))
}

/// A provider open 09:00-17:00 every day with hourly slots.
pub async fn seed_provider(pool: &sqlx::SqlitePool, utc_offset_minutes: i64) -> Result<Provider> {
    let provider = Provider::create(pool, "Test Studio", utc_offset_minutes).await?;
    for weekday in [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ] {
        set_weekly_hours(pool, provider.id, weekday, time(9, 0), time(17, 0), 60).await?;
    }
    Ok(provider)
}

/// Records every request; fails them all while `failing` is set.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<NotificationRequest>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<NotificationRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, request: &NotificationRequest) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError {
                recipient: request.recipient,
                reason: "transport down".to_string(),
            });
        }
        self.sent.lock().unwrap().push(request.clone());
        Ok(())
    }
}

pub struct TestContext {
    pub db: DatabaseManager,
    pub provider: Provider,
    pub service: Service,
    pub clock: Arc<FixedClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub engine: BookingEngine,
    _temp_dir: TempDir,
}

impl TestContext {
    pub async fn new(approval_required: bool) -> Result<Self> {
        Self::with_config(BookingConfig {
            approval_required,
            ..BookingConfig::default()
        })
        .await
    }

    pub async fn with_config(config: BookingConfig) -> Result<Self> {
        let (db, temp_dir) = setup_test_db().await?;
        let provider = seed_provider(&db.pool, 0).await?;
        let service = Service::create(&db.pool, provider.id, "Consultation", 60, 5000).await?;
        let clock = Arc::new(FixedClock::new(initial_now()));
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = BookingEngine::sqlite(db.pool.clone(), notifier.clone(), clock.clone(), config);

        Ok(Self {
            db,
            provider,
            service,
            clock,
            notifier,
            engine,
            _temp_dir: temp_dir,
        })
    }

    pub fn request(&self, client_id: i64, date: NaiveDate, hour: u32, minute: u32) -> ReservationRequest {
        ReservationRequest {
            client_id,
            provider_id: self.provider.id,
            service_id: self.service.id,
            date,
            time: time(hour, minute),
        }
    }
}

impl TestContext {
    pub fn clock_now(&self) -> DateTime<Utc> {
        use appointment_booking_bot::booking::clock::Clock;
        self.clock.now()
    }
}
