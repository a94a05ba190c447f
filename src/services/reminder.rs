use sqlx::SqlitePool;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::booking::engine::BookingEngine;
use crate::booking::notifier::NotificationRequest;
use crate::database::models::ChatSession;
use crate::error::BookingError;

/// Runs the reminder tick on a cron schedule.
pub struct ReminderService {
    engine: BookingEngine,
    pool: SqlitePool,
    schedule: String,
    scheduler: JobScheduler,
}

impl ReminderService {
    pub async fn new(
        engine: BookingEngine,
        pool: SqlitePool,
        schedule: &str,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            engine,
            pool,
            schedule: schedule.to_string(),
            scheduler,
        })
    }

    pub async fn start(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let engine = self.engine.clone();
        let pool = self.pool.clone();

        let reminder_job = Job::new_async(self.schedule.as_str(), move |_uuid, _l| {
            let engine = engine.clone();
            let pool = pool.clone();
            Box::pin(async move {
                if let Err(e) = run_tick(&engine, &pool).await {
                    tracing::error!("Reminder tick failed: {}", e);
                }
            })
        })?;

        self.scheduler.add(reminder_job).await?;
        self.scheduler.start().await?;

        tracing::info!("Reminder service started with schedule '{}'", self.schedule);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.scheduler.shutdown().await?;
        Ok(())
    }

    /// Manual trigger, outside the schedule.
    pub async fn run_now(&self) -> Result<Vec<NotificationRequest>, BookingError> {
        run_tick(&self.engine, &self.pool).await
    }
}

async fn run_tick(engine: &BookingEngine, pool: &SqlitePool) -> Result<Vec<NotificationRequest>, BookingError> {
    let now = engine.now();
    let issued = engine.tick_reminders(now).await?;

    match ChatSession::purge_expired(pool, now).await {
        Ok(0) => {}
        Ok(purged) => tracing::debug!("Purged {} expired chat session(s)", purged),
        Err(e) => tracing::warn!("Failed to purge chat sessions: {}", e),
    }

    Ok(issued)
}
