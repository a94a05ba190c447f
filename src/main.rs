//! # Appointment Booking Bot Main Entry Point
//!
//! Initializes logging, loads configuration, sets up the database,
//! starts the reminder service and the health server, and runs the Telegram bot.

use anyhow::Result;
use chrono::Duration;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use appointment_booking_bot::booking::clock::SystemClock;
use appointment_booking_bot::booking::engine::BookingEngine;
use appointment_booking_bot::booking::notifier::Notifier;
use appointment_booking_bot::bot::handlers::BotHandler;
use appointment_booking_bot::bot::BotContext;
use appointment_booking_bot::config::Config;
use appointment_booking_bot::database::connection::DatabaseManager;
use appointment_booking_bot::services::health::HealthService;
use appointment_booking_bot::services::notifier::TelegramNotifier;
use appointment_booking_bot::services::reminder::ReminderService;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "appointment_booking_bot=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    info!("Starting Appointment Booking Bot v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration loaded - Database: {}, HTTP Port: {}, approval required: {}",
        config.database_url, config.http_port, config.booking.approval_required
    );
    if config.admin_chat_id.is_none() {
        tracing::warn!("ADMIN_CHAT_ID is not set; approval requests will not be delivered");
    }

    info!("Initializing database connection...");
    let db_manager = DatabaseManager::new(&config.database_url).await?;
    info!("Running database migrations...");
    db_manager.run_migrations().await?;
    let db_arc = Arc::new(db_manager);
    info!("Database initialized successfully");

    info!("Initializing Telegram bot...");
    let bot = Bot::new(&config.telegram_bot_token);
    let notifier: Arc<dyn Notifier> = Arc::new(TelegramNotifier::new(bot.clone(), config.admin_chat_id));
    let engine = BookingEngine::sqlite(
        db_arc.pool.clone(),
        notifier.clone(),
        Arc::new(SystemClock),
        config.booking.clone(),
    );
    let ctx = Arc::new(BotContext {
        engine: engine.clone(),
        pool: db_arc.pool.clone(),
        notifier,
        admin_chat_id: config.admin_chat_id,
        session_ttl: Duration::minutes(config.session_ttl_minutes),
    });
    let handler = BotHandler::new(ctx);
    info!("Telegram bot initialized successfully");

    info!("Initializing reminder service...");
    let mut reminder_service = match ReminderService::new(engine, db_arc.pool.clone(), &config.reminder_cron).await {
        Ok(service) => service,
        Err(e) => {
            tracing::error!("Failed to create reminder service: {}", e);
            return Err(anyhow::anyhow!("Failed to create reminder service: {}", e));
        }
    };

    if let Err(e) = reminder_service.start().await {
        tracing::error!("Failed to start reminder service: {}", e);
    } else {
        info!("Reminder service started successfully");
    }

    let health_service = HealthService::new(db_arc.clone());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.http_port))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to port {}: {}", config.http_port, e))?;

    info!("Health check server starting on port {}", config.http_port);

    let bot_task = tokio::spawn(async move {
        Dispatcher::builder(bot, handler.schema())
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    });

    let health_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, health_service.router).await {
            tracing::error!("Health server error: {}", e);
        }
    });

    // Either task finishing means shutdown.
    tokio::select! {
        result = bot_task => {
            if let Err(e) = result {
                tracing::error!("Bot task error: {}", e);
            }
        }
        result = health_task => {
            if let Err(e) = result {
                tracing::error!("Health task error: {}", e);
            }
        }
    }

    if let Err(e) = reminder_service.stop().await {
        tracing::warn!("Error stopping reminder service: {}", e);
    }

    info!("Application stopped");
    Ok(())
}
