pub mod callback_data;
pub mod commands;
pub mod handlers;

use chrono::Duration;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::booking::engine::BookingEngine;
use crate::booking::notifier::{NotificationRequest, Notifier};
use crate::utils::logging::log_notification_failure;

pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Everything a handler needs; shared across updates.
pub struct BotContext {
    pub engine: BookingEngine,
    pub pool: SqlitePool,
    pub notifier: Arc<dyn Notifier>,
    pub admin_chat_id: Option<i64>,
    pub session_ttl: Duration,
}

impl BotContext {
    pub fn is_admin_chat(&self, chat_id: i64) -> bool {
        self.admin_chat_id == Some(chat_id)
    }

    /// Sends a notification; failures are logged and otherwise ignored.
    pub async fn notify(&self, request: NotificationRequest) {
        if let Err(e) = self.notifier.notify(&request).await {
            log_notification_failure(
                &format!("{:?}", request.kind),
                &request.appointment_id.to_string(),
                &e.to_string(),
            );
        }
    }
}
