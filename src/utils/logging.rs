use tracing::{debug, error, info, warn};

/// Logs command start with consistent format
pub fn log_command_start(command: &str, user: &str, user_id: i64, chat_id: i64, details: Option<&str>) {
    match details {
        Some(d) => info!(
            "CMD_START: {} by {}({}) in chat {} - {}",
            command, user, user_id, chat_id, d
        ),
        None => info!(
            "CMD_START: {} by {}({}) in chat {}",
            command, user, user_id, chat_id
        ),
    }
}

/// Logs command errors with consistent format
pub fn log_command_error(command: &str, user: &str, user_id: i64, chat_id: i64, error: &str) {
    error!(
        "CMD_ERROR: {} by {}({}) in chat {} - {}",
        command, user, user_id, chat_id, error
    );
}

/// Logs booking milestones (reserved, response recorded, proof received)
pub fn log_booking_event(event: &str, appointment: &str, details: Option<&str>) {
    match details {
        Some(d) => info!("BOOKING: {} {} - {}", event, appointment, d),
        None => info!("BOOKING: {} {}", event, appointment),
    }
}

/// Logs an applied status change
pub fn log_transition(appointment: &str, from: &str, to: &str, actor_id: i64) {
    info!("TRANSITION: {} {} -> {} by {}", appointment, from, to, actor_id);
}

/// Logs a rejected status change; callers should never request these
pub fn log_transition_defect(appointment: &str, from: &str, to: &str) {
    error!("TRANSITION: rejected {} {} -> {}", appointment, from, to);
}

/// Logs a lost reservation or approval race
pub fn log_race_lost(operation: &str, subject: &str) {
    info!("RACE: {} lost for {}", operation, subject);
}

/// Logs database operations with consistent format
pub fn log_database_operation(operation: &str, table: &str, details: Option<&str>) {
    match details {
        Some(d) => debug!("DB_OP: {} on {} - {}", operation, table, d),
        None => debug!("DB_OP: {} on {}", operation, table),
    }
}

/// Logs database errors with consistent format
pub fn log_database_error(operation: &str, table: &str, error: &str, details: Option<&str>) {
    match details {
        Some(d) => error!("DB_ERROR: {} on {} failed: {} - {}", operation, table, error, d),
        None => error!("DB_ERROR: {} on {} failed: {}", operation, table, error),
    }
}

/// Logs timeout events with consistent format
pub fn log_timeout(operation: &str, duration_secs: u64, details: Option<&str>) {
    match details {
        Some(d) => warn!("TIMEOUT: {} after {}s - {}", operation, duration_secs, d),
        None => warn!("TIMEOUT: {} after {}s", operation, duration_secs),
    }
}

/// Logs a failed outbound notification
pub fn log_notification_failure(kind: &str, appointment: &str, error: &str) {
    warn!("NOTIFY_ERROR: {} for {} - {}", kind, appointment, error);
}

/// Logs system events with consistent format
pub fn log_system_event(event: &str, details: Option<&str>) {
    match details {
        Some(d) => info!("SYSTEM: {} - {}", event, d),
        None => info!("SYSTEM: {}", event),
    }
}
