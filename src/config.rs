use anyhow::{anyhow, Result};
use chrono::Duration;
use std::env;

use crate::utils::validation::validate_telegram_chat_id;

const DEFAULT_DATABASE_URL: &str = "sqlite:./data/bookings.db";

/// Upper bound for reminder leads, the cancellation window and the session TTL.
pub const MAX_HORIZON_DAYS: i64 = 365;

/// Process configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    pub database_url: String,
    pub http_port: u16,
    pub admin_chat_id: Option<i64>,
    pub session_ttl_minutes: i64,
    pub reminder_cron: String,
    pub booking: BookingConfig,
}

/// The booking core's view of the configuration.
#[derive(Debug, Clone)]
pub struct BookingConfig {
    /// New bookings start in `pending_approval` when true, `scheduled` otherwise.
    pub approval_required: bool,
    /// Clients may cancel only while `now < start - cancellation_window`.
    pub cancellation_window: Duration,
    /// Reminder lead times, keyed by label.
    pub reminder_leads: Vec<ReminderLead>,
    /// Upper bound on a single reserve/resolve/transition call.
    pub operation_timeout: std::time::Duration,
}

/// A named offset before an appointment's start at which a reminder is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderLead {
    pub label: String,
    pub lead: Duration,
}

impl ReminderLead {
    pub fn parse(label: &str) -> Result<Self> {
        let label = label.trim();
        Ok(Self {
            label: label.to_string(),
            lead: parse_lead_label(label)?,
        })
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            approval_required: true,
            cancellation_window: Duration::hours(24),
            reminder_leads: vec![
                ReminderLead { label: "24h".to_string(), lead: Duration::hours(24) },
                ReminderLead { label: "1h".to_string(), lead: Duration::hours(1) },
            ],
            operation_timeout: std::time::Duration::from_secs(5),
        }
    }
}

/// Parses a lead label such as `24h`, `90m` or `2d`.
pub fn parse_lead_label(label: &str) -> Result<Duration> {
    let label = label.trim();
    let unit = match label.chars().last() {
        Some(unit) if label.len() > unit.len_utf8() => unit,
        _ => return Err(anyhow!("Invalid reminder lead '{}'", label)),
    };

    let amount: i64 = label[..label.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| anyhow!("Invalid reminder lead '{}'", label))?;
    if amount <= 0 {
        return Err(anyhow!("Reminder lead must be positive: '{}'", label));
    }

    let minutes_per_unit = match unit {
        'm' => 1,
        'h' => 60,
        'd' => 24 * 60,
        _ => return Err(anyhow!("Invalid reminder lead unit in '{}'", label)),
    };

    amount
        .checked_mul(minutes_per_unit)
        .filter(|minutes| *minutes <= MAX_HORIZON_DAYS * 24 * 60)
        .and_then(Duration::try_minutes)
        .ok_or_else(|| anyhow!("Invalid reminder lead '{}': exceeds {} days", label, MAX_HORIZON_DAYS))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow!("Invalid {}", name)),
    }
}

fn var_or(name: &str, default: &str) -> String {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => default.to_string(),
    }
}

/// `DATABASE_URL`, or the default SQLite file.
pub fn database_url_from_env() -> String {
    var_or("DATABASE_URL", DEFAULT_DATABASE_URL)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let token = env::var("TELEGRAM_BOT_TOKEN")
            .map_err(|_| anyhow!("TELEGRAM_BOT_TOKEN must be set"))?;

        if token.trim().is_empty() {
            return Err(anyhow!("TELEGRAM_BOT_TOKEN must be set"));
        }

        let database_url = database_url_from_env();

        let http_port = var_or("HTTP_PORT", "3000")
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid HTTP_PORT"))?;

        let admin_chat_id = match env::var("ADMIN_CHAT_ID") {
            Ok(value) if !value.trim().is_empty() => {
                let id: i64 = value
                    .trim()
                    .parse()
                    .map_err(|_| anyhow!("Invalid ADMIN_CHAT_ID"))?;
                validate_telegram_chat_id(id).map_err(|_| anyhow!("Invalid ADMIN_CHAT_ID"))?;
                Some(id)
            }
            _ => None,
        };

        let approval_required = parse_bool("APPROVAL_REQUIRED", &var_or("APPROVAL_REQUIRED", "true"))?;

        let window_hours: i64 = var_or("CANCELLATION_WINDOW_HOURS", "24")
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid CANCELLATION_WINDOW_HOURS"))?;
        let cancellation_window = Some(window_hours)
            .filter(|hours| (0..=MAX_HORIZON_DAYS * 24).contains(hours))
            .and_then(Duration::try_hours)
            .ok_or_else(|| anyhow!("Invalid CANCELLATION_WINDOW_HOURS"))?;

        let reminder_leads = var_or("REMINDER_LEADS", "24h,1h")
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(ReminderLead::parse)
            .collect::<Result<Vec<_>>>()?;

        let timeout_secs: u64 = var_or("OPERATION_TIMEOUT_SECS", "5")
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid OPERATION_TIMEOUT_SECS"))?;
        if timeout_secs == 0 {
            return Err(anyhow!("Invalid OPERATION_TIMEOUT_SECS"));
        }

        let session_ttl_minutes: i64 = var_or("SESSION_TTL_MINUTES", "30")
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid SESSION_TTL_MINUTES"))?;
        if session_ttl_minutes <= 0 || session_ttl_minutes > MAX_HORIZON_DAYS * 24 * 60 {
            return Err(anyhow!("Invalid SESSION_TTL_MINUTES"));
        }

        Ok(Config {
            telegram_bot_token: token,
            database_url,
            http_port,
            admin_chat_id,
            session_ttl_minutes,
            reminder_cron: var_or("REMINDER_CRON", "0 */5 * * * *"),
            booking: BookingConfig {
                approval_required,
                cancellation_window,
                reminder_leads,
                operation_timeout: std::time::Duration::from_secs(timeout_secs),
            },
        })
    }
}
