use anyhow::{anyhow, Result};
use uuid::Uuid;

pub fn validate_appointment_id(input: &str) -> Result<Uuid> {
    let input = input.trim();
    if input.is_empty() {
        return Err(anyhow!("Appointment ID cannot be empty"));
    }
    Uuid::parse_str(input).map_err(|_| anyhow!("Invalid appointment ID '{}'", input))
}

pub fn validate_service_id(input: &str) -> Result<i64> {
    let id: i64 = input
        .trim()
        .parse()
        .map_err(|_| anyhow!("Invalid service ID '{}'", input.trim()))?;
    if id <= 0 {
        return Err(anyhow!("Service ID must be positive"));
    }
    Ok(id)
}

pub fn validate_telegram_chat_id(chat_id: i64) -> Result<()> {
    if chat_id == 0 {
        return Err(anyhow!("Chat ID cannot be zero"));
    }

    if chat_id > 2147483647 {
        return Err(anyhow!("Invalid user chat ID range"));
    }

    // Supergroup ids go down to about -1e12.
    if chat_id < -2000000000000 {
        return Err(anyhow!("Chat ID out of valid range"));
    }

    Ok(())
}

/// Cancellation reasons are free text shown to the other party.
pub fn validate_reason(reason: &str) -> Result<Option<String>> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Ok(None);
    }
    if reason.len() > 200 {
        return Err(anyhow!("Reason cannot be longer than 200 characters"));
    }
    Ok(Some(reason.to_string()))
}
