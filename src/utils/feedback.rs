use teloxide::prelude::*;

use crate::error::BookingError;

/// Feedback types for different command outcomes
#[derive(Debug, Clone)]
pub enum FeedbackType {
    Success,
    Warning,
    Error,
    Info,
}

impl FeedbackType {
    fn emoji(&self) -> &'static str {
        match self {
            FeedbackType::Success => "✅",
            FeedbackType::Warning => "⚠️",
            FeedbackType::Error => "❌",
            FeedbackType::Info => "ℹ️",
        }
    }
}

/// Plain-text replies for bot commands
pub struct CommandFeedback {
    bot: Bot,
    chat_id: ChatId,
}

impl CommandFeedback {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }

    pub async fn send(&self, feedback_type: FeedbackType, message: &str) -> ResponseResult<Message> {
        self.bot
            .send_message(self.chat_id, format_feedback(&feedback_type, message))
            .await
    }

    pub async fn success(&self, message: &str) -> ResponseResult<Message> {
        self.send(FeedbackType::Success, message).await
    }

    pub async fn error(&self, message: &str) -> ResponseResult<Message> {
        self.send(FeedbackType::Error, message).await
    }

    pub async fn warning(&self, message: &str) -> ResponseResult<Message> {
        self.send(FeedbackType::Warning, message).await
    }

    pub async fn info(&self, message: &str) -> ResponseResult<Message> {
        self.send(FeedbackType::Info, message).await
    }

    /// Send validation error with helpful suggestion
    pub async fn validation_error(&self, error: &str, suggestion: &str) -> ResponseResult<Message> {
        let message = format!("{error}\n\n💡 Suggestion: {suggestion}");
        self.send(FeedbackType::Error, &message).await
    }

    /// Reports a failed booking operation in user terms.
    pub async fn booking_error(&self, err: &BookingError) -> ResponseResult<Message> {
        let feedback_type = match err {
            BookingError::AlreadyProcessed => FeedbackType::Info,
            BookingError::SlotUnavailable | BookingError::TooLateToCancel => FeedbackType::Warning,
            _ => FeedbackType::Error,
        };
        self.send(feedback_type, &booking_error_message(err)).await
    }
}

pub fn format_feedback(feedback_type: &FeedbackType, message: &str) -> String {
    format!("{} {}", feedback_type.emoji(), message)
}

/// User-facing text for a booking error. Infrastructure details stay in the logs.
pub fn booking_error_message(err: &BookingError) -> String {
    match err {
        BookingError::InvalidTimeRange(reason) => format!("That time can't be booked: {reason}."),
        BookingError::SlotUnavailable => "That slot was just taken. Please pick another one.".to_string(),
        BookingError::AlreadyProcessed => "This appointment was already handled.".to_string(),
        BookingError::InvalidTransition { from, .. } => {
            format!("That action isn't possible while the appointment is {from}.")
        }
        BookingError::NotFound(what) => {
            let mut chars = what.chars();
            match chars.next() {
                Some(first) => format!("{}{} not found.", first.to_uppercase(), chars.as_str()),
                None => "Not found.".to_string(),
            }
        }
        BookingError::TooLateToCancel => {
            "It's too late to cancel this appointment. Please contact us directly.".to_string()
        }
        BookingError::InvalidDuration => "This service has no valid duration.".to_string(),
        BookingError::Storage(_) | BookingError::Notification(_) | BookingError::Timeout(_) => {
            "Something went wrong. Please try again in a moment.".to_string()
        }
    }
}
