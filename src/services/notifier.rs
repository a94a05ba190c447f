use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::booking::notifier::{MessageKind, NotificationRequest, Notifier, NotifyError, Recipient};
use crate::bot::callback_data::CallbackAction;
use crate::bot::commands::admin::approval_keyboard;
use crate::database::models::CompletionResponse;

/// Delivers notification requests as Telegram messages.
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
    admin_chat_id: Option<i64>,
}

impl TelegramNotifier {
    pub fn new(bot: Bot, admin_chat_id: Option<i64>) -> Self {
        Self { bot, admin_chat_id }
    }
}

pub fn notification_text(request: &NotificationRequest) -> String {
    let when = request.starts_at.format("%a %d %b %Y %H:%M UTC");
    let id = request.appointment_id;
    match request.kind {
        MessageKind::Reminder => format!(
            "⏰ Reminder ({}): your appointment starts {}.\nID: {}",
            request.label.as_deref().unwrap_or("upcoming"),
            when,
            id
        ),
        MessageKind::CompletionPrompt => {
            format!("Did your appointment on {when} take place?\nID: {id}")
        }
        MessageKind::ApprovalRequested => format!("📥 New booking request for {when}.\nID: {id}"),
        MessageKind::Approved => format!("✅ Your appointment on {when} is confirmed.\nID: {id}"),
        MessageKind::Rejected => format!("❌ Your booking request for {when} was declined.\nID: {id}"),
        MessageKind::Cancelled => format!("🚫 The appointment on {when} was cancelled.\nID: {id}"),
        MessageKind::NoShow => format!("The appointment on {when} was marked as missed.\nID: {id}"),
        MessageKind::Completed => format!("🎉 The appointment on {when} is complete. Thank you!\nID: {id}"),
    }
}

fn keyboard(request: &NotificationRequest) -> Option<InlineKeyboardMarkup> {
    let id = request.appointment_id;
    match request.kind {
        MessageKind::ApprovalRequested => Some(approval_keyboard(id)),
        MessageKind::CompletionPrompt => Some(InlineKeyboardMarkup::new(vec![vec![
            InlineKeyboardButton::callback(
                "Yes",
                CallbackAction::Completion { response: CompletionResponse::Yes, appointment_id: id }.encode(),
            ),
            InlineKeyboardButton::callback(
                "No",
                CallbackAction::Completion { response: CompletionResponse::No, appointment_id: id }.encode(),
            ),
        ]])),
        _ => None,
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, request: &NotificationRequest) -> Result<(), NotifyError> {
        let chat_id = match request.recipient {
            Recipient::Client(id) => id,
            Recipient::AdminChat => match self.admin_chat_id {
                Some(id) => id,
                None => {
                    tracing::debug!("No admin chat configured; dropping {:?}", request.kind);
                    return Ok(());
                }
            },
        };

        let send = self.bot.send_message(ChatId(chat_id), notification_text(request));
        let result = match keyboard(request) {
            Some(markup) => send.reply_markup(markup).await,
            None => send.await,
        };

        result.map(|_| ()).map_err(|e| NotifyError {
            recipient: request.recipient,
            reason: e.to_string(),
        })
    }
}
