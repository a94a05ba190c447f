use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use uuid::Uuid;

use crate::booking::approval::Decision;
use crate::booking::notifier::{MessageKind, NotificationRequest, Recipient};
use crate::booking::state_machine::Actor;
use crate::bot::callback_data::CallbackAction;
use crate::bot::commands::booking::{describe_appointment, display_offset, user_of};
use crate::bot::{BotContext, HandlerResult};
use crate::database::models::Appointment;
use crate::error::BookingError;
use crate::utils::feedback::CommandFeedback;
use crate::utils::logging::{log_command_error, log_command_start};
use crate::utils::validation::validate_appointment_id;

/// Lifecycle commands available in the admin chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    Confirm,
    Start,
    Complete,
    NoShow,
}

impl AdminAction {
    fn name(&self) -> &'static str {
        match self {
            AdminAction::Confirm => "confirm",
            AdminAction::Start => "start_appt",
            AdminAction::Complete => "complete",
            AdminAction::NoShow => "noshow",
        }
    }

    /// What the client is told afterwards, if anything.
    fn client_message(&self) -> Option<MessageKind> {
        match self {
            AdminAction::Confirm => Some(MessageKind::Approved),
            AdminAction::Start => None,
            AdminAction::Complete => Some(MessageKind::Completed),
            AdminAction::NoShow => Some(MessageKind::NoShow),
        }
    }
}

async fn reject_non_admin(bot: &Bot, msg: &Message, ctx: &BotContext) -> Result<bool, teloxide::RequestError> {
    if ctx.is_admin_chat(msg.chat.id.0) {
        return Ok(false);
    }
    CommandFeedback::new(bot.clone(), msg.chat.id)
        .error("This command is only available in the admin chat.")
        .await?;
    Ok(true)
}

pub fn approval_keyboard(appointment_id: Uuid) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(
            "✅ Approve",
            CallbackAction::Resolve { decision: Decision::Approve, appointment_id }.encode(),
        ),
        InlineKeyboardButton::callback(
            "❌ Reject",
            CallbackAction::Resolve { decision: Decision::Reject, appointment_id }.encode(),
        ),
    ]])
}

pub async fn handle_pending(bot: Bot, msg: Message, ctx: &BotContext) -> HandlerResult {
    if reject_non_admin(&bot, &msg, ctx).await? {
        return Ok(());
    }
    let feedback = CommandFeedback::new(bot.clone(), msg.chat.id);

    let pending = match ctx.engine.list_pending_approvals().await {
        Ok(pending) => pending,
        Err(e) => {
            tracing::error!("Failed to list pending approvals: {}", e);
            feedback.booking_error(&e).await?;
            return Ok(());
        }
    };

    if pending.is_empty() {
        feedback.info("No requests are waiting for approval.").await?;
        return Ok(());
    }

    for appointment in &pending {
        let offset = display_offset(ctx, appointment.provider_id).await;
        let name = ctx.engine.find_service(appointment.service_id).await.ok().map(|s| s.name);
        let text = format!(
            "Client {}\n{}",
            appointment.client_id,
            describe_appointment(appointment, name.as_deref(), offset)
        );
        bot.send_message(msg.chat.id, text)
            .reply_markup(approval_keyboard(appointment.public_id))
            .await?;
    }
    Ok(())
}

async fn apply(ctx: &BotContext, action: AdminAction, appointment_id: Uuid, actor: Actor) -> Result<Appointment, BookingError> {
    match action {
        AdminAction::Confirm => ctx.engine.confirm(appointment_id, actor).await,
        AdminAction::Start => ctx.engine.start_appointment(appointment_id, actor).await,
        AdminAction::Complete => ctx.engine.complete_appointment(appointment_id, actor).await,
        AdminAction::NoShow => ctx.engine.mark_no_show(appointment_id, actor).await,
    }
}

pub async fn handle_lifecycle(
    bot: Bot,
    msg: Message,
    ctx: &BotContext,
    action: AdminAction,
    appointment_id: String,
) -> HandlerResult {
    let (user_id, username) = user_of(&msg);
    log_command_start(action.name(), &username, user_id, msg.chat.id.0, Some(&appointment_id));
    if reject_non_admin(&bot, &msg, ctx).await? {
        return Ok(());
    }
    let feedback = CommandFeedback::new(bot.clone(), msg.chat.id);

    let appointment_id = match validate_appointment_id(&appointment_id) {
        Ok(id) => id,
        Err(e) => {
            feedback
                .validation_error(&e.to_string(), &format!("Usage: /{} <appointment_id>", action.name()))
                .await?;
            return Ok(());
        }
    };

    match apply(ctx, action, appointment_id, Actor::admin(user_id)).await {
        Ok(appointment) => {
            feedback
                .success(&format!("Appointment {} is now {}.", appointment.public_id, appointment.status))
                .await?;
            if let Some(kind) = action.client_message() {
                ctx.notify(NotificationRequest {
                    recipient: Recipient::Client(appointment.client_id),
                    kind,
                    appointment_id: appointment.public_id,
                    label: None,
                    starts_at: appointment.start_time,
                })
                .await;
            }
        }
        Err(e) => {
            log_command_error(action.name(), &username, user_id, msg.chat.id.0, &e.to_string());
            feedback.booking_error(&e).await?;
        }
    }
    Ok(())
}

/// Parses a `proof <appointment_id>` photo caption.
pub fn parse_proof_caption(caption: &str) -> Option<Uuid> {
    let mut words = caption.split_whitespace();
    match (words.next(), words.next(), words.next()) {
        (Some(keyword), Some(id), None) if keyword.eq_ignore_ascii_case("proof") => Uuid::parse_str(id).ok(),
        _ => None,
    }
}

/// Admin photo captioned `proof <id>`: records completion proof.
pub async fn handle_proof_photo(bot: Bot, msg: Message, ctx: &BotContext) -> HandlerResult {
    if !ctx.is_admin_chat(msg.chat.id.0) {
        return Ok(());
    }
    let feedback = CommandFeedback::new(bot.clone(), msg.chat.id);

    let Some(appointment_id) = msg.caption().and_then(parse_proof_caption) else {
        feedback
            .validation_error("Photo caption not recognised.", "Caption proof photos as: proof <appointment_id>")
            .await?;
        return Ok(());
    };

    let Some(file_id) = msg.photo().and_then(|sizes| sizes.last()).map(|p| p.file.id.clone()) else {
        return Ok(());
    };

    match ctx.engine.record_proof_upload(appointment_id, &file_id).await {
        Ok(appointment) => {
            feedback.success("Proof stored. Appointment completed.").await?;
            ctx.notify(NotificationRequest {
                recipient: Recipient::Client(appointment.client_id),
                kind: MessageKind::Completed,
                appointment_id: appointment.public_id,
                label: None,
                starts_at: appointment.start_time,
            })
            .await;
        }
        Err(e) => {
            tracing::warn!("Proof upload for {} rejected: {}", appointment_id, e);
            feedback.booking_error(&e).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_proof_caption() {
        let id = Uuid::new_v4();
        assert_eq!(parse_proof_caption(&format!("proof {id}")), Some(id));
        assert_eq!(parse_proof_caption(&format!("PROOF  {id}")), Some(id));
        assert_eq!(parse_proof_caption("proof"), None);
        assert_eq!(parse_proof_caption(&format!("proof {id} extra")), None);
        assert_eq!(parse_proof_caption("receipt 123"), None);
    }
}
