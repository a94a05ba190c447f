use std::sync::Arc;
use teloxide::prelude::*;

use crate::booking::approval::Decision;
use crate::booking::notifier::{MessageKind, NotificationRequest, Recipient};
use crate::bot::callback_data::CallbackAction;
use crate::bot::commands::booking;
use crate::bot::{BotContext, HandlerResult};
use crate::database::models::{BookingDraft, ChatSession, CompletionResponse};
use crate::error::BookingError;
use crate::utils::feedback::booking_error_message;

pub async fn callback_handler(bot: Bot, q: CallbackQuery, ctx: Arc<BotContext>) -> HandlerResult {
    let user_id = q.from.id.0 as i64;
    let username = q.from.username.as_deref().unwrap_or("unknown");
    let chat_id = q.message.as_ref().map(|m| m.chat.id);

    let Some(data) = q.data.clone() else {
        bot.answer_callback_query(q.id).text("Invalid callback data").await?;
        return Ok(());
    };
    tracing::info!(
        "Callback received: '{}' from user {} ({}) in chat {:?}",
        data, username, user_id, chat_id
    );

    let action = match CallbackAction::parse(&data) {
        Ok(action) => action,
        Err(e) => {
            tracing::warn!("Rejected callback data '{}': {}", data, e);
            bot.answer_callback_query(q.id).text("This button is no longer valid").await?;
            return Ok(());
        }
    };

    match action {
        CallbackAction::PickService { service_id } => {
            bot.answer_callback_query(q.id.clone()).await?;
            let now = ctx.engine.now();
            let mut session = ChatSession::new(
                user_id,
                BookingDraft { service_id: Some(service_id), date: None },
                now,
                ctx.session_ttl,
            );
            if let Err(e) = session.save(&ctx.pool, now, ctx.session_ttl).await {
                tracing::error!("Failed to save chat session for {}: {}", user_id, e);
            }
            if let Some(chat_id) = chat_id {
                bot.send_message(chat_id, "Which date? Send it as YYYY-MM-DD.").await?;
            }
        }
        CallbackAction::PickSlot { service_id, date, time } => {
            bot.answer_callback_query(q.id.clone()).await?;
            if let Err(e) = ChatSession::clear(&ctx.pool, user_id).await {
                tracing::warn!("Failed to clear chat session for {}: {}", user_id, e);
            }
            if let Some(chat_id) = chat_id {
                booking::send_booking_preview(&bot, chat_id, &ctx, service_id, date, time).await?;
            }
        }
        CallbackAction::ConfirmSlot { service_id, date, time } => {
            bot.answer_callback_query(q.id.clone()).text("Booking…").await?;
            if let Some(message) = &q.message {
                // Drop the buttons so the preview cannot be confirmed twice.
                if let Err(e) = bot.edit_message_reply_markup(message.chat.id, message.id).await {
                    tracing::warn!("Failed to clear preview buttons: {}", e);
                }
            }
            if let Some(chat_id) = chat_id {
                booking::reserve_and_announce(&bot, chat_id, user_id, &ctx, service_id, date, time).await?;
            }
        }
        CallbackAction::AbortBooking => {
            bot.answer_callback_query(q.id.clone()).await?;
            if let Err(e) = ChatSession::clear(&ctx.pool, user_id).await {
                tracing::warn!("Failed to clear chat session for {}: {}", user_id, e);
            }
            if let Some(message) = &q.message {
                if let Err(e) = bot
                    .edit_message_text(message.chat.id, message.id, "Booking cancelled. Nothing was reserved.")
                    .await
                {
                    tracing::warn!("Failed to update booking preview: {}", e);
                }
            }
        }
        CallbackAction::Resolve { decision, appointment_id } => {
            if !chat_id.map_or(false, |id| ctx.is_admin_chat(id.0)) {
                bot.answer_callback_query(q.id).text("Only admins can decide").await?;
                return Ok(());
            }

            match ctx.engine.resolve_approval(appointment_id, user_id, decision, None).await {
                Ok(appointment) => {
                    let (label, kind) = match decision {
                        Decision::Approve => ("Approved", MessageKind::Approved),
                        Decision::Reject => ("Rejected", MessageKind::Rejected),
                    };
                    bot.answer_callback_query(q.id.clone()).text(label).await?;
                    if let Some(message) = &q.message {
                        let text = format!("{} by {}\nID: {}", label, username, appointment.public_id);
                        if let Err(e) = bot.edit_message_text(message.chat.id, message.id, text).await {
                            tracing::warn!("Failed to update approval message: {}", e);
                        }
                    }
                    ctx.notify(NotificationRequest {
                        recipient: Recipient::Client(appointment.client_id),
                        kind,
                        appointment_id: appointment.public_id,
                        label: None,
                        starts_at: appointment.start_time,
                    })
                    .await;
                }
                Err(e) => {
                    if matches!(e, BookingError::Storage(_) | BookingError::Timeout(_)) {
                        tracing::error!("Approval of {} failed: {}", appointment_id, e);
                    }
                    bot.answer_callback_query(q.id).text(booking_error_message(&e)).await?;
                }
            }
        }
        CallbackAction::Completion { response, appointment_id } => {
            match ctx.engine.find_appointment(appointment_id).await {
                Ok(appointment) if appointment.client_id == user_id => {}
                Ok(_) | Err(BookingError::NotFound(_)) => {
                    bot.answer_callback_query(q.id).text("Appointment not found").await?;
                    return Ok(());
                }
                Err(e) => {
                    bot.answer_callback_query(q.id).text(booking_error_message(&e)).await?;
                    return Ok(());
                }
            }

            match ctx.engine.record_completion_response(appointment_id, response).await {
                Ok(_) => {
                    let text = match response {
                        CompletionResponse::Yes => "Thanks! We'll finish up on our side.",
                        CompletionResponse::No => "Thanks for letting us know. We'll be in touch.",
                    };
                    bot.answer_callback_query(q.id).text(text).await?;
                }
                Err(e) => {
                    bot.answer_callback_query(q.id).text(booking_error_message(&e)).await?;
                }
            }
        }
    }

    Ok(())
}
