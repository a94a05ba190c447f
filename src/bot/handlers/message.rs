use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::bot::commands::admin::{self, AdminAction};
use crate::bot::commands::booking::{self, user_of};
use crate::bot::commands::Command;
use crate::bot::{BotContext, HandlerResult};
use crate::database::models::ChatSession;
use crate::utils::datetime::parse_date;
use crate::utils::feedback::CommandFeedback;

pub async fn command_handler(bot: Bot, msg: Message, cmd: Command, ctx: Arc<BotContext>) -> HandlerResult {
    match cmd {
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string()).await?;
        }
        Command::Start => {
            bot.send_message(
                msg.chat.id,
                "👋 Welcome!\n\nUse /services to pick a service and book a time.\nUse /mybookings to see your appointments.\nUse /faq for booking rules.\nUse /help to see all commands.",
            )
            .await?;
        }
        Command::Services => booking::handle_services(bot, msg, &ctx).await?,
        Command::Slots { service_id, date } => {
            booking::handle_slots(bot, msg, &ctx, service_id, date).await?
        }
        Command::Book { service_id, date, time } => {
            booking::handle_book(bot, msg, &ctx, service_id, date, time).await?
        }
        Command::MyBookings => booking::handle_my_bookings(bot, msg, &ctx).await?,
        Command::Faq => {
            bot.send_message(msg.chat.id, booking::faq_text(ctx.engine.config())).await?;
        }
        Command::Cancel { args } => booking::handle_cancel(bot, msg, &ctx, args).await?,
        Command::Pending => admin::handle_pending(bot, msg, &ctx).await?,
        Command::Confirm { appointment_id } => {
            admin::handle_lifecycle(bot, msg, &ctx, AdminAction::Confirm, appointment_id).await?
        }
        Command::StartAppt { appointment_id } => {
            admin::handle_lifecycle(bot, msg, &ctx, AdminAction::Start, appointment_id).await?
        }
        Command::Complete { appointment_id } => {
            admin::handle_lifecycle(bot, msg, &ctx, AdminAction::Complete, appointment_id).await?
        }
        Command::NoShow { appointment_id } => {
            admin::handle_lifecycle(bot, msg, &ctx, AdminAction::NoShow, appointment_id).await?
        }
    }
    Ok(())
}

pub async fn photo_handler(bot: Bot, msg: Message, ctx: Arc<BotContext>) -> HandlerResult {
    admin::handle_proof_photo(bot, msg, &ctx).await
}

/// Free text continues a booking started from /services: the expected input is a date.
pub async fn text_handler(bot: Bot, msg: Message, ctx: Arc<BotContext>) -> HandlerResult {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    if text.starts_with('/') {
        bot.send_message(msg.chat.id, "Unknown command or missing arguments. Use /help.").await?;
        return Ok(());
    }

    let (user_id, _) = user_of(&msg);
    let now = ctx.engine.now();
    let session = match ChatSession::load(&ctx.pool, user_id, now).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!("Failed to load chat session for {}: {}", user_id, e);
            return Ok(());
        }
    };

    let Some(mut session) = session else {
        return Ok(());
    };
    let Some(service_id) = session.draft.service_id else {
        return Ok(());
    };

    let date = match parse_date(text) {
        Ok(date) => date,
        Err(e) => {
            CommandFeedback::new(bot.clone(), msg.chat.id)
                .validation_error(&e.to_string(), "Send a date like 2024-05-06.")
                .await?;
            return Ok(());
        }
    };

    session.draft.date = Some(date);
    if let Err(e) = session.save(&ctx.pool, now, ctx.session_ttl).await {
        tracing::warn!("Failed to save chat session for {}: {}", user_id, e);
    }

    booking::send_slots(&bot, msg.chat.id, &ctx, service_id, date).await
}
