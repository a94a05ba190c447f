use chrono::{FixedOffset, NaiveDate, NaiveTime, Offset, Utc};
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::booking::notifier::{MessageKind, NotificationRequest, Recipient};
use crate::booking::reservation::ReservationRequest;
use crate::booking::slots::Slot;
use crate::booking::state_machine::Actor;
use crate::bot::callback_data::CallbackAction;
use crate::bot::{BotContext, HandlerResult};
use crate::config::BookingConfig;
use crate::database::models::{Appointment, AppointmentStatus, Service};
use crate::utils::datetime::{format_datetime, parse_date, parse_time};
use crate::utils::feedback::CommandFeedback;
use crate::utils::logging::{log_command_error, log_command_start};
use crate::utils::validation::{validate_appointment_id, validate_reason, validate_service_id};

const MAX_SLOT_BUTTONS_PER_ROW: usize = 4;

pub fn user_of(msg: &Message) -> (i64, String) {
    msg.from()
        .map(|u| {
            (
                u.id.0 as i64,
                u.username.clone().unwrap_or_else(|| u.first_name.clone()),
            )
        })
        .unwrap_or((0, "unknown".to_string()))
}

/// Provider offset for display; UTC if it cannot be resolved.
pub async fn display_offset(ctx: &BotContext, provider_id: i64) -> FixedOffset {
    match ctx.engine.provider_timezone(provider_id).await {
        Ok(offset) => offset,
        Err(e) => {
            tracing::warn!("Falling back to UTC for provider {}: {}", provider_id, e);
            Utc.fix()
        }
    }
}

pub fn describe_appointment(appointment: &Appointment, service_name: Option<&str>, offset: FixedOffset) -> String {
    format!(
        "{} · {} · {} min · {}\nID: {}",
        format_datetime(&appointment.start_time, offset),
        service_name.unwrap_or("service"),
        appointment.duration_minutes,
        appointment.status,
        appointment.public_id
    )
}

pub fn slot_keyboard(service_id: i64, date: NaiveDate, slots: &[Slot], offset: FixedOffset) -> InlineKeyboardMarkup {
    let buttons: Vec<InlineKeyboardButton> = slots
        .iter()
        .filter(|slot| slot.available)
        .map(|slot| {
            let local = slot.start.with_timezone(&offset).time();
            InlineKeyboardButton::callback(
                local.format("%H:%M").to_string(),
                CallbackAction::PickSlot { service_id, date, time: local }.encode(),
            )
        })
        .collect();

    InlineKeyboardMarkup::new(
        buttons
            .chunks(MAX_SLOT_BUTTONS_PER_ROW)
            .map(|row| row.to_vec())
            .collect::<Vec<_>>(),
    )
}

pub fn service_keyboard(services: &[Service]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(services.iter().map(|service| {
        vec![InlineKeyboardButton::callback(
            format!("{} ({} min, {})", service.name, service.duration_minutes, service.display_price()),
            CallbackAction::PickService { service_id: service.id }.encode(),
        )]
    }))
}

pub async fn handle_services(bot: Bot, msg: Message, ctx: &BotContext) -> HandlerResult {
    let feedback = CommandFeedback::new(bot.clone(), msg.chat.id);

    let services = match ctx.engine.list_services().await {
        Ok(services) => services,
        Err(e) => {
            tracing::error!("Failed to list services: {}", e);
            feedback.booking_error(&e).await?;
            return Ok(());
        }
    };

    if services.is_empty() {
        feedback.info("No services are available right now.").await?;
        return Ok(());
    }

    bot.send_message(msg.chat.id, "Choose a service:")
        .reply_markup(service_keyboard(&services))
        .await?;
    Ok(())
}

/// Replies with the free slots of `service_id` on `date`.
pub async fn send_slots(bot: &Bot, chat_id: ChatId, ctx: &BotContext, service_id: i64, date: NaiveDate) -> HandlerResult {
    let feedback = CommandFeedback::new(bot.clone(), chat_id);

    let service = match ctx.engine.find_service(service_id).await {
        Ok(service) => service,
        Err(e) => {
            feedback.booking_error(&e).await?;
            return Ok(());
        }
    };

    let slots = match ctx
        .engine
        .list_available_slots(service.provider_id, date, service.id)
        .await
    {
        Ok(slots) => slots,
        Err(e) => {
            tracing::error!("Failed to compute slots for service {} on {}: {}", service.id, date, e);
            feedback.booking_error(&e).await?;
            return Ok(());
        }
    };

    if !slots.iter().any(|slot| slot.available) {
        feedback
            .info(&format!("No free slots for {} on {}.", service.name, date))
            .await?;
        return Ok(());
    }

    let offset = display_offset(ctx, service.provider_id).await;
    bot.send_message(chat_id, format!("Free slots for {} on {}:", service.name, date))
        .reply_markup(slot_keyboard(service.id, date, &slots, offset))
        .await?;
    Ok(())
}

pub async fn handle_slots(bot: Bot, msg: Message, ctx: &BotContext, service_id: String, date: String) -> HandlerResult {
    let (user_id, username) = user_of(&msg);
    log_command_start("slots", &username, user_id, msg.chat.id.0, Some(&format!("{service_id} {date}")));
    let feedback = CommandFeedback::new(bot.clone(), msg.chat.id);

    let service_id = match validate_service_id(&service_id) {
        Ok(id) => id,
        Err(e) => {
            feedback.validation_error(&e.to_string(), "Use /services to see service IDs.").await?;
            return Ok(());
        }
    };
    let date = match parse_date(&date) {
        Ok(date) => date,
        Err(e) => {
            feedback.validation_error(&e.to_string(), "Example: /slots 1 2024-05-06").await?;
            return Ok(());
        }
    };

    send_slots(&bot, msg.chat.id, ctx, service_id, date).await
}

/// Summary shown before a slot is booked. `time` is in the provider's local time.
pub fn booking_preview(service: &Service, date: NaiveDate, time: NaiveTime) -> String {
    format!(
        "Please check your booking:\n{}\n{} {}\n{} min · {}\n\nConfirm or cancel?",
        service.name,
        date.format("%Y-%m-%d"),
        time.format("%H:%M"),
        service.duration_minutes,
        service.display_price()
    )
}

pub fn confirmation_keyboard(service_id: i64, date: NaiveDate, time: NaiveTime) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(
            "✅ Confirm",
            CallbackAction::ConfirmSlot { service_id, date, time }.encode(),
        ),
        InlineKeyboardButton::callback("❌ Cancel", CallbackAction::AbortBooking.encode()),
    ]])
}

/// Sends the preview for a picked slot. Nothing is reserved until it is confirmed.
pub async fn send_booking_preview(
    bot: &Bot,
    chat_id: ChatId,
    ctx: &BotContext,
    service_id: i64,
    date: NaiveDate,
    time: NaiveTime,
) -> HandlerResult {
    let service = match ctx.engine.find_service(service_id).await {
        Ok(service) => service,
        Err(e) => {
            CommandFeedback::new(bot.clone(), chat_id).booking_error(&e).await?;
            return Ok(());
        }
    };

    bot.send_message(chat_id, booking_preview(&service, date, time))
        .reply_markup(confirmation_keyboard(service.id, date, time))
        .await?;
    Ok(())
}

/// Booking rules for `/faq`, derived from the running configuration.
pub fn faq_text(config: &BookingConfig) -> String {
    let approval = if config.approval_required {
        "Every request is reviewed by an administrator before it is confirmed."
    } else {
        "Bookings are scheduled as soon as you confirm them."
    };
    let reminders: Vec<&str> = config.reminder_leads.iter().map(|l| l.label.as_str()).collect();
    let reminders = if reminders.is_empty() {
        "We do not send reminders.".to_string()
    } else {
        format!("Reminders go out {} before your appointment.", reminders.join(" and "))
    };

    format!(
        "❓ FAQ / Terms\n\n\
         • Slots are reserved for one client at a time and follow the provider's opening hours.\n\
         • {}\n\
         • You can cancel with /cancel up to {} hours before the start.\n\
         • {}\n\n\
         By booking you agree to these terms.",
        approval,
        config.cancellation_window.num_hours(),
        reminders
    )
}

/// Reserves the slot, replies to the client and asks the admin chat for a decision.
pub async fn reserve_and_announce(
    bot: &Bot,
    chat_id: ChatId,
    client_id: i64,
    ctx: &BotContext,
    service_id: i64,
    date: NaiveDate,
    time: NaiveTime,
) -> HandlerResult {
    let feedback = CommandFeedback::new(bot.clone(), chat_id);

    let service = match ctx.engine.find_service(service_id).await {
        Ok(service) => service,
        Err(e) => {
            feedback.booking_error(&e).await?;
            return Ok(());
        }
    };

    let request = ReservationRequest {
        client_id,
        provider_id: service.provider_id,
        service_id: service.id,
        date,
        time,
    };

    let appointment = match ctx.engine.reserve_slot(request).await {
        Ok(appointment) => appointment,
        Err(e) => {
            if !e.is_domain() {
                tracing::error!("Reservation failed for client {}: {}", client_id, e);
            }
            feedback.booking_error(&e).await?;
            return Ok(());
        }
    };

    let offset = display_offset(ctx, service.provider_id).await;
    let summary = describe_appointment(&appointment, Some(&service.name), offset);
    if appointment.status == AppointmentStatus::PendingApproval {
        feedback
            .success(&format!("Request received, waiting for approval.\n{summary}"))
            .await?;
        ctx.notify(NotificationRequest {
            recipient: Recipient::AdminChat,
            kind: MessageKind::ApprovalRequested,
            appointment_id: appointment.public_id,
            label: None,
            starts_at: appointment.start_time,
        })
        .await;
    } else {
        feedback.success(&format!("Booked!\n{summary}")).await?;
    }

    Ok(())
}

pub async fn handle_book(
    bot: Bot,
    msg: Message,
    ctx: &BotContext,
    service_id: String,
    date: String,
    time: String,
) -> HandlerResult {
    let (user_id, username) = user_of(&msg);
    log_command_start("book", &username, user_id, msg.chat.id.0, Some(&format!("{service_id} {date} {time}")));
    let feedback = CommandFeedback::new(bot.clone(), msg.chat.id);

    let parsed = validate_service_id(&service_id)
        .and_then(|id| Ok((id, parse_date(&date)?, parse_time(&time)?)));
    let (service_id, date, time) = match parsed {
        Ok(parsed) => parsed,
        Err(e) => {
            feedback
                .validation_error(&e.to_string(), "Example: /book 1 2024-05-06 10:00")
                .await?;
            return Ok(());
        }
    };

    reserve_and_announce(&bot, msg.chat.id, user_id, ctx, service_id, date, time).await
}

pub async fn handle_my_bookings(bot: Bot, msg: Message, ctx: &BotContext) -> HandlerResult {
    let (user_id, _) = user_of(&msg);
    let feedback = CommandFeedback::new(bot.clone(), msg.chat.id);

    let appointments = match ctx.engine.list_client_appointments(user_id).await {
        Ok(appointments) => appointments,
        Err(e) => {
            tracing::error!("Failed to list bookings for {}: {}", user_id, e);
            feedback.booking_error(&e).await?;
            return Ok(());
        }
    };

    if appointments.is_empty() {
        feedback.info("You have no bookings yet. Use /services to book.").await?;
        return Ok(());
    }

    let mut lines = vec!["Your bookings:".to_string()];
    for appointment in &appointments {
        let offset = display_offset(ctx, appointment.provider_id).await;
        let name = ctx.engine.find_service(appointment.service_id).await.ok().map(|s| s.name);
        lines.push(describe_appointment(appointment, name.as_deref(), offset));
    }
    bot.send_message(msg.chat.id, lines.join("\n\n")).await?;
    Ok(())
}

pub async fn handle_cancel(bot: Bot, msg: Message, ctx: &BotContext, args: String) -> HandlerResult {
    let (user_id, username) = user_of(&msg);
    log_command_start("cancel", &username, user_id, msg.chat.id.0, Some(&args));
    let feedback = CommandFeedback::new(bot.clone(), msg.chat.id);

    let mut parts = args.trim().splitn(2, char::is_whitespace);
    let appointment_id = match validate_appointment_id(parts.next().unwrap_or_default()) {
        Ok(id) => id,
        Err(e) => {
            feedback
                .validation_error(&e.to_string(), "Use /mybookings to find the appointment ID.")
                .await?;
            return Ok(());
        }
    };
    let reason = match validate_reason(parts.next().unwrap_or_default()) {
        Ok(reason) => reason,
        Err(e) => {
            feedback.error(&e.to_string()).await?;
            return Ok(());
        }
    };

    let is_admin = ctx.is_admin_chat(msg.chat.id.0);
    let actor = if is_admin { Actor::admin(user_id) } else { Actor::client(user_id) };

    // Clients only see their own appointments.
    if !is_admin {
        match ctx.engine.find_appointment(appointment_id).await {
            Ok(appointment) if appointment.client_id == user_id => {}
            Ok(_) => {
                feedback.error("Appointment not found.").await?;
                return Ok(());
            }
            Err(e) => {
                feedback.booking_error(&e).await?;
                return Ok(());
            }
        }
    }

    match ctx.engine.cancel(appointment_id, actor, reason).await {
        Ok(appointment) => {
            feedback.success("Appointment cancelled.").await?;
            let recipient = if is_admin {
                Recipient::Client(appointment.client_id)
            } else {
                Recipient::AdminChat
            };
            ctx.notify(NotificationRequest {
                recipient,
                kind: MessageKind::Cancelled,
                appointment_id: appointment.public_id,
                label: None,
                starts_at: appointment.start_time,
            })
            .await;
        }
        Err(e) => {
            log_command_error("cancel", &username, user_id, msg.chat.id.0, &e.to_string());
            feedback.booking_error(&e).await?;
        }
    }

    Ok(())
}
