mod common;

use anyhow::Result;
use appointment_booking_bot::booking::approval::Decision;
use appointment_booking_bot::booking::notifier::{MessageKind, Recipient};
use appointment_booking_bot::database::models::{
    Appointment, BookingDraft, ChatSession, CompletionStage,
};
use appointment_booking_bot::services::reminder::ReminderService;
use chrono::Duration;
use common::*;

async fn confirmed(ctx: &TestContext, hour: u32) -> Result<Appointment> {
    let appointment = ctx.engine.reserve_slot(ctx.request(CLIENT, booking_date(), hour, 0)).await?;
    Ok(ctx
        .engine
        .resolve_approval(appointment.public_id, ADMIN, Decision::Approve, None)
        .await?)
}

fn labels(issued: &[appointment_booking_bot::booking::NotificationRequest]) -> Vec<String> {
    issued.iter().filter_map(|r| r.label.clone()).collect()
}

#[tokio::test]
async fn test_nothing_is_due_far_ahead() -> Result<()> {
    let ctx = TestContext::new(true).await?;
    confirmed(&ctx, 10).await?;

    let issued = ctx.engine.tick_reminders(initial_now()).await?;
    assert!(issued.is_empty());
    assert!(ctx.notifier.sent().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_each_reminder_is_sent_once() -> Result<()> {
    let ctx = TestContext::new(true).await?;
    let appointment = confirmed(&ctx, 10).await?;

    let day_before = appointment.start_time - Duration::hours(24);
    let issued = ctx.engine.tick_reminders(day_before).await?;
    assert_eq!(labels(&issued), vec!["24h"]);
    assert_eq!(issued[0].recipient, Recipient::Client(CLIENT));
    assert_eq!(issued[0].kind, MessageKind::Reminder);

    let again = ctx.engine.tick_reminders(day_before + Duration::minutes(5)).await?;
    assert!(again.is_empty());

    let hour_before = appointment.start_time - Duration::minutes(30);
    let issued = ctx.engine.tick_reminders(hour_before).await?;
    assert_eq!(labels(&issued), vec!["1h"]);

    let stored = ctx.engine.find_appointment(appointment.public_id).await?;
    assert_eq!(stored.reminder_sent.len(), 2);
    assert_eq!(stored.reminder_sent.get("24h"), Some(&day_before));
    assert_eq!(stored.reminder_sent.get("1h"), Some(&hour_before));
    assert_eq!(ctx.notifier.sent().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_pending_and_cancelled_appointments_get_no_reminders() -> Result<()> {
    let ctx = TestContext::new(true).await?;
    let date = booking_date();
    ctx.engine.reserve_slot(ctx.request(CLIENT, date, 10, 0)).await?;
    let cancelled = confirmed(&ctx, 12).await?;
    ctx.engine
        .cancel(
            cancelled.public_id,
            appointment_booking_bot::booking::Actor::admin(ADMIN),
            None,
        )
        .await?;

    let issued = ctx.engine.tick_reminders(at(date, 9, 30)).await?;
    assert!(issued.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_failed_delivery_is_retried_on_next_tick() -> Result<()> {
    let ctx = TestContext::new(true).await?;
    let appointment = confirmed(&ctx, 10).await?;
    let now = appointment.start_time - Duration::hours(2);

    ctx.notifier.set_failing(true);
    let issued = ctx.engine.tick_reminders(now).await?;
    assert!(issued.is_empty());
    let stored = ctx.engine.find_appointment(appointment.public_id).await?;
    assert!(stored.reminder_sent.is_empty());

    ctx.notifier.set_failing(false);
    let issued = ctx.engine.tick_reminders(now + Duration::minutes(5)).await?;
    assert_eq!(labels(&issued), vec!["24h"]);
    Ok(())
}

#[tokio::test]
async fn test_completion_prompt_after_end() -> Result<()> {
    let ctx = TestContext::new(true).await?;
    let appointment = confirmed(&ctx, 10).await?;

    // Still running at the end instant.
    let issued = ctx.engine.tick_reminders(appointment.end_time()).await?;
    assert!(issued.iter().all(|r| r.kind != MessageKind::CompletionPrompt));

    let after = appointment.end_time() + Duration::minutes(1);
    let issued = ctx.engine.tick_reminders(after).await?;
    assert_eq!(issued.len(), 1);
    assert_eq!(issued[0].kind, MessageKind::CompletionPrompt);
    assert_eq!(issued[0].recipient, Recipient::Client(CLIENT));

    let stored = ctx.engine.find_appointment(appointment.public_id).await?;
    assert_eq!(stored.completion.stage, Some(CompletionStage::AwaitingConfirmation));

    let again = ctx.engine.tick_reminders(after + Duration::minutes(5)).await?;
    assert!(again.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_reminder_service_runs_tick_and_purges_sessions() -> Result<()> {
    let ctx = TestContext::new(true).await?;
    let appointment = confirmed(&ctx, 10).await?;

    let mut stale = ChatSession::new(CLIENT, BookingDraft::default(), initial_now(), Duration::minutes(30));
    stale.save(&ctx.db.pool, initial_now(), Duration::minutes(30)).await?;

    ctx.clock.set(appointment.start_time - Duration::hours(3));
    let service = ReminderService::new(ctx.engine.clone(), ctx.db.pool.clone(), "0 */5 * * * *")
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let issued = service.run_now().await?;

    assert_eq!(labels(&issued), vec!["24h"]);
    let remaining = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM chat_sessions")
        .fetch_one(&ctx.db.pool)
        .await?;
    assert_eq!(remaining, 0);
    Ok(())
}

#[tokio::test]
async fn test_lead_beyond_the_calendar_does_not_break_the_tick() -> Result<()> {
    use appointment_booking_bot::config::{BookingConfig, ReminderLead};

    let ctx = TestContext::with_config(BookingConfig {
        reminder_leads: vec![ReminderLead {
            label: "far".to_string(),
            lead: Duration::try_days(100_000_000).unwrap(),
        }],
        ..BookingConfig::default()
    })
    .await?;
    let appointment = confirmed(&ctx, 10).await?;

    let issued = ctx.engine.tick_reminders(initial_now()).await?;
    assert_eq!(labels(&issued), vec!["far"]);

    let again = ctx.engine.tick_reminders(initial_now() + Duration::minutes(5)).await?;
    assert!(again.is_empty());

    let stored = ctx.engine.find_appointment(appointment.public_id).await?;
    assert!(stored.reminder_sent.contains_key("far"));
    Ok(())
}
