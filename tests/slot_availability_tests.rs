mod common;

use anyhow::Result;
use appointment_booking_bot::booking::hours::{DateException, OpeningWindow};
use appointment_booking_bot::database::models::business_hours::add_exception;
use appointment_booking_bot::database::models::Service;
use appointment_booking_bot::error::BookingError;
use chrono::Duration;
use common::*;

#[tokio::test]
async fn test_booked_slot_is_marked_unavailable() -> Result<()> {
    let ctx = TestContext::new(false).await?;
    let date = booking_date();

    ctx.engine.reserve_slot(ctx.request(CLIENT, date, 10, 0)).await?;

    let slots = ctx
        .engine
        .list_available_slots(ctx.provider.id, date, ctx.service.id)
        .await?;

    assert_eq!(slots.len(), 8);
    assert_eq!(slots[0].start, at(date, 9, 0));
    assert_eq!(slots[7].start, at(date, 16, 0));
    for slot in &slots {
        assert_eq!(slot.end - slot.start, Duration::minutes(60));
        assert_eq!(slot.available, slot.start != at(date, 10, 0), "slot at {}", slot.start);
    }

    Ok(())
}

#[tokio::test]
async fn test_slots_are_chronological() -> Result<()> {
    let ctx = TestContext::new(false).await?;

    let slots = ctx
        .engine
        .list_available_slots(ctx.provider.id, booking_date(), ctx.service.id)
        .await?;

    assert!(slots.windows(2).all(|pair| pair[0].start < pair[1].start));
    assert!(slots.iter().all(|slot| slot.available));
    Ok(())
}

#[tokio::test]
async fn test_long_service_only_offers_slots_that_end_by_close() -> Result<()> {
    let ctx = TestContext::new(false).await?;
    let long = Service::create(&ctx.db.pool, ctx.provider.id, "Extended session", 90, 8000).await?;
    let date = booking_date();

    let slots = ctx.engine.list_available_slots(ctx.provider.id, date, long.id).await?;

    assert_eq!(slots.len(), 7);
    assert_eq!(slots.last().unwrap().start, at(date, 15, 0));
    assert_eq!(slots.last().unwrap().end, at(date, 16, 30));
    Ok(())
}

#[tokio::test]
async fn test_overlap_with_longer_booking_blocks_neighbouring_slots() -> Result<()> {
    let ctx = TestContext::new(false).await?;
    let long = Service::create(&ctx.db.pool, ctx.provider.id, "Extended session", 90, 8000).await?;
    let date = booking_date();

    let mut request = ctx.request(CLIENT, date, 10, 0);
    request.service_id = long.id;
    ctx.engine.reserve_slot(request).await?;

    let slots = ctx
        .engine
        .list_available_slots(ctx.provider.id, date, ctx.service.id)
        .await?;
    let unavailable: Vec<_> = slots.iter().filter(|s| !s.available).map(|s| s.start).collect();

    // 10:00-11:30 touches both the 10:00 and the 11:00 hour.
    assert_eq!(unavailable, vec![at(date, 10, 0), at(date, 11, 0)]);
    Ok(())
}

#[tokio::test]
async fn test_cancelled_booking_frees_the_slot() -> Result<()> {
    let ctx = TestContext::new(false).await?;
    let date = booking_date();

    let appointment = ctx.engine.reserve_slot(ctx.request(CLIENT, date, 10, 0)).await?;
    ctx.engine
        .cancel(
            appointment.public_id,
            appointment_booking_bot::booking::Actor::client(CLIENT),
            None,
        )
        .await?;

    let slots = ctx
        .engine
        .list_available_slots(ctx.provider.id, date, ctx.service.id)
        .await?;
    assert!(slots.iter().all(|slot| slot.available));
    Ok(())
}

#[tokio::test]
async fn test_closed_exception_yields_no_slots() -> Result<()> {
    let ctx = TestContext::new(false).await?;
    let date = booking_date();
    add_exception(&ctx.db.pool, ctx.provider.id, date, &DateException::Closed).await?;

    let slots = ctx
        .engine
        .list_available_slots(ctx.provider.id, date, ctx.service.id)
        .await?;
    assert!(slots.is_empty());

    // The following day keeps its weekly hours.
    let next = ctx
        .engine
        .list_available_slots(ctx.provider.id, date + Duration::days(1), ctx.service.id)
        .await?;
    assert_eq!(next.len(), 8);
    Ok(())
}

#[tokio::test]
async fn test_latest_exception_for_a_date_wins() -> Result<()> {
    let ctx = TestContext::new(false).await?;
    let date = booking_date();
    let short = OpeningWindow::new(time(12, 0), time(14, 0), 30)?;

    add_exception(&ctx.db.pool, ctx.provider.id, date, &DateException::Closed).await?;
    add_exception(&ctx.db.pool, ctx.provider.id, date, &DateException::SpecialHours(short)).await?;

    let slots = ctx
        .engine
        .list_available_slots(ctx.provider.id, date, ctx.service.id)
        .await?;
    let starts: Vec<_> = slots.iter().map(|s| s.start).collect();
    assert_eq!(starts, vec![at(date, 12, 0), at(date, 12, 30), at(date, 13, 0)]);
    Ok(())
}

#[tokio::test]
async fn test_provider_offset_shifts_slots_to_utc() -> Result<()> {
    let ctx = TestContext::new(false).await?;
    let provider = seed_provider(&ctx.db.pool, 120).await?;
    let service = Service::create(&ctx.db.pool, provider.id, "Consultation", 60, 5000).await?;
    let date = booking_date();

    let slots = ctx.engine.list_available_slots(provider.id, date, service.id).await?;

    assert_eq!(slots.len(), 8);
    assert_eq!(slots[0].start, at(date, 7, 0));
    Ok(())
}

#[tokio::test]
async fn test_service_of_another_provider_is_not_found() -> Result<()> {
    let ctx = TestContext::new(false).await?;
    let other = seed_provider(&ctx.db.pool, 0).await?;

    let result = ctx
        .engine
        .list_available_slots(other.id, booking_date(), ctx.service.id)
        .await;
    assert!(matches!(result, Err(BookingError::NotFound("service"))));
    Ok(())
}

#[tokio::test]
async fn test_inactive_service_has_no_slots() -> Result<()> {
    let ctx = TestContext::new(false).await?;
    Service::set_active(&ctx.db.pool, ctx.service.id, false).await?;

    let result = ctx
        .engine
        .list_available_slots(ctx.provider.id, booking_date(), ctx.service.id)
        .await;
    assert!(matches!(result, Err(BookingError::NotFound("service"))));
    Ok(())
}

#[tokio::test]
async fn test_non_positive_duration_is_rejected() -> Result<()> {
    use appointment_booking_bot::booking::hours::SqliteBusinessHours;
    use appointment_booking_bot::booking::slots::SlotAvailabilityCalculator;
    use appointment_booking_bot::database::store::SqliteStore;
    use std::sync::Arc;

    let ctx = TestContext::new(false).await?;
    let calculator = SlotAvailabilityCalculator::new(
        Arc::new(SqliteBusinessHours::new(ctx.db.pool.clone())),
        Arc::new(SqliteStore::new(ctx.db.pool.clone())),
    );

    for duration in [0, -30] {
        let result = calculator.compute_slots(ctx.provider.id, booking_date(), duration).await;
        assert!(matches!(result, Err(BookingError::InvalidDuration)));
    }
    Ok(())
}

#[tokio::test]
async fn test_unrepresentable_duration_is_rejected() -> Result<()> {
    use appointment_booking_bot::booking::hours::SqliteBusinessHours;
    use appointment_booking_bot::booking::slots::SlotAvailabilityCalculator;
    use appointment_booking_bot::database::store::SqliteStore;
    use std::sync::Arc;

    let ctx = TestContext::new(false).await?;
    let calculator = SlotAvailabilityCalculator::new(
        Arc::new(SqliteBusinessHours::new(ctx.db.pool.clone())),
        Arc::new(SqliteStore::new(ctx.db.pool.clone())),
    );
    let result = calculator.compute_slots(ctx.provider.id, booking_date(), i64::MAX).await;
    assert!(matches!(result, Err(BookingError::InvalidDuration)));

    let endless = Service::create(&ctx.db.pool, ctx.provider.id, "Endless", i64::MAX, 0).await?;
    let result = ctx
        .engine
        .list_available_slots(ctx.provider.id, booking_date(), endless.id)
        .await;
    assert!(matches!(result, Err(BookingError::InvalidDuration)));

    // Representable as a duration, but no opening window can hold it.
    let epoch_long = Service::create(&ctx.db.pool, ctx.provider.id, "Epoch", 1_000_000_000_000, 0).await?;
    let slots = ctx
        .engine
        .list_available_slots(ctx.provider.id, booking_date(), epoch_long.id)
        .await?;
    assert!(slots.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_engine_over_static_hours() -> Result<()> {
    use appointment_booking_bot::booking::engine::BookingEngine;
    use appointment_booking_bot::booking::hours::{BusinessHoursConfig, StaticBusinessHours};
    use appointment_booking_bot::booking::notifier::NoopNotifier;
    use appointment_booking_bot::config::BookingConfig;
    use appointment_booking_bot::database::store::SqliteStore;
    use chrono::{FixedOffset, Weekday};
    use std::sync::Arc;

    let ctx = TestContext::new(false).await?;
    let date = booking_date();
    let hours = StaticBusinessHours::new().with_provider(
        ctx.provider.id,
        BusinessHoursConfig::new(FixedOffset::east_opt(0).unwrap())
            .with_weekly(Weekday::Mon, OpeningWindow::new(time(13, 0), time(15, 0), 60)?),
    );
    let store = Arc::new(SqliteStore::new(ctx.db.pool.clone()));
    let engine = BookingEngine::new(
        store.clone(),
        store,
        Arc::new(hours),
        Arc::new(NoopNotifier),
        ctx.clock.clone(),
        BookingConfig::default(),
    );

    let slots = engine.list_available_slots(ctx.provider.id, date, ctx.service.id).await?;
    let starts: Vec<_> = slots.iter().map(|s| s.start).collect();
    assert_eq!(starts, vec![at(date, 13, 0), at(date, 14, 0)]);

    // Tuesday has no weekly entry.
    let tuesday = engine
        .list_available_slots(ctx.provider.id, date + Duration::days(1), ctx.service.id)
        .await?;
    assert!(tuesday.is_empty());
    Ok(())
}
