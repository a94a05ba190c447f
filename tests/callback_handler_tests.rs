use appointment_booking_bot::booking::approval::Decision;
use appointment_booking_bot::bot::callback_data::{CallbackAction, CallbackParseError};
use appointment_booking_bot::database::models::CompletionResponse;
use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

#[test]
fn test_service_payload() {
    let action = CallbackAction::PickService { service_id: 12 };
    assert_eq!(action.encode(), "svc:12");
    assert_eq!(CallbackAction::parse("svc:12"), Ok(action));
}

#[test]
fn test_every_payload_fits_telegram_limit() {
    let id = Uuid::new_v4();
    let actions = [
        CallbackAction::PickService { service_id: i64::MAX },
        CallbackAction::PickSlot {
            service_id: i64::MAX,
            date: NaiveDate::from_ymd_opt(2030, 12, 31).unwrap(),
            time: NaiveTime::from_hms_opt(23, 30, 0).unwrap(),
        },
        CallbackAction::ConfirmSlot {
            service_id: i64::MAX,
            date: NaiveDate::from_ymd_opt(2030, 12, 31).unwrap(),
            time: NaiveTime::from_hms_opt(23, 30, 0).unwrap(),
        },
        CallbackAction::AbortBooking,
        CallbackAction::Resolve { decision: Decision::Reject, appointment_id: id },
        CallbackAction::Completion { response: CompletionResponse::Yes, appointment_id: id },
    ];

    for action in actions {
        let encoded = action.encode();
        assert!(encoded.len() <= 64, "{encoded} is {} bytes", encoded.len());
        assert_eq!(CallbackAction::parse(&encoded), Ok(action));
    }
}

#[test]
fn test_slot_pick_and_confirmation_carry_the_same_slot() {
    let date = NaiveDate::from_ymd_opt(2030, 3, 4).unwrap();
    let time = NaiveTime::from_hms_opt(10, 0, 0).unwrap();

    let confirm = CallbackAction::ConfirmSlot { service_id: 3, date, time };
    assert_eq!(confirm.encode(), "confirm:3:2030-03-04:1000");
    assert_eq!(
        CallbackAction::parse("slot:3:2030-03-04:1000"),
        Ok(CallbackAction::PickSlot { service_id: 3, date, time })
    );
    assert_eq!(CallbackAction::parse("confirm:3:2030-03-04:1000"), Ok(confirm));
    assert_eq!(CallbackAction::parse("abort"), Ok(CallbackAction::AbortBooking));
}

#[test]
fn test_completion_payload() {
    let id = Uuid::new_v4();
    assert_eq!(
        CallbackAction::parse(&format!("done:no:{id}")),
        Ok(CallbackAction::Completion { response: CompletionResponse::No, appointment_id: id })
    );
}

#[test]
fn test_malformed_payloads() {
    let cases = [
        "admin:approve:not-a-uuid",
        "admin:maybe:6f1c2b1e-3c4d-4e5f-8a9b-0c1d2e3f4a5b",
        "slot:1:2030-02-30:1000",
        "slot:1:2030-03-04:2500",
        "svc:",
        "svc:1:2",
        "confirm:1:2030-03-04",
        "confirm:x:2030-03-04:1000",
        "abort:now",
    ];
    for data in cases {
        assert!(
            matches!(CallbackAction::parse(data), Err(CallbackParseError::Malformed(_))),
            "{data} should be malformed"
        );
    }
}

#[test]
fn test_legacy_prefixes_are_unknown() {
    assert_eq!(
        CallbackAction::parse("vote:1:2"),
        Err(CallbackParseError::UnknownPrefix("vote".to_string()))
    );
    assert_eq!(
        CallbackAction::parse(""),
        Err(CallbackParseError::UnknownPrefix(String::new()))
    );
}
