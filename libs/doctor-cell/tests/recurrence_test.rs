// libs/doctor-cell/tests/recurrence_test.rs
use assert_matches::assert_matches;
use chrono::{Datelike, Weekday};
use futures::future::join_all;

use doctor_cell::models::{CreateRecurringSessionRequest, DoctorError};
use doctor_cell::services::{RecurrenceService, SessionService};
use shared_database::SchedulingStore;
use shared_utils::test_utils::{at, date, hm, TestContext};

fn template(day: Weekday) -> CreateRecurringSessionRequest {
    CreateRecurringSessionRequest {
        day,
        consult_start: hm(9, 0),
        consult_end: hm(11, 0),
        booking_start: hm(6, 0),
        avg_consult_time: 10,
        slot_duration: 30,
    }
}

// 2025-06-16 is a Monday.
fn context() -> TestContext {
    TestContext::new(at(date(2025, 6, 16), 8, 0))
}

#[tokio::test]
async fn expands_matching_weekdays_once() {
    let ctx = context();
    let doctor = ctx.seed_doctor("Rohan Das").await;
    let service = RecurrenceService::new(&ctx.state);
    service.create_template(doctor.id, template(Weekday::Mon)).await.unwrap();
    service.create_template(doctor.id, template(Weekday::Thu)).await.unwrap();

    let report = service.expand(doctor.id, 14).await.unwrap();

    assert_eq!(
        report.created_dates,
        vec![date(2025, 6, 16), date(2025, 6, 19), date(2025, 6, 23), date(2025, 6, 26)]
    );
    assert!(report.skipped_dates.is_empty());

    let session = ctx
        .store
        .find_session(report.created_session_ids[0])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.session_date.weekday(), Weekday::Mon);
    assert!(session.recurring_template_id.is_some());
    assert_eq!(session.window(), (hm(9, 0), hm(11, 0)));

    let slots = SessionService::new(&ctx.state)
        .list_session_slots(session.id)
        .await
        .unwrap();
    assert_eq!(slots.len(), 4);

    let again = service.expand(doctor.id, 14).await.unwrap();
    assert!(again.created_dates.is_empty());
    assert_eq!(again.skipped_dates.len(), 4);
}

#[tokio::test]
async fn concurrent_expansions_create_each_session_once() {
    let ctx = context();
    let doctor = ctx.seed_doctor("Rohan Das").await;
    let service = RecurrenceService::new(&ctx.state);
    service.create_template(doctor.id, template(Weekday::Wed)).await.unwrap();

    let runs = join_all((0..4).map(|_| service.expand(doctor.id, 21))).await;

    let created: usize = runs
        .into_iter()
        .map(|run| run.unwrap().created_dates.len())
        .sum();
    assert_eq!(created, 3);
}

#[tokio::test]
async fn rejects_duplicate_templates() {
    let ctx = context();
    let doctor = ctx.seed_doctor("Rohan Das").await;
    let service = RecurrenceService::new(&ctx.state);
    service.create_template(doctor.id, template(Weekday::Fri)).await.unwrap();

    assert_matches!(
        service.create_template(doctor.id, template(Weekday::Fri)).await,
        Err(DoctorError::DuplicateTemplate(_))
    );

    // Same day with a different window is a separate template.
    let afternoon = CreateRecurringSessionRequest {
        consult_start: hm(14, 0),
        consult_end: hm(16, 0),
        ..template(Weekday::Fri)
    };
    assert!(service.create_template(doctor.id, afternoon).await.is_ok());
}

#[tokio::test]
async fn expansion_requires_templates_and_a_sane_horizon() {
    let ctx = context();
    let doctor = ctx.seed_doctor("Rohan Das").await;
    let service = RecurrenceService::new(&ctx.state);

    assert_matches!(service.expand(doctor.id, 7).await, Err(DoctorError::TemplateNotFound));

    service.create_template(doctor.id, template(Weekday::Mon)).await.unwrap();
    assert_matches!(service.expand(doctor.id, 0).await, Err(DoctorError::InvalidWindow(_)));
    assert_matches!(service.expand(doctor.id, 91).await, Err(DoctorError::InvalidWindow(_)));
    assert!(service.expand(doctor.id, 90).await.is_ok());
}

#[tokio::test]
async fn template_windows_are_validated() {
    let ctx = context();
    let doctor = ctx.seed_doctor("Rohan Das").await;
    let service = RecurrenceService::new(&ctx.state);

    let inverted = CreateRecurringSessionRequest {
        consult_start: hm(12, 0),
        ..template(Weekday::Tue)
    };
    assert_matches!(
        service.create_template(doctor.id, inverted).await,
        Err(DoctorError::InvalidWindow(_))
    );
    assert_matches!(
        service.create_template(uuid::Uuid::new_v4(), template(Weekday::Tue)).await,
        Err(DoctorError::DoctorNotFound)
    );
}
