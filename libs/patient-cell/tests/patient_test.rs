// libs/patient-cell/tests/patient_test.rs
use assert_matches::assert_matches;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use appointment_cell::models::BookAppointmentRequest;
use appointment_cell::services::AppointmentBookingService;
use doctor_cell::models::CreateSessionRequest;
use doctor_cell::services::SessionService;
use patient_cell::models::PatientError;
use patient_cell::router::patient_routes;
use patient_cell::services::PatientService;
use shared_database::{ChangeSet, SchedulingStore};
use shared_models::scheduling::Patient;
use shared_utils::extractor::{USER_ID_HEADER, USER_ROLE_HEADER};
use shared_utils::test_utils::{at, date, hm, patient_fixture, TestContext, TestUser};

async fn registry() -> (TestContext, Vec<Patient>) {
    let ctx = TestContext::new(at(date(2025, 6, 20), 7, 0));
    let mut patients = ctx.seed_patients(3).await;
    let named = patient_fixture("Noor Haddad");
    ctx.store
        .commit(ChangeSet::new().with_patient(named.clone()))
        .await
        .unwrap();
    patients.push(named);
    (ctx, patients)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn directory_searches_name_and_email() {
    let (ctx, patients) = registry().await;
    let service = PatientService::new(&ctx.state);
    let staff = TestUser::doctor(Uuid::new_v4()).to_user();

    let by_name = service.list_patients(&staff, Some("  NOOR "), None, None).await.unwrap();
    assert_eq!(by_name.total, 1);
    assert_eq!(by_name.data[0].id, patients[3].id);

    let by_email = service.list_patients(&staff, Some("patient.2@"), None, None).await.unwrap();
    assert_eq!(by_email.data.iter().map(|p| p.id).collect::<Vec<_>>(), vec![patients[1].id]);

    let everyone = service.list_patients(&staff, None, None, None).await.unwrap();
    assert_eq!((everyone.total, everyone.page, everyone.limit), (4, 1, 10));
}

#[tokio::test]
async fn directory_is_paged_and_staff_only() {
    let (ctx, patients) = registry().await;
    let service = PatientService::new(&ctx.state);
    let admin = TestUser::admin().to_user();

    let first = service.list_patients(&admin, None, Some(1), Some(3)).await.unwrap();
    let second = service.list_patients(&admin, None, Some(2), Some(3)).await.unwrap();
    assert_eq!((first.data.len(), second.data.len()), (3, 1));
    assert_eq!(first.total_pages, 2);
    assert!(first.data.iter().all(|p| p.id != second.data[0].id));

    let patient = TestUser::patient(patients[0].id).to_user();
    assert_matches!(
        service.list_patients(&patient, None, None, None).await,
        Err(PatientError::Unauthorized)
    );
}

#[tokio::test]
async fn patient_record_includes_appointments() {
    let (ctx, patients) = registry().await;
    let doctor = ctx.seed_doctor("Sana Qureshi").await;
    let created = SessionService::new(&ctx.state)
        .create_session(
            doctor.id,
            CreateSessionRequest {
                session_date: date(2025, 6, 20),
                consult_start: hm(9, 0),
                consult_end: hm(11, 0),
                booking_start: hm(6, 0),
                avg_consult_time: 10,
                slot_duration: 30,
                is_active: None,
                generate_slots: None,
            },
        )
        .await
        .unwrap();
    let booked = AppointmentBookingService::new(&ctx.state)
        .book_appointment(
            patients[0].id,
            BookAppointmentRequest { slot_id: created.slots[1].id, appointment_reason: None },
        )
        .await
        .unwrap();

    let service = PatientService::new(&ctx.state);
    let own = service
        .get_patient(patients[0].id, &TestUser::patient(patients[0].id).to_user())
        .await
        .unwrap();
    assert_eq!(own.patient, patients[0]);
    assert_eq!(own.appointments.len(), 1);
    assert_eq!(own.appointments[0].id, booked.appointment.id);

    let by_doctor = service
        .get_patient(patients[0].id, &TestUser::doctor(doctor.id).to_user())
        .await
        .unwrap();
    assert_eq!(by_doctor.appointments.len(), 1);

    assert_matches!(
        service
            .get_patient(patients[0].id, &TestUser::patient(patients[1].id).to_user())
            .await,
        Err(PatientError::Unauthorized)
    );
    assert_matches!(
        service.get_patient(Uuid::new_v4(), &TestUser::admin().to_user()).await,
        Err(PatientError::NotFound)
    );
}

#[tokio::test]
async fn router_serves_the_directory() {
    let (ctx, patients) = registry().await;
    let app = patient_routes(ctx.state.clone());

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/?search=haddad&limit=5")
                .header(USER_ID_HEADER, Uuid::new_v4().to_string())
                .header(USER_ROLE_HEADER, "admin")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_json(response).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["limit"], 5);
    assert_eq!(page["data"][0]["full_name"], "Noor Haddad");

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/{}", patients[2].id))
                .header(USER_ID_HEADER, patients[2].id.to_string())
                .header(USER_ROLE_HEADER, "patient")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let record = body_json(response).await;
    assert_eq!(record["email"], "patient.3@mail.test");
    assert_eq!(record["appointments"].as_array().map(Vec::len), Some(0));
}
