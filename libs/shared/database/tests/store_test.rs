// libs/shared/database/tests/store_test.rs
use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use shared_database::{ChangeSet, InMemoryStore, SchedulingStore, StoreError};
use shared_models::scheduling::{Appointment, AppointmentStatus, Doctor, Patient, Session, Slot};

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

fn session_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 20).unwrap()
}

fn doctor() -> Doctor {
    Doctor {
        id: Uuid::new_v4(),
        full_name: "Kavya Menon".to_string(),
        email: "kavya.menon@clinic.test".to_string(),
        specialization: Some("Dermatology".to_string()),
        bio: None,
        created_at: Utc::now(),
    }
}

fn patient() -> Patient {
    Patient {
        id: Uuid::new_v4(),
        full_name: "Arjun Das".to_string(),
        email: "arjun.das@mail.test".to_string(),
        age: Some(41),
        created_at: Utc::now(),
    }
}

fn session(doctor_id: Uuid) -> Session {
    Session {
        id: Uuid::new_v4(),
        doctor_id,
        session_date: session_day(),
        consult_start: hm(9, 0),
        consult_end: hm(11, 0),
        booking_start: hm(6, 0),
        avg_consult_time: 10,
        slot_duration: 30,
        is_active: true,
        recurring_template_id: None,
        created_at: Utc::now(),
    }
}

fn slot(session: &Session, start: NaiveTime, end: NaiveTime, max_bookings: u32) -> Slot {
    Slot {
        id: Uuid::new_v4(),
        session_id: session.id,
        doctor_id: session.doctor_id,
        start_time: start,
        end_time: end,
        max_bookings,
        is_booked: false,
    }
}

fn confirmed(patient_id: Uuid, slot: &Slot) -> Appointment {
    let now = Utc::now();
    Appointment {
        id: Uuid::new_v4(),
        patient_id,
        slot_id: Some(slot.id),
        status: AppointmentStatus::Confirmed,
        reporting_time: Some(slot.start_time),
        appointment_reason: None,
        cancellation_reason: None,
        created_at: now,
        updated_at: now,
    }
}

async fn seeded() -> (InMemoryStore, Doctor, Patient, Session, Slot) {
    let store = InMemoryStore::new();
    let doctor = doctor();
    let patient = patient();
    let session = session(doctor.id);
    let slot = slot(&session, hm(9, 0), hm(9, 30), 1);

    store
        .commit(
            ChangeSet::new()
                .with_doctor(doctor.clone())
                .with_patient(patient.clone())
                .with_session(session.clone())
                .with_slot(slot.clone()),
        )
        .await
        .unwrap();

    (store, doctor, patient, session, slot)
}

#[tokio::test]
async fn rejects_overlapping_slots_and_keeps_prior_state() {
    let (store, _, _, session, _) = seeded().await;
    let overlapping = slot(&session, hm(9, 15), hm(9, 45), 3);

    let result = store.commit(ChangeSet::new().with_slot(overlapping.clone())).await;

    assert_matches!(result, Err(StoreError::Conflict(_)));
    assert!(store.find_slot(overlapping.id).await.unwrap().is_none());
    assert_eq!(store.list_session_slots(session.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn rejects_slots_outside_the_session() {
    let (store, _, _, session, _) = seeded().await;
    let late = slot(&session, hm(10, 45), hm(11, 15), 3);

    assert_matches!(
        store.commit(ChangeSet::new().with_slot(late)).await,
        Err(StoreError::Conflict(_))
    );
}

#[tokio::test]
async fn rejects_bookings_beyond_capacity_atomically() {
    let (store, _, first, session, full) = seeded().await;
    let second = patient();
    let other_slot = slot(&session, hm(9, 30), hm(10, 0), 3);
    store
        .commit(ChangeSet::new().with_patient(second.clone()).with_slot(other_slot.clone()))
        .await
        .unwrap();
    store
        .commit(ChangeSet::new().with_appointment(confirmed(first.id, &full)))
        .await
        .unwrap();

    // The valid half of this change set must not land either.
    let fine = confirmed(second.id, &other_slot);
    let overflow = confirmed(second.id, &full);
    let result = store
        .commit(ChangeSet::new().with_appointment(fine.clone()).with_appointment(overflow))
        .await;

    assert_matches!(result, Err(StoreError::Conflict(_)));
    assert!(store.find_appointment(fine.id).await.unwrap().is_none());
}

#[tokio::test]
async fn rejects_active_appointments_without_a_slot() {
    let (store, _, patient, _, slot) = seeded().await;
    let mut appointment = confirmed(patient.id, &slot);
    appointment.slot_id = None;

    assert_matches!(
        store.commit(ChangeSet::new().with_appointment(appointment.clone())).await,
        Err(StoreError::Conflict(_))
    );

    appointment.status = AppointmentStatus::PendingReschedule;
    appointment.reporting_time = None;
    assert!(store.commit(ChangeSet::new().with_appointment(appointment)).await.is_ok());
}

#[tokio::test]
async fn rejects_deleting_a_referenced_slot() {
    let (store, _, patient, _, slot) = seeded().await;
    let appointment = confirmed(patient.id, &slot);
    store
        .commit(ChangeSet::new().with_appointment(appointment.clone()))
        .await
        .unwrap();

    let mut changes = ChangeSet::new();
    changes.deleted_slots.push(slot.id);
    assert_matches!(store.commit(changes).await, Err(StoreError::Conflict(_)));

    let mut detached = appointment;
    detached.slot_id = None;
    detached.status = AppointmentStatus::PendingReschedule;
    detached.reporting_time = None;
    let mut changes = ChangeSet::new().with_appointment(detached);
    changes.deleted_slots.push(slot.id);
    store.commit(changes).await.unwrap();

    assert!(store.find_slot(slot.id).await.unwrap().is_none());
}

#[tokio::test]
async fn rejects_duplicate_template_sessions() {
    let (store, doctor, _, _, _) = seeded().await;
    let template_id = Uuid::new_v4();
    let mut first = session(doctor.id);
    first.recurring_template_id = Some(template_id);
    let mut second = session(doctor.id);
    second.recurring_template_id = Some(template_id);

    store.commit(ChangeSet::new().with_session(first.clone())).await.unwrap();
    assert_matches!(
        store.commit(ChangeSet::new().with_session(second)).await,
        Err(StoreError::Conflict(_))
    );

    let found = store
        .find_session_by_template(doctor.id, session_day(), template_id)
        .await
        .unwrap();
    assert_eq!(found.map(|s| s.id), Some(first.id));
}

#[tokio::test]
async fn bookings_on_a_day_skip_cancelled_appointments() {
    let (store, _, patient, _, slot) = seeded().await;
    let mut appointment = confirmed(patient.id, &slot);
    store
        .commit(ChangeSet::new().with_appointment(appointment.clone()))
        .await
        .unwrap();

    let bookings = store.list_patient_bookings_on(patient.id, session_day()).await.unwrap();
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0].1.id, slot.id);

    appointment.status = AppointmentStatus::Cancelled;
    appointment.slot_id = None;
    store.commit(ChangeSet::new().with_appointment(appointment)).await.unwrap();

    assert!(store
        .list_patient_bookings_on(patient.id, session_day())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn delete_doctor_cancels_their_appointments() {
    let (store, doctor, patient, session, slot) = seeded().await;
    let appointment = confirmed(patient.id, &slot);
    store
        .commit(ChangeSet::new().with_appointment(appointment.clone()))
        .await
        .unwrap();

    store.delete_doctor(doctor.id).await.unwrap();

    assert!(store.find_doctor(doctor.id).await.unwrap().is_none());
    assert!(store.find_session(session.id).await.unwrap().is_none());
    assert!(store.find_slot(slot.id).await.unwrap().is_none());

    let cancelled = store.find_appointment(appointment.id).await.unwrap().unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    assert_eq!(cancelled.slot_id, None);

    assert_matches!(
        store.delete_doctor(doctor.id).await,
        Err(StoreError::NotFound { entity: "doctor", .. })
    );
}

#[tokio::test]
async fn doctor_listing_follows_slot_ownership() {
    let (store, first_doctor, patient, _, first_slot) = seeded().await;
    let other_doctor = doctor();
    let other_session = session(other_doctor.id);
    let other_slot = slot(&other_session, hm(9, 0), hm(9, 30), 2);
    store
        .commit(
            ChangeSet::new()
                .with_doctor(other_doctor.clone())
                .with_session(other_session)
                .with_slot(other_slot.clone()),
        )
        .await
        .unwrap();

    let mine = confirmed(patient.id, &first_slot);
    let theirs = confirmed(patient.id, &other_slot);
    let mut cancelled = confirmed(patient.id, &other_slot);
    cancelled.status = AppointmentStatus::Cancelled;
    cancelled.slot_id = None;
    store
        .commit(
            ChangeSet::new()
                .with_appointment(mine.clone())
                .with_appointment(theirs.clone())
                .with_appointment(cancelled),
        )
        .await
        .unwrap();

    let ids = |appointments: Vec<Appointment>| appointments.into_iter().map(|a| a.id).collect::<Vec<_>>();
    assert_eq!(ids(store.list_doctor_appointments(first_doctor.id).await.unwrap()), vec![mine.id]);
    assert_eq!(ids(store.list_doctor_appointments(other_doctor.id).await.unwrap()), vec![theirs.id]);
    assert_eq!(store.list_appointments().await.unwrap().len(), 3);
}

#[tokio::test]
async fn patient_search_matches_name_or_email() {
    let (store, _, arjun, _, _) = seeded().await;
    let mut other = patient();
    other.full_name = "Nila Bose".to_string();
    other.email = "nila@mail.test".to_string();
    store.commit(ChangeSet::new().with_patient(other.clone())).await.unwrap();

    let (found, total) = store.list_patients("ARJUN", 0, 10).await.unwrap();
    assert_eq!((found[0].id, total), (arjun.id, 1));

    let (found, _) = store.list_patients("nila@", 0, 10).await.unwrap();
    assert_eq!(found[0].id, other.id);

    let (page, total) = store.list_patients("", 1, 1).await.unwrap();
    assert_eq!((page.len(), total), (1, 2));
}
