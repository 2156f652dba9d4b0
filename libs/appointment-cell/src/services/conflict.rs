// libs/appointment-cell/src/services/conflict.rs
use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::SchedulingConfig;
use shared_database::SchedulingStore;
use shared_models::scheduling::{Session, Slot};
use shared_models::time::windows_overlap;

use crate::models::AppointmentError;

pub struct ConflictDetectionService {
    store: Arc<dyn SchedulingStore>,
}

impl ConflictDetectionService {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self { store }
    }

    /// Bookable interval of a session: from booking start until shortly
    /// before consultation ends. Half-open.
    pub fn booking_window(
        session: &Session,
        config: &SchedulingConfig,
    ) -> (NaiveDateTime, NaiveDateTime) {
        let opens = session.at(session.booking_start);
        let closes = session.at(session.consult_end)
            - Duration::minutes(config.booking_close_minutes as i64);
        (opens, closes)
    }

    pub fn ensure_booking_open(
        session: &Session,
        config: &SchedulingConfig,
        now: NaiveDateTime,
    ) -> Result<(), AppointmentError> {
        let (opens, closes) = Self::booking_window(session, config);
        if now < opens || now >= closes {
            warn!("Booking for session {} attempted at {} outside {} - {}",
                  session.id, now, opens, closes);
            return Err(AppointmentError::BookingWindowClosed);
        }
        Ok(())
    }

    /// Fails when the patient already holds a non-cancelled appointment on the
    /// same day whose slot overlaps `slot`.
    pub async fn check_patient_overlap(
        &self,
        patient_id: Uuid,
        session: &Session,
        slot: &Slot,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<(), AppointmentError> {
        debug!("Checking overlaps for patient {} on {}", patient_id, session.session_date);

        let bookings = self
            .store
            .list_patient_bookings_on(patient_id, session.session_date)
            .await?;

        let clash = bookings
            .iter()
            .filter(|(appointment, _)| Some(appointment.id) != exclude_appointment_id)
            .find(|(_, booked)| windows_overlap(booked.window(), slot.window()));

        if let Some((appointment, _)) = clash {
            warn!("Patient {} already booked appointment {} overlapping slot {}",
                  patient_id, appointment.id, slot.id);
            return Err(AppointmentError::OverlappingBooking);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared_utils::test_utils::{at, date, hm};

    fn session() -> Session {
        Session {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            session_date: date(2025, 6, 20),
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

    #[test]
    fn booking_window_is_half_open() {
        let session = session();
        let config = SchedulingConfig::default();
        let day = date(2025, 6, 20);

        assert!(ConflictDetectionService::ensure_booking_open(&session, &config, at(day, 6, 0)).is_ok());
        assert!(ConflictDetectionService::ensure_booking_open(&session, &config, at(day, 10, 49)).is_ok());
        assert_eq!(
            ConflictDetectionService::ensure_booking_open(&session, &config, at(day, 10, 50)),
            Err(AppointmentError::BookingWindowClosed)
        );
        assert_eq!(
            ConflictDetectionService::ensure_booking_open(&session, &config, at(day, 5, 59)),
            Err(AppointmentError::BookingWindowClosed)
        );
    }
}
