// libs/shared/models/src/scheduling.rs
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::time::{self, hhmm, hhmm_option};

// ==============================================================================
// PEOPLE
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub specialization: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub age: Option<u32>,
    pub created_at: DateTime<Utc>,
}

// ==============================================================================
// SESSIONS AND SLOTS
// ==============================================================================

/// Weekly template from which dated sessions are materialized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecurringSession {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub day: Weekday,
    #[serde(with = "hhmm")]
    pub consult_start: NaiveTime,
    #[serde(with = "hhmm")]
    pub consult_end: NaiveTime,
    #[serde(with = "hhmm")]
    pub booking_start: NaiveTime,
    pub avg_consult_time: u32,
    pub slot_duration: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub session_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub consult_start: NaiveTime,
    #[serde(with = "hhmm")]
    pub consult_end: NaiveTime,
    #[serde(with = "hhmm")]
    pub booking_start: NaiveTime,
    pub avg_consult_time: u32,
    pub slot_duration: u32,
    pub is_active: bool,
    pub recurring_template_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn window(&self) -> (NaiveTime, NaiveTime) {
        (self.consult_start, self.consult_end)
    }

    pub fn day(&self) -> Weekday {
        chrono::Datelike::weekday(&self.session_date)
    }

    /// Anchor a wall-clock time of this session to its calendar date.
    pub fn at(&self, time: NaiveTime) -> NaiveDateTime {
        self.session_date.and_time(time)
    }

    pub fn total_minutes(&self) -> i64 {
        time::minutes_between(self.consult_start, self.consult_end)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Slot {
    pub id: Uuid,
    pub session_id: Uuid,
    pub doctor_id: Uuid,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub max_bookings: u32,
    pub is_booked: bool,
}

impl Slot {
    pub fn window(&self) -> (NaiveTime, NaiveTime) {
        (self.start_time, self.end_time)
    }

    pub fn duration_minutes(&self) -> i64 {
        time::minutes_between(self.start_time, self.end_time)
    }

    /// Re-derive the booked flag from the live confirmed+rescheduled count.
    /// Returns true when the flag changed.
    pub fn sync_booked(&mut self, occupancy: usize) -> bool {
        let booked = occupancy as u64 >= self.max_bookings as u64;
        let changed = self.is_booked != booked;
        self.is_booked = booked;
        changed
    }
}

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Confirmed,
    Rescheduled,
    Cancelled,
    Missed,
    PendingReschedule,
}

impl AppointmentStatus {
    /// Statuses that hold a seat in their slot.
    pub fn occupies_slot(&self) -> bool {
        matches!(self, AppointmentStatus::Confirmed | AppointmentStatus::Rescheduled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Rescheduled => write!(f, "rescheduled"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Missed => write!(f, "missed"),
            AppointmentStatus::PendingReschedule => write!(f, "pending_reschedule"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub slot_id: Option<Uuid>,
    pub status: AppointmentStatus,
    #[serde(with = "hhmm_option")]
    pub reporting_time: Option<NaiveTime>,
    pub appointment_reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn is_active(&self) -> bool {
        self.status.occupies_slot()
    }

    /// Queue position inside a slot: reporting time, then arrival order.
    pub fn queue_key(&self) -> (Option<NaiveTime>, DateTime<Utc>, Uuid) {
        (self.reporting_time, self.created_at, self.id)
    }

    pub fn creation_key(&self) -> (DateTime<Utc>, Uuid) {
        (self.created_at, self.id)
    }
}

/// Count of seats taken in a slot.
pub fn occupancy<'a>(appointments: impl IntoIterator<Item = &'a Appointment>) -> usize {
    appointments.into_iter().filter(|a| a.is_active()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booked_flag_follows_capacity() {
        let mut slot = Slot {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            max_bookings: 3,
            is_booked: false,
        };
        assert!(!slot.sync_booked(2));
        assert!(slot.sync_booked(3));
        assert!(slot.is_booked);
        assert!(slot.sync_booked(1));
        assert!(!slot.is_booked);
    }

    #[test]
    fn appointment_serializes_reporting_time_as_hhmm() {
        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            slot_id: None,
            status: AppointmentStatus::PendingReschedule,
            reporting_time: NaiveTime::from_hms_opt(10, 20, 0),
            appointment_reason: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        };
        let value = serde_json::to_value(&appointment).unwrap();
        assert_eq!(value["reporting_time"], "10:20");
        assert_eq!(value["status"], "pending_reschedule");
    }
}
