// libs/doctor-cell/src/services/slots.rs
use chrono::NaiveTime;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_models::scheduling::{Session, Slot};
use shared_models::time::{self, from_minutes, minutes_between, to_minutes};

use crate::models::DoctorError;

/// Builds and validates slots inside a session's consult window.
pub struct SlotAllocator;

impl SlotAllocator {
    /// Seats a window can hold at the session cadence, never fewer than one.
    pub fn derive_capacity(start: NaiveTime, end: NaiveTime, avg_consult_time: u32) -> u32 {
        let minutes = minutes_between(start, end).max(0) as u32;
        if avg_consult_time == 0 {
            return 1;
        }
        (minutes / avg_consult_time).max(1)
    }

    pub fn create_slot(
        session: &Session,
        existing: &[Slot],
        start: NaiveTime,
        end: NaiveTime,
        max_bookings: Option<u32>,
    ) -> Result<Slot, DoctorError> {
        if start >= end {
            return Err(DoctorError::InvalidWindow(
                "Slot start time must be before end time".to_string(),
            ));
        }

        if !time::window_contains(session.window(), (start, end)) {
            return Err(DoctorError::InvalidWindow(format!(
                "Slot {}-{} must lie within session {}-{}",
                time::format_hhmm(start),
                time::format_hhmm(end),
                time::format_hhmm(session.consult_start),
                time::format_hhmm(session.consult_end),
            )));
        }

        if max_bookings == Some(0) {
            return Err(DoctorError::InvalidWindow(
                "max_bookings must be at least 1".to_string(),
            ));
        }

        if let Some(clash) = existing
            .iter()
            .filter(|slot| slot.session_id == session.id)
            .find(|slot| time::windows_overlap(slot.window(), (start, end)))
        {
            warn!("Slot {}-{} overlaps slot {} in session {}",
                  time::format_hhmm(start), time::format_hhmm(end), clash.id, session.id);
            return Err(DoctorError::OverlapConflict(format!(
                "Slot overlaps with existing slot {}-{}",
                time::format_hhmm(clash.start_time),
                time::format_hhmm(clash.end_time),
            )));
        }

        let capacity = max_bookings
            .unwrap_or_else(|| Self::derive_capacity(start, end, session.avg_consult_time));

        Ok(new_slot(session, start, end, capacity))
    }

    /// Fixed-duration slots tiling `[range_start, range_end)`; the last one is
    /// shorter when the range does not divide evenly.
    pub fn generate_slots(
        session: &Session,
        range_start: NaiveTime,
        range_end: NaiveTime,
        slot_duration: u32,
        avg_consult_time: u32,
    ) -> SlotTiling {
        debug!("Tiling {}-{} for session {} in {} minute slots",
               time::format_hhmm(range_start), time::format_hhmm(range_end), session.id, slot_duration);

        SlotTiling {
            session_id: session.id,
            doctor_id: session.doctor_id,
            start: to_minutes(range_start),
            cursor: to_minutes(range_start),
            end: to_minutes(range_end),
            slot_duration,
            avg_consult_time,
        }
    }
}

fn new_slot(session: &Session, start: NaiveTime, end: NaiveTime, max_bookings: u32) -> Slot {
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

/// Lazy slot sequence. Cloning or calling [`SlotTiling::restart`] replays the
/// same windows from the beginning.
#[derive(Debug, Clone)]
pub struct SlotTiling {
    session_id: Uuid,
    doctor_id: Uuid,
    start: u32,
    cursor: u32,
    end: u32,
    slot_duration: u32,
    avg_consult_time: u32,
}

impl SlotTiling {
    pub fn restart(&self) -> Self {
        Self {
            cursor: self.start,
            ..self.clone()
        }
    }
}

impl Iterator for SlotTiling {
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        if self.slot_duration == 0 || self.cursor >= self.end {
            return None;
        }

        let stop = (self.cursor + self.slot_duration).min(self.end);
        let start_time = from_minutes(self.cursor).ok()?;
        let end_time = from_minutes(stop).ok()?;
        self.cursor = stop;

        Some(Slot {
            id: Uuid::new_v4(),
            session_id: self.session_id,
            doctor_id: self.doctor_id,
            start_time,
            end_time,
            max_bookings: SlotAllocator::derive_capacity(start_time, end_time, self.avg_consult_time),
            is_booked: false,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.slot_duration == 0 || self.cursor >= self.end {
            return (0, Some(0));
        }
        let remaining = (self.end - self.cursor).div_ceil(self.slot_duration) as usize;
        (remaining, Some(remaining))
    }
}
