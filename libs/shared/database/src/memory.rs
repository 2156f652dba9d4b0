// libs/shared/database/src/memory.rs
//
// In-process store. Commits are staged on a copy of the tables, validated as
// a whole and only then swapped in, so a rejected change set leaves no trace.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_models::scheduling::{
    Appointment, AppointmentStatus, Doctor, Patient, RecurringSession, Session, Slot,
};
use shared_models::time;

use crate::store::{
    ChangeSet, SchedulingStore, SessionSchedule, SlotBookings, StoreError, StoreResult,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    doctors: HashMap<Uuid, Doctor>,
    patients: HashMap<Uuid, Patient>,
    recurring_sessions: HashMap<Uuid, RecurringSession>,
    sessions: HashMap<Uuid, Session>,
    slots: HashMap<Uuid, Slot>,
    appointments: HashMap<Uuid, Appointment>,
}

impl Tables {
    fn session_slots(&self, session_id: Uuid) -> Vec<Slot> {
        let mut slots: Vec<Slot> = self
            .slots
            .values()
            .filter(|slot| slot.session_id == session_id)
            .cloned()
            .collect();
        slots.sort_by_key(|slot| (slot.start_time, slot.end_time));
        slots
    }

    fn slot_appointments(&self, slot_id: Uuid) -> Vec<Appointment> {
        let mut appointments: Vec<Appointment> = self
            .appointments
            .values()
            .filter(|appointment| appointment.slot_id == Some(slot_id))
            .cloned()
            .collect();
        appointments.sort_by_key(Appointment::queue_key);
        appointments
    }

    fn apply(&mut self, changes: ChangeSet) {
        for doctor in changes.doctors {
            self.doctors.insert(doctor.id, doctor);
        }
        for patient in changes.patients {
            self.patients.insert(patient.id, patient);
        }
        for template in changes.recurring_sessions {
            self.recurring_sessions.insert(template.id, template);
        }
        for session in changes.sessions {
            self.sessions.insert(session.id, session);
        }
        for slot in changes.slots {
            self.slots.insert(slot.id, slot);
        }
        for appointment in changes.appointments {
            self.appointments.insert(appointment.id, appointment);
        }
        for slot_id in changes.deleted_slots {
            self.slots.remove(&slot_id);
        }
    }

    fn validate(
        &self,
        touched_sessions: &HashSet<Uuid>,
        touched_slots: &HashSet<Uuid>,
        touched_appointments: &HashSet<Uuid>,
        deleted_slots: &[Uuid],
    ) -> StoreResult<()> {
        for session_id in touched_sessions {
            let Some(session) = self.sessions.get(session_id) else {
                return Err(StoreError::NotFound { entity: "session", id: *session_id });
            };
            if session.consult_start >= session.consult_end {
                return Err(StoreError::Conflict(format!(
                    "session {} has an empty consult window",
                    session.id
                )));
            }
            if let Some(template_id) = session.recurring_template_id {
                let duplicate = self.sessions.values().any(|other| {
                    other.id != session.id
                        && other.doctor_id == session.doctor_id
                        && other.session_date == session.session_date
                        && other.recurring_template_id == Some(template_id)
                });
                if duplicate {
                    return Err(StoreError::Conflict(format!(
                        "session already exists for template {} on {}",
                        template_id, session.session_date
                    )));
                }
            }

            let slots = self.session_slots(*session_id);
            for slot in &slots {
                if slot.start_time >= slot.end_time
                    || !time::window_contains(session.window(), slot.window())
                {
                    return Err(StoreError::Conflict(format!(
                        "slot {} lies outside session {}",
                        slot.id, session.id
                    )));
                }
            }
            for pair in slots.windows(2) {
                if time::windows_overlap(pair[0].window(), pair[1].window()) {
                    return Err(StoreError::Conflict(format!(
                        "slots {} and {} overlap",
                        pair[0].id, pair[1].id
                    )));
                }
            }
        }

        for slot_id in touched_slots {
            let Some(slot) = self.slots.get(slot_id) else {
                continue;
            };
            if !self.sessions.contains_key(&slot.session_id) {
                return Err(StoreError::NotFound { entity: "session", id: slot.session_id });
            }
            if slot.max_bookings == 0 {
                return Err(StoreError::Conflict(format!("slot {} has no capacity", slot.id)));
            }
            let taken = self
                .appointments
                .values()
                .filter(|a| a.slot_id == Some(slot.id) && a.is_active())
                .count();
            if taken as u64 > slot.max_bookings as u64 {
                return Err(StoreError::Conflict(format!(
                    "slot {} would hold {} bookings for {} seats",
                    slot.id, taken, slot.max_bookings
                )));
            }
        }

        for appointment_id in touched_appointments {
            let Some(appointment) = self.appointments.get(appointment_id) else {
                continue;
            };
            match appointment.slot_id {
                Some(slot_id) if !self.slots.contains_key(&slot_id) => {
                    return Err(StoreError::NotFound { entity: "slot", id: slot_id });
                }
                None if appointment.is_active() => {
                    return Err(StoreError::Conflict(format!(
                        "appointment {} is {} without a slot",
                        appointment.id, appointment.status
                    )));
                }
                _ => {}
            }
        }

        for slot_id in deleted_slots {
            if self.appointments.values().any(|a| a.slot_id == Some(*slot_id)) {
                return Err(StoreError::Conflict(format!(
                    "slot {} is deleted while appointments still reference it",
                    slot_id
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(appointments: &mut [Appointment]) {
    appointments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
}

#[async_trait]
impl SchedulingStore for InMemoryStore {
    async fn find_doctor(&self, id: Uuid) -> StoreResult<Option<Doctor>> {
        Ok(self.tables.read().await.doctors.get(&id).cloned())
    }

    async fn list_doctors(&self, search: &str, offset: usize, limit: usize) -> StoreResult<(Vec<Doctor>, usize)> {
        let needle = search.trim().to_lowercase();
        let tables = self.tables.read().await;

        let mut matches: Vec<Doctor> = tables
            .doctors
            .values()
            .filter(|doctor| {
                needle.is_empty()
                    || doctor.full_name.to_lowercase().contains(&needle)
                    || doctor.email.to_lowercase().contains(&needle)
                    || doctor
                        .specialization
                        .as_deref()
                        .is_some_and(|s| s.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        let total = matches.len();
        let page = matches.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }

    async fn find_patient(&self, id: Uuid) -> StoreResult<Option<Patient>> {
        Ok(self.tables.read().await.patients.get(&id).cloned())
    }

    async fn list_patients(&self, search: &str, offset: usize, limit: usize) -> StoreResult<(Vec<Patient>, usize)> {
        let needle = search.trim().to_lowercase();
        let tables = self.tables.read().await;

        let mut matches: Vec<Patient> = tables
            .patients
            .values()
            .filter(|patient| {
                needle.is_empty()
                    || patient.full_name.to_lowercase().contains(&needle)
                    || patient.email.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        let total = matches.len();
        let page = matches.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }

    async fn find_session(&self, id: Uuid) -> StoreResult<Option<Session>> {
        Ok(self.tables.read().await.sessions.get(&id).cloned())
    }

    async fn find_session_by_template(
        &self,
        doctor_id: Uuid,
        session_date: NaiveDate,
        template_id: Uuid,
    ) -> StoreResult<Option<Session>> {
        Ok(self
            .tables
            .read()
            .await
            .sessions
            .values()
            .find(|s| {
                s.doctor_id == doctor_id
                    && s.session_date == session_date
                    && s.recurring_template_id == Some(template_id)
            })
            .cloned())
    }

    async fn load_session_schedule(&self, session_id: Uuid) -> StoreResult<Option<SessionSchedule>> {
        let tables = self.tables.read().await;
        let Some(session) = tables.sessions.get(&session_id).cloned() else {
            return Ok(None);
        };

        let slots = tables
            .session_slots(session_id)
            .into_iter()
            .map(|slot| {
                let appointments = tables.slot_appointments(slot.id);
                SlotBookings { slot, appointments }
            })
            .collect();

        Ok(Some(SessionSchedule { session, slots }))
    }

    async fn find_slot(&self, id: Uuid) -> StoreResult<Option<Slot>> {
        Ok(self.tables.read().await.slots.get(&id).cloned())
    }

    async fn list_session_slots(&self, session_id: Uuid) -> StoreResult<Vec<Slot>> {
        Ok(self.tables.read().await.session_slots(session_id))
    }

    async fn list_slot_appointments(&self, slot_id: Uuid) -> StoreResult<Vec<Appointment>> {
        Ok(self.tables.read().await.slot_appointments(slot_id))
    }

    async fn find_appointment(&self, id: Uuid) -> StoreResult<Option<Appointment>> {
        Ok(self.tables.read().await.appointments.get(&id).cloned())
    }

    async fn list_patient_appointments(&self, patient_id: Uuid) -> StoreResult<Vec<Appointment>> {
        let mut appointments: Vec<Appointment> = self
            .tables
            .read()
            .await
            .appointments
            .values()
            .filter(|a| a.patient_id == patient_id)
            .cloned()
            .collect();
        newest_first(&mut appointments);
        Ok(appointments)
    }

    async fn list_doctor_appointments(&self, doctor_id: Uuid) -> StoreResult<Vec<Appointment>> {
        let tables = self.tables.read().await;
        let mut appointments: Vec<Appointment> = tables
            .appointments
            .values()
            .filter(|a| {
                a.slot_id
                    .and_then(|slot_id| tables.slots.get(&slot_id))
                    .is_some_and(|slot| slot.doctor_id == doctor_id)
            })
            .cloned()
            .collect();
        newest_first(&mut appointments);
        Ok(appointments)
    }

    async fn list_appointments(&self) -> StoreResult<Vec<Appointment>> {
        let mut appointments: Vec<Appointment> =
            self.tables.read().await.appointments.values().cloned().collect();
        newest_first(&mut appointments);
        Ok(appointments)
    }

    async fn list_patient_bookings_on(
        &self,
        patient_id: Uuid,
        date: NaiveDate,
    ) -> StoreResult<Vec<(Appointment, Slot)>> {
        let tables = self.tables.read().await;
        let bookings = tables
            .appointments
            .values()
            .filter(|a| a.patient_id == patient_id && a.status != AppointmentStatus::Cancelled)
            .filter_map(|a| {
                let slot = tables.slots.get(&a.slot_id?)?;
                let session = tables.sessions.get(&slot.session_id)?;
                (session.session_date == date).then(|| (a.clone(), slot.clone()))
            })
            .collect();
        Ok(bookings)
    }

    async fn list_recurring_sessions(&self, doctor_id: Uuid) -> StoreResult<Vec<RecurringSession>> {
        let mut templates: Vec<RecurringSession> = self
            .tables
            .read()
            .await
            .recurring_sessions
            .values()
            .filter(|t| t.doctor_id == doctor_id)
            .cloned()
            .collect();
        templates.sort_by_key(|t| (t.day.num_days_from_monday(), t.consult_start, t.created_at));
        Ok(templates)
    }

    async fn commit(&self, changes: ChangeSet) -> StoreResult<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut tables = self.tables.write().await;

        let mut touched_sessions: HashSet<Uuid> = changes.sessions.iter().map(|s| s.id).collect();
        let mut touched_slots: HashSet<Uuid> = changes.slots.iter().map(|s| s.id).collect();
        let touched_appointments: HashSet<Uuid> = changes.appointments.iter().map(|a| a.id).collect();

        for slot in &changes.slots {
            touched_sessions.insert(slot.session_id);
        }
        for appointment in &changes.appointments {
            if let Some(slot_id) = appointment.slot_id {
                touched_slots.insert(slot_id);
            }
        }
        let deleted_slots = changes.deleted_slots.clone();

        let mut staged = tables.clone();
        staged.apply(changes);

        if let Err(e) = staged.validate(&touched_sessions, &touched_slots, &touched_appointments, &deleted_slots) {
            warn!("Rejected change set: {}", e);
            return Err(e);
        }

        *tables = staged;
        debug!(
            "Committed change set touching {} sessions, {} slots, {} appointments",
            touched_sessions.len(),
            touched_slots.len(),
            touched_appointments.len()
        );
        Ok(())
    }

    async fn delete_doctor(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.doctors.remove(&id).is_none() {
            return Err(StoreError::NotFound { entity: "doctor", id });
        }

        tables.recurring_sessions.retain(|_, t| t.doctor_id != id);
        tables.sessions.retain(|_, s| s.doctor_id != id);

        let removed_slots: HashSet<Uuid> = tables
            .slots
            .values()
            .filter(|slot| slot.doctor_id == id)
            .map(|slot| slot.id)
            .collect();
        tables.slots.retain(|slot_id, _| !removed_slots.contains(slot_id));

        let now = Utc::now();
        for appointment in tables.appointments.values_mut() {
            if appointment.slot_id.is_some_and(|slot_id| removed_slots.contains(&slot_id)) {
                appointment.slot_id = None;
                appointment.reporting_time = None;
                appointment.status = AppointmentStatus::Cancelled;
                appointment.cancellation_reason = Some("Doctor no longer available".to_string());
                appointment.updated_at = now;
            }
        }

        debug!("Removed doctor {} with {} slots", id, removed_slots.len());
        Ok(())
    }
}
