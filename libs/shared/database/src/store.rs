// libs/shared/database/src/store.rs
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use shared_models::scheduling::{
    occupancy, Appointment, Doctor, Patient, RecurringSession, Session, Slot,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Write rejected: {0}")]
    Conflict(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A slot together with every appointment that references it.
#[derive(Debug, Clone, Serialize)]
pub struct SlotBookings {
    pub slot: Slot,
    pub appointments: Vec<Appointment>,
}

impl SlotBookings {
    pub fn occupancy(&self) -> usize {
        occupancy(&self.appointments)
    }
}

/// Eagerly loaded session graph: slots ordered by start time.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSchedule {
    pub session: Session,
    pub slots: Vec<SlotBookings>,
}

impl SessionSchedule {
    pub fn booked_count(&self) -> usize {
        self.slots.iter().map(SlotBookings::occupancy).sum()
    }

    pub fn total_capacity(&self) -> u64 {
        self.slots.iter().map(|s| s.slot.max_bookings as u64).sum()
    }
}

/// Writes applied together by [`SchedulingStore::commit`]. Entries are upserts
/// keyed by id; `deleted_slots` are removed after the upserts land.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub doctors: Vec<Doctor>,
    pub patients: Vec<Patient>,
    pub recurring_sessions: Vec<RecurringSession>,
    pub sessions: Vec<Session>,
    pub slots: Vec<Slot>,
    pub appointments: Vec<Appointment>,
    pub deleted_slots: Vec<Uuid>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_doctor(mut self, doctor: Doctor) -> Self {
        self.doctors.push(doctor);
        self
    }

    pub fn with_patient(mut self, patient: Patient) -> Self {
        self.patients.push(patient);
        self
    }

    pub fn with_recurring_session(mut self, template: RecurringSession) -> Self {
        self.recurring_sessions.push(template);
        self
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.sessions.push(session);
        self
    }

    pub fn with_slot(mut self, slot: Slot) -> Self {
        self.slots.push(slot);
        self
    }

    pub fn with_slots(mut self, slots: impl IntoIterator<Item = Slot>) -> Self {
        self.slots.extend(slots);
        self
    }

    pub fn with_appointment(mut self, appointment: Appointment) -> Self {
        self.appointments.push(appointment);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.doctors.is_empty()
            && self.patients.is_empty()
            && self.recurring_sessions.is_empty()
            && self.sessions.is_empty()
            && self.slots.is_empty()
            && self.appointments.is_empty()
            && self.deleted_slots.is_empty()
    }
}

/// Persistence seam for the scheduling engine. `commit` must apply the whole
/// change set or nothing.
#[async_trait]
pub trait SchedulingStore: Send + Sync {
    async fn find_doctor(&self, id: Uuid) -> StoreResult<Option<Doctor>>;

    /// Case-insensitive match on name, email or specialization. Returns the
    /// requested page and the total number of matches.
    async fn list_doctors(&self, search: &str, offset: usize, limit: usize) -> StoreResult<(Vec<Doctor>, usize)>;

    async fn find_patient(&self, id: Uuid) -> StoreResult<Option<Patient>>;

    /// Case-insensitive match on name or email, newest first.
    async fn list_patients(&self, search: &str, offset: usize, limit: usize) -> StoreResult<(Vec<Patient>, usize)>;

    async fn find_session(&self, id: Uuid) -> StoreResult<Option<Session>>;

    async fn find_session_by_template(
        &self,
        doctor_id: Uuid,
        session_date: NaiveDate,
        template_id: Uuid,
    ) -> StoreResult<Option<Session>>;

    async fn load_session_schedule(&self, session_id: Uuid) -> StoreResult<Option<SessionSchedule>>;

    async fn find_slot(&self, id: Uuid) -> StoreResult<Option<Slot>>;

    async fn list_session_slots(&self, session_id: Uuid) -> StoreResult<Vec<Slot>>;

    async fn list_slot_appointments(&self, slot_id: Uuid) -> StoreResult<Vec<Appointment>>;

    async fn find_appointment(&self, id: Uuid) -> StoreResult<Option<Appointment>>;

    async fn list_patient_appointments(&self, patient_id: Uuid) -> StoreResult<Vec<Appointment>>;

    /// Appointments currently seated in one of the doctor's slots. Cancelled
    /// and pending appointments hold no slot and are not included.
    async fn list_doctor_appointments(&self, doctor_id: Uuid) -> StoreResult<Vec<Appointment>>;

    async fn list_appointments(&self) -> StoreResult<Vec<Appointment>>;

    /// Non-cancelled appointments of the patient whose slot belongs to a
    /// session on `date`, paired with that slot.
    async fn list_patient_bookings_on(
        &self,
        patient_id: Uuid,
        date: NaiveDate,
    ) -> StoreResult<Vec<(Appointment, Slot)>>;

    async fn list_recurring_sessions(&self, doctor_id: Uuid) -> StoreResult<Vec<RecurringSession>>;

    async fn commit(&self, changes: ChangeSet) -> StoreResult<()>;

    /// Remove a doctor with their templates, sessions and slots. Appointments
    /// on removed slots are cancelled.
    async fn delete_doctor(&self, id: Uuid) -> StoreResult<()>;
}
