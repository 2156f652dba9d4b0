// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{ChangeSet, SchedulingLocks, SchedulingStore};
use shared_models::auth::User;
use shared_models::pagination::{Page, PageRequest};
use shared_models::scheduling::{occupancy, Appointment, AppointmentStatus, Session, Slot};
use shared_models::time::{add_minutes, format_hhmm, window_contains};
use shared_utils::{AppState, Clock};

use crate::models::{
    AppointmentDetails, AppointmentError, BookAppointmentRequest, BookingResult,
    DEFAULT_CANCELLATION_REASON,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::lifecycle::{AppointmentAction, AppointmentLifecycleService};

pub struct AppointmentBookingService {
    config: Arc<AppConfig>,
    store: Arc<dyn SchedulingStore>,
    locks: Arc<SchedulingLocks>,
    clock: Arc<dyn Clock>,
    conflict_service: ConflictDetectionService,
    lifecycle_service: AppointmentLifecycleService,
}

impl AppointmentBookingService {
    pub fn new(state: &AppState) -> Self {
        Self {
            config: Arc::clone(&state.config),
            store: Arc::clone(&state.store),
            locks: Arc::clone(&state.locks),
            clock: Arc::clone(&state.clock),
            conflict_service: ConflictDetectionService::new(Arc::clone(&state.store)),
            lifecycle_service: AppointmentLifecycleService::new(),
        }
    }

    async fn load_slot(&self, slot_id: Uuid) -> Result<Slot, AppointmentError> {
        self.store
            .find_slot(slot_id)
            .await?
            .ok_or(AppointmentError::SlotNotFound)
    }

    /// The slot's session, which must be active and contain the slot.
    async fn bookable_session(&self, slot: &Slot) -> Result<Session, AppointmentError> {
        let session = self
            .store
            .find_session(slot.session_id)
            .await?
            .ok_or(AppointmentError::SessionNotFound)?;

        if !session.is_active {
            warn!("Slot {} belongs to inactive session {}", slot.id, session.id);
            return Err(AppointmentError::SessionInactive);
        }
        if !window_contains(session.window(), slot.window()) {
            return Err(AppointmentError::InvalidWindow(format!(
                "Slot {}-{} lies outside the session window",
                format_hhmm(slot.start_time),
                format_hhmm(slot.end_time)
            )));
        }
        Ok(session)
    }

    async fn load_owned_appointment(
        &self,
        appointment_id: Uuid,
        patient_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self
            .store
            .find_appointment(appointment_id)
            .await?
            .ok_or(AppointmentError::AppointmentNotFound)?;

        if appointment.patient_id != patient_id {
            warn!("Patient {} attempted to modify appointment {} of patient {}",
                  patient_id, appointment_id, appointment.patient_id);
            return Err(AppointmentError::Unauthorized);
        }
        Ok(appointment)
    }

    /// Seats taken in `slot`, ignoring `exclude`.
    async fn seats_taken(&self, slot_id: Uuid, exclude: Option<Uuid>) -> Result<usize, AppointmentError> {
        let appointments = self.store.list_slot_appointments(slot_id).await?;
        Ok(occupancy(
            appointments.iter().filter(|a| Some(a.id) != exclude),
        ))
    }

    /// The old slot with its booked flag recomputed once `leaving` is gone.
    async fn released_slot(&self, slot_id: Uuid, leaving: Uuid) -> Result<Option<Slot>, AppointmentError> {
        let Some(mut slot) = self.store.find_slot(slot_id).await? else {
            return Ok(None);
        };
        let remaining = self.seats_taken(slot_id, Some(leaving)).await?;
        slot.sync_booked(remaining);
        Ok(Some(slot))
    }

    #[instrument(skip(self, request), fields(slot_id = %request.slot_id))]
    pub async fn book_appointment(
        &self,
        patient_id: Uuid,
        request: BookAppointmentRequest,
    ) -> Result<BookingResult, AppointmentError> {
        debug!("Booking slot {} for patient {}", request.slot_id, patient_id);

        self.store
            .find_patient(patient_id)
            .await?
            .ok_or(AppointmentError::PatientNotFound)?;

        let _patient_guard = self.locks.patients.acquire(patient_id).await;
        let session_id = self.load_slot(request.slot_id).await?.session_id;
        let _session_guard = self.locks.sessions.acquire(session_id).await;

        // Re-read under the lock; a resize may have trimmed or removed the slot.
        let mut slot = self.load_slot(request.slot_id).await?;
        let session = self.bookable_session(&slot).await?;

        ConflictDetectionService::ensure_booking_open(&session, &self.config.scheduling, self.clock.now())?;

        let taken = self.seats_taken(slot.id, None).await?;
        if taken as u64 >= slot.max_bookings as u64 {
            warn!("Slot {} is full ({} of {})", slot.id, taken, slot.max_bookings);
            return Err(AppointmentError::SlotFull);
        }

        self.conflict_service
            .check_patient_overlap(patient_id, &session, &slot, None)
            .await?;

        let reporting_time = add_minutes(
            slot.start_time,
            taken as i64 * session.avg_consult_time as i64,
        )?;

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id,
            slot_id: Some(slot.id),
            status: AppointmentStatus::Confirmed,
            reporting_time: Some(reporting_time),
            appointment_reason: request.appointment_reason,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        };

        let mut changes = ChangeSet::new().with_appointment(appointment.clone());
        if slot.sync_booked(taken + 1) {
            changes = changes.with_slot(slot.clone());
        }
        self.store.commit(changes).await?;

        info!("Booked appointment {} in slot {} reporting at {}",
              appointment.id, slot.id, format_hhmm(reporting_time));

        Ok(BookingResult {
            appointment,
            slot,
            session_id: session.id,
            session_date: session.session_date,
        })
    }

    pub async fn reschedule_appointment(
        &self,
        appointment_id: Uuid,
        patient_id: Uuid,
        new_slot_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Rescheduling appointment {} to slot {}", appointment_id, new_slot_id);

        let appointment = self.load_owned_appointment(appointment_id, patient_id).await?;
        self.lifecycle_service
            .validate_action(appointment.status, AppointmentAction::Reschedule)?;
        if appointment.slot_id == Some(new_slot_id) {
            return Err(AppointmentError::ValidationError(
                "Appointment is already in this slot".to_string(),
            ));
        }

        let _patient_guard = self.locks.patients.acquire(patient_id).await;

        let mut session_ids = vec![self.load_slot(new_slot_id).await?.session_id];
        if let Some(old_slot_id) = appointment.slot_id {
            if let Some(old_slot) = self.store.find_slot(old_slot_id).await? {
                session_ids.push(old_slot.session_id);
            }
        }
        let _session_guards = self.locks.sessions.acquire_many(&session_ids).await;

        // State may have moved while waiting for the locks.
        let mut appointment = self.load_owned_appointment(appointment_id, patient_id).await?;
        self.lifecycle_service
            .validate_action(appointment.status, AppointmentAction::Reschedule)?;

        let mut new_slot = self.load_slot(new_slot_id).await?;
        let session = self.bookable_session(&new_slot).await?;

        let taken = self.seats_taken(new_slot.id, Some(appointment.id)).await?;
        if taken as u64 >= new_slot.max_bookings as u64 {
            warn!("Slot {} is full ({} of {})", new_slot.id, taken, new_slot.max_bookings);
            return Err(AppointmentError::SlotFull);
        }

        self.conflict_service
            .check_patient_overlap(patient_id, &session, &new_slot, Some(appointment.id))
            .await?;

        let mut changes = ChangeSet::new();
        if let Some(old_slot_id) = appointment.slot_id {
            if let Some(old_slot) = self.released_slot(old_slot_id, appointment.id).await? {
                changes = changes.with_slot(old_slot);
            }
        }

        new_slot.sync_booked(taken + 1);
        let reporting_time = add_minutes(
            new_slot.start_time,
            taken as i64 * session.avg_consult_time as i64,
        )?;

        let previous_status = appointment.status;
        appointment.slot_id = Some(new_slot.id);
        appointment.reporting_time = Some(reporting_time);
        appointment.status = self.lifecycle_service.next_status(AppointmentAction::Reschedule);
        appointment.updated_at = Utc::now();

        self.store
            .commit(
                changes
                    .with_slot(new_slot)
                    .with_appointment(appointment.clone()),
            )
            .await?;

        info!("Rescheduled appointment {} ({} -> {}) into slot {} at {}",
              appointment.id, previous_status, appointment.status, new_slot_id, format_hhmm(reporting_time));

        Ok(appointment)
    }

    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        patient_id: Uuid,
        reason: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Cancelling appointment {}", appointment_id);

        let appointment = self.load_owned_appointment(appointment_id, patient_id).await?;
        self.lifecycle_service
            .validate_action(appointment.status, AppointmentAction::Cancel)?;

        let _patient_guard = self.locks.patients.acquire(patient_id).await;
        let mut session_ids = Vec::new();
        if let Some(slot_id) = appointment.slot_id {
            if let Some(slot) = self.store.find_slot(slot_id).await? {
                session_ids.push(slot.session_id);
            }
        }
        let _session_guards = self.locks.sessions.acquire_many(&session_ids).await;

        let mut appointment = self.load_owned_appointment(appointment_id, patient_id).await?;
        self.lifecycle_service
            .validate_action(appointment.status, AppointmentAction::Cancel)?;

        let mut changes = ChangeSet::new();
        if let Some(slot_id) = appointment.slot_id.take() {
            if let Some(slot) = self.released_slot(slot_id, appointment.id).await? {
                changes = changes.with_slot(slot);
            }
        }

        appointment.status = self.lifecycle_service.next_status(AppointmentAction::Cancel);
        appointment.cancellation_reason = Some(
            reason
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| DEFAULT_CANCELLATION_REASON.to_string()),
        );
        appointment.updated_at = Utc::now();

        self.store
            .commit(changes.with_appointment(appointment.clone()))
            .await?;

        info!("Cancelled appointment {}", appointment.id);
        Ok(appointment)
    }

    /// Visible to the patient who booked it, the doctor running the session
    /// and admins.
    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        user: &User,
    ) -> Result<AppointmentDetails, AppointmentError> {
        let appointment = self
            .store
            .find_appointment(appointment_id)
            .await?
            .ok_or(AppointmentError::AppointmentNotFound)?;

        let slot = match appointment.slot_id {
            Some(slot_id) => self.store.find_slot(slot_id).await?,
            None => None,
        };
        let session = match &slot {
            Some(slot) => self.store.find_session(slot.session_id).await?,
            None => None,
        };

        let caller = user.user_id();
        let is_patient = caller == Some(appointment.patient_id);
        let is_doctor = session
            .as_ref()
            .is_some_and(|s| caller == Some(s.doctor_id));

        if !(is_patient || is_doctor || user.is_admin()) {
            warn!("User {} denied access to appointment {}", user.id, appointment_id);
            return Err(AppointmentError::Unauthorized);
        }

        Ok(AppointmentDetails { appointment, slot, session })
    }

    pub async fn list_patient_appointments(
        &self,
        patient_id: Uuid,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Listing appointments for patient {}", patient_id);
        let mut appointments = self.store.list_patient_appointments(patient_id).await?;
        appointments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(appointments)
    }

    /// Appointments visible to the caller, newest first: a patient sees their
    /// own, a doctor sees those seated in their sessions, an admin sees all.
    pub async fn list_appointments(
        &self,
        user: &User,
        status: Option<AppointmentStatus>,
        page: Option<usize>,
        limit: Option<usize>,
    ) -> Result<Page<Appointment>, AppointmentError> {
        let request = PageRequest::new(page, limit);

        let appointments = if user.is_admin() {
            self.store.list_appointments().await?
        } else {
            let caller = user.user_id().ok_or(AppointmentError::Unauthorized)?;
            if user.is_doctor() {
                self.store.list_doctor_appointments(caller).await?
            } else if user.is_patient() {
                self.store.list_patient_appointments(caller).await?
            } else {
                warn!("User {} has no role that can list appointments", user.id);
                return Err(AppointmentError::Unauthorized);
            }
        };

        let visible: Vec<Appointment> = appointments
            .into_iter()
            .filter(|a| status.map_or(true, |wanted| a.status == wanted))
            .collect();

        debug!(
            "Listing {} appointments for {} (page {}, limit {})",
            visible.len(), user.id, request.page, request.limit
        );

        Ok(request.slice(visible))
    }
}
