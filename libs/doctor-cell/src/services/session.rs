// libs/doctor-cell/src/services/session.rs
use std::sync::Arc;

use chrono::{NaiveTime, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{ChangeSet, SchedulingLocks, SchedulingStore};
use shared_models::scheduling::{occupancy, Session};
use shared_models::time::format_hhmm;
use shared_utils::{AppState, Clock};

use crate::models::{
    CreateSessionRequest, CreateSlotRequest, DoctorError, ResizeOutcome, SessionCreated, SlotView,
    UpdateSessionRequest,
};
use crate::services::resize::ResizePlanner;
use crate::services::slots::SlotAllocator;

/// Shared window rules for sessions and recurring templates.
pub(crate) fn validate_session_window(
    consult_start: NaiveTime,
    consult_end: NaiveTime,
    booking_start: NaiveTime,
    avg_consult_time: u32,
    slot_duration: u32,
) -> Result<(), DoctorError> {
    if consult_start >= consult_end {
        return Err(DoctorError::InvalidWindow(
            "consult_start must be before consult_end".to_string(),
        ));
    }
    if booking_start > consult_start {
        return Err(DoctorError::InvalidWindow(
            "booking_start must not be after consult_start".to_string(),
        ));
    }
    if avg_consult_time == 0 {
        return Err(DoctorError::InvalidWindow(
            "avg_consult_time must be at least 1 minute".to_string(),
        ));
    }
    if slot_duration == 0 {
        return Err(DoctorError::InvalidWindow(
            "slot_duration must be at least 1 minute".to_string(),
        ));
    }
    Ok(())
}

pub struct SessionService {
    config: Arc<AppConfig>,
    store: Arc<dyn SchedulingStore>,
    locks: Arc<SchedulingLocks>,
    clock: Arc<dyn Clock>,
}

impl SessionService {
    pub fn new(state: &AppState) -> Self {
        Self {
            config: Arc::clone(&state.config),
            store: Arc::clone(&state.store),
            locks: Arc::clone(&state.locks),
            clock: Arc::clone(&state.clock),
        }
    }

    async fn owned_session(&self, doctor_id: Uuid, session_id: Uuid) -> Result<Session, DoctorError> {
        let session = self
            .store
            .find_session(session_id)
            .await?
            .ok_or(DoctorError::SessionNotFound)?;

        if session.doctor_id != doctor_id {
            warn!("Doctor {} attempted to modify session {} owned by {}",
                  doctor_id, session_id, session.doctor_id);
            return Err(DoctorError::Forbidden);
        }
        Ok(session)
    }

    pub async fn create_session(
        &self,
        doctor_id: Uuid,
        request: CreateSessionRequest,
    ) -> Result<SessionCreated, DoctorError> {
        debug!("Creating session on {} for doctor {}", request.session_date, doctor_id);

        validate_session_window(
            request.consult_start,
            request.consult_end,
            request.booking_start,
            request.avg_consult_time,
            request.slot_duration,
        )?;

        self.store
            .find_doctor(doctor_id)
            .await?
            .ok_or(DoctorError::DoctorNotFound)?;

        let session = Session {
            id: Uuid::new_v4(),
            doctor_id,
            session_date: request.session_date,
            consult_start: request.consult_start,
            consult_end: request.consult_end,
            booking_start: request.booking_start,
            avg_consult_time: request.avg_consult_time,
            slot_duration: request.slot_duration,
            is_active: request.is_active.unwrap_or(true),
            recurring_template_id: None,
            created_at: Utc::now(),
        };

        let slots: Vec<_> = if request.generate_slots.unwrap_or(true) {
            SlotAllocator::generate_slots(
                &session,
                session.consult_start,
                session.consult_end,
                session.slot_duration,
                session.avg_consult_time,
            )
            .collect()
        } else {
            Vec::new()
        };

        self.store
            .commit(
                ChangeSet::new()
                    .with_session(session.clone())
                    .with_slots(slots.iter().cloned()),
            )
            .await?;

        info!("Created session {} ({}-{}) with {} slots",
              session.id, format_hhmm(session.consult_start), format_hhmm(session.consult_end), slots.len());

        Ok(SessionCreated { session, slots })
    }

    pub async fn create_slot_in_session(
        &self,
        doctor_id: Uuid,
        session_id: Uuid,
        request: CreateSlotRequest,
    ) -> Result<SlotView, DoctorError> {
        let _guard = self.locks.sessions.acquire(session_id).await;
        let session = self.owned_session(doctor_id, session_id).await?;

        let existing = self.store.list_session_slots(session_id).await?;
        let slot = SlotAllocator::create_slot(
            &session,
            &existing,
            request.start_time,
            request.end_time,
            request.max_bookings,
        )?;

        self.store.commit(ChangeSet::new().with_slot(slot.clone())).await?;
        info!("Added slot {} ({}-{}) to session {}",
              slot.id, format_hhmm(slot.start_time), format_hhmm(slot.end_time), session_id);

        Ok(SlotView {
            available: slot.max_bookings,
            slot,
            booked_count: 0,
        })
    }

    pub async fn list_session_slots(&self, session_id: Uuid) -> Result<Vec<SlotView>, DoctorError> {
        let schedule = self
            .store
            .load_session_schedule(session_id)
            .await?
            .ok_or(DoctorError::SessionNotFound)?;

        Ok(schedule
            .slots
            .into_iter()
            .map(|entry| {
                let booked = occupancy(&entry.appointments);
                SlotView {
                    available: entry.slot.max_bookings.saturating_sub(booked as u32),
                    slot: entry.slot,
                    booked_count: booked,
                }
            })
            .collect())
    }

    /// Resize the consult window and/or toggle the session's active flag.
    #[instrument(skip(self, request), fields(doctor_id = %doctor_id))]
    pub async fn update_session(
        &self,
        doctor_id: Uuid,
        session_id: Uuid,
        request: UpdateSessionRequest,
    ) -> Result<ResizeOutcome, DoctorError> {
        let _guard = self.locks.sessions.acquire(session_id).await;

        let schedule = self
            .store
            .load_session_schedule(session_id)
            .await?
            .ok_or(DoctorError::SessionNotFound)?;

        if schedule.session.doctor_id != doctor_id {
            warn!("Doctor {} attempted to resize session {} owned by {}",
                  doctor_id, session_id, schedule.session.doctor_id);
            return Err(DoctorError::Forbidden);
        }

        let new_start = request.consult_start.unwrap_or(schedule.session.consult_start);
        let new_end = request.consult_end.unwrap_or(schedule.session.consult_end);

        let planner = ResizePlanner::new(&self.config.scheduling, self.clock.as_ref());
        let mut plan = planner.plan(&schedule, new_start, new_end)?;

        if let Some(is_active) = request.is_active {
            plan.session.is_active = is_active;
            plan.changes.sessions = vec![plan.session.clone()];
        }

        self.store.commit(plan.changes).await?;

        info!("Session {} now {}-{} (avg {} min): {}",
              session_id,
              format_hhmm(plan.session.consult_start),
              format_hhmm(plan.session.consult_end),
              plan.session.avg_consult_time,
              plan.message);

        Ok(ResizeOutcome {
            session_id,
            consult_start: plan.session.consult_start,
            consult_end: plan.session.consult_end,
            avg_consult_time: plan.session.avg_consult_time,
            is_active: plan.session.is_active,
            adjusted: plan.adjusted,
            pending: plan.pending,
            created_slots: plan.created_slots,
            deleted_slots: plan.deleted_slots,
            compressed: plan.compressed,
            message: plan.message,
        })
    }
}
