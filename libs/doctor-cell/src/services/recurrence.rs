// libs/doctor-cell/src/services/recurrence.rs
use std::sync::Arc;

use chrono::{Datelike, Duration, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{ChangeSet, SchedulingLocks, SchedulingStore};
use shared_models::scheduling::{RecurringSession, Session};
use shared_models::time::format_hhmm;
use shared_utils::{AppState, Clock};

use crate::models::{CreateRecurringSessionRequest, DoctorError, ExpansionReport};
use crate::services::session::validate_session_window;
use crate::services::slots::SlotAllocator;

/// Weekly templates and their expansion into dated sessions.
pub struct RecurrenceService {
    config: Arc<AppConfig>,
    store: Arc<dyn SchedulingStore>,
    locks: Arc<SchedulingLocks>,
    clock: Arc<dyn Clock>,
}

impl RecurrenceService {
    pub fn new(state: &AppState) -> Self {
        Self {
            config: Arc::clone(&state.config),
            store: Arc::clone(&state.store),
            locks: Arc::clone(&state.locks),
            clock: Arc::clone(&state.clock),
        }
    }

    pub async fn create_template(
        &self,
        doctor_id: Uuid,
        request: CreateRecurringSessionRequest,
    ) -> Result<RecurringSession, DoctorError> {
        validate_session_window(
            request.consult_start,
            request.consult_end,
            request.booking_start,
            request.avg_consult_time,
            request.slot_duration,
        )?;

        let _guard = self.locks.doctors.acquire(doctor_id).await;

        self.store
            .find_doctor(doctor_id)
            .await?
            .ok_or(DoctorError::DoctorNotFound)?;

        let existing = self.store.list_recurring_sessions(doctor_id).await?;
        if existing.iter().any(|t| {
            t.day == request.day
                && t.consult_start == request.consult_start
                && t.consult_end == request.consult_end
        }) {
            warn!("Doctor {} already has a {} {}-{} template",
                  doctor_id, request.day,
                  format_hhmm(request.consult_start), format_hhmm(request.consult_end));
            return Err(DoctorError::DuplicateTemplate(format!(
                "{} {}-{}",
                request.day,
                format_hhmm(request.consult_start),
                format_hhmm(request.consult_end)
            )));
        }

        let template = RecurringSession {
            id: Uuid::new_v4(),
            doctor_id,
            day: request.day,
            consult_start: request.consult_start,
            consult_end: request.consult_end,
            booking_start: request.booking_start,
            avg_consult_time: request.avg_consult_time,
            slot_duration: request.slot_duration,
            is_active: true,
            created_at: Utc::now(),
        };

        self.store
            .commit(ChangeSet::new().with_recurring_session(template.clone()))
            .await?;
        info!("Created recurring template {} for doctor {} on {}", template.id, doctor_id, template.day);

        Ok(template)
    }

    /// Materialize sessions for `[today, today + days_ahead)`. Dates that
    /// already have a session from the same template are skipped.
    pub async fn expand(&self, doctor_id: Uuid, days_ahead: u32) -> Result<ExpansionReport, DoctorError> {
        let max_days = self.config.scheduling.max_expand_days;
        if days_ahead == 0 || days_ahead > max_days {
            return Err(DoctorError::InvalidWindow(format!(
                "days_ahead must be between 1 and {}",
                max_days
            )));
        }

        let _guard = self.locks.doctors.acquire(doctor_id).await;

        let templates: Vec<RecurringSession> = self
            .store
            .list_recurring_sessions(doctor_id)
            .await?
            .into_iter()
            .filter(|t| t.is_active)
            .collect();
        if templates.is_empty() {
            return Err(DoctorError::TemplateNotFound);
        }

        let today = self.clock.today();
        debug!("Expanding {} templates for doctor {} from {} over {} days",
               templates.len(), doctor_id, today, days_ahead);

        let mut report = ExpansionReport::default();
        let mut changes = ChangeSet::new();

        for offset in 0..days_ahead {
            let day = today + Duration::days(offset as i64);
            for template in templates.iter().filter(|t| t.day == day.weekday()) {
                if self
                    .store
                    .find_session_by_template(doctor_id, day, template.id)
                    .await?
                    .is_some()
                {
                    report.skipped_dates.push(day);
                    continue;
                }

                let session = Session {
                    id: Uuid::new_v4(),
                    doctor_id,
                    session_date: day,
                    consult_start: template.consult_start,
                    consult_end: template.consult_end,
                    booking_start: template.booking_start,
                    avg_consult_time: template.avg_consult_time,
                    slot_duration: template.slot_duration,
                    is_active: true,
                    recurring_template_id: Some(template.id),
                    created_at: Utc::now(),
                };
                let slots = SlotAllocator::generate_slots(
                    &session,
                    session.consult_start,
                    session.consult_end,
                    session.slot_duration,
                    session.avg_consult_time,
                );

                report.created_dates.push(day);
                report.created_session_ids.push(session.id);
                changes = changes.with_slots(slots).with_session(session);
            }
        }

        if !changes.is_empty() {
            self.store.commit(changes).await?;
        }

        info!("Expanded recurring sessions for doctor {}: {} created, {} skipped",
              doctor_id, report.created_dates.len(), report.skipped_dates.len());
        Ok(report)
    }
}
