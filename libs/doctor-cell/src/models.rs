use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::error::AppError;
use shared_models::pagination::Page;
use shared_models::scheduling::{Doctor, Session, Slot};
use shared_models::time::{hhmm, hhmm_option, TimeError};

// ==============================================================================
// REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub session_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub consult_start: NaiveTime,
    #[serde(with = "hhmm")]
    pub consult_end: NaiveTime,
    #[serde(with = "hhmm")]
    pub booking_start: NaiveTime,
    pub avg_consult_time: u32,
    pub slot_duration: u32,
    pub is_active: Option<bool>,
    /// Tile the consult window with slots on creation (default true).
    pub generate_slots: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSlotRequest {
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub max_bookings: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSessionRequest {
    #[serde(default, with = "hhmm_option")]
    pub consult_start: Option<NaiveTime>,
    #[serde(default, with = "hhmm_option")]
    pub consult_end: Option<NaiveTime>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecurringSessionRequest {
    pub day: Weekday,
    #[serde(with = "hhmm")]
    pub consult_start: NaiveTime,
    #[serde(with = "hhmm")]
    pub consult_end: NaiveTime,
    #[serde(with = "hhmm")]
    pub booking_start: NaiveTime,
    #[serde(default = "default_avg_consult_time")]
    pub avg_consult_time: u32,
    pub slot_duration: u32,
}

fn default_avg_consult_time() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpandRecurringRequest {
    pub days_ahead: u32,
}

// ==============================================================================
// RESPONSES
// ==============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct SessionCreated {
    pub session: Session,
    pub slots: Vec<Slot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotView {
    #[serde(flatten)]
    pub slot: Slot,
    pub booked_count: usize,
    pub available: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResizeOutcome {
    pub session_id: Uuid,
    #[serde(with = "hhmm")]
    pub consult_start: NaiveTime,
    #[serde(with = "hhmm")]
    pub consult_end: NaiveTime,
    pub avg_consult_time: u32,
    pub is_active: bool,
    pub adjusted: Vec<Uuid>,
    pub pending: Vec<Uuid>,
    pub created_slots: Vec<Uuid>,
    pub deleted_slots: Vec<Uuid>,
    pub compressed: bool,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExpansionReport {
    pub created_dates: Vec<NaiveDate>,
    pub skipped_dates: Vec<NaiveDate>,
    pub created_session_ids: Vec<Uuid>,
}

pub type DoctorPage = Page<Doctor>;

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DoctorError {
    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Session not found")]
    SessionNotFound,

    #[error("No active recurring templates found for this doctor")]
    TemplateNotFound,

    #[error("Not authorized to modify this session")]
    Forbidden,

    #[error("Invalid window: {0}")]
    InvalidWindow(String),

    #[error("Overlap conflict: {0}")]
    OverlapConflict(String),

    #[error("Recurring template already exists: {0}")]
    DuplicateTemplate(String),

    #[error("Resize aborted: {0}")]
    ResizeInvariant(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<StoreError> for DoctorError {
    fn from(e: StoreError) -> Self {
        DoctorError::DatabaseError(e.to_string())
    }
}

impl From<TimeError> for DoctorError {
    fn from(e: TimeError) -> Self {
        DoctorError::InvalidWindow(e.to_string())
    }
}

impl From<DoctorError> for AppError {
    fn from(e: DoctorError) -> Self {
        match e {
            DoctorError::DoctorNotFound
            | DoctorError::SessionNotFound
            | DoctorError::TemplateNotFound => AppError::NotFound(e.to_string()),
            DoctorError::Forbidden => AppError::Forbidden(e.to_string()),
            DoctorError::InvalidWindow(_) => AppError::ValidationError(e.to_string()),
            DoctorError::OverlapConflict(_) | DoctorError::DuplicateTemplate(_) => {
                AppError::Conflict(e.to_string())
            }
            DoctorError::ResizeInvariant(_) => AppError::Internal(e.to_string()),
            DoctorError::DatabaseError(_) => AppError::Database(e.to_string()),
        }
    }
}
