use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::error::AppError;
use shared_models::scheduling::{Appointment, AppointmentStatus, Session, Slot};
use shared_models::time::TimeError;

pub const DEFAULT_CANCELLATION_REASON: &str = "Cancelled by patient";

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub slot_id: Uuid,
    pub appointment_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub new_slot_id: Uuid,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentListQuery {
    pub status: Option<AppointmentStatus>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

// ==============================================================================
// RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct BookingResult {
    pub appointment: Appointment,
    pub slot: Slot,
    pub session_id: Uuid,
    pub session_date: NaiveDate,
}

/// An appointment with the slot and session it currently points at.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentDetails {
    pub appointment: Appointment,
    pub slot: Option<Slot>,
    pub session: Option<Session>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    AppointmentNotFound,

    #[error("Slot not found")]
    SlotNotFound,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Unauthorized access to appointment")]
    Unauthorized,

    #[error("Invalid window: {0}")]
    InvalidWindow(String),

    #[error("Booking is closed for this session")]
    BookingWindowClosed,

    #[error("Slot is fully booked")]
    SlotFull,

    #[error("Patient already has an overlapping appointment")]
    OverlappingBooking,

    #[error("Appointment cannot be modified in current status: {0}")]
    InvalidStatusTransition(AppointmentStatus),

    #[error("Session is not active")]
    SessionInactive,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<StoreError> for AppointmentError {
    fn from(e: StoreError) -> Self {
        AppointmentError::DatabaseError(e.to_string())
    }
}

impl From<TimeError> for AppointmentError {
    fn from(e: TimeError) -> Self {
        AppointmentError::InvalidWindow(e.to_string())
    }
}

impl From<AppointmentError> for AppError {
    fn from(e: AppointmentError) -> Self {
        match e {
            AppointmentError::AppointmentNotFound
            | AppointmentError::SlotNotFound
            | AppointmentError::SessionNotFound
            | AppointmentError::PatientNotFound => AppError::NotFound(e.to_string()),
            AppointmentError::Unauthorized => AppError::Auth(e.to_string()),
            AppointmentError::InvalidWindow(_) | AppointmentError::ValidationError(_) => {
                AppError::ValidationError(e.to_string())
            }
            AppointmentError::BookingWindowClosed
            | AppointmentError::InvalidStatusTransition(_)
            | AppointmentError::SessionInactive => AppError::BadRequest(e.to_string()),
            AppointmentError::SlotFull | AppointmentError::OverlappingBooking => {
                AppError::Conflict(e.to_string())
            }
            AppointmentError::DatabaseError(_) => AppError::Database(e.to_string()),
        }
    }
}
