// libs/appointment-cell/src/handlers.rs
use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::AppState;

use crate::models::{
    AppointmentListQuery, BookAppointmentRequest, CancelAppointmentRequest,
    RescheduleAppointmentRequest,
};
use crate::services::booking::AppointmentBookingService;

/// Patients act on their own appointments; their identity id is the patient id.
fn patient_id(user: &User) -> Result<Uuid, AppError> {
    if !user.is_patient() {
        return Err(AppError::Forbidden("Patient role required".to_string()));
    }
    user.user_id()
        .ok_or_else(|| AppError::Auth("Caller identity is not a valid id".to_string()))
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let patient_id = patient_id(&user)?;
    let booking_service = AppointmentBookingService::new(&state);

    let booking = booking_service.book_appointment(patient_id, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Appointment booked successfully",
            "appointment_id": booking.appointment.id,
            "reporting_time": booking.appointment.reporting_time.map(shared_models::time::format_hhmm),
            "booking": booking,
        })),
    ))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    let details = booking_service.get_appointment(appointment_id, &user).await?;
    Ok(Json(json!(details)))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let patient_id = patient_id(&user)?;
    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service
        .reschedule_appointment(appointment_id, patient_id, request.new_slot_id)
        .await?;

    Ok(Json(json!({
        "message": "Appointment rescheduled successfully",
        "appointment": appointment,
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let patient_id = patient_id(&user)?;
    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service
        .cancel_appointment(appointment_id, patient_id, request.reason)
        .await?;

    Ok(Json(json!({
        "message": "Appointment cancelled successfully",
        "appointment": appointment,
    })))
}

#[axum::debug_handler]
pub async fn get_my_appointments(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let patient_id = patient_id(&user)?;
    let booking_service = AppointmentBookingService::new(&state);

    let appointments = booking_service.list_patient_appointments(patient_id).await?;

    Ok(Json(json!({
        "total": appointments.len(),
        "appointments": appointments,
    })))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);

    let page = booking_service
        .list_appointments(&user, query.status, query.page, query.limit)
        .await?;

    Ok(Json(json!(page)))
}
