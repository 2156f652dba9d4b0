use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::AppState;

use crate::models::{
    CreateRecurringSessionRequest, CreateSessionRequest, CreateSlotRequest, ExpandRecurringRequest,
    UpdateSessionRequest,
};
use crate::services::{DoctorService, RecurrenceService, SessionService};

#[derive(Debug, Deserialize)]
pub struct DoctorSearchQuery {
    pub search: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

/// Sessions are managed by the doctor who owns them; the caller's id is the
/// doctor id.
fn doctor_id(user: &User) -> Result<Uuid, AppError> {
    if !user.is_doctor() && !user.is_admin() {
        return Err(AppError::Forbidden("Doctor role required".to_string()));
    }
    user.user_id()
        .ok_or_else(|| AppError::Auth("Caller identity is not a valid id".to_string()))
}

// ==============================================================================
// DOCTOR DIRECTORY
// ==============================================================================

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<AppState>,
    Query(query): Query<DoctorSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state);

    let page = doctor_service
        .list_doctors(query.search.as_deref(), query.page, query.limit)
        .await?;

    Ok(Json(json!(page)))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<AppState>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state);
    let doctor = doctor_service.get_doctor(doctor_id).await?;
    Ok(Json(json!(doctor)))
}

// ==============================================================================
// SESSIONS AND SLOTS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_session(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let doctor_id = doctor_id(&user)?;
    let session_service = SessionService::new(&state);

    let created = session_service.create_session(doctor_id, request).await?;

    Ok((StatusCode::CREATED, Json(json!(created))))
}

#[axum::debug_handler]
pub async fn create_slot(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<CreateSlotRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let doctor_id = doctor_id(&user)?;
    let session_service = SessionService::new(&state);

    let slot = session_service
        .create_slot_in_session(doctor_id, session_id, request)
        .await?;

    Ok((StatusCode::CREATED, Json(json!(slot))))
}

#[axum::debug_handler]
pub async fn update_session(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<UpdateSessionRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = doctor_id(&user)?;
    let session_service = SessionService::new(&state);

    let outcome = session_service
        .update_session(doctor_id, session_id, request)
        .await?;

    Ok(Json(json!(outcome)))
}

#[axum::debug_handler]
pub async fn list_session_slots(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let session_service = SessionService::new(&state);
    let slots = session_service.list_session_slots(session_id).await?;

    Ok(Json(json!({
        "session_id": session_id,
        "slots": slots,
    })))
}

// ==============================================================================
// RECURRING SESSIONS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_recurring_session(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateRecurringSessionRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let doctor_id = doctor_id(&user)?;
    let recurrence_service = RecurrenceService::new(&state);

    let template = recurrence_service.create_template(doctor_id, request).await?;

    Ok((StatusCode::CREATED, Json(json!(template))))
}

#[axum::debug_handler]
pub async fn expand_recurring_sessions(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<ExpandRecurringRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = doctor_id(&user)?;
    let recurrence_service = RecurrenceService::new(&state);

    let report = recurrence_service.expand(doctor_id, request.days_ahead).await?;

    Ok(Json(json!(report)))
}
