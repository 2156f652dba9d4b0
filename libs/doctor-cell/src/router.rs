use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_utils::extractor::identity_middleware;
use shared_utils::AppState;

use crate::handlers;

pub fn doctor_routes(state: AppState) -> Router {
    // Directory and slot listings are readable without a caller identity
    let public_routes = Router::new()
        .route("/", get(handlers::list_doctors))
        .route("/{doctor_id}", get(handlers::get_doctor))
        .route("/sessions/{session_id}/slots", get(handlers::list_session_slots));

    let protected_routes = Router::new()
        .route("/sessions", post(handlers::create_session))
        .route("/sessions/{session_id}", patch(handlers::update_session))
        .route("/sessions/{session_id}/slots", post(handlers::create_slot))
        .route("/recurring-sessions", post(handlers::create_recurring_session))
        .route("/recurring-sessions/expand", post(handlers::expand_recurring_sessions))
        .layer(middleware::from_fn(identity_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
