use axum::{middleware, routing::get, Router};

use shared_utils::extractor::identity_middleware;
use shared_utils::AppState;

use crate::handlers;

pub fn patient_routes(state: AppState) -> Router {
    // Patient records are never public
    let protected_routes = Router::new()
        .route("/", get(handlers::search_patients))
        .route("/{patient_id}", get(handlers::get_patient))
        .layer(middleware::from_fn(identity_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
