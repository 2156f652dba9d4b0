use axum::{routing::get, Router};

use appointment_cell::router::appointment_routes;
use doctor_cell::router::doctor_routes;
use patient_cell::router::patient_routes;
use shared_utils::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduler is running!" }))
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/patients", patient_routes(state))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use shared_utils::extractor::{USER_ID_HEADER, USER_ROLE_HEADER};
    use shared_utils::test_utils::{at, date, TestContext};

    use super::*;

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn root_reports_running() {
        let ctx = TestContext::new(at(date(2025, 6, 20), 7, 0));
        let response = create_router(ctx.state.clone())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn doctor_session_is_bookable_through_the_api() {
        let ctx = TestContext::new(at(date(2025, 6, 20), 7, 0));
        let doctor = ctx.seed_doctor("Rhea Kapoor").await;
        let patients = ctx.seed_patients(1).await;
        let app = create_router(ctx.state.clone());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/doctors/sessions")
                    .header("content-type", "application/json")
                    .header(USER_ID_HEADER, doctor.id.to_string())
                    .header(USER_ROLE_HEADER, "doctor")
                    .body(Body::from(
                        json!({
                            "session_date": "2025-06-20",
                            "consult_start": "09:00",
                            "consult_end": "11:00",
                            "booking_start": "06:00",
                            "avg_consult_time": 10,
                            "slot_duration": 30,
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        let slot_id = created["slots"][0]["id"].clone();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/appointments")
                    .header("content-type", "application/json")
                    .header(USER_ID_HEADER, patients[0].id.to_string())
                    .header(USER_ROLE_HEADER, "patient")
                    .body(Body::from(json!({ "slot_id": slot_id }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await["reporting_time"], "09:00");

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/patients/{}", patients[0].id))
                    .header(USER_ID_HEADER, doctor.id.to_string())
                    .header(USER_ROLE_HEADER, "doctor")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let record = body_json(response).await;
        assert_eq!(record["appointments"][0]["status"], "confirmed");
    }
}
