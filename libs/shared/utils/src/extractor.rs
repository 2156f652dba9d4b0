use axum::{
    body::Body,
    http::Request,
    middleware::Next,
    response::Response,
};

use shared_models::auth::User;
use shared_models::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const USER_EMAIL_HEADER: &str = "x-user-email";

// The gateway in front of this service authenticates callers and forwards
// their identity in headers. Requests without one are rejected here.
pub async fn identity_middleware(
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let user = user_from_headers(&request)?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

fn header_value<B>(request: &Request<B>, name: &str) -> Result<Option<String>, AppError> {
    request
        .headers()
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map(|v| v.trim().to_string())
                .map_err(|_| AppError::Auth(format!("Invalid {} header", name)))
        })
        .transpose()
}

pub fn user_from_headers<B>(request: &Request<B>) -> Result<User, AppError> {
    let id = header_value(request, USER_ID_HEADER)?
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Auth("Missing caller identity".to_string()))?;

    if uuid::Uuid::parse_str(&id).is_err() {
        return Err(AppError::Auth("Caller identity is not a valid id".to_string()));
    }

    Ok(User {
        id,
        email: header_value(request, USER_EMAIL_HEADER)?,
        role: header_value(request, USER_ROLE_HEADER)?.map(|r| r.to_lowercase()),
        created_at: None,
    })
}

// Function to extract user from request extensions
pub fn extract_user<B>(request: &Request<B>) -> Result<User, AppError> {
    request
        .extensions()
        .get::<User>()
        .cloned()
        .ok_or_else(|| AppError::Auth("User not found in request extensions".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_identity_headers() {
        let id = uuid::Uuid::new_v4().to_string();
        let request = Request::builder()
            .header(USER_ID_HEADER, &id)
            .header(USER_ROLE_HEADER, "Doctor")
            .body(())
            .unwrap();

        let user = user_from_headers(&request).unwrap();
        assert_eq!(user.id, id);
        assert!(user.is_doctor());
        assert_eq!(user.email, None);
    }

    #[test]
    fn rejects_missing_or_malformed_identity() {
        let missing = Request::builder().body(()).unwrap();
        assert!(matches!(user_from_headers(&missing), Err(AppError::Auth(_))));

        let malformed = Request::builder()
            .header(USER_ID_HEADER, "not-a-uuid")
            .body(())
            .unwrap();
        assert!(matches!(user_from_headers(&malformed), Err(AppError::Auth(_))));
    }
}
