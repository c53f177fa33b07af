use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::ApiError;
use super::ApiSuccess;
use super::AuthResponseData;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::ports::UserServicePort;
use crate::inbound::http::router::AppState;

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequestBody>,
) -> Result<ApiSuccess<AuthResponseData>, ApiError> {
    // An unparseable email cannot belong to an account; fail like any
    // other bad credential rather than leaking format detail.
    let email = EmailAddress::new(body.email)
        .map_err(|_| ApiError::Unauthorized("Invalid email or password".to_string()))?;

    let user = state
        .user_service
        .authenticate(&email, &body.password)
        .await
        .map_err(ApiError::from)?;

    let token = state
        .authenticator
        .issue(user.id, user.role.as_str(), user.email.as_str())
        .map_err(|e| {
            tracing::error!(error = %e, "Token issuance failed");
            ApiError::InternalServerError("Internal server error".to_string())
        })?;

    Ok(ApiSuccess::new(
        StatusCode::OK,
        AuthResponseData {
            user: (&user).into(),
            token,
        },
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginRequestBody {
    email: String,
    password: String,
}
