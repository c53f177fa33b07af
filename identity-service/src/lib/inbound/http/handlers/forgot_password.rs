use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::AcknowledgementData;
use super::ApiError;
use super::ApiSuccess;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::ports::UserServicePort;
use crate::inbound::http::router::AppState;

pub async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequestBody>,
) -> Result<ApiSuccess<AcknowledgementData>, ApiError> {
    // The acknowledgement is identical whether or not the address is
    // registered; an unparseable address cannot belong to an account.
    if let Ok(email) = EmailAddress::new(body.email) {
        state
            .user_service
            .request_password_reset(&email)
            .await
            .map_err(ApiError::from)?;
    }

    Ok(ApiSuccess::new(
        StatusCode::OK,
        AcknowledgementData {
            message: "If an account exists, a reset email has been sent.".to_string(),
        },
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ForgotPasswordRequestBody {
    email: String,
}
