use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use thiserror::Error;

use super::ApiError;
use super::ApiSuccess;
use super::AuthResponseData;
use crate::domain::user::errors::EmailError;
use crate::domain::user::errors::PasswordPolicyError;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::Password;
use crate::domain::user::models::RegisterUserCommand;
use crate::domain::user::ports::UserServicePort;
use crate::inbound::http::router::AppState;

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequestBody>,
) -> Result<ApiSuccess<AuthResponseData>, ApiError> {
    let user = state
        .user_service
        .register(body.try_into_command()?)
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
        StatusCode::CREATED,
        AuthResponseData {
            user: (&user).into(),
            token,
        },
    ))
}

/// HTTP request body for registration (raw JSON)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegisterRequestBody {
    fullname: String,
    email: String,
    phone: String,
    address: String,
    password: String,
}

#[derive(Debug, Clone, Error)]
enum ParseRegisterRequestError {
    #[error("Missing required field: {0}")]
    Missing(&'static str),

    #[error("Invalid email: {0}")]
    Email(#[from] EmailError),

    #[error("{0}")]
    Password(#[from] PasswordPolicyError),
}

fn required(field: &'static str, value: String) -> Result<String, ParseRegisterRequestError> {
    if value.trim().is_empty() {
        Err(ParseRegisterRequestError::Missing(field))
    } else {
        Ok(value)
    }
}

impl RegisterRequestBody {
    fn try_into_command(self) -> Result<RegisterUserCommand, ParseRegisterRequestError> {
        let fullname = required("fullname", self.fullname)?;
        let email = EmailAddress::new(self.email)?;
        let phone = required("phone", self.phone)?;
        let address = required("address", self.address)?;
        let password = Password::new(self.password)?;

        Ok(RegisterUserCommand::new(
            fullname, email, phone, address, password,
        ))
    }
}

impl From<ParseRegisterRequestError> for ApiError {
    fn from(err: ParseRegisterRequestError) -> Self {
        ApiError::UnprocessableEntity(err.to_string())
    }
}
