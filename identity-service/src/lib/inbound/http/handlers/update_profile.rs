use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;
use axum::Json;
use serde::Deserialize;
use thiserror::Error;

use super::ApiError;
use super::ApiSuccess;
use super::UserData;
use crate::domain::user::errors::EmailError;
use crate::domain::user::errors::PasswordPolicyError;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::Password;
use crate::domain::user::models::UpdateProfileCommand;
use crate::domain::user::ports::UserServicePort;
use crate::inbound::http::middleware::CurrentUser;
use crate::inbound::http::router::AppState;

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<UpdateProfileRequestBody>,
) -> Result<ApiSuccess<UserData>, ApiError> {
    let user = state
        .user_service
        .update_profile(&current.id, body.try_into_command()?)
        .await
        .map_err(ApiError::from)?;

    Ok(ApiSuccess::new(StatusCode::OK, UserData::from(&user)))
}

/// HTTP request body for partial profile updates (raw JSON)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpdateProfileRequestBody {
    fullname: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Clone, Error)]
enum ParseUpdateProfileRequestError {
    #[error("Invalid email: {0}")]
    Email(#[from] EmailError),

    #[error("{0}")]
    Password(#[from] PasswordPolicyError),
}

impl UpdateProfileRequestBody {
    fn try_into_command(self) -> Result<UpdateProfileCommand, ParseUpdateProfileRequestError> {
        let email = self.email.map(EmailAddress::new).transpose()?;
        let password = self.password.map(Password::new).transpose()?;

        Ok(UpdateProfileCommand {
            fullname: self.fullname,
            email,
            phone: self.phone,
            address: self.address,
            password,
        })
    }
}

impl From<ParseUpdateProfileRequestError> for ApiError {
    fn from(err: ParseUpdateProfileRequestError) -> Self {
        ApiError::UnprocessableEntity(err.to_string())
    }
}
