use axum::http::StatusCode;
use axum::Extension;

use super::ApiError;
use super::ApiSuccess;
use super::UserData;
use crate::inbound::http::middleware::CurrentUser;

/// Return the caller's own record, as resolved by the authentication gate.
pub async fn get_profile(
    Extension(current): Extension<CurrentUser>,
) -> Result<ApiSuccess<UserData>, ApiError> {
    Ok(ApiSuccess::new(StatusCode::OK, UserData::from(&current)))
}
