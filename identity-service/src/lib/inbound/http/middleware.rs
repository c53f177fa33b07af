use axum::extract::Request;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::{self};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use chrono::DateTime;
use chrono::Utc;
use serde_json::json;

use crate::domain::user::errors::UserError;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::Role;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::ports::UserServicePort;
use crate::inbound::http::router::AppState;

/// Extension type carrying the authenticated identity through the request.
///
/// Built from the freshly re-resolved record, never from token claims
/// alone, and deliberately without the password hash.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: UserId,
    pub display_id: i64,
    pub fullname: String,
    pub email: EmailAddress,
    pub phone: String,
    pub address: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            display_id: user.display_id,
            fullname: user.fullname.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            address: user.address.clone(),
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// Middleware that validates bearer tokens and attaches the resolved
/// identity to request extensions.
///
/// The claimed identity is re-resolved against the store on every request,
/// so a stale token for a removed or altered user stops here.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_token_from_header(&req)?;

    let claims = state.authenticator.verify(token).map_err(|e| {
        tracing::warn!("Bearer token rejected: {}", e);
        unauthorized("Invalid or expired token")
    })?;

    let user_id = UserId::from_string(&claims.sub).map_err(|e| {
        tracing::warn!("Failed to parse user ID from token: {}", e);
        unauthorized("Invalid token format")
    })?;

    let user = match state.user_service.get_user(&user_id).await {
        Ok(user) => user,
        Err(UserError::NotFound(_)) => {
            tracing::warn!(user_id = %user_id, "Token subject no longer resolves");
            return Err(unauthorized("Invalid or expired token"));
        }
        Err(e) => {
            tracing::error!(error = %e, "Identity resolution failed");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Internal server error"
                })),
            )
                .into_response());
        }
    };

    req.extensions_mut().insert(CurrentUser::from(&user));

    Ok(next.run(req).await)
}

/// Middleware gating a route to administrators.
///
/// Composes after `authenticate`; without an attached identity the gate
/// fails as unauthorized rather than forbidden.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, Response> {
    authorize(req.extensions().get::<CurrentUser>(), &[Role::Admin])?;
    Ok(next.run(req).await)
}

fn authorize(current: Option<&CurrentUser>, allowed: &[Role]) -> Result<(), Response> {
    let current = current.ok_or_else(|| unauthorized("Missing authenticated identity"))?;

    if allowed.contains(&current.role) {
        Ok(())
    } else {
        Err((
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "Insufficient role"
            })),
        )
            .into_response())
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": message
        })),
    )
        .into_response()
}

fn extract_token_from_header(req: &Request) -> Result<&str, Response> {
    let auth_header = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .ok_or_else(|| unauthorized("Missing Authorization header"))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| unauthorized("Invalid Authorization header"))?;

    if !auth_str.starts_with("Bearer ") {
        return Err(unauthorized(
            "Invalid Authorization header format. Expected: Bearer <token>",
        ));
    }

    Ok(auth_str.trim_start_matches("Bearer "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current_user(role: Role) -> CurrentUser {
        CurrentUser {
            id: UserId::new(),
            display_id: 1,
            fullname: "Alice Example".to_string(),
            email: EmailAddress::new("alice@example.com".to_string()).unwrap(),
            phone: "0917 555 0101".to_string(),
            address: "12 Example St".to_string(),
            role,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_authorize_allows_member_role() {
        let admin = current_user(Role::Admin);
        assert!(authorize(Some(&admin), &[Role::Admin]).is_ok());
    }

    #[test]
    fn test_authorize_rejects_non_member_role_as_forbidden() {
        let adopter = current_user(Role::Adopter);
        let response = authorize(Some(&adopter), &[Role::Admin]).unwrap_err();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_authorize_without_identity_is_unauthorized() {
        let response = authorize(None, &[Role::Admin]).unwrap_err();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
