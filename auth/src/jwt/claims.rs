use chrono::Duration;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Identity claims carried by a bearer token.
///
/// The token is stateless: everything a downstream gate needs to know about
/// the caller travels inside it, bounded only by `exp`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user identifier)
    pub sub: String,

    /// Role name at issuance time
    pub role: String,

    /// Email address at issuance time
    pub email: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Create claims for an authenticated identity with automatic expiration.
    ///
    /// # Arguments
    /// * `user_id` - Unique user identifier
    /// * `role` - Role name to embed
    /// * `email` - Email address to embed
    /// * `validity_hours` - Hours until the token expires
    pub fn for_identity(
        user_id: impl ToString,
        role: impl Into<String>,
        email: impl Into<String>,
        validity_hours: i64,
    ) -> Self {
        let now = Utc::now();
        let expiration = now + Duration::hours(validity_hours);

        Self {
            sub: user_id.to_string(),
            role: role.into(),
            email: email.into(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
        }
    }

    /// Check if the claims are expired at the given instant.
    pub fn is_expired(&self, current_timestamp: i64) -> bool {
        self.exp < current_timestamp
    }
}
