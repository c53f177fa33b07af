use crate::jwt::Claims;
use crate::jwt::JwtError;
use crate::jwt::JwtHandler;

/// Bearer-token issuer and verifier for authenticated identities.
///
/// Holds the process-wide signing key and token lifetime, both injected
/// once at startup from configuration. Issues stateless tokens carrying
/// `{sub, role, email}`; expiry is the only bound on their lifetime.
pub struct Authenticator {
    jwt_handler: JwtHandler,
    validity_hours: i64,
}

impl Authenticator {
    /// Create a new authenticator.
    ///
    /// # Arguments
    /// * `jwt_secret` - Secret key for JWT signing
    /// * `validity_hours` - Lifetime of issued tokens, in hours
    pub fn new(jwt_secret: &[u8], validity_hours: i64) -> Self {
        Self {
            jwt_handler: JwtHandler::new(jwt_secret),
            validity_hours,
        }
    }

    /// Issue a signed token for an authenticated identity.
    ///
    /// # Arguments
    /// * `user_id` - Unique user identifier (token subject)
    /// * `role` - Role name at issuance time
    /// * `email` - Email address at issuance time
    ///
    /// # Returns
    /// Compact JWT string
    ///
    /// # Errors
    /// * `EncodingFailed` - Token generation failed
    pub fn issue(
        &self,
        user_id: impl ToString,
        role: &str,
        email: &str,
    ) -> Result<String, JwtError> {
        let claims = Claims::for_identity(user_id, role, email, self.validity_hours);
        self.jwt_handler.encode(&claims)
    }

    /// Verify a token's signature and expiry, returning its claims.
    ///
    /// # Arguments
    /// * `token` - Compact JWT string
    ///
    /// # Errors
    /// * `TokenExpired` - The token's lifetime has lapsed
    /// * `InvalidToken` - Signature mismatch or structural corruption
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        self.jwt_handler.decode(token)
    }
}
