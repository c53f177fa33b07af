use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::user::errors::EmailError;
use crate::domain::user::errors::PasswordPolicyError;
use crate::domain::user::errors::RoleError;
use crate::domain::user::errors::UserIdError;

/// Name of the counter backing user display identifiers.
pub const USER_DISPLAY_ID_SEQUENCE: &str = "user_display_id";

/// User aggregate entity.
///
/// `display_id` is the human-facing sequential integer, assigned exactly
/// once at creation and never reused; `id` is the storage primary key.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub display_id: i64,
    pub fullname: String,
    pub email: EmailAddress,
    pub phone: String,
    pub address: String,
    pub password_hash: String,
    pub role: Role,
    pub password_reset: Option<PasswordReset>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User unique identifier type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Generate a new random user ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a user ID from string.
    ///
    /// # Errors
    /// * `InvalidFormat` - String is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self, UserIdError> {
        Uuid::parse_str(s)
            .map(UserId)
            .map_err(|e| UserIdError::InvalidFormat(e.to_string()))
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Email address type
///
/// Validates format using an RFC 5322 compliant parser and normalizes to
/// lowercase on construction, so equality and uniqueness are
/// case-insensitive everywhere downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Create a new validated, lowercased email address.
    ///
    /// # Errors
    /// * `InvalidFormat` - Email does not conform to RFC 5322
    pub fn new(email: String) -> Result<Self, EmailError> {
        let normalized = email.trim().to_lowercase();

        email_address::EmailAddress::from_str(&normalized)
            .map(|_| EmailAddress(normalized))
            .map_err(|e| EmailError::InvalidFormat(e.to_string()))
    }

    /// Get email as string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Plaintext password accepted at a boundary, validated against the
/// password policy before any hashing happens.
#[derive(Clone)]
pub struct Password(String);

impl Password {
    const MIN_LENGTH: usize = 8;

    /// Create a new policy-checked password.
    ///
    /// # Errors
    /// * `TooShort` - Password shorter than 8 characters
    pub fn new(password: String) -> Result<Self, PasswordPolicyError> {
        let length = password.len();
        if length < Self::MIN_LENGTH {
            return Err(PasswordPolicyError::TooShort {
                min: Self::MIN_LENGTH,
                actual: length,
            });
        }
        Ok(Self(password))
    }

    /// Get the plaintext as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the wrapper, yielding the plaintext.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Closed role tag.
///
/// Every boundary that accepts a role string parses it through here, so an
/// unknown role can never reach a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Adopter,
    Admin,
}

impl Role {
    /// Get the role's canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Adopter => "adopter",
            Role::Admin => "admin",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Adopter
    }
}

impl FromStr for Role {
    type Err = RoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "adopter" => Ok(Role::Adopter),
            "admin" => Ok(Role::Admin),
            other => Err(RoleError::Unknown(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pending password-reset state on a user record.
///
/// Only the one-way digest of the raw token is kept; the pair is set and
/// cleared together, never one field without the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordReset {
    pub token_digest: String,
    pub expires_at: DateTime<Utc>,
}

/// Command to register a new user with validated fields.
#[derive(Debug)]
pub struct RegisterUserCommand {
    pub fullname: String,
    pub email: EmailAddress,
    pub phone: String,
    pub address: String,
    pub password: Password,
}

impl RegisterUserCommand {
    /// Construct a new register command.
    ///
    /// # Arguments
    /// * `fullname`, `phone`, `address` - Required profile attributes
    /// * `email` - Validated, normalized email address
    /// * `password` - Policy-checked plaintext (hashed by the service)
    pub fn new(
        fullname: String,
        email: EmailAddress,
        phone: String,
        address: String,
        password: Password,
    ) -> Self {
        Self {
            fullname,
            email,
            phone,
            address,
            password,
        }
    }
}

/// Command to update a user's own profile with optional validated fields.
///
/// Only provided fields are updated.
#[derive(Debug)]
pub struct UpdateProfileCommand {
    pub fullname: Option<String>,
    pub email: Option<EmailAddress>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub password: Option<Password>,
}

/// Outgoing email handed to the sender collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}
