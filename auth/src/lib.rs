//! Authentication utilities library
//!
//! Provides reusable authentication infrastructure for the identity service:
//! - Password hashing (Argon2id)
//! - JWT bearer-token issuance and verification
//! - Single-use password-reset token generation and digesting
//!
//! The service crate defines its own domain traits and adapts these
//! implementations. Nothing in here knows about users, roles as domain
//! concepts, or storage.
//!
//! # Examples
//!
//! ## Password Hashing
//! ```
//! use auth::PasswordHasher;
//!
//! let hasher = PasswordHasher::new();
//! let hash = hasher.hash("my_password").unwrap();
//! let is_valid = hasher.verify("my_password", &hash).unwrap();
//! assert!(is_valid);
//! ```
//!
//! ## Bearer Tokens
//! ```
//! use auth::Authenticator;
//!
//! let issuer = Authenticator::new(b"secret_key_at_least_32_bytes_long!", 24);
//! let token = issuer.issue("user123", "adopter", "a@example.com").unwrap();
//! let claims = issuer.verify(&token).unwrap();
//! assert_eq!(claims.sub, "user123");
//! ```
//!
//! ## Reset Tokens
//! ```
//! use auth::ResetTokenGenerator;
//!
//! let generator = ResetTokenGenerator::new();
//! let token = generator.generate();
//! // The raw token goes to the user; only the digest is stored.
//! assert_eq!(generator.digest(&token.raw), token.digest);
//! ```

pub mod authenticator;
pub mod jwt;
pub mod password;
pub mod reset;

// Re-export commonly used items
pub use authenticator::Authenticator;
pub use jwt::Claims;
pub use jwt::JwtError;
pub use jwt::JwtHandler;
pub use password::PasswordError;
pub use password::PasswordHasher;
pub use reset::GeneratedResetToken;
pub use reset::ResetTokenGenerator;
