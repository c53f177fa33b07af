use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;

use crate::domain::user::errors::EmailSenderError;
use crate::domain::user::errors::UserError;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::EmailMessage;
use crate::domain::user::models::PasswordReset;
use crate::domain::user::models::RegisterUserCommand;
use crate::domain::user::models::UpdateProfileCommand;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;

/// Port for identity domain service operations.
#[async_trait]
pub trait UserServicePort: Send + Sync + 'static {
    /// Register a new user with validated credentials.
    ///
    /// The duplicate-email check runs before a display identifier is
    /// allocated, so a rejected registration never consumes one.
    ///
    /// # Errors
    /// * `EmailAlreadyExists` - Email is already registered
    /// * `DatabaseError` - Store operation failed
    async fn register(&self, command: RegisterUserCommand) -> Result<User, UserError>;

    /// Verify credentials and return the matching user.
    ///
    /// Unknown email and wrong password fail identically in shape.
    ///
    /// # Errors
    /// * `InvalidCredentials` - No such user, or password does not match
    /// * `DatabaseError` - Store operation failed
    async fn authenticate(&self, email: &EmailAddress, password: &str) -> Result<User, UserError>;

    /// Retrieve user by unique identifier.
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    /// * `DatabaseError` - Store operation failed
    async fn get_user(&self, id: &UserId) -> Result<User, UserError>;

    /// Retrieve all users.
    ///
    /// # Errors
    /// * `DatabaseError` - Store operation failed
    async fn list_users(&self) -> Result<Vec<User>, UserError>;

    /// Update a user's own profile with optional fields.
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    /// * `EmailAlreadyExists` - New email is already registered
    /// * `DatabaseError` - Store operation failed
    async fn update_profile(
        &self,
        id: &UserId,
        command: UpdateProfileCommand,
    ) -> Result<User, UserError>;

    /// Begin a password reset for the given email.
    ///
    /// Succeeds with no observable difference whether or not the email is
    /// registered. When it is, a single-use token valid for ten minutes is
    /// stored (digest only) and the raw token is emailed to the account. A
    /// delivery failure rolls the stored state back before surfacing.
    ///
    /// # Errors
    /// * `EmailDelivery` - Transport reported failure (state rolled back)
    /// * `DatabaseError` - Store operation failed
    async fn request_password_reset(&self, email: &EmailAddress) -> Result<(), UserError>;

    /// Consume a reset token, setting a new password.
    ///
    /// The match-and-clear is a single atomic conditional update: a token
    /// can be consumed at most once, even under concurrent attempts.
    ///
    /// # Errors
    /// * `InvalidOrExpiredResetToken` - No user matches the token digest
    ///   with an unexpired window
    /// * `WeakPassword` - Replacement password fails the policy
    /// * `DatabaseError` - Store operation failed
    async fn reset_password(&self, raw_token: &str, new_password: &str) -> Result<(), UserError>;
}

/// Persistence operations for the user aggregate.
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Persist new user to storage.
    ///
    /// # Errors
    /// * `EmailAlreadyExists` - Email is already registered (constraint
    ///   backstop for concurrent registrations)
    /// * `DatabaseError` - Store operation failed
    async fn create(&self, user: User) -> Result<User, UserError>;

    /// Retrieve user by identifier.
    ///
    /// # Errors
    /// * `DatabaseError` - Store operation failed
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserError>;

    /// Retrieve user by normalized email address.
    ///
    /// # Errors
    /// * `DatabaseError` - Store operation failed
    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, UserError>;

    /// Retrieve all users from storage.
    ///
    /// # Errors
    /// * `DatabaseError` - Store operation failed
    async fn list_all(&self) -> Result<Vec<User>, UserError>;

    /// Update an existing user's profile fields and password hash.
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    /// * `EmailAlreadyExists` - New email is already registered
    /// * `DatabaseError` - Store operation failed
    async fn update(&self, user: User) -> Result<User, UserError>;

    /// Store a pending reset pair (digest + expiry) on a user.
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    /// * `DatabaseError` - Store operation failed
    async fn set_password_reset(
        &self,
        id: &UserId,
        reset: &PasswordReset,
    ) -> Result<(), UserError>;

    /// Clear a pending reset pair, returning the user to the absent state.
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    /// * `DatabaseError` - Store operation failed
    async fn clear_password_reset(&self, id: &UserId) -> Result<(), UserError>;

    /// Atomically consume a reset token: in one conditional update, match
    /// the stored digest with an expiry later than `now`, set the new
    /// password hash, and clear the reset pair.
    ///
    /// # Returns
    /// The updated user, or None when no row matched (wrong token or
    /// lapsed expiry - indistinguishable by design)
    ///
    /// # Errors
    /// * `DatabaseError` - Store operation failed
    async fn consume_password_reset(
        &self,
        token_digest: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, UserError>;
}

/// Monotonic allocator for named integer sequences.
#[async_trait]
pub trait SequenceAllocator: Send + Sync + 'static {
    /// Atomically increment-and-fetch the named counter, creating it on
    /// first use.
    ///
    /// Linearizable: for N concurrent calls the returned values are exactly
    /// the next N unused integers, with no duplicate and no gap. A
    /// read-then-write implementation violates this contract.
    ///
    /// # Errors
    /// * `DatabaseError` - Backing store unreachable; the caller must not
    ///   create the dependent record
    async fn allocate_next(&self, sequence: &str) -> Result<i64, UserError>;
}

/// Outbound email delivery collaborator.
#[async_trait]
pub trait EmailSender: Send + Sync + 'static {
    /// Deliver a single message.
    ///
    /// # Errors
    /// * `InvalidAddress` - Recipient or sender address unparseable
    /// * `MessageBuild` - Message construction failed
    /// * `TransportFailed` - Transport reported failure
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailSenderError>;
}
