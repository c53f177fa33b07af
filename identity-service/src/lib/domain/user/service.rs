use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;

use crate::domain::user::errors::UserError;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::EmailMessage;
use crate::domain::user::models::Password;
use crate::domain::user::models::PasswordReset;
use crate::domain::user::models::RegisterUserCommand;
use crate::domain::user::models::Role;
use crate::domain::user::models::UpdateProfileCommand;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::models::USER_DISPLAY_ID_SEQUENCE;
use crate::domain::user::ports::EmailSender;
use crate::domain::user::ports::SequenceAllocator;
use crate::domain::user::ports::UserRepository;
use crate::domain::user::ports::UserServicePort;

/// How long a password-reset token stays valid.
const RESET_TOKEN_VALIDITY_MINUTES: i64 = 10;

/// Domain service implementation for identity operations.
///
/// Concrete implementation of UserServicePort with dependency injection.
/// Argon2 work runs on the blocking thread pool so request handling stays
/// responsive while a hash is computed.
pub struct UserService<R, Q, M>
where
    R: UserRepository,
    Q: SequenceAllocator,
    M: EmailSender,
{
    repository: Arc<R>,
    sequences: Arc<Q>,
    mailer: Arc<M>,
    password_hasher: Arc<auth::PasswordHasher>,
    reset_tokens: auth::ResetTokenGenerator,
    reset_link_base: String,
}

impl<R, Q, M> UserService<R, Q, M>
where
    R: UserRepository,
    Q: SequenceAllocator,
    M: EmailSender,
{
    /// Create a new identity service with injected dependencies.
    ///
    /// # Arguments
    /// * `repository` - User persistence implementation
    /// * `sequences` - Display-identifier allocator implementation
    /// * `mailer` - Outbound email implementation
    /// * `reset_link_base` - Client base URL reset links are built on
    pub fn new(repository: Arc<R>, sequences: Arc<Q>, mailer: Arc<M>, reset_link_base: String) -> Self {
        Self {
            repository,
            sequences,
            mailer,
            password_hasher: Arc::new(auth::PasswordHasher::new()),
            reset_tokens: auth::ResetTokenGenerator::new(),
            reset_link_base,
        }
    }

    async fn hash_password(&self, password: Password) -> Result<String, UserError> {
        let hasher = Arc::clone(&self.password_hasher);

        tokio::task::spawn_blocking(move || hasher.hash(password.as_str()))
            .await
            .map_err(|e| UserError::Unknown(format!("Hashing task failed: {}", e)))?
            .map_err(|e| UserError::Unknown(format!("Password hashing failed: {}", e)))
    }

    async fn verify_password(&self, password: String, stored_hash: String) -> Result<bool, UserError> {
        let hasher = Arc::clone(&self.password_hasher);

        tokio::task::spawn_blocking(move || hasher.verify(&password, &stored_hash))
            .await
            .map_err(|e| UserError::Unknown(format!("Verification task failed: {}", e)))?
            .map_err(|e| UserError::Unknown(format!("Password verification failed: {}", e)))
    }

    fn reset_email(&self, to: &EmailAddress, raw_token: &str) -> EmailMessage {
        let reset_url = format!(
            "{}/reset-password/{}",
            self.reset_link_base.trim_end_matches('/'),
            raw_token
        );

        EmailMessage {
            to: to.to_string(),
            subject: "Password reset request".to_string(),
            html: format!(
                "<p>You requested to reset your password.</p>\
                 <p>Click the link below:</p>\
                 <a href=\"{url}\">{url}</a>\
                 <p>This link expires in <strong>{minutes} minutes</strong>.</p>",
                url = reset_url,
                minutes = RESET_TOKEN_VALIDITY_MINUTES,
            ),
        }
    }
}

#[async_trait]
impl<R, Q, M> UserServicePort for UserService<R, Q, M>
where
    R: UserRepository,
    Q: SequenceAllocator,
    M: EmailSender,
{
    async fn register(&self, command: RegisterUserCommand) -> Result<User, UserError> {
        // Duplicate check runs before the allocator so a rejected
        // registration never consumes a display identifier. The store's
        // unique constraint backstops concurrent registrations.
        if self.repository.find_by_email(&command.email).await?.is_some() {
            return Err(UserError::EmailAlreadyExists(command.email.to_string()));
        }

        let password_hash = self.hash_password(command.password).await?;

        let display_id = self
            .sequences
            .allocate_next(USER_DISPLAY_ID_SEQUENCE)
            .await?;

        let now = Utc::now();
        let user = User {
            id: UserId::new(),
            display_id,
            fullname: command.fullname,
            email: command.email,
            phone: command.phone,
            address: command.address,
            password_hash,
            role: Role::default(),
            password_reset: None,
            created_at: now,
            updated_at: now,
        };

        let created = self.repository.create(user).await?;

        tracing::info!(
            user_id = %created.id,
            display_id = created.display_id,
            "User registered"
        );

        Ok(created)
    }

    async fn authenticate(&self, email: &EmailAddress, password: &str) -> Result<User, UserError> {
        // Unknown email and wrong password are deliberately the same error.
        let user = self
            .repository
            .find_by_email(email)
            .await?
            .ok_or(UserError::InvalidCredentials)?;

        let matches = self
            .verify_password(password.to_string(), user.password_hash.clone())
            .await?;

        if !matches {
            return Err(UserError::InvalidCredentials);
        }

        Ok(user)
    }

    async fn get_user(&self, id: &UserId) -> Result<User, UserError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(UserError::NotFound(id.to_string()))
    }

    async fn list_users(&self) -> Result<Vec<User>, UserError> {
        self.repository.list_all().await
    }

    async fn update_profile(
        &self,
        id: &UserId,
        command: UpdateProfileCommand,
    ) -> Result<User, UserError> {
        let mut user = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or(UserError::NotFound(id.to_string()))?;

        if let Some(fullname) = command.fullname {
            user.fullname = fullname;
        }

        if let Some(new_email) = command.email {
            if new_email != user.email
                && self.repository.find_by_email(&new_email).await?.is_some()
            {
                return Err(UserError::EmailAlreadyExists(new_email.to_string()));
            }
            user.email = new_email;
        }

        if let Some(phone) = command.phone {
            user.phone = phone;
        }

        if let Some(address) = command.address {
            user.address = address;
        }

        if let Some(password) = command.password {
            user.password_hash = self.hash_password(password).await?;
        }

        user.updated_at = Utc::now();

        self.repository.update(user).await
    }

    async fn request_password_reset(&self, email: &EmailAddress) -> Result<(), UserError> {
        // An unknown email gets the same outcome as a known one, with no
        // record touched and no mail sent.
        let Some(user) = self.repository.find_by_email(email).await? else {
            return Ok(());
        };

        let token = self.reset_tokens.generate();
        let reset = PasswordReset {
            token_digest: token.digest,
            expires_at: Utc::now() + Duration::minutes(RESET_TOKEN_VALIDITY_MINUTES),
        };

        self.repository.set_password_reset(&user.id, &reset).await?;

        let message = self.reset_email(&user.email, &token.raw);
        if let Err(e) = self.mailer.send(&message).await {
            tracing::error!(
                user_id = %user.id,
                error = %e,
                "Reset email delivery failed, rolling back reset state"
            );
            // A dead link must never be left active.
            self.repository.clear_password_reset(&user.id).await?;
            return Err(UserError::EmailDelivery(e.to_string()));
        }

        tracing::info!(user_id = %user.id, "Password reset requested");

        Ok(())
    }

    async fn reset_password(&self, raw_token: &str, new_password: &str) -> Result<(), UserError> {
        let password = Password::new(new_password.to_string())?;

        let token_digest = self.reset_tokens.digest(raw_token);
        let new_password_hash = self.hash_password(password).await?;
        let now: DateTime<Utc> = Utc::now();

        // Single conditional update: match digest + unexpired window, set
        // the new hash, clear the pair. Expiry is checked here, lazily -
        // there is no background sweep.
        match self
            .repository
            .consume_password_reset(&token_digest, &new_password_hash, now)
            .await?
        {
            Some(user) => {
                tracing::info!(user_id = %user.id, "Password reset completed");
                Ok(())
            }
            None => Err(UserError::InvalidOrExpiredResetToken),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicI64;
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    use mockall::mock;
    use mockall::predicate::*;

    use super::*;
    use crate::domain::user::errors::EmailSenderError;

    // Define mocks in the test module using mockall
    mock! {
        pub TestUserRepository {}

        #[async_trait]
        impl UserRepository for TestUserRepository {
            async fn create(&self, user: User) -> Result<User, UserError>;
            async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserError>;
            async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, UserError>;
            async fn list_all(&self) -> Result<Vec<User>, UserError>;
            async fn update(&self, user: User) -> Result<User, UserError>;
            async fn set_password_reset(&self, id: &UserId, reset: &PasswordReset) -> Result<(), UserError>;
            async fn clear_password_reset(&self, id: &UserId) -> Result<(), UserError>;
            async fn consume_password_reset(
                &self,
                token_digest: &str,
                new_password_hash: &str,
                now: DateTime<Utc>,
            ) -> Result<Option<User>, UserError>;
        }
    }

    mock! {
        pub TestSequenceAllocator {}

        #[async_trait]
        impl SequenceAllocator for TestSequenceAllocator {
            async fn allocate_next(&self, sequence: &str) -> Result<i64, UserError>;
        }
    }

    mock! {
        pub TestEmailSender {}

        #[async_trait]
        impl EmailSender for TestEmailSender {
            async fn send(&self, message: &EmailMessage) -> Result<(), EmailSenderError>;
        }
    }

    fn service(
        repository: MockTestUserRepository,
        sequences: MockTestSequenceAllocator,
        mailer: MockTestEmailSender,
    ) -> UserService<MockTestUserRepository, MockTestSequenceAllocator, MockTestEmailSender> {
        UserService::new(
            Arc::new(repository),
            Arc::new(sequences),
            Arc::new(mailer),
            "http://localhost:3000".to_string(),
        )
    }

    fn email(address: &str) -> EmailAddress {
        EmailAddress::new(address.to_string()).unwrap()
    }

    fn register_command(address: &str) -> RegisterUserCommand {
        RegisterUserCommand::new(
            "Alice Example".to_string(),
            email(address),
            "0917 555 0101".to_string(),
            "12 Example St".to_string(),
            Password::new("password123".to_string()).unwrap(),
        )
    }

    fn sample_user(address: &str, password_hash: &str) -> User {
        let now = Utc::now();
        User {
            id: UserId::new(),
            display_id: 1,
            fullname: "Alice Example".to_string(),
            email: email(address),
            phone: "0917 555 0101".to_string(),
            address: "12 Example St".to_string(),
            password_hash: password_hash.to_string(),
            role: Role::Adopter,
            password_reset: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_register_success() {
        let mut repository = MockTestUserRepository::new();
        let mut sequences = MockTestSequenceAllocator::new();
        let mailer = MockTestEmailSender::new();

        repository
            .expect_find_by_email()
            .times(1)
            .returning(|_| Ok(None));

        sequences
            .expect_allocate_next()
            .withf(|sequence| sequence == USER_DISPLAY_ID_SEQUENCE)
            .times(1)
            .returning(|_| Ok(42));

        repository
            .expect_create()
            .withf(|user| {
                user.display_id == 42
                    && user.role == Role::Adopter
                    && user.password_reset.is_none()
                    && user.password_hash.starts_with("$argon2")
            })
            .times(1)
            .returning(|user| Ok(user));

        let service = service(repository, sequences, mailer);

        let user = service
            .register(register_command("alice@example.com"))
            .await
            .expect("registration failed");

        assert_eq!(user.display_id, 42);
        assert_eq!(user.email.as_str(), "alice@example.com");
        assert_eq!(user.role, Role::Adopter);
        // The plaintext never ends up stored
        assert!(user.password_hash.starts_with("$argon2"));
    }

    #[tokio::test]
    async fn test_register_duplicate_email_does_not_allocate() {
        let mut repository = MockTestUserRepository::new();
        let mut sequences = MockTestSequenceAllocator::new();
        let mailer = MockTestEmailSender::new();

        repository
            .expect_find_by_email()
            .times(1)
            .returning(|_| Ok(Some(sample_user("alice@example.com", "$argon2id$existing"))));

        // A rejected registration must not consume a display identifier
        sequences.expect_allocate_next().times(0);
        repository.expect_create().times(0);

        let service = service(repository, sequences, mailer);

        let result = service.register(register_command("alice@example.com")).await;
        assert!(matches!(
            result.unwrap_err(),
            UserError::EmailAlreadyExists(_)
        ));
    }

    #[tokio::test]
    async fn test_authenticate_success() {
        let hash = auth::PasswordHasher::new().hash("password123").unwrap();

        let mut repository = MockTestUserRepository::new();
        let sequences = MockTestSequenceAllocator::new();
        let mailer = MockTestEmailSender::new();

        let stored = sample_user("alice@example.com", &hash);
        let expected_id = stored.id;
        repository
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));

        let service = service(repository, sequences, mailer);

        let user = service
            .authenticate(&email("alice@example.com"), "password123")
            .await
            .expect("authentication failed");
        assert_eq!(user.id, expected_id);
    }

    #[tokio::test]
    async fn test_authenticate_failures_are_identical_in_shape() {
        let hash = auth::PasswordHasher::new().hash("password123").unwrap();

        // Wrong password
        let mut repository = MockTestUserRepository::new();
        let stored = sample_user("alice@example.com", &hash);
        repository
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));
        let service_known = service(
            repository,
            MockTestSequenceAllocator::new(),
            MockTestEmailSender::new(),
        );
        let wrong_password = service_known
            .authenticate(&email("alice@example.com"), "not-the-password")
            .await
            .unwrap_err();

        // Unknown email
        let mut repository = MockTestUserRepository::new();
        repository
            .expect_find_by_email()
            .times(1)
            .returning(|_| Ok(None));
        let service_unknown = service(
            repository,
            MockTestSequenceAllocator::new(),
            MockTestEmailSender::new(),
        );
        let unknown_email = service_unknown
            .authenticate(&email("nobody@example.com"), "password123")
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, UserError::InvalidCredentials));
        assert!(matches!(unknown_email, UserError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn test_request_reset_unknown_email_is_a_silent_noop() {
        let mut repository = MockTestUserRepository::new();
        let sequences = MockTestSequenceAllocator::new();
        let mut mailer = MockTestEmailSender::new();

        repository
            .expect_find_by_email()
            .times(1)
            .returning(|_| Ok(None));
        repository.expect_set_password_reset().times(0);
        mailer.expect_send().times(0);

        let service = service(repository, sequences, mailer);

        // Same generic outcome as the known-email case
        assert!(service
            .request_password_reset(&email("nobody@example.com"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_request_reset_stores_digest_and_mails_raw_token() {
        let stored_digest: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let sent_html: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

        let mut repository = MockTestUserRepository::new();
        let sequences = MockTestSequenceAllocator::new();
        let mut mailer = MockTestEmailSender::new();

        let stored = sample_user("alice@example.com", "$argon2id$existing");
        repository
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));

        let digest_capture = Arc::clone(&stored_digest);
        repository
            .expect_set_password_reset()
            .withf(|_, reset| reset.expires_at > Utc::now())
            .times(1)
            .returning(move |_, reset| {
                *digest_capture.lock().unwrap() = Some(reset.token_digest.clone());
                Ok(())
            });

        let html_capture = Arc::clone(&sent_html);
        mailer
            .expect_send()
            .withf(|message| message.to == "alice@example.com")
            .times(1)
            .returning(move |message| {
                *html_capture.lock().unwrap() = Some(message.html.clone());
                Ok(())
            });

        let service = service(repository, sequences, mailer);

        service
            .request_password_reset(&email("alice@example.com"))
            .await
            .expect("reset request failed");

        let digest = stored_digest.lock().unwrap().clone().unwrap();
        let html = sent_html.lock().unwrap().clone().unwrap();

        // The mail carries the raw token; the store only ever sees its digest
        let raw = html
            .split("/reset-password/")
            .nth(1)
            .and_then(|rest| rest.split('"').next())
            .expect("reset link missing from email");

        assert_ne!(raw, digest);
        assert_eq!(auth::ResetTokenGenerator::new().digest(raw), digest);
    }

    #[tokio::test]
    async fn test_request_reset_rolls_back_on_delivery_failure() {
        let mut repository = MockTestUserRepository::new();
        let sequences = MockTestSequenceAllocator::new();
        let mut mailer = MockTestEmailSender::new();

        let stored = sample_user("alice@example.com", "$argon2id$existing");
        let user_id = stored.id;
        repository
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));
        repository
            .expect_set_password_reset()
            .times(1)
            .returning(|_, _| Ok(()));

        mailer.expect_send().times(1).returning(|_| {
            Err(EmailSenderError::TransportFailed(
                "connection refused".to_string(),
            ))
        });

        // A dead link must never be left active
        repository
            .expect_clear_password_reset()
            .withf(move |id| *id == user_id)
            .times(1)
            .returning(|_| Ok(()));

        let service = service(repository, sequences, mailer);

        let result = service.request_password_reset(&email("alice@example.com")).await;
        assert!(matches!(result.unwrap_err(), UserError::EmailDelivery(_)));
    }

    #[tokio::test]
    async fn test_reset_password_consumes_matching_token() {
        let generator = auth::ResetTokenGenerator::new();
        let token = generator.generate();
        let expected_digest = token.digest.clone();

        let mut repository = MockTestUserRepository::new();
        let sequences = MockTestSequenceAllocator::new();
        let mailer = MockTestEmailSender::new();

        repository
            .expect_consume_password_reset()
            .withf(move |digest, new_hash, _| {
                digest == expected_digest && new_hash.starts_with("$argon2")
            })
            .times(1)
            .returning(|_, _, _| Ok(Some(sample_user("alice@example.com", "$argon2id$new"))));

        let service = service(repository, sequences, mailer);

        assert!(service
            .reset_password(&token.raw, "brand-new-password")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_reset_password_unmatched_token_fails() {
        let mut repository = MockTestUserRepository::new();
        let sequences = MockTestSequenceAllocator::new();
        let mailer = MockTestEmailSender::new();

        repository
            .expect_consume_password_reset()
            .times(1)
            .returning(|_, _, _| Ok(None));

        let service = service(repository, sequences, mailer);

        let result = service
            .reset_password("0123456789abcdef0123", "brand-new-password")
            .await;
        assert!(matches!(
            result.unwrap_err(),
            UserError::InvalidOrExpiredResetToken
        ));
    }

    #[tokio::test]
    async fn test_reset_password_enforces_policy_before_consuming() {
        let mut repository = MockTestUserRepository::new();
        let sequences = MockTestSequenceAllocator::new();
        let mailer = MockTestEmailSender::new();

        repository.expect_consume_password_reset().times(0);

        let service = service(repository, sequences, mailer);

        let result = service.reset_password("0123456789abcdef0123", "short").await;
        assert!(matches!(result.unwrap_err(), UserError::WeakPassword(_)));
    }

    // In-memory double backing the concurrency and end-to-end properties
    // that expectation mocks cannot express.
    #[derive(Default)]
    struct InMemoryStore {
        users: Mutex<Vec<User>>,
        counter: AtomicI64,
    }

    #[async_trait]
    impl UserRepository for InMemoryStore {
        async fn create(&self, user: User) -> Result<User, UserError> {
            let mut users = self.users.lock().unwrap();
            if users.iter().any(|u| u.email == user.email) {
                return Err(UserError::EmailAlreadyExists(user.email.to_string()));
            }
            users.push(user.clone());
            Ok(user)
        }

        async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserError> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.id == *id)
                .cloned())
        }

        async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, UserError> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.email == *email)
                .cloned())
        }

        async fn list_all(&self) -> Result<Vec<User>, UserError> {
            Ok(self.users.lock().unwrap().clone())
        }

        async fn update(&self, user: User) -> Result<User, UserError> {
            let mut users = self.users.lock().unwrap();
            let slot = users
                .iter_mut()
                .find(|u| u.id == user.id)
                .ok_or(UserError::NotFound(user.id.to_string()))?;
            *slot = user.clone();
            Ok(user)
        }

        async fn set_password_reset(
            &self,
            id: &UserId,
            reset: &PasswordReset,
        ) -> Result<(), UserError> {
            let mut users = self.users.lock().unwrap();
            let user = users
                .iter_mut()
                .find(|u| u.id == *id)
                .ok_or(UserError::NotFound(id.to_string()))?;
            user.password_reset = Some(reset.clone());
            Ok(())
        }

        async fn clear_password_reset(&self, id: &UserId) -> Result<(), UserError> {
            let mut users = self.users.lock().unwrap();
            let user = users
                .iter_mut()
                .find(|u| u.id == *id)
                .ok_or(UserError::NotFound(id.to_string()))?;
            user.password_reset = None;
            Ok(())
        }

        async fn consume_password_reset(
            &self,
            token_digest: &str,
            new_password_hash: &str,
            now: DateTime<Utc>,
        ) -> Result<Option<User>, UserError> {
            let mut users = self.users.lock().unwrap();
            let matched = users.iter_mut().find(|u| {
                u.password_reset
                    .as_ref()
                    .is_some_and(|r| r.token_digest == token_digest && r.expires_at > now)
            });

            Ok(matched.map(|user| {
                user.password_hash = new_password_hash.to_string();
                user.password_reset = None;
                user.updated_at = now;
                user.clone()
            }))
        }
    }

    #[async_trait]
    impl SequenceAllocator for InMemoryStore {
        async fn allocate_next(&self, _sequence: &str) -> Result<i64, UserError> {
            Ok(self.counter.fetch_add(1, Ordering::SeqCst) + 1)
        }
    }

    #[derive(Default)]
    struct CapturingMailer {
        sent: Mutex<Vec<EmailMessage>>,
    }

    #[async_trait]
    impl EmailSender for CapturingMailer {
        async fn send(&self, message: &EmailMessage) -> Result<(), EmailSenderError> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    fn in_memory_service(
        store: Arc<InMemoryStore>,
        mailer: Arc<CapturingMailer>,
    ) -> UserService<InMemoryStore, InMemoryStore, CapturingMailer> {
        UserService::new(
            Arc::clone(&store),
            store,
            mailer,
            "http://localhost:3000".to_string(),
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_registrations_get_distinct_gapless_display_ids() {
        const REGISTRATIONS: i64 = 16;

        let store = Arc::new(InMemoryStore::default());
        let mailer = Arc::new(CapturingMailer::default());
        let service = Arc::new(in_memory_service(Arc::clone(&store), mailer));

        let mut handles = Vec::new();
        for i in 0..REGISTRATIONS {
            let service = Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                service
                    .register(register_command(&format!("user{}@example.com", i)))
                    .await
            }));
        }

        let mut display_ids = Vec::new();
        for handle in handles {
            let user = handle.await.unwrap().expect("registration failed");
            display_ids.push(user.display_id);
        }

        // Exactly {1..N}: no duplicate, no gap
        display_ids.sort_unstable();
        assert_eq!(display_ids, (1..=REGISTRATIONS).collect::<Vec<_>>());
    }

    fn raw_token_from(message: &EmailMessage) -> String {
        message
            .html
            .split("/reset-password/")
            .nth(1)
            .and_then(|rest| rest.split('"').next())
            .expect("reset link missing from email")
            .to_string()
    }

    #[tokio::test]
    async fn test_end_to_end_reset_token_is_single_use() {
        let store = Arc::new(InMemoryStore::default());
        let mailer = Arc::new(CapturingMailer::default());
        let service = in_memory_service(Arc::clone(&store), Arc::clone(&mailer));

        let user = service
            .register(register_command("alice@example.com"))
            .await
            .expect("registration failed");

        service
            .request_password_reset(&user.email)
            .await
            .expect("reset request failed");

        let raw = raw_token_from(&mailer.sent.lock().unwrap()[0]);

        // Consume within the validity window
        service
            .reset_password(&raw, "a-new-password")
            .await
            .expect("reset failed");

        // The old password no longer works, the new one does
        assert!(matches!(
            service
                .authenticate(&user.email, "password123")
                .await
                .unwrap_err(),
            UserError::InvalidCredentials
        ));
        assert!(service
            .authenticate(&user.email, "a-new-password")
            .await
            .is_ok());

        // The state machine is back to absent: a second consume fails
        let result = service.reset_password(&raw, "another-password").await;
        assert!(matches!(
            result.unwrap_err(),
            UserError::InvalidOrExpiredResetToken
        ));
    }

    #[tokio::test]
    async fn test_expired_reset_token_is_rejected_and_password_unchanged() {
        let store = Arc::new(InMemoryStore::default());
        let mailer = Arc::new(CapturingMailer::default());
        let service = in_memory_service(Arc::clone(&store), Arc::clone(&mailer));

        let user = service
            .register(register_command("alice@example.com"))
            .await
            .expect("registration failed");

        service
            .request_password_reset(&user.email)
            .await
            .expect("reset request failed");

        // Rewind the stored expiry past the validity window
        {
            let mut users = store.users.lock().unwrap();
            let reset = users[0].password_reset.as_mut().unwrap();
            reset.expires_at = Utc::now() - Duration::minutes(1);
        }

        let raw = raw_token_from(&mailer.sent.lock().unwrap()[0]);

        let result = service.reset_password(&raw, "a-new-password").await;
        assert!(matches!(
            result.unwrap_err(),
            UserError::InvalidOrExpiredResetToken
        ));

        // The original password still authenticates
        assert!(service
            .authenticate(&user.email, "password123")
            .await
            .is_ok());
    }
}
