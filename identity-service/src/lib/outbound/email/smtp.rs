use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::AsyncSmtpTransport;
use lettre::AsyncTransport;
use lettre::Message;
use lettre::Tokio1Executor;

use crate::config::EmailConfig;
use crate::domain::user::errors::EmailSenderError;
use crate::domain::user::models::EmailMessage;
use crate::domain::user::ports::EmailSender;

/// SMTP delivery for transactional mail (reset links).
pub struct SmtpEmailSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpEmailSender {
    /// Create a sender from configuration.
    ///
    /// Credentials are only attached when a username is configured, so a
    /// local development relay works without authentication.
    ///
    /// # Errors
    /// * `TransportFailed` - Relay parameters are invalid
    pub fn new(config: &EmailConfig) -> Result<Self, EmailSenderError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| EmailSenderError::TransportFailed(e.to_string()))?
            .port(config.smtp_port);

        if !config.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ));
        }

        Ok(Self {
            mailer: builder.build(),
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailSenderError> {
        let email = Message::builder()
            .from(self.from_address.parse().map_err(|_| {
                EmailSenderError::InvalidAddress(self.from_address.clone())
            })?)
            .to(message
                .to
                .parse()
                .map_err(|_| EmailSenderError::InvalidAddress(message.to.clone()))?)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(message.html.clone())
            .map_err(|e| EmailSenderError::MessageBuild(e.to_string()))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| EmailSenderError::TransportFailed(e.to_string()))?;

        Ok(())
    }
}
