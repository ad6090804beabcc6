//! Mail transports
//!
//! [`SmtpMailer`] relays through an SMTP server with STARTTLS.
//! [`RecordingMailer`] keeps messages in memory and is used when SMTP is not
//! configured outside production, and in tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Serialize;
use tracing::info;
use crate::config::settings::EmailConfig;
use crate::utils::errors::{EmailError, Result};

/// A rendered HTML email ready to send
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<()>;

    /// Short transport name for health output
    fn name(&self) -> &'static str;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let from: Mailbox = format!("{} <{}>", config.sender_name, config.sender_email)
            .parse()
            .map_err(EmailError::Address)?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(EmailError::Transport)?
            .port(config.smtp_port);

        if let (Some(user), Some(pass)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        let to: Mailbox = email.to.parse().map_err(EmailError::Address)?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(email.html_body.clone())
            .map_err(|e| EmailError::Build(e.to_string()))?;

        self.transport.send(message).await.map_err(EmailError::Transport)?;

        info!(to = %email.to, subject = %email.subject, "Email sent via SMTP");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}

/// In-memory transport
#[derive(Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<OutgoingEmail>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send to `address` fail
    pub fn fail_for(&self, address: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(address.to_lowercase());
        }
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sent_to(&self, address: &str) -> Vec<OutgoingEmail> {
        let address = address.to_lowercase();
        self.sent()
            .into_iter()
            .filter(|e| e.to.to_lowercase() == address)
            .collect()
    }
}

#[async_trait]
impl MailTransport for RecordingMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        let should_fail = self
            .failing
            .lock()
            .map(|f| f.contains(&email.to.to_lowercase()))
            .unwrap_or(false);
        if should_fail {
            return Err(EmailError::Build(format!("recipient {} rejected", email.to)).into());
        }

        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email.clone());
        }
        info!(to = %email.to, subject = %email.subject, "Email recorded");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_mailer() {
        let mailer = RecordingMailer::new();
        mailer.fail_for("Bad@Example.com");

        let ok = OutgoingEmail { to: "good@example.com".into(), subject: "Hi".into(), html_body: "<p>x</p>".into() };
        let bad = OutgoingEmail { to: "bad@example.com".into(), ..ok.clone() };

        assert!(mailer.send(&ok).await.is_ok());
        assert!(mailer.send(&bad).await.is_err());
        assert_eq!(mailer.sent().len(), 1);
        assert_eq!(mailer.sent_to("GOOD@example.com").len(), 1);
    }

    #[test]
    fn test_smtp_mailer_builds_from_defaults() {
        let settings = crate::config::Settings::default();
        let mailer = SmtpMailer::new(&settings.email).unwrap();
        assert_eq!(mailer.name(), "smtp");
    }
}
