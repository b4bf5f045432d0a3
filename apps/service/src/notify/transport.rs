use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::config::Email;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("could not build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("SMTP delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Delivery seam for composed digests. A send either fully succeeds or
/// reports an error; the caller decides what a failure means for the
/// cycle.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<(), TransportError>;
}

/// SMTP delivery over STARTTLS with credential auth. One message is
/// composed and submitted per configured recipient.
pub struct SmtpTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
    recipients: Vec<Mailbox>,
}

impl SmtpTransport {
    pub fn new(settings: &Email) -> Result<Self, TransportError> {
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.server)?
            .port(settings.port)
            .credentials(Credentials::new(settings.user.clone(), settings.password.clone()))
            .build();

        let sender: Mailbox = format!("hostwatch@{}", settings.sender_domain).parse()?;
        let recipients = settings
            .recipients
            .iter()
            .map(|recipient| recipient.parse())
            .collect::<Result<Vec<Mailbox>, _>>()?;

        Ok(Self { mailer, sender, recipients })
    }
}

#[async_trait]
impl Transport for SmtpTransport {
    async fn send(&self, subject: &str, body: &str) -> Result<(), TransportError> {
        for recipient in &self.recipients {
            let message = Message::builder()
                .from(self.sender.clone())
                .to(recipient.clone())
                .subject(subject)
                .date_now()
                .body(body.to_string())?;

            self.mailer.send(message).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Email {
        Email {
            server: "mail.example.com".into(),
            port: 587,
            user: "watch@example.com".into(),
            password: "secret".into(),
            sender_domain: "example.net".into(),
            recipients: vec!["ops@example.com".into(), "oncall@example.com".into()],
        }
    }

    #[test]
    fn builds_sender_from_domain() {
        let transport = SmtpTransport::new(&settings()).unwrap();
        assert_eq!(transport.sender.email.to_string(), "hostwatch@example.net");
        assert_eq!(transport.recipients.len(), 2);
    }

    #[test]
    fn rejects_malformed_recipient() {
        let mut bad = settings();
        bad.recipients.push("not-an-address".into());
        assert!(matches!(SmtpTransport::new(&bad), Err(TransportError::Address(_))));
    }
}
