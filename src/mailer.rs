//! Fire-and-forget mail notifications.
//!
//! Formats and dispatches a single message over SMTP (STARTTLS). Delivery is
//! best-effort: success and failure are logged, nothing is returned to the
//! caller, and there is no retry or queue.

use anyhow::{Context, Result};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::{error, info};

use crate::config::MailConfig;

/// A single outbound notification.
#[derive(Debug, Clone)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub text: String,
}

/// SMTP notification sender.
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl Mailer {
    /// Build a sender from the mail configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when `mail.from` is not a valid mailbox or the SMTP
    /// transport cannot be constructed. No connection is made here.
    pub fn new(config: &MailConfig) -> Result<Self> {
        let from = config
            .from
            .parse::<Mailbox>()
            .with_context(|| format!("invalid mail.from: '{}'", config.from))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .with_context(|| format!("invalid mail.host: '{}'", config.host))?
            .port(config.port);
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    /// Send one notification, best-effort.
    ///
    /// Returns nothing actionable: a malformed recipient or a delivery
    /// failure is logged and dropped.
    pub async fn send(&self, notification: Notification) {
        let message = match self.build_message(&notification) {
            Ok(message) => message,
            Err(e) => {
                error!("could not build notification to {}: {:#}", notification.to, e);
                return;
            }
        };

        match self.transport.send(message).await {
            Ok(response) => info!(
                "notification '{}' sent to {}: {}",
                notification.subject,
                notification.to,
                response.code()
            ),
            Err(e) => error!("failed to send notification to {}: {}", notification.to, e),
        }
    }

    fn build_message(&self, notification: &Notification) -> Result<Message> {
        let to = notification
            .to
            .parse::<Mailbox>()
            .with_context(|| format!("invalid recipient: '{}'", notification.to))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(notification.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                notification.text.clone(),
                format!("<b>{}</b>", notification.text),
            ))
            .context("building mime message")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mailer() -> Mailer {
        Mailer::new(&MailConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: Some("bot".to_string()),
            password: Some("secret".to_string()),
            from: "Chat Bot <bot@example.com>".to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_build_message_carries_both_bodies() {
        let message = mailer()
            .build_message(&Notification {
                to: "someone@example.com".to_string(),
                subject: "hello".to_string(),
                text: "rubbish recorded".to_string(),
            })
            .unwrap();

        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: hello"));
        assert!(raw.contains("rubbish recorded"));
        assert!(raw.contains("<b>rubbish recorded</b>"));
    }

    #[tokio::test]
    async fn test_build_message_rejects_bad_recipient() {
        assert!(mailer()
            .build_message(&Notification {
                to: "not a mailbox".to_string(),
                subject: "hello".to_string(),
                text: "x".to_string(),
            })
            .is_err());
    }

    #[tokio::test]
    async fn test_invalid_from_rejected_at_construction() {
        let result = Mailer::new(&MailConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: None,
            password: None,
            from: "not a mailbox".to_string(),
        });
        assert!(result.is_err());
    }
}
