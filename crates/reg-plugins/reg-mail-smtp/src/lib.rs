//! # reg-mail-smtp
//!
//! SMTP implementation of `EmailTransport` on top of lettre's blocking
//! transport. One connection attempt per email; failures go back to the
//! caller, which logs them and moves on to the next recipient.

use anyhow::Context;
use lettre::message::{header::ContentType, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use reg_core::{Email, EmailTransport};

/// SMTP relay settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    /// STARTTLS/TLS relay when true, plaintext otherwise.
    #[serde(default = "default_tls")]
    pub use_tls: bool,
}

fn default_port() -> u16 {
    587
}

fn default_tls() -> bool {
    true
}

pub struct SmtpMailer {
    transport: SmtpTransport,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> anyhow::Result<Self> {
        let builder = if config.use_tls {
            SmtpTransport::relay(&config.host)
                .with_context(|| format!("invalid SMTP relay {}", config.host))?
        } else {
            SmtpTransport::builder_dangerous(&config.host)
        }
        .port(config.port);

        let builder = match (&config.username, &config.password) {
            (Some(username), Some(password)) => builder.credentials(Credentials::new(
                username.clone(),
                password.expose_secret().to_string(),
            )),
            _ => builder,
        };

        Ok(Self {
            transport: builder.build(),
        })
    }
}

impl EmailTransport for SmtpMailer {
    fn send(&self, email: &Email) -> anyhow::Result<()> {
        let message = build_message(email)?;
        self.transport
            .send(&message)
            .with_context(|| format!("SMTP delivery to {} failed", email.to_address))?;
        debug!(to = %email.to_address, "registration email sent");
        Ok(())
    }
}

/// Turns an [`Email`] into a MIME message. Plain text only, or
/// text + HTML alternatives when an HTML body is present.
pub fn build_message(email: &Email) -> anyhow::Result<Message> {
    let from = Mailbox::new(
        Some(email.from_name.clone()),
        email
            .from_address
            .parse()
            .with_context(|| format!("invalid sender address {}", email.from_address))?,
    );
    let to = Mailbox::new(
        email.to_name.clone(),
        email
            .to_address
            .parse()
            .with_context(|| format!("invalid recipient address {}", email.to_address))?,
    );

    let builder = Message::builder()
        .from(from.clone())
        .reply_to(from)
        .to(to)
        .subject(email.subject.clone());

    let message = match &email.html_body {
        Some(html) => builder.multipart(MultiPart::alternative_plain_html(
            email.text_body.clone(),
            html.clone(),
        ))?,
        None => builder
            .header(ContentType::TEXT_PLAIN)
            .body(email.text_body.clone())?,
    };
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(to: &str) -> Email {
        Email {
            to_name: None,
            to_address: to.to_string(),
            from_name: "Example Chat".to_string(),
            from_address: "no_reply@example.org".to_string(),
            subject: "User Registration".to_string(),
            text_body: "A new user with the username 'alice' just registered.".to_string(),
            html_body: None,
        }
    }

    #[test]
    fn builds_plain_text_message() {
        let message = build_message(&email("ops@example.org")).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("To: ops@example.org"));
        assert!(raw.contains("Subject: User Registration"));
        assert!(raw.contains("\"Example Chat\" <no_reply@example.org>"));
        assert!(raw.contains("just registered."));
    }

    #[test]
    fn rejects_unparseable_recipient() {
        let err = build_message(&email("not an address")).unwrap_err();
        assert!(err.to_string().contains("invalid recipient address"));
    }

    #[test]
    fn html_body_becomes_alternative() {
        let mut email = email("ops@example.org");
        email.html_body = Some("<p>hi</p>".to_string());
        let raw = String::from_utf8(build_message(&email).unwrap().formatted()).unwrap();
        assert!(raw.contains("multipart/alternative"));
    }

    #[test]
    fn config_defaults() {
        let config: SmtpConfig = serde_json::from_str(r#"{"host":"smtp.example.org"}"#).unwrap();
        assert_eq!(config.port, 587);
        assert!(config.use_tls);
        assert!(config.password.is_none());
        assert!(SmtpMailer::new(&config).is_ok());
    }
}
