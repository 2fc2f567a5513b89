//! Outbound mail — SMTP submission over STARTTLS via lettre.
//!
//! The mailer never raises: every transport, auth, and protocol failure is
//! reported as a `MailOutcome` so the lifecycle can record the ticket and
//! surface the failure to an operator instead of losing the ticket.

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Delivery status. `Sent` means confirmed handoff to the relay, not
/// delivery to the end recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MailStatus {
    Sent,
    Failed,
}

/// Outcome of a send attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailOutcome {
    pub status: MailStatus,
    pub message: String,
}

impl MailOutcome {
    pub fn sent(to: &str) -> Self {
        Self {
            status: MailStatus::Sent,
            message: format!("Email accepted by relay for {to}"),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: MailStatus::Failed,
            message: reason.into(),
        }
    }

    pub fn is_sent(&self) -> bool {
        self.status == MailStatus::Sent
    }
}

/// Sends a plain-text message to an address. Infallible by contract.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> MailOutcome;
}

/// SMTP mailer configuration (address/app-password pair).
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub address: String,
    pub app_password: SecretString,
}

/// Mailer backed by an SMTP relay, STARTTLS on the submission port.
pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> MailOutcome {
        let config = self.config.clone();
        let to = to.to_string();
        let subject = subject.to_string();
        let body = body.to_string();

        // lettre's sync transport blocks on the socket.
        let result =
            tokio::task::spawn_blocking(move || send_blocking(&config, &to, &subject, &body))
                .await;

        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Mail send task panicked");
                MailOutcome::failed(format!("send task failed: {e}"))
            }
        }
    }
}

fn send_blocking(config: &SmtpConfig, to: &str, subject: &str, body: &str) -> MailOutcome {
    let from = match config.address.parse() {
        Ok(mbox) => mbox,
        Err(e) => return MailOutcome::failed(format!("invalid from address: {e}")),
    };
    let to_mbox = match to.parse() {
        Ok(mbox) => mbox,
        Err(e) => return MailOutcome::failed(format!("invalid recipient address {to}: {e}")),
    };

    let email = match Message::builder()
        .from(from)
        .to(to_mbox)
        .subject(subject)
        .body(body.to_string())
    {
        Ok(msg) => msg,
        Err(e) => return MailOutcome::failed(format!("failed to build email: {e}")),
    };

    let transport = match SmtpTransport::starttls_relay(&config.host) {
        Ok(builder) => builder
            .port(config.port)
            .credentials(Credentials::new(
                config.address.clone(),
                config.app_password.expose_secret().to_string(),
            ))
            .build(),
        Err(e) => return MailOutcome::failed(format!("SMTP relay error: {e}")),
    };

    match transport.send(&email) {
        Ok(_) => {
            info!(to = %to, "Email accepted by relay");
            MailOutcome::sent(to)
        }
        Err(e) => {
            warn!(to = %to, error = %e, "SMTP send failed");
            MailOutcome::failed(format!("SMTP send failed: {e}"))
        }
    }
}
