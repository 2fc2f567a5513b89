//! Runtime configuration, read once at startup.
//!
//! Three secrets are required — the model API key and the mail
//! address/app-password pair. A missing secret is a startup failure, never
//! a runtime one.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::lifecycle::DEFAULT_MAIL_SUBJECT;
use crate::mail::SmtpConfig;

const DEFAULT_MODEL: &str = "llama3-70b-8192";
const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_WORKBOOK: &str = "./data/SupportTickets.xlsx";
const DEFAULT_HTTP_PORT: u16 = 8080;

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Groq API key.
    pub groq_api_key: SecretString,
    /// Chat model identifier.
    pub model: String,
    /// SMTP relay settings (STARTTLS submission).
    pub smtp: SmtpConfig,
    /// Path of the ticket workbook (created on first use).
    pub workbook_path: PathBuf,
    /// HTTP listen port.
    pub http_port: u16,
    /// Fixed subject line for outbound replies.
    pub mail_subject: String,
}

impl Config {
    /// Build configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup (testable core of
    /// `from_env`).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let groq_api_key = required(&lookup, "GROQ_API_KEY")?;
        let email_address = required(&lookup, "EMAIL_ADDRESS")?;
        let email_app_password = required(&lookup, "EMAIL_APP_PASSWORD")?;

        let smtp_port = match lookup("SMTP_PORT") {
            None => DEFAULT_SMTP_PORT,
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "SMTP_PORT".to_string(),
                message: format!("not a port number: {raw}"),
            })?,
        };

        let http_port = match lookup("TICKET_HTTP_PORT") {
            None => DEFAULT_HTTP_PORT,
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "TICKET_HTTP_PORT".to_string(),
                message: format!("not a port number: {raw}"),
            })?,
        };

        Ok(Self {
            groq_api_key: SecretString::from(groq_api_key),
            model: lookup("TICKET_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            smtp: SmtpConfig {
                host: lookup("SMTP_HOST").unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
                port: smtp_port,
                address: email_address,
                app_password: SecretString::from(email_app_password),
            },
            workbook_path: lookup("TICKET_WORKBOOK")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_WORKBOOK)),
            http_port,
            mail_subject: lookup("MAIL_SUBJECT")
                .unwrap_or_else(|| DEFAULT_MAIL_SUBJECT.to_string()),
        })
    }
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<String, ConfigError> {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        move |key| map.get(key).map(|v| v.to_string())
    }

    const SECRETS: [(&str, &str); 3] = [
        ("GROQ_API_KEY", "gsk-test"),
        ("EMAIL_ADDRESS", "support@example.com"),
        ("EMAIL_APP_PASSWORD", "app-password"),
    ];

    #[test]
    fn defaults_applied_when_only_secrets_set() {
        let config = Config::from_lookup(env(&SECRETS)).unwrap();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.smtp.host, DEFAULT_SMTP_HOST);
        assert_eq!(config.smtp.port, DEFAULT_SMTP_PORT);
        assert_eq!(config.http_port, DEFAULT_HTTP_PORT);
        assert_eq!(config.mail_subject, DEFAULT_MAIL_SUBJECT);
    }

    #[test]
    fn missing_secret_names_the_variable() {
        let err = Config::from_lookup(env(&SECRETS[..2])).unwrap_err();
        assert!(err.to_string().contains("EMAIL_APP_PASSWORD"));
    }

    #[test]
    fn blank_secret_counts_as_missing() {
        let pairs = [
            ("GROQ_API_KEY", "  "),
            ("EMAIL_ADDRESS", "support@example.com"),
            ("EMAIL_APP_PASSWORD", "pw"),
        ];
        let err = Config::from_lookup(env(&pairs)).unwrap_err();
        assert!(err.to_string().contains("GROQ_API_KEY"));
    }

    #[test]
    fn invalid_port_is_rejected() {
        let pairs = [
            ("GROQ_API_KEY", "gsk-test"),
            ("EMAIL_ADDRESS", "support@example.com"),
            ("EMAIL_APP_PASSWORD", "pw"),
            ("SMTP_PORT", "not-a-port"),
        ];
        let err = Config::from_lookup(env(&pairs)).unwrap_err();
        assert!(err.to_string().contains("SMTP_PORT"));
    }

    #[test]
    fn overrides_take_effect() {
        let pairs = [
            ("GROQ_API_KEY", "gsk-test"),
            ("EMAIL_ADDRESS", "support@example.com"),
            ("EMAIL_APP_PASSWORD", "pw"),
            ("TICKET_MODEL", "llama-3.3-70b-versatile"),
            ("TICKET_WORKBOOK", "/var/lib/tickets/book.xlsx"),
            ("TICKET_HTTP_PORT", "9090"),
        ];
        let config = Config::from_lookup(env(&pairs)).unwrap();
        assert_eq!(config.model, "llama-3.3-70b-versatile");
        assert_eq!(config.workbook_path, PathBuf::from("/var/lib/tickets/book.xlsx"));
        assert_eq!(config.http_port, 9090);
    }
}
