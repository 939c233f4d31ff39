//! Configuration module for environment variable parsing.
//!
//! Everything is read once at startup; registries built from it are never
//! refreshed, so a restart is required to pick up changes.

use std::env;

use tracing::warn;
use url::Url;

use crate::error::ConfigError;
use crate::types::{domain_part, MailingList};

/// Default Mailgun API endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.mailgun.net/v3";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Public base URL of this service, used to check installed webhooks
    pub host: String,

    /// Mailgun private API key
    pub mailgun_api_key: Option<String>,

    /// Mailgun API base URL
    pub mailgun_api_base: String,

    /// Copy every bounce reply and failure notice to this address
    pub bounce_cc: Option<String>,

    /// Blind copy every bounce reply and failure notice to this address
    pub bounce_bcc: Option<String>,

    /// Default help contact for relay failure notices
    pub help_email: Option<String>,

    /// Configured mailing lists
    pub mailing_lists: Vec<MailingList>,

    /// Maximum accepted webhook body size
    pub max_body_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mailing_lists = match parse_optional("MAILING_LISTS") {
            Some(raw) => parse_lists(&raw)?,
            None => Vec::new(),
        };

        Ok(Config {
            port: env::var("PORT")
                .ok()
                .and_then(|v| parse_or_warn("PORT", &v))
                .unwrap_or(50708),

            host: normalize_host(parse_optional("HOST").as_deref())?,

            mailgun_api_key: parse_optional("MAILGUN_API_KEY"),

            mailgun_api_base: parse_optional("MAILGUN_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),

            bounce_cc: parse_optional("BOUNCE_CC"),

            bounce_bcc: parse_optional("BOUNCE_BCC"),

            help_email: parse_optional("HELP_EMAIL"),

            mailing_lists,

            max_body_bytes: env::var("MAX_BODY_BYTES")
                .ok()
                .and_then(|v| parse_or_warn("MAX_BODY_BYTES", &v))
                .unwrap_or(25 * 1024 * 1024),
        })
    }

    /// URL a provider webhook should point at for the given path.
    pub fn webhook_url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }
}

/// Read a variable, treating blank values as unset.
fn parse_optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or_warn<T: std::str::FromStr>(name: &str, raw: &str) -> Option<T> {
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            None
        }
    }
}

/// Parse the `MAILING_LISTS` JSON array.
fn parse_lists(raw: &str) -> Result<Vec<MailingList>, ConfigError> {
    let lists: Vec<MailingList> = serde_json::from_str(raw).map_err(ConfigError::MailingLists)?;

    for list in &lists {
        if domain_part(&list.public_address).is_none() {
            return Err(ConfigError::ListAddress(list.public_address.clone()));
        }
    }

    Ok(lists)
}

/// Validate `HOST` and strip the trailing slash so paths can be appended.
fn normalize_host(raw: Option<&str>) -> Result<String, ConfigError> {
    let Some(raw) = raw else {
        return Ok(String::new());
    };

    let url = Url::parse(raw).map_err(ConfigError::Host)?;
    Ok(url.as_str().trim_end_matches('/').to_string())
}
