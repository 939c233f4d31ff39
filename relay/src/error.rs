//! Typed errors for the relay library.
//!
//! - `EventError`: an inbound webhook payload could not be understood
//! - `ProviderError`: the outbound mail client failed
//! - `ConfigError`: startup configuration is invalid

use thiserror::Error;

/// A malformed inbound event. Processing of that single event is aborted.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("Sender address has no domain: {0:?}")]
    MalformedSender(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid event payload: {0}")]
    Payload(#[source] serde_json::Error),

    #[error("Invalid attachments field: {0}")]
    Attachments(#[source] serde_json::Error),

    #[error("Invalid content-id-map field: {0}")]
    ContentIdMap(#[source] serde_json::Error),
}

/// Failure talking to the mail provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Invalid API base URL: {0}")]
    InvalidBase(#[from] url::ParseError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to fetch attachment {url}: {source}")]
    AttachmentFetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("MAILING_LISTS is not valid JSON: {0}")]
    MailingLists(#[source] serde_json::Error),

    #[error("Mailing list public address has no domain: {0}")]
    ListAddress(String),

    #[error("HOST is not a valid URL: {0}")]
    Host(#[source] url::ParseError),
}
