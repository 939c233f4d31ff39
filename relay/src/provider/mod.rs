//! Outbound mail client.
//!
//! The relay only decides *what* to send; delivery is delegated to a
//! `MailProvider`. Production uses the Mailgun HTTP API.

pub mod mailgun;

#[cfg(test)]
pub mod testing;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{Domain, OutboundMessage, Route};

pub use mailgun::{DomainClient, Mailgun};

/// Capabilities the relay needs from the mail provider.
#[async_trait]
pub trait MailProvider: Send + Sync {
    /// Send a composed message through the given sending domain.
    async fn send(&self, domain: &str, message: &OutboundMessage) -> Result<(), ProviderError>;

    /// List every domain on the account, active or not.
    async fn list_domains(&self) -> Result<Vec<Domain>, ProviderError>;

    /// URLs configured for the permanent failure webhook of a domain.
    async fn webhook_urls(&self, domain: &str) -> Result<Vec<String>, ProviderError>;

    /// List the account's inbound routes.
    async fn list_routes(&self) -> Result<Vec<Route>, ProviderError>;
}
