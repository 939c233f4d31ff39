//! Registry of managed (active) sending domains.

use std::collections::HashMap;

use futures::future::join_all;
use tracing::{info, warn};

use crate::error::ProviderError;
use crate::provider::MailProvider;
use crate::types::Domain;

/// Domains this service may send bounce notifications for.
#[derive(Debug, Clone, Default)]
pub struct DomainRegistry {
    domains: HashMap<String, Domain>,
}

/// Result of checking a domain's permanent failure webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookStatus {
    Installed,
    Missing,
    /// The lookup failed; the domain is still managed
    Unknown,
}

impl WebhookStatus {
    pub fn glyph(self) -> &'static str {
        match self {
            WebhookStatus::Installed => "✔",
            WebhookStatus::Missing => "✘",
            WebhookStatus::Unknown => "?",
        }
    }
}

impl DomainRegistry {
    /// Build a registry keeping only active domains.
    pub fn from_domains(domains: impl IntoIterator<Item = Domain>) -> Self {
        let domains = domains
            .into_iter()
            .filter(|d| d.active)
            .map(|d| (d.name.clone(), d))
            .collect();

        Self { domains }
    }

    /// Fetch domains from the provider and report webhook status for each.
    ///
    /// Webhook checks run concurrently and only produce log output; a failed
    /// check never removes a domain from the registry.
    pub async fn load(
        provider: &dyn MailProvider,
        expected_webhook: &str,
    ) -> Result<Self, ProviderError> {
        let all = provider.list_domains().await?;
        let total = all.len();
        let registry = Self::from_domains(all);

        info!(
            total_domains = total,
            active_domains = registry.len(),
            "domain_registry_loaded"
        );

        registry.check_webhooks(provider, expected_webhook).await;

        Ok(registry)
    }

    /// Check every managed domain's permanent failure webhook.
    pub async fn check_webhooks(
        &self,
        provider: &dyn MailProvider,
        expected_webhook: &str,
    ) -> Vec<(String, WebhookStatus)> {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();

        let checks = names.into_iter().map(|name| async move {
            let status = webhook_status(provider, name, expected_webhook).await;
            (name.to_string(), status)
        });

        join_all(checks).await
    }

    pub fn is_managed(&self, name: &str) -> bool {
        self.domains.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.domains.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

async fn webhook_status(
    provider: &dyn MailProvider,
    domain: &str,
    expected_webhook: &str,
) -> WebhookStatus {
    match provider.webhook_urls(domain).await {
        Ok(urls) => {
            let status = if urls.iter().any(|u| u == expected_webhook) {
                WebhookStatus::Installed
            } else {
                WebhookStatus::Missing
            };
            info!(
                domain = %domain,
                status = status.glyph(),
                expected = %expected_webhook,
                "domain_webhook_status"
            );
            status
        }
        Err(e) => {
            warn!(domain = %domain, error = %e, "domain_webhook_status_unknown");
            WebhookStatus::Unknown
        }
    }
}
