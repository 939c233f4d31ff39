//! In-memory provider for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::MailProvider;
use crate::error::ProviderError;
use crate::types::{Domain, OutboundMessage, Route};

/// Records every send attempt and can be told to fail sends.
#[derive(Default)]
pub struct RecordingProvider {
    pub domains: Vec<Domain>,
    /// Webhook URLs per domain; a missing entry makes the lookup fail
    pub webhooks: HashMap<String, Vec<String>>,
    pub routes: Vec<Route>,
    attempts: Mutex<Vec<(String, OutboundMessage)>>,
    failures_left: Mutex<usize>,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` sends.
    pub fn failing_sends(self, count: usize) -> Self {
        *self.failures_left.lock().unwrap() = count;
        self
    }

    /// Every send attempt, successful or not, as (domain, message).
    pub fn attempts(&self) -> Vec<(String, OutboundMessage)> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailProvider for RecordingProvider {
    async fn send(&self, domain: &str, message: &OutboundMessage) -> Result<(), ProviderError> {
        self.attempts
            .lock()
            .unwrap()
            .push((domain.to_string(), message.clone()));

        let mut failures_left = self.failures_left.lock().unwrap();
        if *failures_left > 0 {
            *failures_left -= 1;
            return Err(ProviderError::Status {
                status: 400,
                body: "message too large".to_string(),
            });
        }

        Ok(())
    }

    async fn list_domains(&self) -> Result<Vec<Domain>, ProviderError> {
        Ok(self.domains.clone())
    }

    async fn webhook_urls(&self, domain: &str) -> Result<Vec<String>, ProviderError> {
        self.webhooks
            .get(domain)
            .cloned()
            .ok_or_else(|| ProviderError::Status {
                status: 404,
                body: "webhook not found".to_string(),
            })
    }

    async fn list_routes(&self) -> Result<Vec<Route>, ProviderError> {
        Ok(self.routes.clone())
    }
}
