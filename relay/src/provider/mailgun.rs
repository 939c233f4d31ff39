//! Mailgun HTTP API client.
//!
//! Reference: https://documentation.mailgun.com/docs/mailgun/api-reference/

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, Response,
};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{debug, info};
use url::Url;

use super::MailProvider;
use crate::error::ProviderError;
use crate::types::{Domain, OutboundMessage, Route};

/// Account-level Mailgun client.
///
/// Cheap to clone; per-domain operations go through `for_domain`, which hands
/// out an independent handle so no client state is shared between requests.
#[derive(Clone)]
pub struct Mailgun {
    client: Client,
    api_base: String,
    api_key: String,
}

impl Mailgun {
    /// Create a client for the given API base URL and private key.
    pub fn new(api_base: &str, api_key: String) -> Result<Self, ProviderError> {
        let base = Url::parse(api_base)?;
        let client = Client::builder().build()?;

        Ok(Self {
            client,
            api_base: base.as_str().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Handle for sending through a single domain.
    pub fn for_domain(&self, domain: &str) -> DomainClient {
        DomainClient {
            client: self.client.clone(),
            endpoint: format!("{}/{}", self.api_base, domain),
            api_key: self.api_key.clone(),
            domain: domain.to_string(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.api_base, path);
        debug!(url = %url, "mailgun_request");

        let response = self
            .client
            .get(&url)
            .basic_auth("api", Some(&self.api_key))
            .send()
            .await?;

        Ok(ensure_success(response).await?.json().await?)
    }
}

#[async_trait]
impl MailProvider for Mailgun {
    async fn send(&self, domain: &str, message: &OutboundMessage) -> Result<(), ProviderError> {
        self.for_domain(domain).send(message).await
    }

    async fn list_domains(&self) -> Result<Vec<Domain>, ProviderError> {
        let list: ItemList<DomainItem> = self.get_json("/domains?limit=1000").await?;

        Ok(list
            .items
            .into_iter()
            .map(|d| Domain::new(d.name, d.state == "active"))
            .collect())
    }

    async fn webhook_urls(&self, domain: &str) -> Result<Vec<String>, ProviderError> {
        let response: WebhookResponse = self
            .get_json(&format!("/domains/{}/webhooks/permanent_fail", domain))
            .await?;

        Ok(response.webhook.urls)
    }

    async fn list_routes(&self) -> Result<Vec<Route>, ProviderError> {
        let list: ItemList<Route> = self.get_json("/routes?limit=1000").await?;
        Ok(list.items)
    }
}

/// Mailgun client bound to one sending domain.
pub struct DomainClient {
    client: Client,
    endpoint: String,
    api_key: String,
    domain: String,
}

impl DomainClient {
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Send a message, downloading any attachments from their stored URLs first.
    pub async fn send(&self, message: &OutboundMessage) -> Result<(), ProviderError> {
        let mut form = Form::new()
            .text("from", message.from.clone())
            .text("to", message.to.clone())
            .text("subject", message.subject.clone())
            .text("text", message.text_body.clone())
            .text("html", message.html_body.clone());

        if let Some(cc) = non_empty(&message.cc) {
            form = form.text("cc", cc.to_string());
        }
        if let Some(bcc) = non_empty(&message.bcc) {
            form = form.text("bcc", bcc.to_string());
        }
        if let Some(id) = non_empty(&message.in_reply_to) {
            form = form.text("h:In-Reply-To", bracketed(id));
        }
        if let Some(id) = non_empty(&message.message_id) {
            form = form.text("h:Message-Id", bracketed(id));
        }

        for attachment in &message.attachments {
            let data = self.fetch_attachment(&attachment.source_url).await?;
            let part = Part::bytes(data).file_name(attachment.filename.clone());
            form = form.part(attachment.placement.form_field(), part);
        }

        let response = self
            .client
            .post(format!("{}/messages", self.endpoint))
            .basic_auth("api", Some(&self.api_key))
            .multipart(form)
            .send()
            .await?;

        ensure_success(response).await?;

        info!(
            domain = %self.domain,
            to = %message.to,
            attachments = message.attachments.len(),
            "mailgun_message_accepted"
        );

        Ok(())
    }

    /// Stored-message attachment URLs require the account's API credentials.
    async fn fetch_attachment(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        match self.download(url).await {
            Ok(data) => Ok(data),
            Err(source) => Err(ProviderError::AttachmentFetch {
                url: url.to_string(),
                source,
            }),
        }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, reqwest::Error> {
        let response = self
            .client
            .get(url)
            .basic_auth("api", Some(&self.api_key))
            .send()
            .await?
            .error_for_status()?;

        Ok(response.bytes().await?.to_vec())
    }
}

async fn ensure_success(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Status {
        status: status.as_u16(),
        body,
    })
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Message-Id headers carry angle brackets; webhook payloads usually don't.
fn bracketed(id: &str) -> String {
    if id.starts_with('<') && id.ends_with('>') {
        id.to_string()
    } else {
        format!("<{}>", id)
    }
}

#[derive(Deserialize)]
struct ItemList<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Deserialize)]
struct DomainItem {
    name: String,
    #[serde(default)]
    state: String,
}

#[derive(Deserialize)]
struct WebhookResponse {
    webhook: WebhookUrls,
}

#[derive(Deserialize)]
struct WebhookUrls {
    #[serde(default)]
    urls: Vec<String>,
}
