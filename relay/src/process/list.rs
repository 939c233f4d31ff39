//! Mailing list relay.
//!
//! A message stored for a list's public address is rewritten (subject
//! prefix, unsubscribe footer, inline attachments) and forwarded to the
//! list's internal address. When the forward fails the author receives a
//! single failure notice; that notice is never itself retried or wrapped.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use super::attachments::resolve_attachments;
use super::notice::{delivery_failure, NoticeDefaults};
use super::Outcome;
use crate::error::EventError;
use crate::html::escape;
use crate::provider::MailProvider;
use crate::registry::ListRegistry;
use crate::types::{domain_part, Attachment, MailingList, OutboundMessage};

/// Placeholder the provider replaces with the recipient's unsubscribe URL.
pub const UNSUBSCRIBE_TOKEN: &str = "%mailing_list_unsubscribe_url%";

/// Stored-message webhook form fields.
///
/// Field names follow the provider's form encoding.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListForm {
    #[serde(default, rename = "From")]
    pub from_header: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub recipient: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default, rename = "body-plain")]
    pub body_plain: String,
    #[serde(default, rename = "body-html")]
    pub body_html: String,
    #[serde(default, rename = "Message-Id")]
    pub message_id: String,
    /// JSON array of `{url, name}`
    #[serde(default)]
    pub attachments: Option<String>,
    /// JSON object of `<token>` → attachment URL
    #[serde(default, rename = "content-id-map")]
    pub content_id_map: Option<String>,
}

/// A message stored for a mailing list's public address.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListMessage {
    pub from: String,
    pub to_list: String,
    pub subject: String,
    pub body_plain: String,
    pub body_html: String,
    pub message_id: String,
    /// Sending domain reported by the provider
    pub domain: Option<String>,
    pub attachments: Vec<Attachment>,
    /// Content-id map entries in document order
    pub content_id_map: Vec<(String, String)>,
}

impl ListMessage {
    pub fn from_form(form: ListForm) -> Result<Self, EventError> {
        let from = form
            .from_header
            .or(form.sender)
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .ok_or(EventError::MissingField("From"))?;

        let to_list = form.recipient.trim().to_string();
        if to_list.is_empty() {
            return Err(EventError::MissingField("recipient"));
        }

        let attachments = match form.attachments.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => {
                serde_json::from_str(raw).map_err(EventError::Attachments)?
            }
            _ => Vec::new(),
        };

        let content_id_map = match form.content_id_map.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => parse_content_id_map(raw)?,
            _ => Vec::new(),
        };

        Ok(Self {
            from,
            to_list,
            subject: form.subject,
            body_plain: form.body_plain,
            body_html: form.body_html,
            message_id: form.message_id,
            domain: form.domain.filter(|d| !d.trim().is_empty()),
            attachments,
            content_id_map,
        })
    }
}

/// Parse the content-id map keeping document order; non-string values are skipped.
fn parse_content_id_map(raw: &str) -> Result<Vec<(String, String)>, EventError> {
    let map: Map<String, Value> = serde_json::from_str(raw).map_err(EventError::ContentIdMap)?;

    Ok(map
        .into_iter()
        .filter_map(|(token, url)| match url {
            Value::String(url) => Some((token, url)),
            _ => None,
        })
        .collect())
}

/// Prepend the list's subject prefix, if any.
pub fn list_subject(prefix: Option<&str>, subject: &str) -> String {
    match prefix.map(str::trim).filter(|p| !p.is_empty()) {
        Some(prefix) => format!("{} {}", prefix, subject),
        None => subject.to_string(),
    }
}

/// Rewrite a stored message for forwarding to the list's internal address.
pub fn compose_forward(list: &MailingList, message: &ListMessage) -> OutboundMessage {
    let name = list.display_name();

    let text_body = format!(
        "{}\n\nUnsubscribe from {}: {}\n",
        message.body_plain, name, UNSUBSCRIBE_TOKEN
    );
    let html_body = format!(
        "{}\n<br>\n<br>\n<a href='{}'>Click here</a> to unsubscribe from the {} mailing list\n",
        message.body_html,
        UNSUBSCRIBE_TOKEN,
        escape(name)
    );

    let resolution = resolve_attachments(&message.attachments, &message.content_id_map, &html_body);

    OutboundMessage {
        from: message.from.clone(),
        to: list.internal_address.clone(),
        cc: None,
        bcc: None,
        subject: list_subject(list.subject_prefix.as_deref(), &message.subject),
        text_body,
        html_body: resolution.html,
        in_reply_to: None,
        message_id: Some(message.message_id.clone()).filter(|id| !id.is_empty()),
        attachments: resolution.attachments,
    }
}

/// Domain used to send the forward and any failure notice.
///
/// The list's public address decides; the event's `domain` field is only
/// used for lists configured without one.
pub fn sending_domain(list: &MailingList, message: &ListMessage) -> Option<String> {
    let Some(list_domain) = domain_part(&list.public_address) else {
        return message.domain.clone();
    };

    if let Some(reported) = message.domain.as_deref() {
        if !reported.eq_ignore_ascii_case(list_domain) {
            warn!(
                list = %list.public_address,
                reported = %reported,
                "mailing_list_domain_mismatch"
            );
        }
    }

    Some(list_domain.to_string())
}

/// Relay a stored list message end to end.
pub async fn relay_list_message(
    provider: &dyn MailProvider,
    lists: &ListRegistry,
    defaults: &NoticeDefaults,
    message: &ListMessage,
) -> Outcome {
    let Some(list) = lists.find_by_public_address(&message.to_list) else {
        error!(list = %message.to_list, "mailing_list_not_configured");
        return Outcome::Ignored;
    };

    let Some(domain) = sending_domain(list, message) else {
        error!(list = %list.public_address, "mailing_list_domain_unknown");
        return Outcome::Ignored;
    };

    info!(
        from = %message.from,
        list = %list.public_address,
        message_id = %message.message_id,
        attachments = message.attachments.len(),
        "mailing_list_message_received"
    );

    let forward = compose_forward(list, message);

    let send_error = match provider.send(&domain, &forward).await {
        Ok(()) => {
            info!(message_id = %message.message_id, "mailing_list_forwarded");
            return Outcome::Sent;
        }
        Err(e) => e,
    };

    warn!(
        message_id = %message.message_id,
        error = %send_error,
        "mailing_list_forward_failed"
    );

    let help_email = list
        .help_email
        .as_deref()
        .filter(|help| !help.trim().is_empty())
        .or(defaults.help_email.as_deref());
    let notice = delivery_failure(
        &domain,
        &message.from,
        &message.subject,
        !message.attachments.is_empty(),
        help_email,
        defaults,
    );

    match provider.send(&domain, &notice).await {
        Ok(()) => info!(to = %message.from, message_id = %message.message_id, "delivery_failure_sent"),
        Err(e) => error!(
            to = %message.from,
            message_id = %message.message_id,
            error = %e,
            "delivery_failure_send_failed"
        ),
    }

    Outcome::Failed
}
