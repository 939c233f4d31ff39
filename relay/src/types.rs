//! Shared data types for the relay pipeline.
//!
//! Inbound events (`BounceEvent`, `ListMessage`) live next to the processors
//! that parse them; the types here are shared between registries, processors
//! and the outbound mail client.

use serde::Deserialize;

/// A sending domain as reported by the mail provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    pub name: String,
    pub active: bool,
}

impl Domain {
    pub fn new(name: impl Into<String>, active: bool) -> Self {
        Self {
            name: name.into(),
            active,
        }
    }
}

/// A provider route, used only for mailing list diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Route {
    #[serde(default)]
    pub expression: String,
    #[serde(default)]
    pub actions: Vec<String>,
}

/// A configured mailing list.
///
/// Messages stored for `public_address` are rewritten and forwarded to
/// `internal_address`, which is the provider-managed list that fans out to
/// subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MailingList {
    /// Address people write to (lookup key)
    #[serde(rename = "public")]
    pub public_address: String,
    /// Provider mailing list address the message is forwarded to
    #[serde(rename = "internal")]
    pub internal_address: String,
    /// Display name used in the unsubscribe footer
    #[serde(default)]
    pub name: Option<String>,
    /// Optional prefix prepended to every subject, e.g. "[team]"
    #[serde(default, rename = "subjectPrefix")]
    pub subject_prefix: Option<String>,
    /// Help contact overriding the global default in failure notices
    #[serde(default, rename = "helpEmail")]
    pub help_email: Option<String>,
}

impl MailingList {
    /// Name shown to subscribers, falling back to the public address.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.public_address)
    }
}

/// An attachment uploaded alongside a stored message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Attachment {
    pub url: String,
    #[serde(rename = "name")]
    pub filename: String,
}

/// Where a resolved attachment goes in the outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Referenced from the HTML body by filename
    Inline,
    /// Regular attachment
    Standalone,
}

impl Placement {
    /// Multipart form field the provider expects for this placement.
    pub fn form_field(self) -> &'static str {
        match self {
            Placement::Inline => "inline",
            Placement::Standalone => "attachment",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAttachment {
    pub filename: String,
    pub placement: Placement,
    pub source_url: String,
}

/// A fully composed message handed to the outbound mail client.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutboundMessage {
    pub from: String,
    pub to: String,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
    /// Message-Id this message replies to
    pub in_reply_to: Option<String>,
    /// Message-Id to preserve on forwarded messages
    pub message_id: Option<String>,
    pub attachments: Vec<ResolvedAttachment>,
}

/// Return the part of an address after the first `@`, if any.
pub fn domain_part(address: &str) -> Option<&str> {
    address
        .split_once('@')
        .map(|(_, domain)| domain.trim())
        .filter(|domain| !domain.is_empty())
}
