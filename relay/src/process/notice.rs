//! Notification composition shared by the bounce processor and list relay.

use crate::config::Config;
use crate::html::{escape, strip_html};
use crate::types::OutboundMessage;

/// Local part of the address notifications are sent from.
pub const BOUNCEBOT: &str = "bouncebot";

/// Address notifications for `domain` are sent from.
pub fn bouncebot_address(domain: &str) -> String {
    format!("{}@{}", BOUNCEBOT, domain)
}

/// Copy recipients and help contact applied to generated notifications.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoticeDefaults {
    pub cc: Option<String>,
    pub bcc: Option<String>,
    pub help_email: Option<String>,
}

impl NoticeDefaults {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cc: config.bounce_cc.clone(),
            bcc: config.bounce_bcc.clone(),
            help_email: config.help_email.clone(),
        }
    }
}

/// Build a notification from `bouncebot@<domain>` with a text part derived
/// from the HTML.
pub fn notification(
    domain: &str,
    to: &str,
    subject: String,
    html: String,
    defaults: &NoticeDefaults,
) -> OutboundMessage {
    OutboundMessage {
        from: bouncebot_address(domain),
        to: to.to_string(),
        cc: defaults.cc.clone(),
        bcc: defaults.bcc.clone(),
        subject,
        text_body: strip_html(&html),
        html_body: html,
        ..Default::default()
    }
}

/// Notice sent to the author of a list message that could not be forwarded.
pub fn delivery_failure(
    domain: &str,
    to: &str,
    original_subject: &str,
    had_attachments: bool,
    help_email: Option<&str>,
    defaults: &NoticeDefaults,
) -> OutboundMessage {
    let mut html = String::from("<strong>Permanently failed to send message.</strong>\n");

    if had_attachments {
        html.push_str("<p>Possibly due to attachment size</p>\n");
    }

    if let Some(help) = help_email.filter(|h| !h.trim().is_empty()) {
        let help = escape(help.trim());
        html.push_str(&format!(
            "<p>Please contact <a href='mailto:{help}'>{help}</a></p>\n"
        ));
    }

    notification(
        domain,
        to,
        format!("Delivery Failure: {}", original_subject),
        html,
        defaults,
    )
}
