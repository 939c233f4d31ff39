//! Permanent failure (bounce) processing.
//!
//! A bounce is turned into a reply to the original sender when:
//! - the sender is not the bouncebot itself (a bounce of a bounce), and
//! - the sender's domain is a managed domain.
//!
//! Reply send failures are only logged; they are never bounce-handled again.

use serde::Deserialize;
use tracing::{error, info, warn};

use super::notice::{bouncebot_address, notification, NoticeDefaults};
use super::Outcome;
use crate::error::EventError;
use crate::html::escape;
use crate::provider::MailProvider;
use crate::registry::DomainRegistry;
use crate::types::{domain_part, OutboundMessage};

/// A permanent delivery failure reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BounceEvent {
    pub sender: String,
    pub recipient: String,
    pub origin_domain: String,
    pub message_id: String,
    pub subject: String,
    pub failure_description: String,
    pub failure_detail: String,
}

impl BounceEvent {
    /// Build an event, deriving the origin domain from the sender.
    pub fn new(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        message_id: impl Into<String>,
        subject: impl Into<String>,
        failure_description: impl Into<String>,
        failure_detail: impl Into<String>,
    ) -> Result<Self, EventError> {
        let sender = sender.into();
        let origin_domain = domain_part(&sender)
            .ok_or_else(|| EventError::MalformedSender(sender.clone()))?
            .to_string();

        Ok(Self {
            sender,
            recipient: recipient.into(),
            origin_domain,
            message_id: message_id.into(),
            subject: subject.into(),
            failure_description: failure_description.into(),
            failure_detail: failure_detail.into(),
        })
    }

    /// Parse the JSON body of a permanent failure webhook.
    pub fn from_json(body: &[u8]) -> Result<Self, EventError> {
        let payload: BouncePayload = serde_json::from_slice(body).map_err(EventError::Payload)?;
        let data = payload.event_data;
        let status = data.delivery_status;

        Self::new(
            data.envelope.sender,
            data.recipient,
            data.message.headers.message_id.unwrap_or_default(),
            data.message.headers.subject.unwrap_or_default(),
            status.description.unwrap_or_default(),
            status.message.unwrap_or_default(),
        )
    }
}

/// What to do with a bounce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BounceDecision {
    Reply(OutboundMessage),
    /// The bounced message was itself a bounce notification
    SelfAddressed,
    UnmanagedDomain,
}

/// Apply routing policy and compose the reply, without sending anything.
pub fn decide(
    event: &BounceEvent,
    domains: &DomainRegistry,
    defaults: &NoticeDefaults,
) -> BounceDecision {
    if event.sender == bouncebot_address(&event.origin_domain) {
        return BounceDecision::SelfAddressed;
    }

    if !domains.is_managed(&event.origin_domain) {
        return BounceDecision::UnmanagedDomain;
    }

    BounceDecision::Reply(compose_reply(event, defaults))
}

/// Reply to the original sender describing the permanent failure.
pub fn compose_reply(event: &BounceEvent, defaults: &NoticeDefaults) -> OutboundMessage {
    let html = format!(
        "<strong>Permanently failed to send to {}</strong>\n<blockquote>\n<em>{}</em>\n{}\n</blockquote>\n",
        escape(&event.recipient),
        escape(&event.failure_description),
        escape(&event.failure_detail),
    );

    let mut reply = notification(
        &event.origin_domain,
        &event.sender,
        format!("Re: {}", event.subject),
        html,
        defaults,
    );
    reply.in_reply_to = Some(event.message_id.clone()).filter(|id| !id.is_empty());
    reply
}

/// Process a bounce end to end: decide, then make at most one send attempt.
pub async fn handle_bounce(
    provider: &dyn MailProvider,
    domains: &DomainRegistry,
    defaults: &NoticeDefaults,
    event: &BounceEvent,
) -> Outcome {
    let reply = match decide(event, domains, defaults) {
        BounceDecision::Reply(reply) => reply,
        BounceDecision::SelfAddressed => {
            warn!(
                recipient = %event.recipient,
                "bounce_notification_undeliverable"
            );
            return Outcome::Ignored;
        }
        BounceDecision::UnmanagedDomain => {
            warn!(
                sender = %event.sender,
                recipient = %event.recipient,
                domain = %event.origin_domain,
                "bounce_ignored_unmanaged_domain"
            );
            return Outcome::Ignored;
        }
    };

    info!(sender = %event.sender, recipient = %event.recipient, "bounce_reply_sending");

    match provider.send(&event.origin_domain, &reply).await {
        Ok(()) => {
            info!(sender = %event.sender, message_id = %event.message_id, "bounce_reply_sent");
            Outcome::Sent
        }
        Err(e) => {
            error!(
                sender = %event.sender,
                message_id = %event.message_id,
                error = %e,
                "bounce_reply_failed"
            );
            Outcome::Failed
        }
    }
}

// Provider payload shape: only the fields we use.

#[derive(Deserialize)]
struct BouncePayload {
    #[serde(rename = "event-data")]
    event_data: EventData,
}

#[derive(Deserialize)]
struct EventData {
    envelope: Envelope,
    #[serde(default)]
    recipient: String,
    #[serde(default)]
    message: MessageInfo,
    #[serde(default, rename = "delivery-status")]
    delivery_status: DeliveryStatus,
}

#[derive(Deserialize)]
struct Envelope {
    sender: String,
}

#[derive(Deserialize, Default)]
struct MessageInfo {
    #[serde(default)]
    headers: Headers,
}

#[derive(Deserialize, Default)]
struct Headers {
    #[serde(default, rename = "message-id")]
    message_id: Option<String>,
    #[serde(default)]
    subject: Option<String>,
}

#[derive(Deserialize, Default)]
struct DeliveryStatus {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::strip_html;
    use crate::provider::testing::RecordingProvider;
    use crate::types::Domain;

    fn registry() -> DomainRegistry {
        DomainRegistry::from_domains(vec![Domain::new("acme.com", true)])
    }

    fn event(sender: &str) -> BounceEvent {
        BounceEvent::new(
            sender,
            "x@y.com",
            "20240101.abc@acme.com",
            "Quarterly numbers",
            "Not delivering to previously bounced address",
            "550 5.1.1 mailbox does not exist",
        )
        .unwrap()
    }

    const PAYLOAD: &str = r#"{
        "signature": {"timestamp": "1", "token": "t", "signature": "s"},
        "event-data": {
            "event": "failed",
            "severity": "permanent",
            "recipient": "x@y.com",
            "envelope": {"sender": "user@acme.com", "targets": "x@y.com"},
            "message": {"headers": {
                "message-id": "20240101.abc@acme.com",
                "subject": "Quarterly numbers",
                "to": "x@y.com"
            }},
            "delivery-status": {
                "code": 550,
                "description": "Not delivering to previously bounced address",
                "message": "550 5.1.1 mailbox does not exist"
            }
        }
    }"#;

    #[test]
    fn test_from_json() {
        let event = BounceEvent::from_json(PAYLOAD.as_bytes()).unwrap();

        assert_eq!(event.sender, "user@acme.com");
        assert_eq!(event.recipient, "x@y.com");
        assert_eq!(event.origin_domain, "acme.com");
        assert_eq!(event.message_id, "20240101.abc@acme.com");
        assert_eq!(event.subject, "Quarterly numbers");
        assert_eq!(event.failure_detail, "550 5.1.1 mailbox does not exist");
    }

    #[test]
    fn test_from_json_null_delivery_fields() {
        let body = r#"{"event-data": {
            "recipient": "x@y.com",
            "envelope": {"sender": "user@acme.com"},
            "message": {"headers": {"subject": null}},
            "delivery-status": {"description": null, "message": ""}
        }}"#;

        let event = BounceEvent::from_json(body.as_bytes()).unwrap();

        assert_eq!(event.subject, "");
        assert_eq!(event.failure_description, "");
        assert_eq!(event.message_id, "");
    }

    #[test]
    fn test_from_json_missing_sender() {
        let body = r#"{"event-data": {"recipient": "x@y.com", "envelope": {}}}"#;

        assert!(matches!(
            BounceEvent::from_json(body.as_bytes()),
            Err(EventError::Payload(_))
        ));
    }

    #[test]
    fn test_from_json_invalid_json() {
        assert!(matches!(
            BounceEvent::from_json(b"{not json"),
            Err(EventError::Payload(_))
        ));
    }

    #[test]
    fn test_sender_without_domain_is_malformed() {
        let result = BounceEvent::new("postmaster", "x@y.com", "id", "s", "d", "m");

        assert!(matches!(result, Err(EventError::MalformedSender(_))));
    }

    #[test]
    fn test_self_addressed_bounce_is_dropped() {
        let decision = decide(&event("bouncebot@acme.com"), &registry(), &NoticeDefaults::default());

        assert_eq!(decision, BounceDecision::SelfAddressed);
    }

    #[test]
    fn test_self_addressed_bounce_from_unmanaged_domain_is_dropped() {
        let decision = decide(
            &event("bouncebot@elsewhere.org"),
            &registry(),
            &NoticeDefaults::default(),
        );

        assert_eq!(decision, BounceDecision::SelfAddressed);
    }

    #[test]
    fn test_unmanaged_domain_is_dropped() {
        let decision = decide(&event("user@elsewhere.org"), &registry(), &NoticeDefaults::default());

        assert_eq!(decision, BounceDecision::UnmanagedDomain);
    }

    #[test]
    fn test_reply_to_managed_sender() {
        let defaults = NoticeDefaults {
            cc: Some("ops@acme.com".to_string()),
            bcc: Some("audit@acme.com".to_string()),
            help_email: None,
        };

        let BounceDecision::Reply(reply) = decide(&event("user@acme.com"), &registry(), &defaults)
        else {
            panic!("Expected a reply");
        };

        assert_eq!(reply.from, "bouncebot@acme.com");
        assert_eq!(reply.to, "user@acme.com");
        assert_eq!(reply.cc.as_deref(), Some("ops@acme.com"));
        assert_eq!(reply.bcc.as_deref(), Some("audit@acme.com"));
        assert_eq!(reply.subject, "Re: Quarterly numbers");
        assert_eq!(reply.in_reply_to.as_deref(), Some("20240101.abc@acme.com"));
        assert!(reply.html_body.contains("Permanently failed to send to x@y.com"));
        assert!(reply.html_body.contains("550 5.1.1 mailbox does not exist"));
        assert_eq!(reply.text_body, strip_html(&reply.html_body));
        assert!(!reply.text_body.contains('<'));
        assert!(reply.attachments.is_empty());
    }

    #[test]
    fn test_reply_escapes_failure_text() {
        let event = BounceEvent::new(
            "user@acme.com",
            "x@y.com",
            "id",
            "s",
            "<script>alert(1)</script>",
            "a & b",
        )
        .unwrap();

        let reply = compose_reply(&event, &NoticeDefaults::default());

        assert!(!reply.html_body.contains("<script>"));
        assert!(reply.text_body.contains("<script>alert(1)</script>"));
        assert!(reply.text_body.contains("a & b"));
    }

    #[tokio::test]
    async fn test_handle_bounce_sends_once_via_origin_domain() {
        let provider = RecordingProvider::new();

        let outcome = handle_bounce(
            &provider,
            &registry(),
            &NoticeDefaults::default(),
            &event("user@acme.com"),
        )
        .await;

        assert_eq!(outcome, Outcome::Sent);
        let attempts = provider.attempts();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].0, "acme.com");
        assert_eq!(attempts[0].1.to, "user@acme.com");
    }

    #[tokio::test]
    async fn test_handle_bounce_dropped_events_send_nothing() {
        let provider = RecordingProvider::new();

        for sender in ["bouncebot@acme.com", "user@elsewhere.org"] {
            let outcome = handle_bounce(
                &provider,
                &registry(),
                &NoticeDefaults::default(),
                &event(sender),
            )
            .await;
            assert_eq!(outcome, Outcome::Ignored);
        }

        assert!(provider.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_handle_bounce_send_failure_is_not_retried() {
        let provider = RecordingProvider::new().failing_sends(5);

        let outcome = handle_bounce(
            &provider,
            &registry(),
            &NoticeDefaults::default(),
            &event("user@acme.com"),
        )
        .await;

        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(provider.attempts().len(), 1);
    }
}
