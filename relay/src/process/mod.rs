//! Webhook event processing.
//!
//! ## Processing Flow
//!
//! ```text
//! BounceEvent  → handle_bounce()       → reply to sender (0 or 1 send)
//! ListMessage  → relay_list_message()  → forward to list (1 send)
//!                                        └ on failure: notice to author (1 send)
//! ```

pub mod attachments;
pub mod bounce;
pub mod list;
pub mod notice;

pub use attachments::{resolve_attachments, Resolution};
pub use bounce::{decide, handle_bounce, BounceDecision, BounceEvent};
pub use list::{compose_forward, relay_list_message, ListForm, ListMessage};
pub use notice::{bouncebot_address, NoticeDefaults};

/// Result of processing a single webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A message was accepted by the provider
    Sent,
    /// Dropped by policy; nothing was sent
    Ignored,
    /// The primary send failed
    Failed,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Sent => "sent",
            Outcome::Ignored => "ignored",
            Outcome::Failed => "failed",
        }
    }
}
