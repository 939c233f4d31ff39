//! Bouncebot - Mailgun webhook relay.
//!
//! Receives provider webhooks and relays derived messages back through the
//! provider:
//! - Permanent failures become a reply to the original sender
//! - Stored mailing list messages are rewritten and forwarded to the list
//!
//! ## Architecture
//!
//! ```text
//! Webhook → web handler → processor (+ registries) → MailProvider → Mailgun
//! ```

pub mod config;
pub mod error;
pub mod html;
pub mod process;
pub mod provider;
pub mod registry;
pub mod types;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use error::{ConfigError, EventError, ProviderError};
pub use process::{BounceEvent, ListMessage, NoticeDefaults, Outcome};
pub use provider::{MailProvider, Mailgun};
pub use registry::{DomainRegistry, ListRegistry};
pub use types::{Attachment, Domain, MailingList, OutboundMessage, Placement, ResolvedAttachment};
pub use web::AppState;
