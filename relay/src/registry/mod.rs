//! Process-lifetime registries populated once at startup.
//!
//! Both registries are read-only after loading and are shared by reference
//! between request handlers.

pub mod domains;
pub mod lists;

pub use domains::{DomainRegistry, WebhookStatus};
pub use lists::{check_routes, ListRegistry, RouteStatus};
