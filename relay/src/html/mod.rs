//! HTML helpers for generated notification bodies.

pub mod text;

pub use text::{escape, strip_html};
