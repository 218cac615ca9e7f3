//! Workspace umbrella crate.
//!
//! Exposes the feature flags that map to the individual workspace crates
//! (`core-service`, `core-richmedia`, `core-messages`) so a host application
//! can depend on `richmedia-workspace` alone and opt into the pieces it needs.

#[cfg(feature = "desktop-shims")]
pub use core_service::{CoreService, CoreError};

#[cfg(feature = "streaming")]
pub use core_richmedia::{MediaError, RichMediaService};

#[cfg(feature = "link-parser")]
pub use core_messages::parser::parse_content;
