//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the rich-media sync core:
//! - Logging and tracing infrastructure
//! - Configuration management (provider credentials, feature flags, sync tuning)
//! - Event bus system
//!
//! Every other `core-*` crate depends on this one for its logging
//! conventions and for broadcasting progress to observers.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
