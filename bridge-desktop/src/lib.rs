//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux) and for headless tooling.
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`, with retry and exponential backoff
//!
//! Job dispatch on desktop is an in-process queue and lives with the sync
//! worker in `core-richmedia`; mobile hosts provide their own durable
//! `SyncDispatcher`.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::ReqwestHttpClient;
//! use bridge_traits::HttpClient;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), bridge_traits::BridgeError> {
//!     let http_client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new()?);
//!     // Use in core configuration
//!     Ok(())
//! }
//! ```

mod http;

pub use http::ReqwestHttpClient;
