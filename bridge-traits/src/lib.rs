//! # Host Bridge Traits
//!
//! Capabilities the rich-media core needs from its host application.
//!
//! ## Overview
//!
//! The core never talks to the network, the job scheduler or the host logger
//! directly. Each of those is a trait defined here and implemented per
//! platform (desktop defaults live in `bridge-desktop`; mobile hosts inject
//! their own adapters).
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP used by the provider resolvers
//! - [`SyncDispatcher`](dispatch::SyncDispatcher) - Durable, retriable rich-media sync jobs
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert platform errors into it and keep the message actionable
//! (include the URL, status code or job id involved).
//!
//! ## Thread Safety
//!
//! Every trait requires `Send + Sync` so implementations can be shared across
//! tokio tasks behind an `Arc`.
//!
//! ## Example
//!
//! ```ignore
//! use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//!
//! pub struct MyHttpClient {
//!     client: reqwest::Client,
//! }
//!
//! #[async_trait]
//! impl HttpClient for MyHttpClient {
//!     async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
//!         todo!()
//!     }
//! }
//! ```

pub mod dispatch;
pub mod error;
pub mod http;
pub mod logging;

pub use error::BridgeError;

// Re-export commonly used types
pub use dispatch::SyncDispatcher;
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
