//! # Rich-Media Sync Core
//!
//! Keeps provider metadata (YouTube, SoundCloud, Spotify, Google Maps) of
//! chat messages fresh and prepares streaming URIs for playback.
//!
//! ## Components
//!
//! - [`classifier`]: which fragments need provider sync
//! - [`change_detector`]: which edits warrant another round
//! - [`providers`]: one resolver per provider plus the [`ResolverRegistry`]
//! - [`service`]: the [`RichMediaService`] orchestrator
//! - [`worker`]: in-process dispatcher and retrying worker
//! - [`listener`]: store subscription feeding the orchestrator
//!
//! ## Example
//!
//! ```ignore
//! use core_richmedia::{ChannelSyncDispatcher, ResolverRegistry, RichMediaService};
//!
//! let (dispatcher, jobs) = ChannelSyncDispatcher::channel();
//! let registry = ResolverRegistry::from_config(&config)?;
//! let service = Arc::new(RichMediaService::new(store, registry, Arc::new(dispatcher), bus));
//!
//! let errors = service.resolve(&message_id).await;
//! for error in errors {
//!     println!("{}", error);
//! }
//! ```

pub mod change_detector;
pub mod classifier;
pub mod error;
pub mod listener;
pub mod providers;
pub mod service;
pub mod worker;

pub use change_detector::content_changed;
pub use classifier::{is_syncable, is_syncable_message};
pub use error::{ErrorDescriptor, ErrorKind, MediaError, Result};
pub use listener::StoreListener;
pub use providers::{MediaResolver, ResolverRegistry, StreamingResolver};
pub use service::RichMediaService;
pub use worker::{ChannelSyncDispatcher, RichMediaSyncWorker, SyncJobReceiver};
