//! # Event Bus System
//!
//! Broadcasts what the rich-media sync subsystem is doing to anyone who wants
//! to observe it (UI badges, diagnostics, tests) using `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - **Event Types**: [`CoreEvent`] wrapping [`RichMediaEvent`] and [`StreamingEvent`]
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Receiver wrapper with an optional filter
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────┐   emit    ┌───────────┐   subscribe   ┌────────────┐
//! │ RichMediaService   ├──────────>│ EventBus  ├──────────────>│ Subscriber │
//! └────────────────────┘           │ (broadcast│               └────────────┘
//! ┌────────────────────┐   emit    │  channel) │   subscribe   ┌────────────┐
//! │ RichMediaSyncWorker├──────────>│           ├──────────────>│ Subscriber │
//! └────────────────────┘           └───────────┘               └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, RichMediaEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::RichMedia(RichMediaEvent::SyncStarted {
//!         message_id: "msg-1".to_string(),
//!     }))
//!     .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.description(), "Rich-media sync started");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   Non-fatal; keep receiving.
//! - **`RecvError::Closed`**: All senders have been dropped. Treat as shutdown.
//!
//! Emitting with no subscribers returns `Err`; publishers in this workspace
//! ignore it, since observing events is optional.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Metadata resolution lifecycle
    RichMedia(RichMediaEvent),
    /// Streaming URI preparation
    Streaming(StreamingEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::RichMedia(e) => e.description(),
            CoreEvent::Streaming(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::RichMedia(RichMediaEvent::FragmentFailed { .. }) => EventSeverity::Warning,
            CoreEvent::RichMedia(RichMediaEvent::MessageMissing { .. }) => EventSeverity::Warning,
            CoreEvent::Streaming(StreamingEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::RichMedia(RichMediaEvent::SyncCompleted { failed, .. }) if *failed > 0 => {
                EventSeverity::Warning
            }
            CoreEvent::RichMedia(RichMediaEvent::SyncCompleted { .. }) => EventSeverity::Info,
            CoreEvent::Streaming(StreamingEvent::Prepared { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// Message id the event refers to, when it refers to exactly one.
    pub fn message_id(&self) -> Option<&str> {
        match self {
            CoreEvent::RichMedia(RichMediaEvent::SyncStarted { message_id })
            | CoreEvent::RichMedia(RichMediaEvent::SyncCompleted { message_id, .. })
            | CoreEvent::RichMedia(RichMediaEvent::FragmentFailed { message_id, .. })
            | CoreEvent::RichMedia(RichMediaEvent::MessageMissing { message_id }) => {
                Some(message_id.as_str())
            }
            _ => None,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Rich-Media Events
// ============================================================================

/// Events emitted while refreshing provider metadata for messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum RichMediaEvent {
    /// Resolutions were handed to the dispatcher.
    SyncScheduled {
        /// Messages scheduled in this batch.
        message_ids: Vec<String>,
    },
    /// A resolution round began.
    SyncStarted {
        message_id: String,
    },
    /// A resolution round finished and merged content was written back.
    SyncCompleted {
        message_id: String,
        /// Number of fragments in the merged content.
        fragments: usize,
        /// Number of fragments whose update failed.
        failed: usize,
    },
    /// One fragment could not be refreshed; its previous content was kept.
    FragmentFailed {
        message_id: String,
        /// Position of the fragment in the message content.
        index: usize,
        /// Machine-readable error kind (e.g. "network", "not_found").
        kind: String,
        /// Human-readable detail.
        detail: String,
    },
    /// The message disappeared between scheduling and resolution.
    MessageMissing {
        message_id: String,
    },
}

impl RichMediaEvent {
    fn description(&self) -> &str {
        match self {
            RichMediaEvent::SyncScheduled { .. } => "Rich-media sync scheduled",
            RichMediaEvent::SyncStarted { .. } => "Rich-media sync started",
            RichMediaEvent::SyncCompleted { .. } => "Rich-media sync completed",
            RichMediaEvent::FragmentFailed { .. } => "Fragment update failed",
            RichMediaEvent::MessageMissing { .. } => "Message missing at resolution time",
        }
    }
}

// ============================================================================
// Streaming Events
// ============================================================================

/// Events emitted while preparing playable URIs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum StreamingEvent {
    /// Streaming URIs were resolved for an asset.
    Prepared {
        /// Provider tag (e.g. "soundcloud").
        provider: String,
        /// Number of URIs returned (zero for providers without streaming).
        uri_count: usize,
    },
    /// The provider failed to produce streaming URIs.
    Failed {
        provider: String,
        message: String,
    },
}

impl StreamingEvent {
    fn description(&self) -> &str {
        match self {
            StreamingEvent::Prepared { .. } => "Streaming URIs prepared",
            StreamingEvent::Failed { .. } => "Streaming preparation failed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus yields another publisher on the same channel; each
/// `subscribe()` creates an independent receiver.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of events to buffer per subscriber.
    ///   When a subscriber falls behind by more than this amount, it will
    ///   receive a `RecvError::Lagged` error.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let streaming_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Streaming(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events that match `predicate` will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without waiting.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
