//! # Rich-Media Sync Orchestrator
//!
//! Reacts to message-store mutations, decides which messages need provider
//! metadata refreshed, fans fragment updates out to the resolvers and writes
//! the merged result back.
//!
//! ## Flow
//!
//! ```text
//! MessageStore ──Added──> on_messages_added ──mark──> update_all_content
//!      │                        └──schedule──> SyncDispatcher ──> resolve(id)
//!      └─────Updated──> on_message_updated ──schedule──┘              │
//!                                                                     v
//!                         resolvers (concurrent, one per fragment) ──merge──> update_message
//! ```
//!
//! ## Consistency
//!
//! `resolve` reads the message, resolves, then writes the merged content in a
//! single `update_message` call. An edit landing between the read and the
//! write is overwritten (last writer wins); the store reports the overwrite
//! as an update and the change detector schedules another round.
//!
//! Every round is idempotent: it re-reads current state, so duplicate or late
//! dispatches only cost an extra provider round-trip.

use bridge_traits::dispatch::SyncDispatcher;
use core_messages::{ContentFragment, MediaAsset, Message, MessageId, MessageStore};
use core_runtime::events::{CoreEvent, EventBus, RichMediaEvent, StreamingEvent};
use futures::future::join_all;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::change_detector::content_changed;
use crate::classifier::{is_syncable, is_syncable_message};
use crate::error::{ErrorDescriptor, ErrorKind, MediaError, Result};
use crate::providers::ResolverRegistry;

pub struct RichMediaService {
    store: Arc<dyn MessageStore>,
    registry: ResolverRegistry,
    dispatcher: Arc<dyn SyncDispatcher>,
    event_bus: EventBus,
    streaming_enabled: bool,
}

impl RichMediaService {
    pub fn new(
        store: Arc<dyn MessageStore>,
        registry: ResolverRegistry,
        dispatcher: Arc<dyn SyncDispatcher>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            store,
            registry,
            dispatcher,
            event_bus,
            streaming_enabled: true,
        }
    }

    /// When disabled, `prepare_streaming` returns no URIs for any asset.
    pub fn with_streaming(mut self, enabled: bool) -> Self {
        self.streaming_enabled = enabled;
        self
    }

    pub fn registry(&self) -> &ResolverRegistry {
        &self.registry
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    // =========================================================================
    // Store Reactions
    // =========================================================================

    /// Mark and schedule newly added rich-media messages.
    ///
    /// All syncable fragments of the eligible messages are flagged in one
    /// batch write before any resolution is scheduled.
    #[instrument(skip(self, messages), fields(count = messages.len()))]
    pub async fn on_messages_added(&self, messages: &[Message]) -> Result<()> {
        let ids: Vec<MessageId> = messages
            .iter()
            .filter(|m| is_syncable_message(m))
            .map(|m| m.id.clone())
            .collect();

        if ids.is_empty() {
            debug!("No syncable messages in batch");
            return Ok(());
        }

        self.store
            .update_all_content(
                &ids,
                Box::new(|content: &[ContentFragment]| {
                    content
                        .iter()
                        .map(|fragment| {
                            if is_syncable(fragment) {
                                fragment.clone().with_sync_needed(true)
                            } else {
                                fragment.clone()
                            }
                        })
                        .collect()
                }),
            )
            .await?;

        debug!(marked = ids.len(), "Marked fragments for sync");
        self.schedule(&ids).await
    }

    /// Schedule one resolution when an edit changed syncable content.
    ///
    /// Returns whether a resolution was scheduled. Sync flags are left as
    /// they are.
    pub async fn on_message_updated(&self, previous: &Message, updated: &Message) -> Result<bool> {
        if !is_syncable_message(updated) || !content_changed(&previous.content, &updated.content) {
            return Ok(false);
        }

        debug!(message_id = %updated.id, "Syncable content changed");
        self.schedule(std::slice::from_ref(&updated.id)).await?;
        Ok(true)
    }

    /// Re-dispatch every message that still has a fragment awaiting sync.
    ///
    /// Returns the number of messages scheduled.
    #[instrument(skip(self))]
    pub async fn resume_pending(&self) -> Result<usize> {
        let ids = self.store.list_pending_sync().await?;
        if !ids.is_empty() {
            info!(count = ids.len(), "Resuming pending rich-media sync");
            self.schedule(&ids).await?;
        }
        Ok(ids.len())
    }

    /// Hand every id to the dispatcher concurrently.
    ///
    /// All ids are attempted; the first dispatch failure is returned.
    async fn schedule(&self, ids: &[MessageId]) -> Result<()> {
        let results = join_all(
            ids.iter()
                .map(|id| self.dispatcher.sync_rich_media(id.as_str())),
        )
        .await;

        let mut scheduled = Vec::with_capacity(ids.len());
        let mut first_error = None;
        for (id, result) in ids.iter().zip(results) {
            match result {
                Ok(()) => scheduled.push(id.to_string()),
                Err(e) => {
                    error!(message_id = %id, error = %e, "Failed to dispatch rich-media sync");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if !scheduled.is_empty() {
            self.emit(RichMediaEvent::SyncScheduled {
                message_ids: scheduled,
            });
        }

        match first_error {
            Some(e) => Err(MediaError::Bridge(e)),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Run one resolution round for `message_id`.
    ///
    /// Every fragment is sent to its resolver concurrently; non-syncable
    /// fragments pass through. Successful results replace their fragment,
    /// failed ones keep the previous fragment, and every fragment leaves the
    /// round with `sync_needed == false`. The merged content is written with
    /// a single store update.
    ///
    /// Returns one descriptor per failure; empty means full success. A
    /// missing message yields a single `Internal` descriptor and no write.
    #[instrument(skip(self, message_id), fields(message_id = %message_id))]
    pub async fn resolve(&self, message_id: &MessageId) -> Vec<ErrorDescriptor> {
        let message = match self.store.get_message(message_id).await {
            Ok(Some(message)) => message,
            Ok(None) => {
                warn!("Message not found for rich-media sync");
                self.emit(RichMediaEvent::MessageMissing {
                    message_id: message_id.to_string(),
                });
                return vec![ErrorDescriptor::new(
                    ErrorKind::Internal,
                    format!("message {} not found", message_id),
                )];
            }
            Err(e) => {
                error!(error = %e, "Failed to load message for rich-media sync");
                return vec![ErrorDescriptor::from(&MediaError::from(e))];
            }
        };

        self.emit(RichMediaEvent::SyncStarted {
            message_id: message_id.to_string(),
        });

        let results = join_all(
            message
                .content
                .iter()
                .map(|fragment| self.update_fragment(&message, fragment)),
        )
        .await;

        let (merged, mut errors) = merge_results(&message.content, results);
        let fragment_count = merged.len();

        let write = self
            .store
            .update_message(
                message_id,
                Box::new(move |mut current| {
                    current.content = merged;
                    current
                }),
            )
            .await;

        match write {
            Ok(Some(_)) => {}
            Ok(None) => {
                warn!("Message removed before merged content was written");
                self.emit(RichMediaEvent::MessageMissing {
                    message_id: message_id.to_string(),
                });
                errors.push(ErrorDescriptor::new(
                    ErrorKind::Internal,
                    format!("message {} removed during sync", message_id),
                ));
            }
            Err(e) => {
                error!(error = %e, "Failed to persist merged content");
                errors.push(ErrorDescriptor::from(&MediaError::from(e)));
            }
        }

        for descriptor in &errors {
            if let Some(index) = descriptor.index {
                self.emit(RichMediaEvent::FragmentFailed {
                    message_id: message_id.to_string(),
                    index,
                    kind: descriptor.kind.as_str().to_string(),
                    detail: descriptor.detail.clone(),
                });
            }
        }

        let failed = errors.iter().filter(|d| d.index.is_some()).count();
        if errors.is_empty() {
            info!(fragments = fragment_count, "Rich-media sync completed");
        } else {
            warn!(fragments = fragment_count, errors = errors.len(), "Rich-media sync completed with errors");
        }
        self.emit(RichMediaEvent::SyncCompleted {
            message_id: message_id.to_string(),
            fragments: fragment_count,
            failed,
        });

        errors
    }

    async fn update_fragment(
        &self,
        message: &Message,
        fragment: &ContentFragment,
    ) -> Result<ContentFragment> {
        let Some(provider) = fragment.provider() else {
            return Ok(fragment.clone());
        };

        let resolver = self.registry.get(provider).ok_or_else(|| {
            MediaError::Unsupported(format!("no resolver registered for {}", provider))
        })?;

        resolver.update_media(message, fragment).await
    }

    // =========================================================================
    // Streaming
    // =========================================================================

    /// Playable URIs for `asset`.
    ///
    /// Providers without a streaming capability, unregistered providers and
    /// a disabled streaming feature all yield an empty list.
    #[instrument(skip(self, asset), fields(asset = %asset))]
    pub async fn prepare_streaming(&self, asset: &MediaAsset) -> Result<Vec<Url>> {
        let provider = asset.provider();

        let streaming = self
            .registry
            .get(provider)
            .and_then(|resolver| resolver.streaming());

        let Some(streaming) = streaming.filter(|_| self.streaming_enabled) else {
            debug!("No streaming capability for asset");
            self.emit_streaming(StreamingEvent::Prepared {
                provider: provider.to_string(),
                uri_count: 0,
            });
            return Ok(Vec::new());
        };

        match streaming.prepare_streaming(asset).await {
            Ok(urls) => {
                debug!(uri_count = urls.len(), "Streaming URIs prepared");
                self.emit_streaming(StreamingEvent::Prepared {
                    provider: provider.to_string(),
                    uri_count: urls.len(),
                });
                Ok(urls)
            }
            Err(e) => {
                warn!(error = %e, "Streaming preparation failed");
                self.emit_streaming(StreamingEvent::Failed {
                    provider: provider.to_string(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn emit(&self, event: RichMediaEvent) {
        // Observing events is optional
        let _ = self.event_bus.emit(CoreEvent::RichMedia(event));
    }

    fn emit_streaming(&self, event: StreamingEvent) {
        let _ = self.event_bus.emit(CoreEvent::Streaming(event));
    }
}

impl fmt::Debug for RichMediaService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RichMediaService")
            .field("registry", &self.registry)
            .field("streaming_enabled", &self.streaming_enabled)
            .finish()
    }
}

/// Combine per-fragment results with the original content, index by index.
///
/// Successes replace their fragment, failures keep the original; every
/// merged fragment has `sync_needed == false`. Errors carry the index of the
/// fragment they refer to.
pub fn merge_results(
    original: &[ContentFragment],
    results: Vec<Result<ContentFragment>>,
) -> (Vec<ContentFragment>, Vec<ErrorDescriptor>) {
    let mut errors = Vec::new();
    let merged = original
        .iter()
        .zip(results)
        .enumerate()
        .map(|(index, (previous, result))| {
            let fragment = match result {
                Ok(updated) => updated,
                Err(e) => {
                    debug!(index, error = %e, "Fragment update failed, keeping previous content");
                    errors.push(ErrorDescriptor::from(&e).with_index(index));
                    previous.clone()
                }
            };
            fragment.with_sync_needed(false)
        })
        .collect();

    (merged, errors)
}
