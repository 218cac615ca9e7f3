//! Sync Job Dispatch
//!
//! Hands rich-media sync work to the host's job system.

use async_trait::async_trait;

use crate::error::Result;

/// Enqueues rich-media sync jobs.
///
/// The job system behind this trait owns durability: a job accepted here must
/// survive the app going offline or being restarted, and is retried by the
/// host according to its own policy. When the job runs it calls back into the
/// core to resolve the message by id, so duplicate or late jobs are harmless.
///
/// - **Android**: WorkManager unique work keyed by message id
/// - **iOS**: persisted operation queue drained on `BGProcessingTask`
/// - **Desktop / tests**: in-process channel drained by a tokio worker
///
/// # Example
///
/// ```ignore
/// use bridge_traits::dispatch::SyncDispatcher;
///
/// async fn schedule(dispatcher: &dyn SyncDispatcher, ids: &[String]) -> Result<()> {
///     for id in ids {
///         dispatcher.sync_rich_media(id).await?;
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SyncDispatcher: Send + Sync {
    /// Enqueue a rich-media sync job for one message.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::QueueClosed`](crate::BridgeError::QueueClosed)
    /// when the job system has shut down.
    async fn sync_rich_media(&self, message_id: &str) -> Result<()>;

    /// Whether jobs are currently accepted.
    async fn is_available(&self) -> bool {
        true
    }
}
