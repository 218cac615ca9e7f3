//! # In-Process Sync Worker
//!
//! Desktop builds and tests have no host job system, so sync jobs go through
//! an unbounded channel: [`ChannelSyncDispatcher`] is the sending half and
//! [`RichMediaSyncWorker`] drains it.
//!
//! The worker bounds concurrent resolutions with a semaphore and re-runs a
//! round with exponential backoff when every error it reported is transient
//! (network failures, rate limiting). Rounds with a permanent error are not
//! retried; the fragment keeps its previous metadata until the next edit or
//! restart.

use async_trait::async_trait;
use bridge_traits::dispatch::SyncDispatcher;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use core_messages::MessageId;
use core_runtime::config::SyncSettings;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::error::ErrorDescriptor;
use crate::service::RichMediaService;

/// Receiving half of the in-process job queue
pub type SyncJobReceiver = mpsc::UnboundedReceiver<MessageId>;

/// [`SyncDispatcher`] backed by an in-process channel.
#[derive(Debug, Clone)]
pub struct ChannelSyncDispatcher {
    sender: mpsc::UnboundedSender<MessageId>,
}

impl ChannelSyncDispatcher {
    pub fn channel() -> (Self, SyncJobReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl SyncDispatcher for ChannelSyncDispatcher {
    async fn sync_rich_media(&self, message_id: &str) -> BridgeResult<()> {
        self.sender
            .send(MessageId::from(message_id))
            .map_err(|_| BridgeError::QueueClosed(format!("sync job for message {}", message_id)))
    }

    async fn is_available(&self) -> bool {
        !self.sender.is_closed()
    }
}

/// Drains sync jobs and runs resolutions.
pub struct RichMediaSyncWorker {
    service: Arc<RichMediaService>,
    settings: SyncSettings,
}

impl RichMediaSyncWorker {
    pub fn new(service: Arc<RichMediaService>, settings: SyncSettings) -> Self {
        Self { service, settings }
    }

    /// Spawn [`run`](Self::run) on the current runtime.
    pub fn spawn(self, jobs: SyncJobReceiver, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(jobs, shutdown))
    }

    /// Process jobs until the queue closes or `shutdown` fires, then wait for
    /// in-flight resolutions to finish.
    pub async fn run(self, mut jobs: SyncJobReceiver, mut shutdown: watch::Receiver<bool>) {
        let limit = self.settings.max_concurrent_resolutions.max(1);
        let semaphore = Arc::new(Semaphore::new(limit));
        info!(max_concurrent = limit, "Rich-media sync worker started");

        if *shutdown.borrow() {
            return;
        }

        loop {
            let message_id = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                job = jobs.recv() => match job {
                    Some(message_id) => message_id,
                    None => break,
                },
            };

            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };

            let service = self.service.clone();
            let settings = self.settings.clone();
            tokio::spawn(async move {
                let _permit = permit;
                resolve_with_retry(&service, &message_id, &settings).await;
            });
        }

        // Every permit back means every spawned round has finished
        let _ = semaphore.acquire_many(limit as u32).await;
        info!("Rich-media sync worker stopped");
    }
}

/// Resolve `message_id`, re-running the round while all reported errors are
/// transient and retries remain. Returns the errors of the last round.
#[instrument(skip(service, message_id, settings), fields(message_id = %message_id))]
pub async fn resolve_with_retry(
    service: &RichMediaService,
    message_id: &MessageId,
    settings: &SyncSettings,
) -> Vec<ErrorDescriptor> {
    let mut attempt = 0;

    loop {
        let errors = service.resolve(message_id).await;

        let retryable = !errors.is_empty() && errors.iter().all(|e| e.kind.is_transient());
        if !retryable {
            return errors;
        }
        if attempt >= settings.max_retries {
            warn!(attempts = attempt + 1, "Giving up on transient rich-media errors");
            return errors;
        }

        attempt += 1;
        let delay = settings.retry_delay(attempt);
        debug!(attempt, ?delay, "Retrying rich-media sync after transient errors");
        sleep(delay).await;
    }
}
