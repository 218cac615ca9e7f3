//! Forwards message-store mutations to the orchestrator.

use core_messages::MessageEvent;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::service::RichMediaService;

/// Subscription loop between a `MessageStore` and [`RichMediaService`].
///
/// Delivery is at least once. If the subscription lags and events are lost,
/// every message with pending fragments is dispatched again.
pub struct StoreListener {
    service: Arc<RichMediaService>,
}

impl StoreListener {
    pub fn new(service: Arc<RichMediaService>) -> Self {
        Self { service }
    }

    /// Spawn [`run`](Self::run) on the current runtime.
    pub fn spawn(
        self,
        events: broadcast::Receiver<MessageEvent>,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(events, shutdown))
    }

    /// Handle events until the store closes its channel or `shutdown` fires.
    ///
    /// Subscribe before the first write you want observed; the receiver is
    /// taken as an argument for that reason.
    pub async fn run(
        self,
        mut events: broadcast::Receiver<MessageEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        if *shutdown.borrow() {
            return;
        }

        loop {
            let received = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                received = events.recv() => received,
            };

            match received {
                Ok(event) => self.handle(event).await,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Message event subscription lagged, resuming pending sync");
                    if let Err(e) = self.service.resume_pending().await {
                        error!(error = %e, "Failed to resume pending sync after lag");
                    }
                }
                Err(RecvError::Closed) => {
                    info!("Message store closed its event channel");
                    break;
                }
            }
        }

        debug!("Store listener stopped");
    }

    /// Route one store event to the orchestrator.
    pub async fn handle(&self, event: MessageEvent) {
        match event {
            MessageEvent::Added(messages) => {
                if let Err(e) = self.service.on_messages_added(&messages).await {
                    error!(error = %e, count = messages.len(), "Failed to schedule added messages");
                }
            }
            MessageEvent::Updated(changes) => {
                for (previous, updated) in &changes {
                    if let Err(e) = self.service.on_message_updated(previous, updated).await {
                        error!(message_id = %updated.id, error = %e, "Failed to schedule updated message");
                    }
                }
            }
        }
    }
}
