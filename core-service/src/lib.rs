//! Core service façade and bootstrap helpers.
//!
//! This crate wires a validated [`CoreConfig`] and a host [`MessageStore`] into
//! a running rich-media sync subsystem: the resolver registry, the
//! orchestrator, the store listener and, when the host brings no job queue of
//! its own, the in-process sync worker. Desktop apps typically enable the
//! `desktop-shims` feature so the configuration falls back to the reqwest
//! based `HttpClient` from `bridge-desktop`.

pub mod error;

pub use error::{CoreError, Result};

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop::ReqwestHttpClient;

use std::sync::Arc;

use bridge_traits::dispatch::SyncDispatcher;
use core_messages::{MessageId, MessageStore};
use core_richmedia::{
    ChannelSyncDispatcher, ErrorDescriptor, ResolverRegistry, RichMediaService,
    RichMediaSyncWorker, StoreListener,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus};
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[cfg(feature = "streaming")]
use core_messages::MediaAsset;
#[cfg(feature = "streaming")]
use url::Url;

/// Primary façade exposed to host applications.
pub struct CoreService {
    service: Arc<RichMediaService>,
    store: Arc<dyn MessageStore>,
    event_bus: EventBus,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl CoreService {
    /// Start the subsystem on the current tokio runtime.
    ///
    /// The store is subscribed before anything else runs, then every message
    /// left with pending fragments by a previous session is dispatched again.
    ///
    /// ```no_run
    /// # async fn example(store: std::sync::Arc<core_messages::InMemoryMessageStore>) -> core_service::Result<()> {
    /// use core_runtime::config::{CoreConfig, ProviderApiConfig};
    /// use core_service::CoreService;
    ///
    /// let config = CoreConfig::builder()
    ///     .provider_api_config(ProviderApiConfig::from_env()?)
    ///     .enable_youtube(true)
    ///     .build()?;
    /// let core = CoreService::bootstrap(config, store).await?;
    /// # core.shutdown().await;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// - [`CoreError::InitializationFailed`] outside a tokio runtime
    /// - [`CoreError::Runtime`] when the configuration does not validate
    /// - [`CoreError::Media`] when an enabled provider cannot be built
    pub async fn bootstrap(config: CoreConfig, store: Arc<dyn MessageStore>) -> Result<Self> {
        tokio::runtime::Handle::try_current()
            .map_err(|e| CoreError::InitializationFailed(format!("No tokio runtime: {}", e)))?;
        config.validate()?;

        let registry = ResolverRegistry::from_config(&config)?;
        let event_bus = EventBus::new(config.sync_settings.event_buffer_size);

        let (dispatcher, jobs): (Arc<dyn SyncDispatcher>, _) = match config.sync_dispatcher.clone() {
            Some(dispatcher) => (dispatcher, None),
            None => {
                let (dispatcher, jobs) = ChannelSyncDispatcher::channel();
                (Arc::new(dispatcher), Some(jobs))
            }
        };

        let service = Arc::new(
            RichMediaService::new(store.clone(), registry, dispatcher, event_bus.clone())
                .with_streaming(config.features.enable_streaming),
        );

        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::with_capacity(2);

        tasks.push(StoreListener::new(service.clone()).spawn(store.subscribe(), shutdown_rx.clone()));
        if let Some(jobs) = jobs {
            tasks.push(
                RichMediaSyncWorker::new(service.clone(), config.sync_settings.clone())
                    .spawn(jobs, shutdown_rx),
            );
        }

        let core = Self {
            service,
            store,
            event_bus,
            shutdown,
            tasks: Mutex::new(tasks),
        };

        let resumed = core.service.resume_pending().await?;
        info!(
            providers = ?core.service.registry().providers(),
            resumed,
            in_process_worker = config.sync_dispatcher.is_none(),
            "Rich-media core started"
        );

        Ok(core)
    }

    /// The orchestrator, for hosts that run sync jobs on their own queue.
    pub fn service(&self) -> Arc<RichMediaService> {
        Arc::clone(&self.service)
    }

    pub fn store(&self) -> Arc<dyn MessageStore> {
        Arc::clone(&self.store)
    }

    /// Subscribe to sync and streaming events.
    pub fn events(&self) -> broadcast::Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    /// Run one resolution round for `message_id` right away.
    pub async fn resolve(&self, message_id: &MessageId) -> Vec<ErrorDescriptor> {
        self.service.resolve(message_id).await
    }

    /// Playable URIs for `asset`; empty when its provider cannot stream.
    #[cfg(feature = "streaming")]
    pub async fn prepare_streaming(&self, asset: &MediaAsset) -> Result<Vec<Url>> {
        Ok(self.service.prepare_streaming(asset).await?)
    }

    /// Stop the listener and worker, waiting for in-flight rounds.
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);

        let tasks = std::mem::take(&mut *self.tasks.lock().await);
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }
        info!("Rich-media core stopped");
    }
}
