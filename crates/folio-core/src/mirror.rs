//! Active Configuration Mirror
//!
//! Read-only cache of which backing model serves which role. Writes go to
//! the backing store and are announced on the event channel; the mirror
//! re-reads on navigation and on every `configuration-changed`.

use crate::config::ModelOption;
use crate::error::WorkspaceError;
use folio_events::{EventChannel, Subscription, Topic};
use folio_store::{ActiveConfiguration, ConfigRole, ConfigService};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Static model capability table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelCatalog {
    options: Vec<ModelOption>,
}

impl ModelCatalog {
    #[must_use]
    pub fn new(options: Vec<ModelOption>) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> &[ModelOption] {
        &self.options
    }

    #[must_use]
    pub fn find(&self, model: &str) -> Option<&ModelOption> {
        self.options.iter().find(|o| o.name == model)
    }

    /// Models missing from the table are left to the backing store to judge
    #[must_use]
    pub fn is_supported(&self, model: &str) -> bool {
        self.find(model).map_or(true, |o| o.available)
    }
}

#[derive(Debug, Default)]
struct MirrorState {
    config: Option<ActiveConfiguration>,
    last_error: Option<WorkspaceError>,
    issued: u64,
    applied: u64,
}

/// Caches the active configuration
pub struct ConfigMirror {
    service: Arc<dyn ConfigService>,
    channel: EventChannel,
    catalog: ModelCatalog,
    state: Mutex<MirrorState>,
    stale: AtomicBool,
    wake: Arc<Notify>,
}

impl fmt::Debug for ConfigMirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigMirror")
            .field("state", &self.state)
            .field("stale", &self.stale)
            .finish_non_exhaustive()
    }
}

impl ConfigMirror {
    #[must_use]
    pub fn new(service: Arc<dyn ConfigService>, channel: EventChannel, catalog: ModelCatalog) -> Self {
        Self {
            service,
            channel,
            catalog,
            state: Mutex::new(MirrorState::default()),
            stale: AtomicBool::new(false),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Re-fetch the active configuration
    ///
    /// # Errors
    /// `WorkspaceError::BackingStoreUnavailable`; the cached value is kept
    pub async fn read(&self) -> Result<ActiveConfiguration, WorkspaceError> {
        let sequence = {
            let mut state = self.state.lock();
            state.issued += 1;
            state.issued
        };

        match self.service.active().await {
            Ok(config) => {
                self.apply(sequence, config.clone());
                Ok(config)
            }
            Err(source) => {
                let err = WorkspaceError::BackingStoreUnavailable {
                    resource: "configuration".to_string(),
                    source,
                };
                tracing::warn!(error = %err, "configuration read failed");
                self.state.lock().last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Assign `model` to `role`, then announce the change
    ///
    /// # Errors
    /// - `WorkspaceError::UnsupportedModel` when the capability table marks
    ///   `model` unavailable; nothing is sent or published
    /// - `WorkspaceError::PersistError` if the backing store rejects the write
    pub async fn write(
        &self,
        role: ConfigRole,
        model: &str,
    ) -> Result<ActiveConfiguration, WorkspaceError> {
        if !self.catalog.is_supported(model) {
            tracing::info!(%role, model, "model rejected by capability table");
            return Err(WorkspaceError::UnsupportedModel {
                model: model.to_string(),
            });
        }

        let sequence = {
            let mut state = self.state.lock();
            state.issued += 1;
            state.issued
        };
        let config = self.service.update(role, model).await.map_err(|source| {
            WorkspaceError::PersistError {
                name: "configuration".to_string(),
                source,
            }
        })?;

        self.apply(sequence, config.clone());
        tracing::info!(%role, model, "configuration updated");
        self.channel.publish(Topic::CONFIGURATION_CHANGED, None);
        Ok(config)
    }

    /// Model names the backing store supports
    ///
    /// # Errors
    /// `WorkspaceError::BackingStoreUnavailable`
    pub async fn list_models(&self) -> Result<Vec<String>, WorkspaceError> {
        self.service
            .models()
            .await
            .map_err(|source| WorkspaceError::BackingStoreUnavailable {
                resource: "models".to_string(),
                source,
            })
    }

    #[inline]
    #[must_use]
    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Last successfully read configuration
    #[must_use]
    pub fn cached(&self) -> Option<ActiveConfiguration> {
        self.state.lock().config.clone()
    }

    /// Error of the last failed read, cleared by the next successful one
    #[must_use]
    pub fn last_error(&self) -> Option<WorkspaceError> {
        self.state.lock().last_error.clone()
    }

    pub fn mark_stale(&self) {
        self.stale.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::SeqCst)
    }

    /// Re-read if a change was announced since the last sync
    ///
    /// # Errors
    /// `WorkspaceError::BackingStoreUnavailable`; the mirror stays stale
    pub async fn sync_pending(&self) -> Result<bool, WorkspaceError> {
        if !self.stale.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }
        if let Err(err) = self.read().await {
            self.stale.store(true, Ordering::SeqCst);
            return Err(err);
        }
        Ok(true)
    }

    /// Mark stale on every `configuration-changed`
    pub fn subscribe(self: &Arc<Self>, channel: &EventChannel) -> Subscription {
        let mirror: Weak<Self> = Arc::downgrade(self);
        channel.subscribe(Topic::CONFIGURATION_CHANGED, move |_| {
            if let Some(mirror) = mirror.upgrade() {
                mirror.mark_stale();
            }
            Ok(())
        })
    }

    /// Re-read in the background after each announced change, until dropped
    pub fn spawn_sync_task(self: &Arc<Self>) -> JoinHandle<()> {
        let mirror = Arc::downgrade(self);
        let wake = Arc::clone(&self.wake);
        tokio::spawn(async move {
            loop {
                wake.notified().await;
                let Some(mirror) = mirror.upgrade() else {
                    break;
                };
                if let Err(err) = mirror.sync_pending().await {
                    tracing::warn!(error = %err, "background configuration refresh failed");
                }
            }
        })
    }

    /// Drop the cache and ignore reads still in flight
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.config = None;
        state.last_error = None;
        state.applied = state.issued;
        self.stale.store(false, Ordering::SeqCst);
    }

    fn apply(&self, sequence: u64, config: ActiveConfiguration) {
        let mut state = self.state.lock();
        if sequence > state.applied {
            state.applied = sequence;
            state.config = Some(config);
            state.last_error = None;
        } else {
            tracing::debug!(sequence, applied = state.applied, "stale configuration discarded");
        }
    }
}

impl Drop for ConfigMirror {
    fn drop(&mut self) {
        self.wake.notify_one();
    }
}
