//! Workspace composition root
//!
//! Owns one instance of every component and wires them together:
//! - Index and mirror subscribe to the event channel at construction
//! - `start` launches background sync, so announced changes are applied
//!   without an explicit `sync`
//! - The pipeline and `open` share one preview manager
//! - Dropping the workspace unsubscribes and stops background sync

use crate::config::WorkspaceConfig;
use crate::error::WorkspaceError;
use crate::index::{DirectoryIndex, DirectorySnapshot};
use crate::mirror::{ConfigMirror, ModelCatalog};
use crate::pipeline::ArtifactPipeline;
use crate::preview::{ConsumerId, PreviewHandle, PreviewManager};
use crate::slot::SlotFile;
use crate::types::DocumentRef;
use folio_events::{EventChannel, Subscription};
use folio_store::{
    ActiveConfiguration, ConfigService, FileStore, GenerationService, HttpBackend, TextDocument,
    VerificationService,
};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// External collaborators of a workspace
#[derive(Clone)]
pub struct Services {
    pub files: Arc<dyn FileStore>,
    pub generator: Arc<dyn GenerationService>,
    pub verifier: Arc<dyn VerificationService>,
    pub config: Arc<dyn ConfigService>,
}

impl Services {
    /// Every service backed by the same implementation
    #[must_use]
    pub fn shared<B>(backend: Arc<B>) -> Self
    where
        B: FileStore + GenerationService + VerificationService + ConfigService + 'static,
    {
        Self {
            files: backend.clone(),
            generator: backend.clone(),
            verifier: backend.clone(),
            config: backend,
        }
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}

/// Result of opening a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenedDocument {
    /// Binary document, materialized for preview
    Preview(PreviewHandle),
    /// Textual document content
    Text(TextDocument),
}

/// Outcome of draining change notifications
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Collections refreshed
    pub collections: usize,
    /// Whether the configuration was re-read
    pub configuration: bool,
}

/// Every component of one workspace session
pub struct Workspace {
    config: WorkspaceConfig,
    channel: EventChannel,
    index: Arc<DirectoryIndex>,
    previews: Arc<PreviewManager>,
    pipeline: ArtifactPipeline,
    mirror: Arc<ConfigMirror>,
    /// Consumer for previews opened outside the pipeline
    viewer: ConsumerId,
    subscriptions: Mutex<Vec<Subscription>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl fmt::Debug for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workspace")
            .field("config", &self.config)
            .field("index", &self.index)
            .field("pipeline", &self.pipeline)
            .field("mirror", &self.mirror)
            .finish_non_exhaustive()
    }
}

impl Workspace {
    /// Workspace over one backend implementing every service
    #[must_use]
    pub fn new<B>(config: WorkspaceConfig, backend: Arc<B>) -> Self
    where
        B: FileStore + GenerationService + VerificationService + ConfigService + 'static,
    {
        Self::with_services(config, Services::shared(backend))
    }

    /// Workspace talking HTTP to `config.api_base_url`
    ///
    /// # Errors
    /// `WorkspaceError::Configuration` for an unusable base URL
    pub fn connect(config: WorkspaceConfig) -> Result<Self, WorkspaceError> {
        let backend = match config.request_timeout() {
            Some(timeout) => HttpBackend::with_timeout(&config.api_base_url, timeout),
            None => HttpBackend::new(&config.api_base_url),
        }
        .map_err(|e| WorkspaceError::Configuration(e.to_string()))?;
        tracing::info!(base_url = %backend.base_url(), "connecting workspace");
        Ok(Self::new(config, Arc::new(backend)))
    }

    /// Workspace over separately supplied services
    #[must_use]
    pub fn with_services(config: WorkspaceConfig, services: Services) -> Self {
        let channel = EventChannel::new();
        let previews = Arc::new(PreviewManager::new(
            services.files.clone(),
            &config.binary_extensions,
        ));
        let index = Arc::new(DirectoryIndex::new(services.files.clone()));
        let mirror = Arc::new(ConfigMirror::new(
            services.config,
            channel.clone(),
            ModelCatalog::new(config.models.clone()),
        ));

        let mut pipeline = ArtifactPipeline::new(
            services.files,
            services.generator,
            services.verifier,
            previews.clone(),
            channel.clone(),
        )
        .with_ack_windows(config.save_ack_window(), config.verification_ack_window());

        if let Some(path) = &config.artifact_slot_path {
            let slot = SlotFile::new(path);
            match slot.load() {
                Ok(Some(artifact)) => {
                    pipeline.restore(artifact);
                }
                Ok(None) => {}
                Err(err) => tracing::warn!(error = %err, "ignoring unreadable artifact slot"),
            }
            pipeline = pipeline.with_slot_file(slot);
        }

        let subscriptions = vec![index.subscribe(&channel), mirror.subscribe(&channel)];

        Self {
            config,
            channel,
            index,
            previews,
            pipeline,
            mirror,
            viewer: ConsumerId::new(),
            subscriptions: Mutex::new(subscriptions),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Initial load of both listings and the active configuration
    ///
    /// Also starts background sync on the current runtime.
    ///
    /// # Errors
    /// The first `BackingStoreUnavailable`; whatever did load is kept
    pub async fn start(&self) -> Result<DirectorySnapshot, WorkspaceError> {
        self.spawn_background_sync();
        let (listings, config) =
            futures::future::join(self.index.refresh_all(), self.mirror.read()).await;
        config?;
        listings
    }

    /// Navigation trigger: re-read the active configuration
    ///
    /// # Errors
    /// `WorkspaceError::BackingStoreUnavailable`
    pub async fn navigate(&self) -> Result<ActiveConfiguration, WorkspaceError> {
        self.mirror.read().await
    }

    /// Open `doc` for viewing
    ///
    /// Binary documents are previewed through the shared preview manager,
    /// replacing the previously opened preview. Anything else is loaded as
    /// text.
    ///
    /// # Errors
    /// `WorkspaceError::FetchFailed`, or `WorkspaceError::Superseded` if a
    /// newer `open` overtook this one
    pub async fn open(&self, doc: &DocumentRef) -> Result<OpenedDocument, WorkspaceError> {
        if self.previews.is_binary(doc) {
            return match self.previews.acquire(self.viewer, doc).await? {
                Some(handle) => Ok(OpenedDocument::Preview(handle)),
                None => Err(WorkspaceError::Superseded {
                    name: doc.name.clone(),
                }),
            };
        }
        self.previews.release_consumer(self.viewer);
        self.index.load_text(doc).await.map(OpenedDocument::Text)
    }

    /// Release the preview held by `open`
    pub fn close_preview(&self) -> bool {
        self.previews.release_consumer(self.viewer)
    }

    /// Apply every change announced since the last sync
    ///
    /// # Errors
    /// The first refresh failure; remaining work stays pending
    pub async fn sync(&self) -> Result<SyncReport, WorkspaceError> {
        let collections = self.index.sync_pending().await?;
        let configuration = self.mirror.sync_pending().await?;
        Ok(SyncReport {
            collections,
            configuration,
        })
    }

    /// Apply announced changes in the background until dropped
    pub fn spawn_background_sync(&self) {
        let mut tasks = self.tasks.lock();
        if tasks.is_empty() {
            tasks.push(self.index.spawn_sync_task());
            tasks.push(self.mirror.spawn_sync_task());
        }
    }

    /// Drop every piece of session state
    pub fn reset(&self) {
        self.pipeline.clear();
        self.previews.release_all();
        self.index.reset();
        self.mirror.reset();
        tracing::info!("workspace reset");
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn channel(&self) -> &EventChannel {
        &self.channel
    }

    #[inline]
    #[must_use]
    pub fn index(&self) -> &DirectoryIndex {
        &self.index
    }

    #[inline]
    #[must_use]
    pub fn previews(&self) -> &PreviewManager {
        &self.previews
    }

    #[inline]
    #[must_use]
    pub fn pipeline(&self) -> &ArtifactPipeline {
        &self.pipeline
    }

    #[inline]
    #[must_use]
    pub fn mirror(&self) -> &ConfigMirror {
        &self.mirror
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.subscriptions.lock().clear();
    }
}
