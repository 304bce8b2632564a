//! Artifact Pipeline
//!
//! State machine driving one selected document through generation, save and
//! verification:
//! - `select` clears the slot and swaps the preview handle
//! - `generate` uploads the selected document and holds the result
//! - `save` persists the held artifact and announces it
//! - `trigger_verification` fires a downstream run, status shown briefly
//!
//! Every non-idempotent `select` and every `clear` advances a selection
//! epoch. Results of requests issued under an older epoch are dropped.

use crate::error::WorkspaceError;
use crate::preview::{ConsumerId, PreviewHandle, PreviewManager};
use crate::slot::SlotFile;
use crate::status::Transient;
use crate::types::{
    DocumentRef, GeneratedArtifact, PipelineSnapshot, PipelineState, SaveStatus,
    VerificationStatus,
};
use folio_events::{EventChannel, Topic};
use folio_store::{Collection, FileStore, GeneratedCode, GenerationService, VerificationService};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_SAVE_WINDOW: Duration = Duration::from_millis(1500);
const DEFAULT_VERIFICATION_WINDOW: Duration = Duration::from_millis(2000);

#[derive(Debug, Default)]
struct Inner {
    state: PipelineState,
    selection: Option<DocumentRef>,
    epoch: u64,
    artifact: GeneratedArtifact,
    /// Bumped whenever the artifact slot is replaced
    slot_version: u64,
    preview: Option<PreviewHandle>,
    /// A preview fetch for the current epoch is in flight
    fetching: bool,
    save: Transient<SaveStatus>,
    verification: Transient<VerificationStatus>,
    message: Option<String>,
}

/// Single-slot generation pipeline
pub struct ArtifactPipeline {
    files: Arc<dyn FileStore>,
    generator: Arc<dyn GenerationService>,
    verifier: Arc<dyn VerificationService>,
    previews: Arc<PreviewManager>,
    consumer: ConsumerId,
    channel: EventChannel,
    save_window: Duration,
    verification_window: Duration,
    slot: Option<SlotFile>,
    /// Serializes slot writes; never taken while `inner` is held
    slot_write: Mutex<()>,
    inner: Mutex<Inner>,
}

impl fmt::Debug for ArtifactPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactPipeline")
            .field("consumer", &self.consumer)
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl ArtifactPipeline {
    /// Create an idle pipeline
    #[must_use]
    pub fn new(
        files: Arc<dyn FileStore>,
        generator: Arc<dyn GenerationService>,
        verifier: Arc<dyn VerificationService>,
        previews: Arc<PreviewManager>,
        channel: EventChannel,
    ) -> Self {
        Self {
            files,
            generator,
            verifier,
            previews,
            consumer: ConsumerId::new(),
            channel,
            save_window: DEFAULT_SAVE_WINDOW,
            verification_window: DEFAULT_VERIFICATION_WINDOW,
            slot: None,
            slot_write: Mutex::new(()),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// With acknowledgement display windows
    #[inline]
    #[must_use]
    pub fn with_ack_windows(mut self, save: Duration, verification: Duration) -> Self {
        self.save_window = save;
        self.verification_window = verification;
        self
    }

    /// With persisted artifact slot
    #[inline]
    #[must_use]
    pub fn with_slot_file(mut self, slot: SlotFile) -> Self {
        self.slot = Some(slot);
        self
    }

    /// Select `doc`, clearing the held artifact
    ///
    /// Reselecting the current document keeps the artifact and state. It
    /// returns the held preview, or fetches it again when an earlier fetch
    /// failed.
    ///
    /// # Returns
    /// The preview handle for binary documents, `None` for textual ones or
    /// when the selection moved on before the preview arrived.
    ///
    /// # Errors
    /// `WorkspaceError::FetchFailed` if the preview cannot be fetched; the
    /// selection still holds
    pub async fn select(&self, doc: DocumentRef) -> Result<Option<PreviewHandle>, WorkspaceError> {
        let binary = self.previews.is_binary(&doc);
        let epoch = {
            let mut inner = self.inner.lock();
            if inner.selection.as_ref() == Some(&doc) {
                if inner.preview.is_some() || inner.fetching || !binary {
                    return Ok(inner.preview.clone());
                }
                inner.fetching = true;
                inner.message = None;
                tracing::debug!(document = %doc, epoch = inner.epoch, "retrying preview");
                inner.epoch
            } else {
                inner.epoch += 1;
                inner.state = PipelineState::Selected;
                inner.selection = Some(doc.clone());
                inner.preview = None;
                inner.fetching = binary;
                inner.save.reset();
                inner.verification.reset();
                inner.message = None;
                Self::replace_artifact(&mut inner, GeneratedArtifact::empty());
                let epoch = inner.epoch;
                drop(inner);
                tracing::debug!(document = %doc, epoch, "selected");
                self.persist_slot();
                epoch
            }
        };

        if !binary {
            self.previews.release_consumer(self.consumer);
            return Ok(None);
        }

        let result = self.previews.acquire(self.consumer, &doc).await;
        let mut inner = self.inner.lock();
        let current = inner.epoch == epoch;
        if current {
            inner.fetching = false;
        }
        match result {
            Ok(Some(handle)) if current => {
                inner.preview = Some(handle.clone());
                Ok(Some(handle))
            }
            Ok(Some(handle)) => {
                drop(inner);
                self.previews.release(&handle);
                Ok(None)
            }
            Ok(None) => Ok(None),
            Err(err) => {
                if current {
                    inner.message = Some(err.user_message());
                }
                Err(err)
            }
        }
    }

    /// Generate an artifact from the selected document
    ///
    /// Accepted from `Selected`, `Ready` and `Failed`.
    ///
    /// # Errors
    /// - `WorkspaceError::InvalidTransition` without a selection or while
    ///   a generation is in flight
    /// - `WorkspaceError::NotBinary` for textual selections
    /// - `WorkspaceError::FetchFailed` / `WorkspaceError::GenerationError`;
    ///   the pipeline enters `Failed`
    /// - `WorkspaceError::Superseded` if the selection changed meanwhile; the
    ///   result is dropped and the state left to the newer selection
    pub async fn generate(&self) -> Result<GeneratedArtifact, WorkspaceError> {
        let (doc, epoch) = {
            let mut inner = self.inner.lock();
            let doc = match (&inner.selection, inner.state) {
                (
                    Some(doc),
                    PipelineState::Selected | PipelineState::Ready | PipelineState::Failed,
                ) => doc.clone(),
                (_, state) => {
                    return Err(WorkspaceError::InvalidTransition {
                        operation: "generate",
                        state,
                    })
                }
            };
            if !self.previews.is_binary(&doc) {
                let err = WorkspaceError::NotBinary { name: doc.name };
                inner.message = Some(err.user_message());
                return Err(err);
            }
            inner.state = PipelineState::Generating;
            inner.save.reset();
            inner.verification.reset();
            inner.message = None;
            Self::replace_artifact(&mut inner, GeneratedArtifact::pending(doc.name.clone()));
            (doc, inner.epoch)
        };
        self.persist_slot();
        tracing::info!(document = %doc, "generation requested");

        let result = self.request_generation(&doc).await;

        let outcome = {
            let mut inner = self.inner.lock();
            if inner.epoch != epoch {
                tracing::warn!(document = %doc, "generation result arrived after selection changed, discarding");
                return Err(WorkspaceError::Superseded { name: doc.name });
            }
            match result {
                Ok(code) => {
                    let artifact = GeneratedArtifact::ready(doc.name, code);
                    inner.state = PipelineState::Ready;
                    Self::replace_artifact(&mut inner, artifact.clone());
                    tracing::info!(source = %artifact.source_name, artifact = %artifact.target_name, "artifact ready");
                    Ok(artifact)
                }
                Err(err) => {
                    inner.state = PipelineState::Failed;
                    inner.message = Some(err.user_message());
                    Self::replace_artifact(&mut inner, GeneratedArtifact::failed(doc.name));
                    tracing::warn!(error = %err, "generation failed");
                    Err(err)
                }
            }
        };
        self.persist_slot();
        outcome
    }

    async fn request_generation(&self, doc: &DocumentRef) -> Result<GeneratedCode, WorkspaceError> {
        let bytes = self
            .files
            .fetch_binary(&doc.name)
            .await
            .map_err(|source| WorkspaceError::FetchFailed {
                name: doc.name.clone(),
                source,
            })?;
        self.generator
            .generate(&doc.name, bytes)
            .await
            .map_err(|source| WorkspaceError::GenerationError {
                name: doc.name.clone(),
                source,
            })
    }

    /// Persist the held artifact into the artifacts collection
    ///
    /// Publishes `artifact-persisted` with the target name once the write
    /// is accepted.
    ///
    /// # Errors
    /// - `WorkspaceError::InvalidTransition` unless `Ready`
    /// - `WorkspaceError::PersistError`; the pipeline stays `Ready`
    pub async fn save(&self) -> Result<(), WorkspaceError> {
        let (document, version) = {
            let mut inner = self.inner.lock();
            if inner.state != PipelineState::Ready || !inner.artifact.is_ready() {
                return Err(WorkspaceError::InvalidTransition {
                    operation: "save",
                    state: inner.state,
                });
            }
            inner.save.set(SaveStatus::Saving);
            (inner.artifact.to_text_document(), inner.slot_version)
        };

        match self.files.save_text(Collection::Artifacts, &document).await {
            Ok(()) => {
                {
                    let mut inner = self.inner.lock();
                    if inner.slot_version == version {
                        inner.save.flash(SaveStatus::Saved, self.save_window);
                        inner.message = None;
                    }
                }
                tracing::info!(artifact = %document.filename, "artifact saved");
                let report = self
                    .channel
                    .publish(Topic::ARTIFACT_PERSISTED, Some(document.filename));
                tracing::debug!(delivered = report.delivered, failed = report.failed, "save announced");
                Ok(())
            }
            Err(source) => {
                let err = WorkspaceError::PersistError {
                    name: document.filename,
                    source,
                };
                let mut inner = self.inner.lock();
                if inner.slot_version == version {
                    inner.save.reset();
                    inner.message = Some(err.user_message());
                }
                tracing::warn!(error = %err, "save failed");
                Err(err)
            }
        }
    }

    /// Ask the verification service to run the held artifact
    ///
    /// The outcome is only reflected in the transient verification status;
    /// the pipeline state is never changed.
    ///
    /// # Errors
    /// - `WorkspaceError::InvalidTransition` unless `Ready`
    /// - `WorkspaceError::VerificationFailed`
    pub async fn trigger_verification(&self) -> Result<(), WorkspaceError> {
        let (document, version) = {
            let mut inner = self.inner.lock();
            if inner.state != PipelineState::Ready || !inner.artifact.is_ready() {
                return Err(WorkspaceError::InvalidTransition {
                    operation: "trigger verification",
                    state: inner.state,
                });
            }
            inner.verification.set(VerificationStatus::Triggering);
            (inner.artifact.to_text_document(), inner.slot_version)
        };

        let result = self.verifier.trigger(&document).await;

        let mut inner = self.inner.lock();
        let current = inner.slot_version == version;
        match result {
            Ok(()) => {
                if current {
                    inner
                        .verification
                        .flash(VerificationStatus::Acknowledged, self.verification_window);
                }
                tracing::info!(artifact = %document.filename, "verification triggered");
                Ok(())
            }
            Err(source) => {
                let err = WorkspaceError::VerificationFailed {
                    name: document.filename,
                    source,
                };
                if current {
                    inner.verification.flash(
                        VerificationStatus::Failed(err.user_message()),
                        self.verification_window,
                    );
                }
                tracing::warn!(error = %err, "verification trigger failed");
                Err(err)
            }
        }
    }

    /// Return to `Idle`, dropping the selection, slot and preview
    pub fn clear(&self) {
        {
            let mut inner = self.inner.lock();
            inner.epoch += 1;
            inner.state = PipelineState::Idle;
            inner.selection = None;
            inner.preview = None;
            inner.fetching = false;
            inner.save.reset();
            inner.verification.reset();
            inner.message = None;
            Self::replace_artifact(&mut inner, GeneratedArtifact::empty());
        }
        self.persist_slot();
        self.previews.release_consumer(self.consumer);
        tracing::debug!("pipeline cleared");
    }

    /// Hold a previously persisted artifact without a selection
    ///
    /// Ignored unless the artifact is ready and the pipeline is idle.
    pub fn restore(&self, artifact: GeneratedArtifact) -> bool {
        let mut inner = self.inner.lock();
        if !artifact.is_ready() || inner.state != PipelineState::Idle {
            return false;
        }
        tracing::info!(artifact = %artifact.target_name, "artifact restored");
        inner.state = PipelineState::Ready;
        inner.artifact = artifact;
        inner.slot_version += 1;
        true
    }

    /// Consistent view for rendering
    #[must_use]
    pub fn snapshot(&self) -> PipelineSnapshot {
        let inner = self.inner.lock();
        PipelineSnapshot {
            state: inner.state,
            selection: inner.selection.clone(),
            artifact: inner.artifact.clone(),
            preview: inner.preview.clone(),
            save: inner.save.current(),
            verification: inner.verification.current(),
            message: inner.message.clone(),
        }
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.inner.lock().state
    }

    #[must_use]
    pub fn selection(&self) -> Option<DocumentRef> {
        self.inner.lock().selection.clone()
    }

    #[must_use]
    pub fn artifact(&self) -> GeneratedArtifact {
        self.inner.lock().artifact.clone()
    }

    /// Consumer identity under which previews are acquired
    #[inline]
    #[must_use]
    pub fn consumer(&self) -> ConsumerId {
        self.consumer
    }

    fn replace_artifact(inner: &mut Inner, artifact: GeneratedArtifact) {
        inner.artifact = artifact;
        inner.slot_version += 1;
    }

    /// Write the currently held artifact to the slot file
    ///
    /// Called after `inner` is released. Whichever write runs last reads
    /// the latest artifact, so the file never lags behind the slot.
    fn persist_slot(&self) {
        let Some(slot) = &self.slot else {
            return;
        };
        let _writing = self.slot_write.lock();
        let artifact = self.inner.lock().artifact.clone();
        if let Err(err) = slot.store(&artifact) {
            tracing::warn!(error = %err, "failed to persist artifact slot");
        }
    }
}

impl Drop for ArtifactPipeline {
    fn drop(&mut self) {
        self.previews.release_consumer(self.consumer);
    }
}
