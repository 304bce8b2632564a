//! Directory Index
//!
//! Authoritative view of the two collections:
//! - Each refresh replaces one collection's listing wholesale
//! - A failed refresh keeps the previous listing (stale but available)
//! - Responses older than the last applied one are discarded
//! - Change notifications only mark a collection stale; the refresh runs
//!   in [`DirectoryIndex::sync_pending`] or the background sync task

use crate::error::WorkspaceError;
use crate::types::DocumentRef;
use folio_events::{EventChannel, Subscription, Topic};
use folio_store::{Collection, FileStore, TextDocument};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Listing of both collections as of their last applied refresh
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectorySnapshot {
    pub documents: Vec<DocumentRef>,
    pub artifacts: Vec<DocumentRef>,
}

impl DirectorySnapshot {
    #[must_use]
    pub fn listing(&self, collection: Collection) -> &[DocumentRef] {
        match collection {
            Collection::Documents => &self.documents,
            Collection::Artifacts => &self.artifacts,
        }
    }

    #[must_use]
    pub fn contains(&self, doc: &DocumentRef) -> bool {
        self.listing(doc.collection).contains(doc)
    }
}

#[derive(Debug, Default)]
struct Tracked {
    entries: Vec<DocumentRef>,
    /// Sequence number handed to the latest refresh
    issued: u64,
    /// Sequence number of the refresh whose listing is held
    applied: u64,
}

#[derive(Debug, Default)]
struct IndexState {
    documents: Tracked,
    artifacts: Tracked,
}

impl IndexState {
    fn tracked_mut(&mut self, collection: Collection) -> &mut Tracked {
        match collection {
            Collection::Documents => &mut self.documents,
            Collection::Artifacts => &mut self.artifacts,
        }
    }
}

/// Holds the current listing of both collections
pub struct DirectoryIndex {
    files: Arc<dyn FileStore>,
    state: Mutex<IndexState>,
    pending: Mutex<BTreeSet<Collection>>,
    wake: Arc<Notify>,
}

impl fmt::Debug for DirectoryIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryIndex")
            .field("state", &self.state)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl DirectoryIndex {
    /// Create an empty index over `files`
    #[must_use]
    pub fn new(files: Arc<dyn FileStore>) -> Self {
        Self {
            files,
            state: Mutex::new(IndexState::default()),
            pending: Mutex::new(BTreeSet::new()),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Fetch the authoritative listing of `collection`
    ///
    /// Returns the listing held after the call. If a newer refresh already
    /// completed, that listing wins over this response.
    ///
    /// # Errors
    /// `WorkspaceError::BackingStoreUnavailable`; the previous listing is kept
    pub async fn refresh(
        &self,
        collection: Collection,
    ) -> Result<Vec<DocumentRef>, WorkspaceError> {
        let sequence = {
            let mut state = self.state.lock();
            let tracked = state.tracked_mut(collection);
            tracked.issued += 1;
            tracked.issued
        };

        let names = match self.files.list(collection).await {
            Ok(names) => names,
            Err(source) => {
                tracing::warn!(%collection, error = %source, "refresh failed, keeping previous listing");
                return Err(WorkspaceError::BackingStoreUnavailable {
                    resource: collection.to_string(),
                    source,
                });
            }
        };

        let mut state = self.state.lock();
        let tracked = state.tracked_mut(collection);
        if sequence > tracked.applied {
            tracked.entries = names
                .into_iter()
                .map(|name| DocumentRef::new(name, collection))
                .collect();
            tracked.applied = sequence;
            tracing::debug!(%collection, sequence, entries = tracked.entries.len(), "listing applied");
        } else {
            tracing::warn!(%collection, sequence, applied = tracked.applied, "out-of-order listing discarded");
        }
        Ok(tracked.entries.clone())
    }

    /// Refresh both collections concurrently
    ///
    /// Each collection is replaced or retained independently.
    ///
    /// # Errors
    /// The first `BackingStoreUnavailable` in collection order
    pub async fn refresh_all(&self) -> Result<DirectorySnapshot, WorkspaceError> {
        let (documents, artifacts) = futures::future::join(
            self.refresh(Collection::Documents),
            self.refresh(Collection::Artifacts),
        )
        .await;
        documents?;
        artifacts?;
        Ok(self.snapshot())
    }

    /// Delete `doc`, then re-pull its collection
    ///
    /// Publishes nothing; callers coordinating other views notify on their own.
    ///
    /// # Errors
    /// `WorkspaceError::BackingStoreUnavailable` if the delete is rejected (the
    /// listing is left untouched) or the follow-up refresh fails
    pub async fn remove(&self, doc: &DocumentRef) -> Result<Vec<DocumentRef>, WorkspaceError> {
        if let Err(source) = self.files.delete(&doc.name, doc.collection).await {
            tracing::warn!(document = %doc, error = %source, "delete rejected");
            return Err(WorkspaceError::BackingStoreUnavailable {
                resource: doc.collection.to_string(),
                source,
            });
        }
        tracing::info!(document = %doc, "document removed");
        self.refresh(doc.collection).await
    }

    /// Load the textual content of `doc`
    ///
    /// # Errors
    /// `WorkspaceError::FetchFailed`
    pub async fn load_text(&self, doc: &DocumentRef) -> Result<TextDocument, WorkspaceError> {
        self.files
            .load_text(&doc.name, doc.collection)
            .await
            .map_err(|source| WorkspaceError::FetchFailed {
                name: doc.name.clone(),
                source,
            })
    }

    #[must_use]
    pub fn snapshot(&self) -> DirectorySnapshot {
        let state = self.state.lock();
        DirectorySnapshot {
            documents: state.documents.entries.clone(),
            artifacts: state.artifacts.entries.clone(),
        }
    }

    #[must_use]
    pub fn listing(&self, collection: Collection) -> Vec<DocumentRef> {
        self.state.lock().tracked_mut(collection).entries.clone()
    }

    /// Record that `collection` changed elsewhere
    pub fn mark_stale(&self, collection: Collection) {
        self.pending.lock().insert(collection);
        self.wake.notify_one();
    }

    /// Collections waiting for a refresh
    #[must_use]
    pub fn stale(&self) -> Vec<Collection> {
        self.pending.lock().iter().copied().collect()
    }

    /// Refresh every collection marked stale
    ///
    /// A collection whose refresh fails stays marked.
    ///
    /// # Errors
    /// The last `BackingStoreUnavailable` encountered
    pub async fn sync_pending(&self) -> Result<usize, WorkspaceError> {
        let pending = std::mem::take(&mut *self.pending.lock());
        let mut refreshed = 0;
        let mut failure = None;
        for collection in pending {
            match self.refresh(collection).await {
                Ok(_) => refreshed += 1,
                Err(err) => {
                    self.pending.lock().insert(collection);
                    failure = Some(err);
                }
            }
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(refreshed),
        }
    }

    /// Mark artifacts stale whenever one is persisted
    pub fn subscribe(self: &Arc<Self>, channel: &EventChannel) -> Subscription {
        let index: Weak<Self> = Arc::downgrade(self);
        channel.subscribe(Topic::ARTIFACT_PERSISTED, move |notification| {
            if let Some(index) = index.upgrade() {
                tracing::debug!(payload = ?notification.payload, "artifacts marked stale");
                index.mark_stale(Collection::Artifacts);
            }
            Ok(())
        })
    }

    /// Drain stale collections in the background until the index is dropped
    pub fn spawn_sync_task(self: &Arc<Self>) -> JoinHandle<()> {
        let index = Arc::downgrade(self);
        let wake = Arc::clone(&self.wake);
        tokio::spawn(async move {
            loop {
                wake.notified().await;
                let Some(index) = index.upgrade() else {
                    break;
                };
                if let Err(err) = index.sync_pending().await {
                    tracing::warn!(error = %err, "background refresh failed");
                }
            }
        })
    }

    /// Forget both listings and discard refreshes still in flight
    pub fn reset(&self) {
        let mut state = self.state.lock();
        for collection in Collection::ALL {
            let tracked = state.tracked_mut(collection);
            tracked.entries.clear();
            tracked.applied = tracked.issued;
        }
        self.pending.lock().clear();
    }
}

impl Drop for DirectoryIndex {
    fn drop(&mut self) {
        // lets a parked sync task observe the drop and exit
        self.wake.notify_one();
    }
}
