//! Preview handle lifecycle
//!
//! Binary documents are fetched once and exposed to views through opaque
//! [`PreviewHandle`]s:
//! - Each consumer owns at most one live handle
//! - Acquiring for a consumer releases its previous handle before fetching
//! - An acquisition overtaken by a newer one for the same consumer is
//!   discarded instead of installed

use crate::error::WorkspaceError;
use crate::types::DocumentRef;
use dashmap::DashMap;
use folio_store::{Collection, FileStore};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use ulid::Ulid;

/// Unique handle identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandleId(pub Ulid);

impl HandleId {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for HandleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Owner of at most one live handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConsumerId(pub Ulid);

impl ConsumerId {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ConsumerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Locally materialized binary content of one document
///
/// Cloning shares the content; liveness is tracked by the manager, not by
/// the number of clones.
#[derive(Clone)]
pub struct PreviewHandle {
    id: HandleId,
    document: DocumentRef,
    content: Arc<[u8]>,
}

impl PreviewHandle {
    #[inline]
    #[must_use]
    pub fn id(&self) -> HandleId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn document(&self) -> &DocumentRef {
        &self.document
    }

    #[inline]
    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.content.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Media type derived from the document extension
    #[must_use]
    pub fn media_type(&self) -> &'static str {
        match self.document.extension().as_deref() {
            Some("pdf") => "application/pdf",
            _ => "application/octet-stream",
        }
    }
}

impl PartialEq for PreviewHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PreviewHandle {}

impl fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewHandle")
            .field("id", &self.id)
            .field("document", &self.document)
            .field("bytes", &self.content.len())
            .finish()
    }
}

/// Preview statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreviewStats {
    /// Handles materialized
    pub acquired: usize,
    /// Handles released
    pub released: usize,
    /// Fetches completed after being superseded
    pub discarded: usize,
}

#[derive(Debug, Default)]
struct Slot {
    /// Bumped by every acquire/release for the consumer
    ticket: u64,
    handle: Option<PreviewHandle>,
}

/// Creates and releases preview handles
pub struct PreviewManager {
    files: Arc<dyn FileStore>,
    binary_extensions: Vec<String>,
    /// Live handles and their owners
    live: DashMap<HandleId, ConsumerId>,
    slots: Mutex<HashMap<ConsumerId, Slot>>,
    stats: Mutex<PreviewStats>,
}

impl fmt::Debug for PreviewManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewManager")
            .field("binary_extensions", &self.binary_extensions)
            .field("live", &self.live.len())
            .finish_non_exhaustive()
    }
}

impl PreviewManager {
    /// Create manager fetching from `files`
    #[must_use]
    pub fn new(files: Arc<dyn FileStore>, binary_extensions: &[String]) -> Self {
        Self {
            files,
            binary_extensions: binary_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            live: DashMap::new(),
            slots: Mutex::new(HashMap::new()),
            stats: Mutex::new(PreviewStats::default()),
        }
    }

    /// Whether `doc` is a binary document eligible for preview
    #[must_use]
    pub fn is_binary(&self, doc: &DocumentRef) -> bool {
        doc.collection == Collection::Documents
            && doc
                .extension()
                .is_some_and(|ext| self.binary_extensions.iter().any(|b| *b == ext))
    }

    /// Acquire a handle for `doc` on behalf of `consumer`
    ///
    /// The consumer's previous handle is released before the fetch starts.
    ///
    /// # Returns
    /// `None` if another acquire or release for the same consumer happened
    /// while the fetch was in flight; the fetched content is dropped.
    ///
    /// # Errors
    /// - `WorkspaceError::NotBinary` for textual documents
    /// - `WorkspaceError::FetchFailed` if the backing store cannot supply bytes
    pub async fn acquire(
        &self,
        consumer: ConsumerId,
        doc: &DocumentRef,
    ) -> Result<Option<PreviewHandle>, WorkspaceError> {
        if !self.is_binary(doc) {
            return Err(WorkspaceError::NotBinary {
                name: doc.name.clone(),
            });
        }

        let ticket = {
            let mut slots = self.slots.lock();
            let slot = slots.entry(consumer).or_default();
            slot.ticket += 1;
            if let Some(previous) = slot.handle.take() {
                self.forget(&previous);
            }
            slot.ticket
        };

        let bytes = self
            .files
            .fetch_binary(&doc.name)
            .await
            .map_err(|source| WorkspaceError::FetchFailed {
                name: doc.name.clone(),
                source,
            })?;

        let mut slots = self.slots.lock();
        let slot = slots.entry(consumer).or_default();
        if slot.ticket != ticket {
            self.stats.lock().discarded += 1;
            tracing::debug!(%consumer, document = %doc, "preview fetch superseded, discarding");
            return Ok(None);
        }

        let handle = PreviewHandle {
            id: HandleId::new(),
            document: doc.clone(),
            content: Arc::from(bytes),
        };
        self.live.insert(handle.id, consumer);
        slot.handle = Some(handle.clone());
        self.stats.lock().acquired += 1;
        tracing::debug!(%consumer, handle = %handle.id, document = %doc, bytes = handle.len(), "preview acquired");

        Ok(Some(handle))
    }

    /// Release `handle`
    ///
    /// Returns `false` if it was not live (already released or superseded).
    pub fn release(&self, handle: &PreviewHandle) -> bool {
        let mut slots = self.slots.lock();
        let Some(owner) = self.live.get(&handle.id).map(|entry| *entry.value()) else {
            return false;
        };
        if let Some(slot) = slots.get_mut(&owner) {
            if slot.handle.as_ref().is_some_and(|h| h.id == handle.id) {
                slot.handle = None;
            }
        }
        self.forget(handle)
    }

    /// Release whatever `consumer` holds and cancel its in-flight acquisition
    pub fn release_consumer(&self, consumer: ConsumerId) -> bool {
        let mut slots = self.slots.lock();
        let Some(slot) = slots.get_mut(&consumer) else {
            return false;
        };
        slot.ticket += 1;
        match slot.handle.take() {
            Some(handle) => self.forget(&handle),
            None => false,
        }
    }

    /// Release every handle of every consumer
    pub fn release_all(&self) {
        let mut slots = self.slots.lock();
        for slot in slots.values_mut() {
            slot.ticket += 1;
            if let Some(handle) = slot.handle.take() {
                self.forget(&handle);
            }
        }
    }

    /// Handle currently held by `consumer`
    #[must_use]
    pub fn current(&self, consumer: ConsumerId) -> Option<PreviewHandle> {
        self.slots
            .lock()
            .get(&consumer)
            .and_then(|slot| slot.handle.clone())
    }

    #[inline]
    #[must_use]
    pub fn is_live(&self, handle: &PreviewHandle) -> bool {
        self.live.contains_key(&handle.id)
    }

    /// Number of live handles across all consumers
    #[inline]
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    #[must_use]
    pub fn stats(&self) -> PreviewStats {
        *self.stats.lock()
    }

    /// Drop `handle` from the live set; callers hold the slots lock
    fn forget(&self, handle: &PreviewHandle) -> bool {
        if self.live.remove(&handle.id).is_some() {
            self.stats.lock().released += 1;
            tracing::debug!(handle = %handle.id, document = %handle.document, "preview released");
            true
        } else {
            false
        }
    }
}

impl Drop for PreviewManager {
    fn drop(&mut self) {
        self.release_all();
    }
}
