//! Core types for Folio
//!
//! Defines the data model shared by the components:
//! - Document references within a collection
//! - The single generated-artifact slot
//! - Pipeline states and transient statuses
//! - Point-in-time pipeline snapshot

use crate::preview::PreviewHandle;
use folio_store::{Collection, GeneratedCode, TextDocument};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Name of a document within one collection
///
/// Names are unique within a collection, not globally.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    pub name: String,
    pub collection: Collection,
}

impl DocumentRef {
    /// Create new document reference
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, collection: Collection) -> Self {
        Self {
            name: name.into(),
            collection,
        }
    }

    /// Reference into the documents collection
    #[inline]
    #[must_use]
    pub fn document(name: impl Into<String>) -> Self {
        Self::new(name, Collection::Documents)
    }

    /// Reference into the artifacts collection
    #[inline]
    #[must_use]
    pub fn artifact(name: impl Into<String>) -> Self {
        Self::new(name, Collection::Artifacts)
    }

    /// Lowercased file extension, if any
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.name)
    }
}

/// Status of the artifact slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactStatus {
    /// Slot is empty
    #[default]
    None,
    /// Generation requested, no result yet
    Pending,
    /// Result held
    Ready,
    /// Generation failed
    Failed,
}

/// The single generated artifact held by the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedArtifact {
    /// Document the artifact was generated from
    pub source_name: String,
    /// Name the artifact is saved under
    pub target_name: String,
    /// Generated text
    pub payload: String,
    pub status: ArtifactStatus,
}

impl GeneratedArtifact {
    /// Empty slot
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Generation in flight for `source_name`
    #[inline]
    #[must_use]
    pub fn pending(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            status: ArtifactStatus::Pending,
            ..Self::default()
        }
    }

    /// Generation result for `source_name`
    #[inline]
    #[must_use]
    pub fn ready(source_name: impl Into<String>, code: GeneratedCode) -> Self {
        Self {
            source_name: source_name.into(),
            target_name: code.filename,
            payload: code.code,
            status: ArtifactStatus::Ready,
        }
    }

    /// Generation failure for `source_name`
    #[inline]
    #[must_use]
    pub fn failed(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            status: ArtifactStatus::Failed,
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status == ArtifactStatus::Ready
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.status == ArtifactStatus::None
    }

    /// Body used for save and verification requests
    #[must_use]
    pub fn to_text_document(&self) -> TextDocument {
        TextDocument::new(self.target_name.clone(), self.payload.clone())
    }
}

/// Artifact pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    /// Nothing selected
    #[default]
    Idle,
    /// A document is selected, no generation requested
    Selected,
    /// Generation request in flight
    Generating,
    /// Artifact held
    Ready,
    /// Last generation failed
    Failed,
}

impl PipelineState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Selected => "selected",
            Self::Generating => "generating",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Save acknowledgement shown next to the artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    /// Shown for the save acknowledgement window
    Saved,
}

/// Transient status of the last verification trigger
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VerificationStatus {
    #[default]
    Idle,
    Triggering,
    /// Shown for the verification acknowledgement window
    Acknowledged,
    /// Shown for the verification acknowledgement window
    Failed(String),
}

/// Consistent view of the pipeline for rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSnapshot {
    pub state: PipelineState,
    pub selection: Option<DocumentRef>,
    pub artifact: GeneratedArtifact,
    pub preview: Option<PreviewHandle>,
    pub save: SaveStatus,
    pub verification: VerificationStatus,
    /// Last user-visible message (errors, rejections)
    pub message: Option<String>,
}

impl PipelineSnapshot {
    /// Source document of an in-flight generation
    #[must_use]
    pub fn generating_source(&self) -> Option<&str> {
        (self.state == PipelineState::Generating).then_some(self.artifact.source_name.as_str())
    }
}
