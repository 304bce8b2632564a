//! Error types for Folio Core
//!
//! Every operation converts transport failures into one of these classes at
//! its own boundary:
//! - Listing/refresh failures (stale view retained)
//! - Binary/text retrieval failures
//! - Generation, persist and verification failures
//! - Client-side model pre-check rejection
//! - Operations invoked from a state that does not allow them

use crate::types::PipelineState;
use folio_store::StoreError;

/// Main workspace error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkspaceError {
    /// Listing or refresh failed; the previous snapshot is still served
    #[error("{resource} unavailable: {source}")]
    BackingStoreUnavailable {
        /// What was being listed ("documents", "artifacts", "configuration", ...)
        resource: String,
        source: StoreError,
    },

    /// Binary or text retrieval failed
    #[error("failed to fetch '{name}': {source}")]
    FetchFailed { name: String, source: StoreError },

    /// The generation service rejected or failed to produce an artifact
    #[error("generation failed for '{name}': {}", .source.detail().unwrap_or("failed to generate code"))]
    GenerationError { name: String, source: StoreError },

    /// The backing store rejected a write
    #[error("failed to save '{name}': {}", .source.detail().unwrap_or("write rejected"))]
    PersistError { name: String, source: StoreError },

    /// The verification trigger was not accepted
    #[error("failed to trigger verification of '{name}': {}", .source.detail().unwrap_or("request rejected"))]
    VerificationFailed { name: String, source: StoreError },

    /// Requested model is marked unavailable in the capability table
    #[error("{model} is currently unsupported")]
    UnsupportedModel { model: String },

    /// Preview handles and generation are scoped to binary documents
    #[error("'{name}' is not a binary document")]
    NotBinary { name: String },

    /// Operation not valid in the current pipeline state
    #[error("cannot {operation} while {state}")]
    InvalidTransition {
        operation: &'static str,
        state: PipelineState,
    },

    /// Result arrived after the selection moved on and was discarded
    #[error("result for '{name}' discarded: selection changed")]
    Superseded { name: String },

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl WorkspaceError {
    /// Check if re-invoking the operation may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::BackingStoreUnavailable { .. }
                | Self::FetchFailed { .. }
                | Self::GenerationError { .. }
                | Self::PersistError { .. }
                | Self::VerificationFailed { .. }
        )
    }

    /// Service-provided detail message, if any
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        self.store_error().and_then(StoreError::detail)
    }

    /// Underlying transport error, if any
    #[must_use]
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::BackingStoreUnavailable { source, .. }
            | Self::FetchFailed { source, .. }
            | Self::GenerationError { source, .. }
            | Self::PersistError { source, .. }
            | Self::VerificationFailed { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Short message suitable for the view that invoked the operation
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::GenerationError { source, .. } => source
                .detail()
                .unwrap_or("Failed to generate code")
                .to_string(),
            Self::UnsupportedModel { model } => format!("{model} is currently unsupported."),
            other => other.to_string(),
        }
    }

    /// Whether the error should be shown at all
    ///
    /// Superseded results belong to a selection the user already left.
    #[inline]
    #[must_use]
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, Self::Superseded { .. })
    }
}
