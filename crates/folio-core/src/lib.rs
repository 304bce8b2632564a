//! Folio Core - workspace synchronization and artifact pipeline
//!
//! Keeps independently rendered views consistent:
//! - Directory Index over the documents and artifacts collections
//! - Preview handles with guaranteed release
//! - Single-slot artifact pipeline (select, generate, save, verify)
//! - Active configuration mirror with a client-side model pre-check
//! - [`Workspace`] wiring them together over one event channel
//!
//! # Example
//!
//! ```rust,ignore
//! use folio_core::{DocumentRef, Workspace, WorkspaceConfig};
//!
//! # async fn example() -> Result<(), folio_core::WorkspaceError> {
//! let workspace = Workspace::connect(WorkspaceConfig::from_env())?;
//! workspace.start().await?;
//!
//! let pipeline = workspace.pipeline();
//! pipeline.select(DocumentRef::document("paper1.pdf")).await?;
//! pipeline.generate().await?;
//! pipeline.save().await?;
//!
//! workspace.sync().await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod index;
pub mod mirror;
pub mod pipeline;
pub mod preview;
pub mod slot;
pub mod types;
pub mod workspace;

mod status;

pub use config::{default_models, ModelOption, WorkspaceConfig, API_BASE_URL_ENV};
pub use error::WorkspaceError;
pub use index::{DirectoryIndex, DirectorySnapshot};
pub use mirror::{ConfigMirror, ModelCatalog};
pub use pipeline::ArtifactPipeline;
pub use preview::{ConsumerId, HandleId, PreviewHandle, PreviewManager, PreviewStats};
pub use slot::{SlotError, SlotFile};
pub use types::{
    ArtifactStatus, DocumentRef, GeneratedArtifact, PipelineSnapshot, PipelineState, SaveStatus,
    VerificationStatus,
};
pub use workspace::{OpenedDocument, Services, SyncReport, Workspace};

pub use folio_events::{EventChannel, Notification, Subscription, Topic};
pub use folio_store::{ActiveConfiguration, Collection, ConfigRole, TextDocument};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Folio Core
    pub use crate::{
        ArtifactPipeline, Collection, ConfigRole, DocumentRef, OpenedDocument, PipelineState,
        Workspace, WorkspaceConfig, WorkspaceError,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
