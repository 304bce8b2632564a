//! Folio Store - REST contract of the backing services
//!
//! Everything the workbench client knows about the outside world:
//! - Wire types shared with the backing store ([`Collection`], [`TextDocument`], ...)
//! - Service traits consumed by the core ([`FileStore`], [`GenerationService`],
//!   [`VerificationService`], [`ConfigService`])
//! - [`HttpBackend`], the `reqwest` implementation of all four
//!
//! # Example
//!
//! ```rust,ignore
//! use folio_store::{Collection, FileStore, HttpBackend};
//!
//! # async fn example() -> Result<(), folio_store::StoreError> {
//! let backend = HttpBackend::new("http://localhost:8003")?;
//! let files = backend.list(Collection::Documents).await?;
//! println!("{} documents", files.len());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod client;
mod error;
mod service;
mod wire;

pub use client::HttpBackend;
pub use error::StoreError;
pub use service::{ConfigService, FileStore, GenerationService, VerificationService};
pub use wire::{
    ActiveConfiguration, Collection, ConfigRole, ConfigUpdate, ErrorBody, FileListing,
    GeneratedCode, ParseCollectionError, ParseRoleError, TextDocument,
};
