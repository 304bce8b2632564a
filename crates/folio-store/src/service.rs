//! Service traits consumed by the core
//!
//! Each trait covers one external collaborator. [`crate::HttpBackend`]
//! implements all of them against a single base URL; tests substitute
//! in-memory or mocked implementations.

use crate::error::StoreError;
use crate::wire::{ActiveConfiguration, Collection, ConfigRole, GeneratedCode, TextDocument};
use async_trait::async_trait;

/// List/load/save/delete over both collections
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Names in `collection`, in backing-store order
    async fn list(&self, collection: Collection) -> Result<Vec<String>, StoreError>;

    /// Raw bytes of a binary document from the documents collection
    async fn fetch_binary(&self, name: &str) -> Result<Vec<u8>, StoreError>;

    /// Textual document content
    async fn load_text(&self, name: &str, collection: Collection)
        -> Result<TextDocument, StoreError>;

    /// Delete a document
    async fn delete(&self, name: &str, collection: Collection) -> Result<(), StoreError>;

    /// Write a textual document (last write wins)
    async fn save_text(
        &self,
        collection: Collection,
        document: &TextDocument,
    ) -> Result<(), StoreError>;
}

/// Turns a source document into generated code
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Upload `bytes` under `filename` and return the generated artifact
    async fn generate(&self, filename: &str, bytes: Vec<u8>) -> Result<GeneratedCode, StoreError>;
}

/// Downstream verification (backtest) trigger
#[async_trait]
pub trait VerificationService: Send + Sync {
    /// Fire-and-forget: success only acknowledges that the run was accepted
    async fn trigger(&self, artifact: &TextDocument) -> Result<(), StoreError>;
}

/// Active model configuration
#[async_trait]
pub trait ConfigService: Send + Sync {
    /// Current role assignment
    async fn active(&self) -> Result<ActiveConfiguration, StoreError>;

    /// Assign `model_name` to `role`, returning the resulting configuration
    async fn update(
        &self,
        role: ConfigRole,
        model_name: &str,
    ) -> Result<ActiveConfiguration, StoreError>;

    /// Model names the backing store supports
    async fn models(&self) -> Result<Vec<String>, StoreError>;
}
