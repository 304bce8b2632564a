//! `reqwest` implementation of the service traits

use crate::error::StoreError;
use crate::service::{ConfigService, FileStore, GenerationService, VerificationService};
use crate::wire::{
    ActiveConfiguration, Collection, ConfigRole, ConfigUpdate, ErrorBody, FileListing,
    GeneratedCode, TextDocument,
};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// HTTP client for every backing service behind one base URL
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpBackend {
    /// Create a backend for `base_url` (e.g. "http://localhost:8003")
    ///
    /// # Errors
    /// `StoreError::InvalidUrl` if the URL does not parse or cannot carry paths
    pub fn new(base_url: &str) -> Result<Self, StoreError> {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Create a backend whose requests give up after `timeout`
    ///
    /// # Errors
    /// `StoreError::InvalidUrl` for a bad URL, `StoreError::Transport` if the
    /// client cannot be built
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::transport("client setup", e))?;
        Self::with_client(base_url, client)
    }

    /// Create a backend over an existing `reqwest` client
    ///
    /// # Errors
    /// `StoreError::InvalidUrl` if the URL does not parse or cannot carry paths
    pub fn with_client(base_url: &str, client: reqwest::Client) -> Result<Self, StoreError> {
        let trimmed = base_url.trim_end_matches('/');
        let base_url =
            Url::parse(trimmed).map_err(|e| StoreError::InvalidUrl(format!("{trimmed}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::InvalidUrl(trimmed.to_string()));
        }
        Ok(Self { client, base_url })
    }

    /// Base URL requests are resolved against
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build `{base}/{segments...}` with percent-encoded segments
    fn endpoint(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| StoreError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn endpoint_in(&self, segments: &[&str], collection: Collection) -> Result<Url, StoreError> {
        let mut url = self.endpoint(segments)?;
        url.query_pairs_mut()
            .append_pair("folder", collection.as_str());
        Ok(url)
    }

    async fn send(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<Response, StoreError> {
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::transport(operation, e))?;
        check_status(operation, response).await
    }
}

/// Turn a non-2xx response into `StoreError::Status`, reading its optional
/// `{detail}` body
async fn check_status(operation: &str, response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.bytes().await.unwrap_or_default();
    let detail = ErrorBody::parse(&body).detail;
    tracing::debug!(operation, status = status.as_u16(), ?detail, "request rejected");
    Err(StoreError::status_error(operation, status.as_u16(), detail))
}

async fn decode<T: DeserializeOwned>(operation: &str, response: Response) -> Result<T, StoreError> {
    response
        .json::<T>()
        .await
        .map_err(|e| StoreError::decode(operation, e))
}

fn content_type_for(filename: &str) -> &'static str {
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(".pdf") {
        "application/pdf"
    } else {
        "application/octet-stream"
    }
}

#[async_trait]
impl FileStore for HttpBackend {
    async fn list(&self, collection: Collection) -> Result<Vec<String>, StoreError> {
        let operation = "list files";
        let url = self.endpoint_in(&["files"], collection)?;
        let response = self.send(operation, self.client.get(url)).await?;
        let listing: FileListing = decode(operation, response).await?;
        Ok(listing.files)
    }

    async fn fetch_binary(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        let operation = "fetch binary";
        let url = self.endpoint_in(&["files", "binary", name], Collection::Documents)?;
        let response = self.send(operation, self.client.get(url)).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| StoreError::transport(operation, e))?;
        Ok(bytes.to_vec())
    }

    async fn load_text(
        &self,
        name: &str,
        collection: Collection,
    ) -> Result<TextDocument, StoreError> {
        let operation = "load text";
        let url = self.endpoint_in(&["files", "text", name], collection)?;
        let response = self.send(operation, self.client.get(url)).await?;
        decode(operation, response).await
    }

    async fn delete(&self, name: &str, collection: Collection) -> Result<(), StoreError> {
        let url = self.endpoint_in(&["files", name], collection)?;
        self.send("delete file", self.client.delete(url)).await?;
        Ok(())
    }

    async fn save_text(
        &self,
        collection: Collection,
        document: &TextDocument,
    ) -> Result<(), StoreError> {
        let url = self.endpoint_in(&["files", "save"], collection)?;
        self.send("save file", self.client.post(url).json(document))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl GenerationService for HttpBackend {
    async fn generate(&self, filename: &str, bytes: Vec<u8>) -> Result<GeneratedCode, StoreError> {
        let operation = "generate";
        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(content_type_for(filename))
            .map_err(|e| StoreError::transport(operation, e))?;
        let form = Form::new().part("file", part);
        let url = self.endpoint(&["generate"])?;
        let response = self
            .send(operation, self.client.post(url).multipart(form))
            .await?;
        decode(operation, response).await
    }
}

#[async_trait]
impl VerificationService for HttpBackend {
    async fn trigger(&self, artifact: &TextDocument) -> Result<(), StoreError> {
        let url = self.endpoint(&["verify"])?;
        self.send("trigger verification", self.client.post(url).json(artifact))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ConfigService for HttpBackend {
    async fn active(&self) -> Result<ActiveConfiguration, StoreError> {
        let operation = "read configuration";
        let url = self.endpoint(&["config", "active"])?;
        let response = self.send(operation, self.client.get(url)).await?;
        decode(operation, response).await
    }

    async fn update(
        &self,
        role: ConfigRole,
        model_name: &str,
    ) -> Result<ActiveConfiguration, StoreError> {
        let operation = "update configuration";
        let body = ConfigUpdate {
            field: role,
            model_name: model_name.to_string(),
        };
        let url = self.endpoint(&["config"])?;
        let response = self.send(operation, self.client.post(url).json(&body)).await?;
        decode(operation, response).await
    }

    async fn models(&self) -> Result<Vec<String>, StoreError> {
        let operation = "list models";
        let url = self.endpoint(&["config", "models"])?;
        let response = self.send(operation, self.client.get(url)).await?;
        decode(operation, response).await
    }
}
