//! Workspace configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//! `FOLIO_API_BASE_URL` overrides the base URL.

use crate::error::WorkspaceError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding [`WorkspaceConfig::api_base_url`]
pub const API_BASE_URL_ENV: &str = "FOLIO_API_BASE_URL";

/// Default base URL of the backing services
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8003";

/// One entry of the static model capability table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelOption {
    pub name: String,
    /// Human-readable price note
    #[serde(default)]
    pub price: String,
    #[serde(default = "default_true")]
    pub available: bool,
}

fn default_true() -> bool {
    true
}

impl ModelOption {
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, price: impl Into<String>, available: bool) -> Self {
        Self {
            name: name.into(),
            price: price.into(),
            available,
        }
    }
}

/// Default capability table
#[must_use]
pub fn default_models() -> Vec<ModelOption> {
    vec![
        ModelOption::new("gpt-4.1", "Input $2.00 / Cached $0.50 / Output $8.00", true),
        ModelOption::new("gpt-4o", "Input $2.50 / Cached $1.25 / Output $10.00", true),
        ModelOption::new("gpt-3.5-turbo", "Input $0.50 / Output $1.50", true),
        ModelOption::new("gpt-4o-mini", "Input $0.15 / Cached $0.075 / Output $0.60", false),
        ModelOption::new("o1", "Input $15.00 / Cached $7.50 / Output $60.00", false),
    ]
}

/// Workspace configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Base URL of the backing store and services
    pub api_base_url: String,
    /// Extensions treated as binary documents (preview + generation)
    pub binary_extensions: Vec<String>,
    /// How long a successful save stays acknowledged
    pub save_ack_window_ms: u64,
    /// How long a verification trigger status stays visible
    pub verification_ack_window_ms: u64,
    /// Where the artifact slot is persisted between sessions
    pub artifact_slot_path: Option<PathBuf>,
    /// Transport timeout; none by default
    pub request_timeout_secs: Option<u64>,
    /// Static model capability table
    pub models: Vec<ModelOption>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            binary_extensions: vec!["pdf".to_string()],
            save_ack_window_ms: 1500,
            verification_ack_window_ms: 2000,
            artifact_slot_path: None,
            request_timeout_secs: None,
            models: default_models(),
        }
    }
}

impl WorkspaceConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML
    ///
    /// # Errors
    /// `WorkspaceError::Configuration` if the document is not valid TOML or
    /// a field has the wrong type
    pub fn from_toml_str(source: &str) -> Result<Self, WorkspaceError> {
        toml::from_str(source).map_err(|e| WorkspaceError::Configuration(e.to_string()))
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    /// `WorkspaceError::Configuration` if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WorkspaceError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            WorkspaceError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }

    /// Default configuration with environment overrides applied
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply environment overrides
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(API_BASE_URL_ENV) {
            if !url.trim().is_empty() {
                self.api_base_url = url;
            }
        }
        self
    }

    /// With base URL
    #[inline]
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// With binary extensions
    #[must_use]
    pub fn with_binary_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.binary_extensions = extensions
            .into_iter()
            .map(|e| e.into().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    /// With acknowledgement windows
    #[inline]
    #[must_use]
    pub fn with_ack_windows(mut self, save: Duration, verification: Duration) -> Self {
        self.save_ack_window_ms = u64::try_from(save.as_millis()).unwrap_or(u64::MAX);
        self.verification_ack_window_ms =
            u64::try_from(verification.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With persisted artifact slot
    #[inline]
    #[must_use]
    pub fn with_artifact_slot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact_slot_path = Some(path.into());
        self
    }

    /// With request timeout
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = Some(timeout.as_secs());
        self
    }

    /// With model capability table
    #[inline]
    #[must_use]
    pub fn with_models(mut self, models: Vec<ModelOption>) -> Self {
        self.models = models;
        self
    }

    #[inline]
    #[must_use]
    pub fn save_ack_window(&self) -> Duration {
        Duration::from_millis(self.save_ack_window_ms)
    }

    #[inline]
    #[must_use]
    pub fn verification_ack_window(&self) -> Duration {
        Duration::from_millis(self.verification_ack_window_ms)
    }

    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = WorkspaceConfig::new();
        assert_eq!(config.api_base_url, "http://localhost:8003");
        assert_eq!(config.binary_extensions, vec!["pdf"]);
        assert_eq!(config.save_ack_window(), Duration::from_millis(1500));
        assert_eq!(config.verification_ack_window(), Duration::from_millis(2000));
        assert!(config.request_timeout().is_none());
        assert!(config.models.iter().any(|m| m.name == "gpt-4o-mini" && !m.available));
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(WorkspaceConfig::from_toml_str("").unwrap(), WorkspaceConfig::default());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = WorkspaceConfig::from_toml_str(
            r#"
            api_base_url = "http://backend:9000"
            save_ack_window_ms = 10

            [[models]]
            name = "local-llm"
            "#,
        )
        .unwrap();

        assert_eq!(config.api_base_url, "http://backend:9000");
        assert_eq!(config.save_ack_window_ms, 10);
        assert_eq!(config.verification_ack_window_ms, 2000);
        assert_eq!(config.models, vec![ModelOption::new("local-llm", "", true)]);
    }

    #[test]
    fn invalid_toml_is_configuration_error() {
        let err = WorkspaceConfig::from_toml_str("save_ack_window_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, WorkspaceError::Configuration(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "binary_extensions = [\"pdf\", \"epub\"]").unwrap();

        let config = WorkspaceConfig::load(file.path()).unwrap();
        assert_eq!(config.binary_extensions, vec!["pdf", "epub"]);

        assert!(WorkspaceConfig::load("/nonexistent/folio.toml").is_err());
    }

    #[test]
    fn builder_normalizes_extensions() {
        let config = WorkspaceConfig::new().with_binary_extensions([".PDF", "Djvu"]);
        assert_eq!(config.binary_extensions, vec!["pdf", "djvu"]);
    }
}
