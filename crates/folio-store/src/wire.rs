//! Wire types of the backing-store REST contract
//!
//! Field names are part of the contract and must stay stable.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the two named document groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    /// Source material (papers, reports)
    Documents,
    /// Generated output
    Artifacts,
}

impl Collection {
    /// Both collections, in display order
    pub const ALL: [Collection; 2] = [Collection::Documents, Collection::Artifacts];

    /// Value of the `folder` query parameter
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Documents => "documents",
            Collection::Artifacts => "artifacts",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown collection name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown collection '{0}' (expected 'documents' or 'artifacts')")]
pub struct ParseCollectionError(pub String);

impl FromStr for Collection {
    type Err = ParseCollectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "documents" => Ok(Collection::Documents),
            "artifacts" => Ok(Collection::Artifacts),
            other => Err(ParseCollectionError(other.to_string())),
        }
    }
}

/// `GET /files` response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileListing {
    #[serde(default)]
    pub files: Vec<String>,
}

/// A textual document, both as a load response and as a save/verify body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextDocument {
    pub filename: String,
    pub content: String,
}

impl TextDocument {
    /// Create new text document
    #[inline]
    #[must_use]
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }
}

/// `POST /generate` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedCode {
    pub filename: String,
    pub code: String,
}

/// Which backing model serves which logical role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveConfiguration {
    pub generator_role: String,
    pub retrieval_role: String,
}

impl ActiveConfiguration {
    /// Model currently assigned to `role`
    #[inline]
    #[must_use]
    pub fn model_for(&self, role: ConfigRole) -> &str {
        match role {
            ConfigRole::Generator => &self.generator_role,
            ConfigRole::Retrieval => &self.retrieval_role,
        }
    }
}

/// Logical role of a configured model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfigRole {
    #[serde(rename = "generatorRole")]
    Generator,
    #[serde(rename = "retrievalRole")]
    Retrieval,
}

impl ConfigRole {
    /// Field name used on the wire
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigRole::Generator => "generatorRole",
            ConfigRole::Retrieval => "retrievalRole",
        }
    }
}

impl fmt::Display for ConfigRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown role name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}' (expected 'generatorRole' or 'retrievalRole')")]
pub struct ParseRoleError(pub String);

impl FromStr for ConfigRole {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generatorRole" | "generator" => Ok(ConfigRole::Generator),
            "retrievalRole" | "retrieval" => Ok(ConfigRole::Retrieval),
            other => Err(ParseRoleError(other.to_string())),
        }
    }
}

/// `POST /config` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigUpdate {
    pub field: ConfigRole,
    pub model_name: String,
}

/// Optional error body of any non-2xx response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
}

impl ErrorBody {
    /// Parse an error body, falling back to an empty body for anything that
    /// is not the expected JSON object
    #[must_use]
    pub fn parse(bytes: &[u8]) -> Self {
        serde_json::from_slice(bytes).unwrap_or_default()
    }
}
