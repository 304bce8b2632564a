//! Artifact slot persistence
//!
//! The held artifact is the only state that outlives a session. It is kept
//! as a JSON file next to the configuration; a missing file means an empty
//! slot.

use crate::types::GeneratedArtifact;
use std::io;
use std::path::{Path, PathBuf};

/// Slot file errors
#[derive(Debug, thiserror::Error)]
pub enum SlotError {
    #[error("slot file {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("slot file {path} is not a valid artifact: {source}")]
    Format {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// JSON file holding the artifact slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotFile {
    path: PathBuf,
}

impl SlotFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a ready artifact; anything else empties the slot
    ///
    /// # Errors
    /// `SlotError::Io` if the file cannot be written or removed
    pub fn store(&self, artifact: &GeneratedArtifact) -> Result<(), SlotError> {
        if !artifact.is_ready() {
            return match std::fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(source) => Err(self.io(source)),
            };
        }

        let json = serde_json::to_vec_pretty(artifact).map_err(|source| SlotError::Format {
            path: self.path.clone(),
            source,
        })?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| self.io(source))?;
        }
        std::fs::write(&self.path, json).map_err(|source| self.io(source))
    }

    /// Previously stored artifact, if any
    ///
    /// # Errors
    /// - `SlotError::Io` if the file exists but cannot be read
    /// - `SlotError::Format` if it does not hold a ready artifact
    pub fn load(&self) -> Result<Option<GeneratedArtifact>, SlotError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(self.io(source)),
        };
        let artifact: GeneratedArtifact =
            serde_json::from_slice(&bytes).map_err(|source| SlotError::Format {
                path: self.path.clone(),
                source,
            })?;
        Ok(artifact.is_ready().then_some(artifact))
    }

    fn io(&self, source: io::Error) -> SlotError {
        SlotError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_store::GeneratedCode;

    fn ready() -> GeneratedArtifact {
        GeneratedArtifact::ready(
            "paper1.pdf",
            GeneratedCode {
                filename: "paper1.py".to_string(),
                code: "print('strategy')".to_string(),
            },
        )
    }

    #[test]
    fn stores_and_loads_ready_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let slot = SlotFile::new(dir.path().join("state").join("slot.json"));

        assert_eq!(slot.load().unwrap(), None);
        slot.store(&ready()).unwrap();
        assert_eq!(slot.load().unwrap(), Some(ready()));
    }

    #[test]
    fn storing_empty_slot_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let slot = SlotFile::new(dir.path().join("slot.json"));

        slot.store(&ready()).unwrap();
        slot.store(&GeneratedArtifact::pending("paper2.pdf")).unwrap();

        assert!(!slot.path().exists());
        slot.store(&GeneratedArtifact::empty()).unwrap();
    }

    #[test]
    fn corrupt_file_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slot.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(SlotFile::new(path).load(), Err(SlotError::Format { .. })));
    }
}
