//! Testing utilities for Folio workspace
//!
//! In-memory stand-in for the backing store and services:
//! - Two folders (binary documents, text artifacts) plus active configuration
//! - Scripted failures per operation
//! - Request log
//! - Gates that park a request until the test releases it

#![allow(missing_docs)]
#![allow(clippy::missing_panics_doc)]

use async_trait::async_trait;
use folio_store::{
    ActiveConfiguration, Collection, ConfigRole, ConfigService, FileStore, GeneratedCode,
    GenerationService, StoreError, TextDocument, VerificationService,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Notify;

/// Backend operation, used to script failures and gates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    FetchBinary,
    LoadText,
    Delete,
    SaveText,
    Generate,
    Verify,
    ActiveConfig,
    UpdateConfig,
    Models,
}

impl Operation {
    fn name(self) -> &'static str {
        match self {
            Self::List => "list files",
            Self::FetchBinary => "fetch binary",
            Self::LoadText => "load text",
            Self::Delete => "delete",
            Self::SaveText => "save",
            Self::Generate => "generate",
            Self::Verify => "verify",
            Self::ActiveConfig => "read configuration",
            Self::UpdateConfig => "update configuration",
            Self::Models => "list models",
        }
    }
}

/// A request received by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    List(Collection),
    FetchBinary(String),
    LoadText(String, Collection),
    Delete(String, Collection),
    SaveText(Collection, TextDocument),
    Generate { filename: String, bytes: usize },
    Verify(TextDocument),
    ActiveConfig,
    UpdateConfig(ConfigRole, String),
    Models,
}

impl Request {
    #[must_use]
    pub fn operation(&self) -> Operation {
        match self {
            Self::List(_) => Operation::List,
            Self::FetchBinary(_) => Operation::FetchBinary,
            Self::LoadText(..) => Operation::LoadText,
            Self::Delete(..) => Operation::Delete,
            Self::SaveText(..) => Operation::SaveText,
            Self::Generate { .. } => Operation::Generate,
            Self::Verify(_) => Operation::Verify,
            Self::ActiveConfig => Operation::ActiveConfig,
            Self::UpdateConfig(..) => Operation::UpdateConfig,
            Self::Models => Operation::Models,
        }
    }
}

/// Parks one request until released
///
/// The request has already been answered when it parks: releasing it
/// delivers a response computed at the time it arrived.
#[derive(Debug, Clone, Default)]
pub struct Gate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl Gate {
    /// Wait until the held request has arrived
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let the held request complete
    pub fn release(&self) {
        self.release.notify_one();
    }

    async fn park(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

#[derive(Debug)]
struct State {
    documents: BTreeMap<String, Vec<u8>>,
    artifacts: BTreeMap<String, String>,
    active: ActiveConfiguration,
    models: Vec<String>,
    generated: HashMap<String, GeneratedCode>,
    next_failures: HashMap<Operation, VecDeque<StoreError>>,
    sticky_failures: HashMap<Operation, StoreError>,
    gates: HashMap<Operation, VecDeque<Gate>>,
    requests: Vec<Request>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            documents: BTreeMap::new(),
            artifacts: BTreeMap::new(),
            active: ActiveConfiguration {
                generator_role: "gpt-4o".to_string(),
                retrieval_role: "gpt-3.5-turbo".to_string(),
            },
            models: vec![
                "gpt-4.1".to_string(),
                "gpt-4o".to_string(),
                "gpt-3.5-turbo".to_string(),
            ],
            generated: HashMap::new(),
            next_failures: HashMap::new(),
            sticky_failures: HashMap::new(),
            gates: HashMap::new(),
            requests: Vec::new(),
        }
    }
}

/// In-memory implementation of every backing service
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document (binary or text) in the documents collection
    #[must_use]
    pub fn with_document(self, name: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert_document(name, bytes);
        self
    }

    /// Seed an artifact
    #[must_use]
    pub fn with_artifact(self, name: &str, content: &str) -> Self {
        self.insert_artifact(name, content);
        self
    }

    /// Fixed generation result for `source`
    #[must_use]
    pub fn with_generated(self, source: &str, filename: &str, code: &str) -> Self {
        self.state.lock().generated.insert(
            source.to_string(),
            GeneratedCode {
                filename: filename.to_string(),
                code: code.to_string(),
            },
        );
        self
    }

    #[must_use]
    pub fn with_active(self, generator: &str, retrieval: &str) -> Self {
        self.state.lock().active = ActiveConfiguration {
            generator_role: generator.to_string(),
            retrieval_role: retrieval.to_string(),
        };
        self
    }

    #[must_use]
    pub fn with_models(self, models: &[&str]) -> Self {
        self.state.lock().models = models.iter().map(|m| (*m).to_string()).collect();
        self
    }

    pub fn insert_document(&self, name: &str, bytes: impl Into<Vec<u8>>) {
        self.state
            .lock()
            .documents
            .insert(name.to_string(), bytes.into());
    }

    pub fn insert_artifact(&self, name: &str, content: &str) {
        self.state
            .lock()
            .artifacts
            .insert(name.to_string(), content.to_string());
    }

    /// Fail the next `op` with a status error
    pub fn fail_next(&self, op: Operation, status: u16, detail: Option<&str>) {
        self.fail_next_with(
            op,
            StoreError::status_error(op.name(), status, detail.map(str::to_string)),
        );
    }

    /// Fail the next `op` with `error`
    pub fn fail_next_with(&self, op: Operation, error: StoreError) {
        self.state
            .lock()
            .next_failures
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Fail every `op` until [`InMemoryBackend::recover`]
    pub fn fail_always(&self, op: Operation, status: u16, detail: Option<&str>) {
        self.state.lock().sticky_failures.insert(
            op,
            StoreError::status_error(op.name(), status, detail.map(str::to_string)),
        );
    }

    /// Clear every scripted failure of `op`
    pub fn recover(&self, op: Operation) {
        let mut state = self.state.lock();
        state.next_failures.remove(&op);
        state.sticky_failures.remove(&op);
    }

    /// Park the next `op` until the returned gate is released
    pub fn hold_next(&self, op: Operation) -> Gate {
        let gate = Gate::default();
        self.state
            .lock()
            .gates
            .entry(op)
            .or_default()
            .push_back(gate.clone());
        gate
    }

    #[must_use]
    pub fn requests(&self) -> Vec<Request> {
        self.state.lock().requests.clone()
    }

    /// Number of received requests for `op`
    #[must_use]
    pub fn count(&self, op: Operation) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.operation() == op)
            .count()
    }

    pub fn clear_requests(&self) {
        self.state.lock().requests.clear();
    }

    #[must_use]
    pub fn artifact(&self, name: &str) -> Option<String> {
        self.state.lock().artifacts.get(name).cloned()
    }

    #[must_use]
    pub fn has_document(&self, name: &str) -> bool {
        self.state.lock().documents.contains_key(name)
    }

    #[must_use]
    pub fn active(&self) -> ActiveConfiguration {
        self.state.lock().active.clone()
    }

    /// Record `request`, answer it with `respond`, then honor any gate
    async fn handle<T>(
        &self,
        request: Request,
        respond: impl FnOnce(&mut State) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let op = request.operation();
        let (result, gate) = {
            let mut state = self.state.lock();
            state.requests.push(request);
            let mut scripted = state.next_failures.get_mut(&op).and_then(VecDeque::pop_front);
            if scripted.is_none() {
                scripted = state.sticky_failures.get(&op).cloned();
            }
            let result = match scripted {
                Some(error) => Err(error),
                None => respond(&mut *state),
            };
            let gate = state.gates.get_mut(&op).and_then(VecDeque::pop_front);
            (result, gate)
        };
        if let Some(gate) = gate {
            gate.park().await;
        }
        result
    }
}

fn not_found(op: Operation, detail: &str) -> StoreError {
    StoreError::status_error(op.name(), 404, Some(detail.to_string()))
}

fn generated_name(source: &str) -> String {
    let stem = Path::new(source)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(source);
    format!("{stem}.py")
}

#[async_trait]
impl FileStore for InMemoryBackend {
    async fn list(&self, collection: Collection) -> Result<Vec<String>, StoreError> {
        self.handle(Request::List(collection), |state| {
            Ok(match collection {
                Collection::Documents => state.documents.keys().cloned().collect(),
                Collection::Artifacts => state.artifacts.keys().cloned().collect(),
            })
        })
        .await
    }

    async fn fetch_binary(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        self.handle(Request::FetchBinary(name.to_string()), |state| {
            state
                .documents
                .get(name)
                .cloned()
                .ok_or_else(|| not_found(Operation::FetchBinary, "PDF not found"))
        })
        .await
    }

    async fn load_text(
        &self,
        name: &str,
        collection: Collection,
    ) -> Result<TextDocument, StoreError> {
        self.handle(Request::LoadText(name.to_string(), collection), |state| {
            let content = match collection {
                Collection::Documents => state
                    .documents
                    .get(name)
                    .map(|bytes| String::from_utf8_lossy(bytes).into_owned()),
                Collection::Artifacts => state.artifacts.get(name).cloned(),
            };
            content
                .map(|content| TextDocument::new(name, content))
                .ok_or_else(|| not_found(Operation::LoadText, "File not found"))
        })
        .await
    }

    async fn delete(&self, name: &str, collection: Collection) -> Result<(), StoreError> {
        self.handle(Request::Delete(name.to_string(), collection), |state| {
            let removed = match collection {
                Collection::Documents => state.documents.remove(name).is_some(),
                Collection::Artifacts => state.artifacts.remove(name).is_some(),
            };
            if removed {
                Ok(())
            } else {
                Err(not_found(Operation::Delete, "File not found"))
            }
        })
        .await
    }

    async fn save_text(
        &self,
        collection: Collection,
        document: &TextDocument,
    ) -> Result<(), StoreError> {
        self.handle(Request::SaveText(collection, document.clone()), |state| {
            match collection {
                Collection::Documents => {
                    state.documents.insert(
                        document.filename.clone(),
                        document.content.clone().into_bytes(),
                    );
                }
                Collection::Artifacts => {
                    state
                        .artifacts
                        .insert(document.filename.clone(), document.content.clone());
                }
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl GenerationService for InMemoryBackend {
    async fn generate(&self, filename: &str, bytes: Vec<u8>) -> Result<GeneratedCode, StoreError> {
        let request = Request::Generate {
            filename: filename.to_string(),
            bytes: bytes.len(),
        };
        self.handle(request, |state| {
            Ok(state
                .generated
                .get(filename)
                .cloned()
                .unwrap_or_else(|| GeneratedCode {
                    filename: generated_name(filename),
                    code: format!("# generated from {filename}\n"),
                }))
        })
        .await
    }
}

#[async_trait]
impl VerificationService for InMemoryBackend {
    async fn trigger(&self, artifact: &TextDocument) -> Result<(), StoreError> {
        self.handle(Request::Verify(artifact.clone()), |_| Ok(()))
            .await
    }
}

#[async_trait]
impl ConfigService for InMemoryBackend {
    async fn active(&self) -> Result<ActiveConfiguration, StoreError> {
        self.handle(Request::ActiveConfig, |state| Ok(state.active.clone()))
            .await
    }

    async fn update(
        &self,
        role: ConfigRole,
        model_name: &str,
    ) -> Result<ActiveConfiguration, StoreError> {
        self.handle(
            Request::UpdateConfig(role, model_name.to_string()),
            |state| {
                match role {
                    ConfigRole::Generator => state.active.generator_role = model_name.to_string(),
                    ConfigRole::Retrieval => state.active.retrieval_role = model_name.to_string(),
                }
                Ok(state.active.clone())
            },
        )
        .await
    }

    async fn models(&self) -> Result<Vec<String>, StoreError> {
        self.handle(Request::Models, |state| Ok(state.models.clone()))
            .await
    }
}
