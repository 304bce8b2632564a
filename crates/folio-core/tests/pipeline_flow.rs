//! End-to-end pipeline behavior against the in-memory backend

use folio_core::{
    Collection, DocumentRef, GeneratedArtifact, PipelineState, SlotFile, Topic, Workspace,
    WorkspaceConfig, WorkspaceError,
};
use folio_events::ListenerError;
use folio_store::{GeneratedCode, TextDocument};
use folio_test_utils::{InMemoryBackend, Operation, Request};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;

fn backend() -> Arc<InMemoryBackend> {
    Arc::new(
        InMemoryBackend::new()
            .with_document("paper0.pdf", b"%PDF-0".to_vec())
            .with_document("paper1.pdf", b"%PDF-1".to_vec())
            .with_document("paper2.pdf", b"%PDF-2".to_vec())
            .with_document("notes.txt", b"reading list".to_vec())
            .with_generated("paper1.pdf", "paper1.py", "class Momentum: ...")
            .with_artifact("old.py", "print('old')"),
    )
}

fn workspace(backend: &Arc<InMemoryBackend>) -> Arc<Workspace> {
    Arc::new(Workspace::new(WorkspaceConfig::default(), backend.clone()))
}

#[tokio::test]
async fn select_generate_save_publishes_target_name() {
    let backend = backend();
    let workspace = workspace(&backend);
    let payloads = Arc::new(Mutex::new(Vec::new()));
    let _subscription = {
        let payloads = payloads.clone();
        workspace
            .channel()
            .subscribe(Topic::ARTIFACT_PERSISTED, move |n| {
                payloads.lock().push(n.payload.clone());
                Ok(())
            })
    };

    let pipeline = workspace.pipeline();
    pipeline
        .select(DocumentRef::document("paper1.pdf"))
        .await
        .unwrap();
    let artifact = pipeline.generate().await.unwrap();
    assert_eq!(
        artifact,
        GeneratedArtifact::ready(
            "paper1.pdf",
            GeneratedCode {
                filename: "paper1.py".to_string(),
                code: "class Momentum: ...".to_string(),
            }
        )
    );
    assert_eq!(pipeline.state(), PipelineState::Ready);

    pipeline.save().await.unwrap();

    assert!(backend.requests().contains(&Request::SaveText(
        Collection::Artifacts,
        TextDocument::new("paper1.py", "class Momentum: ...")
    )));
    assert_eq!(*payloads.lock(), vec![Some("paper1.py".to_string())]);
}

#[tokio::test]
async fn late_generation_result_is_discarded() {
    let backend = backend();
    let workspace = workspace(&backend);
    workspace
        .pipeline()
        .select(DocumentRef::document("paper1.pdf"))
        .await
        .unwrap();

    let gate = backend.hold_next(Operation::Generate);
    let slow = {
        let workspace = workspace.clone();
        tokio::spawn(async move { workspace.pipeline().generate().await })
    };
    gate.entered().await;
    assert_eq!(workspace.pipeline().snapshot().generating_source(), Some("paper1.pdf"));

    workspace
        .pipeline()
        .select(DocumentRef::document("paper2.pdf"))
        .await
        .unwrap();
    gate.release();

    let err = slow.await.unwrap().unwrap_err();
    assert_eq!(
        err,
        WorkspaceError::Superseded {
            name: "paper1.pdf".to_string()
        }
    );
    let snapshot = workspace.pipeline().snapshot();
    assert_eq!(snapshot.state, PipelineState::Selected);
    assert_eq!(snapshot.selection, Some(DocumentRef::document("paper2.pdf")));
    assert!(snapshot.artifact.is_empty());
    assert_eq!(snapshot.message, None);
}

#[tokio::test]
async fn late_result_does_not_replace_newer_artifact() {
    let backend = backend();
    let workspace = workspace(&backend);
    let pipeline = workspace.pipeline();
    pipeline
        .select(DocumentRef::document("paper1.pdf"))
        .await
        .unwrap();

    let gate = backend.hold_next(Operation::Generate);
    let slow = {
        let workspace = workspace.clone();
        tokio::spawn(async move { workspace.pipeline().generate().await })
    };
    gate.entered().await;

    pipeline
        .select(DocumentRef::document("paper2.pdf"))
        .await
        .unwrap();
    let fresh = pipeline.generate().await.unwrap();
    gate.release();

    assert!(slow.await.unwrap().is_err());
    assert_eq!(pipeline.artifact(), fresh);
    assert_eq!(pipeline.artifact().source_name, "paper2.pdf");
    assert_eq!(pipeline.state(), PipelineState::Ready);
}

#[tokio::test]
async fn reselect_during_generation_keeps_result() {
    let backend = backend();
    let workspace = workspace(&backend);
    workspace
        .pipeline()
        .select(DocumentRef::document("paper1.pdf"))
        .await
        .unwrap();

    let gate = backend.hold_next(Operation::Generate);
    let slow = {
        let workspace = workspace.clone();
        tokio::spawn(async move { workspace.pipeline().generate().await })
    };
    gate.entered().await;
    workspace
        .pipeline()
        .select(DocumentRef::document("paper1.pdf"))
        .await
        .unwrap();
    gate.release();

    let artifact = slow.await.unwrap().unwrap();
    assert_eq!(artifact.target_name, "paper1.py");
    assert_eq!(workspace.pipeline().state(), PipelineState::Ready);
}

#[tokio::test]
async fn generate_is_rejected_while_generating() {
    let backend = backend();
    let workspace = workspace(&backend);
    workspace
        .pipeline()
        .select(DocumentRef::document("paper1.pdf"))
        .await
        .unwrap();

    let gate = backend.hold_next(Operation::Generate);
    let slow = {
        let workspace = workspace.clone();
        tokio::spawn(async move { workspace.pipeline().generate().await })
    };
    gate.entered().await;

    let err = workspace.pipeline().generate().await.unwrap_err();
    assert_eq!(
        err,
        WorkspaceError::InvalidTransition {
            operation: "generate",
            state: PipelineState::Generating
        }
    );
    gate.release();
    slow.await.unwrap().unwrap();
    assert_eq!(backend.count(Operation::Generate), 1);
}

#[tokio::test]
async fn every_listener_sees_save_even_if_first_fails() {
    let backend = backend();
    let workspace = workspace(&backend);
    let calls = Arc::new(Mutex::new(Vec::new()));

    let _first = {
        let calls = calls.clone();
        workspace
            .channel()
            .subscribe(Topic::ARTIFACT_PERSISTED, move |_| {
                calls.lock().push("first");
                Err(ListenerError::new("explorer unmounted"))
            })
    };
    let _second = {
        let calls = calls.clone();
        workspace
            .channel()
            .subscribe(Topic::ARTIFACT_PERSISTED, move |_| {
                calls.lock().push("second");
                Ok(())
            })
    };

    let pipeline = workspace.pipeline();
    pipeline
        .select(DocumentRef::document("paper1.pdf"))
        .await
        .unwrap();
    pipeline.generate().await.unwrap();
    pipeline.save().await.unwrap();

    assert_eq!(*calls.lock(), vec!["first", "second"]);
}

#[tokio::test]
async fn removal_repulls_collection() {
    let backend = backend();
    let workspace = workspace(&backend);
    workspace.start().await.unwrap();
    backend.clear_requests();

    workspace
        .index()
        .remove(&DocumentRef::artifact("old.py"))
        .await
        .unwrap();

    assert_eq!(
        backend.requests(),
        vec![
            Request::Delete("old.py".to_string(), Collection::Artifacts),
            Request::List(Collection::Artifacts),
        ]
    );
    assert!(workspace.index().listing(Collection::Artifacts).is_empty());

    backend.insert_artifact("old.py", "print('old')");
    workspace.index().refresh(Collection::Artifacts).await.unwrap();
    let before = workspace.index().snapshot();
    backend.fail_next(Operation::Delete, 500, None);

    let err = workspace
        .index()
        .remove(&DocumentRef::artifact("old.py"))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkspaceError::BackingStoreUnavailable { .. }));
    assert_eq!(workspace.index().snapshot(), before);
}

#[tokio::test]
async fn refresh_twice_yields_identical_snapshots() {
    let backend = backend();
    let workspace = workspace(&backend);

    let first = workspace.index().refresh_all().await.unwrap();
    let second = workspace.index().refresh_all().await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn artifact_slot_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = WorkspaceConfig::default().with_artifact_slot_path(dir.path().join("slot.json"));
    let backend = backend();

    {
        let workspace = Workspace::new(config.clone(), backend.clone());
        let pipeline = workspace.pipeline();
        pipeline
            .select(DocumentRef::document("paper1.pdf"))
            .await
            .unwrap();
        pipeline.generate().await.unwrap();
    }

    let restored = Workspace::new(config.clone(), backend.clone());
    let snapshot = restored.pipeline().snapshot();
    assert_eq!(snapshot.state, PipelineState::Ready);
    assert_eq!(snapshot.selection, None);
    assert_eq!(snapshot.artifact.target_name, "paper1.py");

    restored.pipeline().clear();
    assert_eq!(SlotFile::new(dir.path().join("slot.json")).load().unwrap(), None);
}

#[derive(Debug, Clone)]
enum Step {
    Select(usize),
    Generate,
    FailingGenerate,
    Clear,
}

const NAMES: [&str; 4] = ["paper0.pdf", "paper1.pdf", "paper2.pdf", "notes.txt"];

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => (0..NAMES.len()).prop_map(Step::Select),
        3 => Just(Step::Generate),
        1 => Just(Step::FailingGenerate),
        1 => Just(Step::Clear),
    ]
}

proptest! {
    #[test]
    fn single_slot_and_single_handle(steps in proptest::collection::vec(step(), 1..24)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let backend = backend();
            let workspace = workspace(&backend);
            let pipeline = workspace.pipeline();
            let mut selected: Option<usize> = None;
            let mut held: Option<usize> = None;

            for step in steps {
                match step {
                    Step::Select(i) => {
                        let _ = pipeline.select(DocumentRef::document(NAMES[i])).await;
                        if selected != Some(i) {
                            selected = Some(i);
                            held = None;
                        }
                    }
                    Step::Generate => {
                        let result = pipeline.generate().await;
                        match selected {
                            Some(i) if i < 3 => {
                                prop_assert!(result.is_ok());
                                held = Some(i);
                            }
                            _ => prop_assert!(result.is_err()),
                        }
                    }
                    Step::FailingGenerate => {
                        backend.fail_next(Operation::Generate, 500, None);
                        let result = pipeline.generate().await;
                        backend.recover(Operation::Generate);
                        prop_assert!(result.is_err());
                        if matches!(selected, Some(i) if i < 3) {
                            held = None;
                        }
                    }
                    Step::Clear => {
                        pipeline.clear();
                        selected = None;
                        held = None;
                    }
                }

                let artifact = pipeline.artifact();
                match held {
                    Some(i) => {
                        prop_assert!(artifact.is_ready());
                        prop_assert_eq!(artifact.source_name.as_str(), NAMES[i]);
                    }
                    None => prop_assert!(!artifact.is_ready()),
                }
                prop_assert!(workspace.previews().live_count() <= 1);
                let expect_preview = matches!(selected, Some(i) if i < 3);
                prop_assert_eq!(workspace.previews().live_count(), usize::from(expect_preview));
            }
            Ok(())
        })?;
    }
}
