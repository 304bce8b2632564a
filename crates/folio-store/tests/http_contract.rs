//! HttpBackend Tests
//!
//! Runs the client against an ephemeral warp server that speaks the REST
//! contract and records what it receives.

use folio_store::{
    Collection, ConfigRole, ConfigService, FileStore, GenerationService, HttpBackend, StoreError,
    TextDocument, VerificationService,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use warp::http::StatusCode;
use warp::Filter;

#[derive(Debug, Default)]
struct Recorded {
    saved: Vec<(String, TextDocument)>,
    deleted: Vec<(String, String)>,
    verified: Vec<TextDocument>,
    uploads: Vec<(String, Option<String>)>,
    config_updates: Vec<serde_json::Value>,
}

type Recorder = Arc<Mutex<Recorded>>;

fn with_recorder(
    recorder: &Recorder,
) -> impl Filter<Extract = (Recorder,), Error = std::convert::Infallible> + Clone {
    let recorder = recorder.clone();
    warp::any().map(move || recorder.clone())
}

fn folder_of(query: &HashMap<String, String>) -> String {
    query.get("folder").cloned().unwrap_or_default()
}

async fn start_server(recorder: Recorder) -> String {
    let list = warp::get()
        .and(warp::path!("files"))
        .and(warp::query::<HashMap<String, String>>())
        .map(|query: HashMap<String, String>| {
            let folder = folder_of(&query);
            if folder == "documents" {
                warp::reply::with_status(
                    warp::reply::json(&json!({ "files": ["paper1.pdf", "paper2.pdf"] })),
                    StatusCode::OK,
                )
            } else {
                warp::reply::with_status(
                    warp::reply::json(&json!({ "files": ["paper1.py"] })),
                    StatusCode::OK,
                )
            }
        });

    let binary = warp::get()
        .and(warp::path!("files" / "binary" / String))
        .and(warp::query::<HashMap<String, String>>())
        .map(|name: String, query: HashMap<String, String>| {
            let body = format!("%PDF {name} from {}", folder_of(&query));
            warp::reply::with_status(body.into_bytes(), StatusCode::OK)
        });

    let text = warp::get()
        .and(warp::path!("files" / "text" / String))
        .and(warp::query::<HashMap<String, String>>())
        .map(|name: String, query: HashMap<String, String>| {
            if name == "missing.py" {
                return warp::reply::with_status(
                    warp::reply::json(&json!({ "detail": "File not found" })),
                    StatusCode::NOT_FOUND,
                );
            }
            warp::reply::with_status(
                warp::reply::json(&json!({
                    "filename": name,
                    "content": format!("content of {name} in {}", folder_of(&query)),
                })),
                StatusCode::OK,
            )
        });

    let delete = warp::delete()
        .and(warp::path!("files" / String))
        .and(warp::query::<HashMap<String, String>>())
        .and(with_recorder(&recorder))
        .map(|name: String, query: HashMap<String, String>, recorder: Recorder| {
            if name == "locked.py" {
                // error body intentionally empty
                return warp::reply::with_status(String::new(), StatusCode::INTERNAL_SERVER_ERROR);
            }
            recorder
                .lock()
                .unwrap()
                .deleted
                .push((name, folder_of(&query)));
            warp::reply::with_status(String::new(), StatusCode::NO_CONTENT)
        });

    let save = warp::post()
        .and(warp::path!("files" / "save"))
        .and(warp::query::<HashMap<String, String>>())
        .and(warp::body::json())
        .and(with_recorder(&recorder))
        .map(|query: HashMap<String, String>, doc: TextDocument, recorder: Recorder| {
            recorder.lock().unwrap().saved.push((folder_of(&query), doc));
            warp::reply::with_status(warp::reply(), StatusCode::NO_CONTENT)
        });

    let generate = warp::post()
        .and(warp::path!("generate"))
        .and(warp::header::optional::<String>("content-type"))
        .and(warp::body::bytes())
        .and(with_recorder(&recorder))
        .map(|content_type: Option<String>, body: warp::hyper::body::Bytes, recorder: Recorder| {
            let body = String::from_utf8_lossy(&body).to_string();
            let filename = if body.contains("filename=\"broken.pdf\"") {
                "broken.pdf"
            } else {
                "paper1.pdf"
            };
            recorder
                .lock()
                .unwrap()
                .uploads
                .push((filename.to_string(), content_type));
            if filename == "broken.pdf" {
                return warp::reply::with_status(
                    warp::reply::json(&json!({ "detail": "No strategy found in document" })),
                    StatusCode::UNPROCESSABLE_ENTITY,
                );
            }
            warp::reply::with_status(
                warp::reply::json(&json!({ "filename": "paper1.py", "code": "class Strategy: pass" })),
                StatusCode::OK,
            )
        });

    let verify = warp::post()
        .and(warp::path!("verify"))
        .and(warp::body::json())
        .and(with_recorder(&recorder))
        .map(|doc: TextDocument, recorder: Recorder| {
            recorder.lock().unwrap().verified.push(doc);
            warp::reply::with_status(warp::reply(), StatusCode::ACCEPTED)
        });

    let active = warp::get().and(warp::path!("config" / "active")).map(|| {
        warp::reply::json(&json!({ "generatorRole": "gpt-4o", "retrievalRole": "gpt-3.5-turbo" }))
    });

    let update = warp::post()
        .and(warp::path!("config"))
        .and(warp::body::json())
        .and(with_recorder(&recorder))
        .map(|body: serde_json::Value, recorder: Recorder| {
            let model = body["model_name"].as_str().unwrap_or_default().to_string();
            recorder.lock().unwrap().config_updates.push(body);
            warp::reply::json(&json!({ "generatorRole": model, "retrievalRole": "gpt-3.5-turbo" }))
        });

    let models = warp::get()
        .and(warp::path!("config" / "models"))
        .map(|| warp::reply::json(&json!(["gpt-4.1", "gpt-4o", "gpt-3.5-turbo"])));

    let routes = list
        .or(binary)
        .or(text)
        .or(delete)
        .or(save)
        .or(generate)
        .or(verify)
        .or(active)
        .or(update)
        .or(models);

    let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    format!("http://{addr}")
}

async fn backend() -> (HttpBackend, Recorder) {
    let recorder = Recorder::default();
    let base = start_server(recorder.clone()).await;
    (HttpBackend::new(&base).unwrap(), recorder)
}

#[tokio::test]
async fn test_list_sends_folder_query() {
    let (backend, _) = backend().await;

    let documents = backend.list(Collection::Documents).await.unwrap();
    let artifacts = backend.list(Collection::Artifacts).await.unwrap();

    assert_eq!(documents, vec!["paper1.pdf", "paper2.pdf"]);
    assert_eq!(artifacts, vec!["paper1.py"]);
}

#[tokio::test]
async fn test_fetch_binary_reads_documents_folder() {
    let (backend, _) = backend().await;

    let bytes = backend.fetch_binary("paper1.pdf").await.unwrap();

    assert_eq!(bytes, b"%PDF paper1.pdf from documents".to_vec());
}

#[tokio::test]
async fn test_load_text_and_missing_detail() {
    let (backend, _) = backend().await;

    let doc = backend
        .load_text("paper1.py", Collection::Artifacts)
        .await
        .unwrap();
    assert_eq!(doc, TextDocument::new("paper1.py", "content of paper1.py in artifacts"));

    let err = backend
        .load_text("missing.py", Collection::Artifacts)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.detail(), Some("File not found"));
}

#[tokio::test]
async fn test_delete_and_empty_error_body() {
    let (backend, recorder) = backend().await;

    backend.delete("old.py", Collection::Artifacts).await.unwrap();
    assert_eq!(
        recorder.lock().unwrap().deleted,
        vec![("old.py".to_string(), "artifacts".to_string())]
    );

    let err = backend
        .delete("locked.py", Collection::Artifacts)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Status { status: 500, detail: None, .. }));
}

#[tokio::test]
async fn test_save_posts_json_body() {
    let (backend, recorder) = backend().await;

    let doc = TextDocument::new("paper1.py", "class Strategy: pass");
    backend.save_text(Collection::Artifacts, &doc).await.unwrap();

    assert_eq!(
        recorder.lock().unwrap().saved,
        vec![("artifacts".to_string(), doc)]
    );
}

#[tokio::test]
async fn test_generate_uploads_multipart() {
    let (backend, recorder) = backend().await;

    let code = backend
        .generate("paper1.pdf", b"%PDF-1.7".to_vec())
        .await
        .unwrap();
    assert_eq!(code.filename, "paper1.py");
    assert_eq!(code.code, "class Strategy: pass");

    let uploads = &recorder.lock().unwrap().uploads;
    assert_eq!(uploads.len(), 1);
    let content_type = uploads[0].1.clone().unwrap_or_default();
    assert!(content_type.starts_with("multipart/form-data"));
}

#[tokio::test]
async fn test_generate_surfaces_service_detail() {
    let (backend, _) = backend().await;

    let err = backend
        .generate("broken.pdf", b"%PDF-1.7".to_vec())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(422));
    assert_eq!(err.detail(), Some("No strategy found in document"));
}

#[tokio::test]
async fn test_verify_accepts_202() {
    let (backend, recorder) = backend().await;

    let doc = TextDocument::new("paper1.py", "class Strategy: pass");
    backend.trigger(&doc).await.unwrap();

    assert_eq!(recorder.lock().unwrap().verified, vec![doc]);
}

#[tokio::test]
async fn test_config_round_trip() {
    let (backend, recorder) = backend().await;

    let active = backend.active().await.unwrap();
    assert_eq!(active.generator_role, "gpt-4o");

    let updated = backend
        .update(ConfigRole::Generator, "gpt-4.1")
        .await
        .unwrap();
    assert_eq!(updated.generator_role, "gpt-4.1");
    assert_eq!(
        recorder.lock().unwrap().config_updates,
        vec![json!({ "field": "generatorRole", "model_name": "gpt-4.1" })]
    );

    let models = backend.models().await.unwrap();
    assert_eq!(models, vec!["gpt-4.1", "gpt-4o", "gpt-3.5-turbo"]);
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let backend = HttpBackend::new("http://127.0.0.1:1").unwrap();

    let err = backend.list(Collection::Documents).await.unwrap_err();

    assert!(matches!(err, StoreError::Transport { .. }));
}
