use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use emotion_api::{ModelError, ModelManager, ModelSource};

const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

#[derive(Clone)]
struct Hub {
    files: Arc<HashMap<String, Vec<u8>>>,
    hits: Arc<AtomicUsize>,
}

async fn resolve(
    State(hub): State<Hub>,
    Path((org, name, revision, file)): Path<(String, String, String, String)>,
) -> Result<Vec<u8>, StatusCode> {
    hub.hits.fetch_add(1, Ordering::SeqCst);
    let key = format!("{org}/{name}@{revision}:{file}");
    hub.files.get(&key).cloned().ok_or(StatusCode::NOT_FOUND)
}

/// Serves `files` (keyed `org/name@revision:path`) the way the hub's resolve endpoint does.
async fn spawn_hub(files: HashMap<String, Vec<u8>>) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let hub = Hub {
        files: Arc::new(files),
        hits: Arc::clone(&hits),
    };
    let app = Router::new()
        .route("/:org/:name/resolve/:revision/*file", get(resolve))
        .with_state(hub);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), hits)
}

fn repo_files(repo: &str, revision: &str, model: &[u8]) -> HashMap<String, Vec<u8>> {
    HashMap::from([
        (format!("{repo}@{revision}:onnx/model.onnx"), model.to_vec()),
        (format!("{repo}@{revision}:tokenizer.json"), b"{\"version\":\"1.0\"}".to_vec()),
        (format!("{repo}@{revision}:config.json"), b"{\"model_type\":\"bert\"}".to_vec()),
    ])
}

#[tokio::test]
async fn test_download_from_hub() -> Result<(), Box<dyn std::error::Error>> {
    let (endpoint, hits) = spawn_hub(repo_files("org/emotions", "main", b"hello")).await;
    let dir = tempfile::tempdir()?;
    let manager = ModelManager::new(dir.path())?.with_endpoint(endpoint);
    let mut source = ModelSource::new("org/emotions");
    source.model_sha256 = Some(HELLO_SHA256.to_string());

    assert!(!manager.is_model_downloaded(&source));
    let model_dir = manager.ensure_model_downloaded(&source).await?;

    assert!(model_dir.ends_with("org--emotions"));
    assert_eq!(std::fs::read(manager.get_model_path(&source))?, b"hello");
    assert_eq!(std::fs::read_to_string(manager.get_config_path(&source))?, "{\"model_type\":\"bert\"}");
    assert!(manager.verify_model(&source)?);
    assert_eq!(hits.load(Ordering::SeqCst), 3);

    // Cached: no further requests.
    manager.ensure_model_downloaded(&source).await?;
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    Ok(())
}

#[tokio::test]
async fn test_revision_is_part_of_url() -> Result<(), Box<dyn std::error::Error>> {
    let (endpoint, _) = spawn_hub(repo_files("org/emotions", "v2", b"hello")).await;
    let dir = tempfile::tempdir()?;
    let manager = ModelManager::new(dir.path())?.with_endpoint(endpoint);

    let mut source = ModelSource::new("org/emotions");
    assert!(manager.ensure_model_downloaded(&source).await.is_err());

    source.revision = "v2".to_string();
    manager.ensure_model_downloaded(&source).await?;
    assert!(manager.is_model_downloaded(&source));
    Ok(())
}

#[tokio::test]
async fn test_hash_mismatch_discards_download() -> Result<(), Box<dyn std::error::Error>> {
    let (endpoint, _) = spawn_hub(repo_files("org/emotions", "main", b"tampered")).await;
    let dir = tempfile::tempdir()?;
    let manager = ModelManager::new(dir.path())?.with_endpoint(endpoint);
    let mut source = ModelSource::new("org/emotions");
    source.model_sha256 = Some(HELLO_SHA256.to_string());

    let result = manager.ensure_model_downloaded(&source).await;
    assert!(matches!(result, Err(ModelError::HashMismatch { .. })));
    assert!(!manager.get_model_path(&source).exists());
    Ok(())
}

#[tokio::test]
async fn test_corrupted_cache_is_redownloaded() -> Result<(), Box<dyn std::error::Error>> {
    let (endpoint, hits) = spawn_hub(repo_files("org/emotions", "main", b"hello")).await;
    let dir = tempfile::tempdir()?;
    let manager = ModelManager::new(dir.path())?.with_endpoint(endpoint);
    let mut source = ModelSource::new("org/emotions");
    source.model_sha256 = Some(HELLO_SHA256.to_string());

    manager.ensure_model_downloaded(&source).await?;
    std::fs::write(manager.get_model_path(&source), "corrupted data")?;
    assert!(!manager.verify_model(&source)?);

    manager.ensure_model_downloaded(&source).await?;
    assert!(manager.verify_model(&source)?);
    assert_eq!(hits.load(Ordering::SeqCst), 6);
    Ok(())
}

#[tokio::test]
async fn test_missing_remote_file_fails() -> Result<(), Box<dyn std::error::Error>> {
    let mut files = repo_files("org/emotions", "main", b"hello");
    files.remove("org/emotions@main:config.json");
    let (endpoint, _) = spawn_hub(files).await;
    let dir = tempfile::tempdir()?;
    let manager = ModelManager::new(dir.path())?.with_endpoint(endpoint);
    let source = ModelSource::new("org/emotions");

    let result = manager.ensure_model_downloaded(&source).await;
    assert!(matches!(result, Err(ModelError::DownloadError(_))));
    assert!(!manager.is_model_downloaded(&source));
    assert!(!manager.get_model_path(&source).exists());
    Ok(())
}

#[tokio::test]
#[ignore = "downloads the pretrained model"]
async fn test_default_model_download() -> Result<(), Box<dyn std::error::Error>> {
    let manager = ModelManager::new_default()?;
    let source = ModelSource::default();
    let model_dir = manager.ensure_model_downloaded(&source).await?;
    assert!(model_dir.join("model.onnx").exists());
    assert!(model_dir.join("tokenizer.json").exists());
    assert!(model_dir.join("config.json").exists());
    Ok(())
}
