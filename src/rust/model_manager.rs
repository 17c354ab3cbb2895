use std::path::{Path, PathBuf};
use std::fs;
use std::io;
use std::sync::Arc;
use std::env;
use tokio::sync::Mutex;
use sha2::{Sha256, Digest};

/// Default pretrained artifact served by the API.
pub const DEFAULT_MODEL_ID: &str = "wncelrcn/mindmap-MiniLM-goemotions-v1";
/// Default hub endpoint, overridable with `HF_ENDPOINT`.
pub const DEFAULT_HUB_ENDPOINT: &str = "https://huggingface.co";

/// File names used inside the local cache directory of a model.
pub const MODEL_FILE_NAME: &str = "model.onnx";
pub const TOKENIZER_FILE_NAME: &str = "tokenizer.json";
pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model not downloaded: {0}")]
    NotDownloaded(String),
    #[error("Download error: {0}")]
    DownloadError(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Model verification failed")]
    VerificationFailed,
    #[error("Hash mismatch: expected {expected}, got {actual} for {file_type} file")]
    HashMismatch {
        file_type: String,
        expected: String,
        actual: String,
    },
}

/// Identifies a pretrained artifact on the model hub and the files to fetch from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSource {
    pub repo_id: String,
    pub revision: String,
    /// Path of the ONNX export inside the repository.
    pub model_file: String,
    pub tokenizer_file: String,
    pub config_file: String,
    /// Expected SHA-256 of the ONNX file; unchecked when `None`.
    pub model_sha256: Option<String>,
}

impl Default for ModelSource {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL_ID)
    }
}

impl ModelSource {
    pub fn new(repo_id: impl Into<String>) -> Self {
        Self {
            repo_id: repo_id.into(),
            revision: "main".to_string(),
            model_file: "onnx/model.onnx".to_string(),
            tokenizer_file: TOKENIZER_FILE_NAME.to_string(),
            config_file: CONFIG_FILE_NAME.to_string(),
            model_sha256: None,
        }
    }

    /// Directory name of this artifact inside the cache (`org/name` -> `org--name`).
    pub fn cache_name(&self) -> String {
        self.repo_id.replace('/', "--")
    }

    /// Download URL of `file` for this artifact on the given hub endpoint.
    pub fn file_url(&self, endpoint: &str, file: &str) -> String {
        format!(
            "{}/{}/resolve/{}/{}",
            endpoint.trim_end_matches('/'),
            self.repo_id,
            self.revision,
            file
        )
    }
}

#[derive(Clone)]
pub struct ModelManager {
    models_dir: PathBuf,
    endpoint: String,
    client: reqwest::Client,
    download_lock: Arc<Mutex<()>>,
}

impl ModelManager {
    /// Creates a new ModelManager with the default models directory
    pub fn new_default() -> io::Result<Self> {
        Self::new(Self::get_default_models_dir())
    }

    /// Returns the default models directory path
    pub fn get_default_models_dir() -> PathBuf {
        // 1. Check environment variable
        if let Ok(path) = env::var("EMOTION_API_CACHE") {
            return PathBuf::from(path).join("models");
        }

        // 2. Use platform-specific cache directory
        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("emotion-api").join("models");
        }

        // 3. Fallback to user's home directory
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("emotion-api").join("models");
        }

        // 4. If all else fails, use system temp directory (platform agnostic)
        env::temp_dir().join("emotion-api").join("models")
    }

    pub fn new<P: AsRef<Path>>(models_dir: P) -> io::Result<Self> {
        let models_dir = models_dir.as_ref().to_path_buf();
        fs::create_dir_all(&models_dir)?;
        let endpoint = env::var("HF_ENDPOINT").unwrap_or_else(|_| DEFAULT_HUB_ENDPOINT.to_string());
        Ok(Self {
            models_dir,
            endpoint,
            client: reqwest::Client::new(),
            download_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Overrides the hub endpoint (mirrors, local test servers).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Local directory holding the cached files of `source`.
    pub fn get_model_dir(&self, source: &ModelSource) -> PathBuf {
        self.models_dir.join(source.cache_name())
    }

    pub fn get_model_path(&self, source: &ModelSource) -> PathBuf {
        self.get_model_dir(source).join(MODEL_FILE_NAME)
    }

    pub fn get_tokenizer_path(&self, source: &ModelSource) -> PathBuf {
        self.get_model_dir(source).join(TOKENIZER_FILE_NAME)
    }

    pub fn get_config_path(&self, source: &ModelSource) -> PathBuf {
        self.get_model_dir(source).join(CONFIG_FILE_NAME)
    }

    pub fn is_model_downloaded(&self, source: &ModelSource) -> bool {
        let model_path = self.get_model_path(source);
        let tokenizer_path = self.get_tokenizer_path(source);
        let config_path = self.get_config_path(source);
        log::debug!("Checking if model {} is downloaded:", source.repo_id);
        log::debug!("  Model path: {:?} (exists: {})", model_path, model_path.exists());
        log::debug!("  Tokenizer path: {:?} (exists: {})", tokenizer_path, tokenizer_path.exists());
        log::debug!("  Config path: {:?} (exists: {})", config_path, config_path.exists());
        model_path.exists() && tokenizer_path.exists() && config_path.exists()
    }

    pub async fn download_model(&self, source: &ModelSource) -> Result<(), ModelError> {
        let _lock = self.download_lock.lock().await;

        let model_dir = self.get_model_dir(source);
        log::info!("Creating model directory at {:?}", model_dir);
        fs::create_dir_all(&model_dir)?;

        let files = [
            (&source.model_file, self.get_model_path(source), source.model_sha256.as_deref(), "model"),
            (&source.tokenizer_file, self.get_tokenizer_path(source), None, "tokenizer"),
            (&source.config_file, self.get_config_path(source), None, "config"),
        ];

        for (remote, local, expected_hash, file_type) in files {
            let url = source.file_url(&self.endpoint, remote);
            if let Err(e) = self.download_and_verify_file(&url, &local, expected_hash, file_type).await {
                log::error!("Failed to setup {} file: {}", file_type, e);
                let _ = self.remove_download(source);
                return Err(e);
            }
        }

        log::info!("Model {} ready to use", source.repo_id);
        Ok(())
    }

    fn hash_file(path: &Path) -> Result<String, ModelError> {
        let bytes = fs::read(path)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }

    fn verify_file(&self, path: &Path, expected_hash: &str) -> Result<bool, ModelError> {
        log::info!("Verifying file: {:?}", path);
        let hash = Self::hash_file(path)?;
        log::debug!("Calculated hash: {}", hash);
        log::debug!("Expected hash:   {}", expected_hash);
        Ok(hash.eq_ignore_ascii_case(expected_hash))
    }

    /// Checks that all files are present and, when a model hash is configured,
    /// that the ONNX file matches it.
    pub fn verify_model(&self, source: &ModelSource) -> Result<bool, ModelError> {
        if !self.is_model_downloaded(source) {
            log::info!("One or more model files do not exist");
            return Ok(false);
        }

        match source.model_sha256.as_deref() {
            Some(expected) => {
                let model_ok = self.verify_file(&self.get_model_path(source), expected)?;
                log::info!("Model hash verification: {}", model_ok);
                Ok(model_ok)
            }
            None => Ok(true),
        }
    }

    async fn download_and_verify_file(
        &self,
        url: &str,
        path: &Path,
        expected_hash: Option<&str>,
        file_type: &str,
    ) -> Result<(), ModelError> {
        log::info!("Downloading {} file from {} to {:?}", file_type, url, path);
        let response = self.client.get(url).send().await?.error_for_status()?;
        log::debug!("Download response status: {}", response.status());
        let bytes = response.bytes().await?;
        log::info!("Downloaded {} bytes", bytes.len());

        if let Some(expected) = expected_hash {
            let mut hasher = Sha256::new();
            hasher.update(&bytes);
            let hash = format!("{:x}", hasher.finalize());
            if !hash.eq_ignore_ascii_case(expected) {
                log::error!("{} hash mismatch: expected {}, got {}", file_type, expected, hash);
                return Err(ModelError::HashMismatch {
                    file_type: file_type.to_string(),
                    expected: expected.to_string(),
                    actual: hash,
                });
            }
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, &bytes)?;

        if let Some(expected) = expected_hash {
            if !self.verify_file(path, expected)? {
                return Err(ModelError::VerificationFailed);
            }
        }

        log::info!("{} file downloaded successfully", file_type);
        Ok(())
    }

    pub fn remove_download(&self, source: &ModelSource) -> Result<(), ModelError> {
        for path in [
            self.get_model_path(source),
            self.get_tokenizer_path(source),
            self.get_config_path(source),
        ] {
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    /// Ensures that a model is downloaded and verified.
    /// If the model doesn't exist, it will be downloaded.
    /// If verification fails, it will be re-downloaded.
    pub async fn ensure_model_downloaded(&self, source: &ModelSource) -> Result<PathBuf, ModelError> {
        log::info!("Checking if model {} is downloaded...", source.repo_id);
        if !self.is_model_downloaded(source) {
            log::info!("Model not found, downloading...");
            self.download_model(source).await?;
        } else if !self.verify_model(source)? {
            log::info!("Model verification failed, re-downloading...");
            self.remove_download(source)?;
            self.download_model(source).await?;
        } else {
            log::info!("Model verification successful");
        }

        if !self.is_model_downloaded(source) {
            return Err(ModelError::NotDownloaded(source.repo_id.clone()));
        }
        Ok(self.get_model_dir(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    fn write_artifacts(manager: &ModelManager, source: &ModelSource, model_bytes: &[u8]) {
        fs::create_dir_all(manager.get_model_dir(source)).unwrap();
        fs::write(manager.get_model_path(source), model_bytes).unwrap();
        fs::write(manager.get_tokenizer_path(source), "{}").unwrap();
        fs::write(manager.get_config_path(source), "{}").unwrap();
    }

    #[test]
    fn test_model_paths() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::new(dir.path()).unwrap();
        let source = ModelSource::default();

        assert!(manager
            .get_model_path(&source)
            .ends_with("wncelrcn--mindmap-MiniLM-goemotions-v1/model.onnx"));
        assert!(manager
            .get_tokenizer_path(&source)
            .ends_with("wncelrcn--mindmap-MiniLM-goemotions-v1/tokenizer.json"));
        assert!(manager
            .get_config_path(&source)
            .ends_with("wncelrcn--mindmap-MiniLM-goemotions-v1/config.json"));
    }

    #[test]
    fn test_file_url() {
        let source = ModelSource::new("org/model");
        assert_eq!(
            source.file_url("https://huggingface.co/", "onnx/model.onnx"),
            "https://huggingface.co/org/model/resolve/main/onnx/model.onnx"
        );
    }

    #[test]
    fn test_download_state_and_removal() -> Result<(), ModelError> {
        let dir = tempfile::tempdir()?;
        let manager = ModelManager::new(dir.path())?;
        let source = ModelSource::default();

        assert!(!manager.is_model_downloaded(&source));
        assert!(!manager.verify_model(&source)?);

        write_artifacts(&manager, &source, b"hello");
        assert!(manager.is_model_downloaded(&source));
        assert!(manager.verify_model(&source)?);

        manager.remove_download(&source)?;
        assert!(!manager.is_model_downloaded(&source));
        Ok(())
    }

    #[test]
    fn test_model_hash_verification() -> Result<(), ModelError> {
        let dir = tempfile::tempdir()?;
        let manager = ModelManager::new(dir.path())?;
        let mut source = ModelSource::default();
        source.model_sha256 = Some(HELLO_SHA256.to_string());

        write_artifacts(&manager, &source, b"hello");
        assert!(manager.verify_model(&source)?);

        fs::write(manager.get_model_path(&source), "corrupted data")?;
        assert!(!manager.verify_model(&source)?);
        Ok(())
    }

    #[tokio::test]
    async fn test_ensure_downloaded_uses_cache() -> Result<(), ModelError> {
        let dir = tempfile::tempdir()?;
        // Unroutable endpoint: any network access would fail the test.
        let manager = ModelManager::new(dir.path())?.with_endpoint("http://127.0.0.1:9");
        let source = ModelSource::default();
        write_artifacts(&manager, &source, b"hello");

        let model_dir = manager.ensure_model_downloaded(&source).await?;
        assert_eq!(model_dir, manager.get_model_dir(&source));
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_download_leaves_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::new(dir.path()).unwrap().with_endpoint("http://127.0.0.1:9");
        let source = ModelSource::default();

        let result = manager.download_model(&source).await;
        assert!(matches!(result, Err(ModelError::DownloadError(_))));
        assert!(!manager.get_model_path(&source).exists());
    }

    #[test]
    fn test_default_models_dir() {
        env::set_var("EMOTION_API_CACHE", "/tmp/test-cache");
        let path = ModelManager::get_default_models_dir();
        assert!(path.to_str().unwrap().contains("/tmp/test-cache/models"));
        env::remove_var("EMOTION_API_CACHE");

        let path = ModelManager::get_default_models_dir();
        assert!(path.to_str().unwrap().contains("emotion-api/models"));
    }
}
