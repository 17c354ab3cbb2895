//! Inference service: lazy model loading guard and the prediction pipeline.
//!
//! [`EmotionService`] owns the model lifecycle
//! (`Unloaded -> Loading -> Loaded | Failed`). At most one load runs at a
//! time; callers arriving while it runs are told so instead of waiting. A
//! failed load is sticky until the process restarts.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use async_trait::async_trait;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::classifier::utils::{rank_emotions, sigmoid_all};
use crate::classifier::{
    ClassifierError, EmotionClassifier, EmotionModel, EmotionPrediction, DEFAULT_MAX_SEQUENCE_LENGTH,
};
use crate::model_manager::{ModelError, ModelManager, ModelSource};
use crate::runtime::RuntimeConfig;

/// Threshold applied when the caller does not give one.
pub const DEFAULT_THRESHOLD: f32 = 0.05;

/// Characters of the input echoed into the request log.
const LOG_PREVIEW_CHARS: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Text input cannot be empty")]
    InvalidInput,
    #[error("Failed to load model: {0}")]
    ModelUnavailable(String),
    #[error("Model is currently loading")]
    ModelLoading,
    #[error("Prediction failed: {0}")]
    InferenceError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Download(#[from] ModelError),
    #[error(transparent)]
    Build(#[from] ClassifierError),
    #[error("model loading task failed: {0}")]
    Task(String),
}

/// Performs one attempt at loading the model.
#[async_trait]
pub trait ModelLoader: Send + Sync + 'static {
    async fn load(&self) -> Result<Arc<dyn EmotionModel>, LoadError>;
}

/// Lifecycle of the process-wide model.
#[derive(Clone, Default)]
pub enum ModelState {
    #[default]
    Unloaded,
    Loading,
    Loaded(Arc<dyn EmotionModel>),
    Failed(String),
}

impl fmt::Debug for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unloaded => write!(f, "Unloaded"),
            Self::Loading => write!(f, "Loading"),
            Self::Loaded(_) => write!(f, "Loaded"),
            Self::Failed(e) => write!(f, "Failed({e:?})"),
        }
    }
}

/// Model status as reported by the health endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelStatus {
    NotLoaded,
    Loading,
    Loaded,
    Error(String),
}

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotLoaded => write!(f, "not_loaded"),
            Self::Loading => write!(f, "loading"),
            Self::Loaded => write!(f, "loaded"),
            Self::Error(e) => write!(f, "error: {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStatus {
    pub healthy: bool,
    pub model_status: ModelStatus,
}

impl ServiceStatus {
    pub fn status_str(&self) -> &'static str {
        if self.healthy {
            "healthy"
        } else {
            "unhealthy"
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarmupStatus {
    Ready,
    Loading,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmupReport {
    pub message: String,
    pub status: WarmupStatus,
}

impl WarmupReport {
    fn new(message: impl Into<String>, status: WarmupStatus) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub success: bool,
    pub emotions: Vec<EmotionPrediction>,
    pub text_analyzed: String,
}

/// Owns the model state and serves predictions from it.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct EmotionService {
    state: Arc<Mutex<ModelState>>,
    loader: Arc<dyn ModelLoader>,
    model_name: String,
}

fn lock(state: &Mutex<ModelState>) -> MutexGuard<'_, ModelState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Records the outcome of a load. Dropped without an outcome (the loader
/// panicked), it marks the load failed rather than leaving it `Loading`.
struct LoadGuard {
    state: Arc<Mutex<ModelState>>,
    done: bool,
}

impl LoadGuard {
    fn finish(mut self, outcome: ModelState) {
        *lock(&self.state) = outcome;
        self.done = true;
    }
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        if !self.done {
            *lock(&self.state) = ModelState::Failed("model loading aborted".to_string());
        }
    }
}

impl EmotionService {
    pub fn new(loader: Arc<dyn ModelLoader>, model_name: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ModelState::Unloaded)),
            loader,
            model_name: model_name.into(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> ModelState {
        lock(&self.state).clone()
    }

    /// Returns the loaded model, loading it first if nothing has been tried yet.
    ///
    /// - loaded: returns immediately
    /// - failed before: returns the stored error, no retry
    /// - another caller is loading: returns [`ServiceError::ModelLoading`] at once
    ///
    /// The load itself runs on a spawned task, so it completes and records its
    /// outcome even if this caller is dropped midway.
    pub async fn ensure_loaded(&self) -> Result<Arc<dyn EmotionModel>, ServiceError> {
        {
            let mut state = lock(&self.state);
            match &*state {
                ModelState::Loaded(model) => return Ok(Arc::clone(model)),
                ModelState::Failed(e) => return Err(ServiceError::ModelUnavailable(e.clone())),
                ModelState::Loading => return Err(ServiceError::ModelLoading),
                ModelState::Unloaded => {}
            }
            *state = ModelState::Loading;
        }

        info!("Starting model download and loading...");
        let start_time = Instant::now();
        let guard = LoadGuard {
            state: Arc::clone(&self.state),
            done: false,
        };
        let loader = Arc::clone(&self.loader);

        let task = tokio::spawn(async move {
            match loader.load().await {
                Ok(model) => {
                    guard.finish(ModelState::Loaded(Arc::clone(&model)));
                    Ok(model)
                }
                Err(e) => {
                    let message = e.to_string();
                    error!("Error loading model: {}", message);
                    guard.finish(ModelState::Failed(message.clone()));
                    Err(message)
                }
            }
        });

        match task.await {
            Ok(Ok(model)) => {
                info!("Model loaded successfully in {:.2?}!", start_time.elapsed());
                Ok(model)
            }
            Ok(Err(message)) => Err(ServiceError::ModelUnavailable(message)),
            Err(join_error) => {
                error!("Model loading task failed: {}", join_error);
                Err(ServiceError::ModelUnavailable(join_error.to_string()))
            }
        }
    }

    /// Health view of the model state. Never triggers a load.
    pub fn status(&self) -> ServiceStatus {
        let model_status = match &*lock(&self.state) {
            ModelState::Unloaded => ModelStatus::NotLoaded,
            ModelState::Loading => ModelStatus::Loading,
            ModelState::Loaded(_) => ModelStatus::Loaded,
            ModelState::Failed(e) => ModelStatus::Error(e.clone()),
        };
        ServiceStatus {
            healthy: !matches!(model_status, ModelStatus::Error(_)),
            model_status,
        }
    }

    /// Loads the model ahead of the first prediction and reports the outcome.
    pub async fn warmup(&self) -> WarmupReport {
        match self.status().model_status {
            ModelStatus::Loaded => return WarmupReport::new("Model already loaded", WarmupStatus::Ready),
            ModelStatus::Loading => {
                return WarmupReport::new("Model is currently loading", WarmupStatus::Loading)
            }
            ModelStatus::NotLoaded | ModelStatus::Error(_) => {}
        }

        match self.ensure_loaded().await {
            Ok(_) => WarmupReport::new("Model loaded successfully", WarmupStatus::Ready),
            Err(ServiceError::ModelLoading) => {
                WarmupReport::new("Model is currently loading", WarmupStatus::Loading)
            }
            Err(e) => WarmupReport::new(e.to_string(), WarmupStatus::Error),
        }
    }

    /// Scores `text` against every emotion and returns those above `threshold`.
    pub async fn predict(&self, text: &str, threshold: f32) -> Result<PredictionResponse, ServiceError> {
        let model = self.ensure_loaded().await?;

        if text.trim().is_empty() {
            return Err(ServiceError::InvalidInput);
        }

        let preview: String = text.chars().take(LOG_PREVIEW_CHARS).collect();
        info!("Analyzing text: {}...", preview);

        let worker_model = Arc::clone(&model);
        let input = text.to_owned();
        let logits = tokio::task::spawn_blocking(move || worker_model.logits(&input))
            .await
            .map_err(|e| ServiceError::InferenceError(e.to_string()))?
            .map_err(|e| {
                error!("Error during prediction: {}", e);
                ServiceError::InferenceError(e.to_string())
            })?;

        let probs = sigmoid_all(&logits);
        let labels = model.labels();
        if probs.len() != labels.len() {
            warn!(
                "Model output size ({}) doesn't match label table ({})",
                probs.len(),
                labels.len()
            );
        }

        let emotions = rank_emotions(&probs, &labels.table, threshold);
        info!("Found {} emotions above threshold {}", emotions.len(), threshold);
        let top: Vec<String> = emotions
            .iter()
            .take(5)
            .map(|e| format!("{}: {:.3}", e.label, e.score))
            .collect();
        info!("Top predictions: [{}]", top.join(", "));

        Ok(PredictionResponse {
            success: true,
            emotions,
            text_analyzed: text.to_string(),
        })
    }
}

/// Where the ONNX artifacts come from.
#[derive(Clone)]
pub enum ModelLocation {
    /// A directory that already holds `model.onnx`, `tokenizer.json` and `config.json`.
    Local(PathBuf),
    /// Downloaded into the cache on first load.
    Hub {
        manager: ModelManager,
        source: ModelSource,
    },
}

/// Loads an [`EmotionClassifier`] from local or downloaded ONNX artifacts.
pub struct OnnxModelLoader {
    location: ModelLocation,
    runtime_config: RuntimeConfig,
    max_sequence_length: usize,
}

impl OnnxModelLoader {
    pub fn new(location: ModelLocation) -> Self {
        Self {
            location,
            runtime_config: RuntimeConfig::default(),
            max_sequence_length: DEFAULT_MAX_SEQUENCE_LENGTH,
        }
    }

    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime_config = config;
        self
    }

    pub fn with_max_sequence_length(mut self, max_sequence_length: usize) -> Self {
        self.max_sequence_length = max_sequence_length;
        self
    }
}

#[async_trait]
impl ModelLoader for OnnxModelLoader {
    async fn load(&self) -> Result<Arc<dyn EmotionModel>, LoadError> {
        let model_dir = match &self.location {
            ModelLocation::Local(dir) => dir.clone(),
            ModelLocation::Hub { manager, source } => manager.ensure_model_downloaded(source).await?,
        };

        info!("Loading tokenizer and model from {:?}...", model_dir);
        let runtime_config = self.runtime_config.clone();
        let max_sequence_length = self.max_sequence_length;
        let classifier = tokio::task::spawn_blocking(move || {
            EmotionClassifier::builder()
                .with_runtime_config(runtime_config)
                .with_max_sequence_length(max_sequence_length)
                .with_model_dir(&model_dir)?
                .build()
        })
        .await
        .map_err(|e| LoadError::Task(e.to_string()))??;

        let info = classifier.info();
        info!(
            "Model ready: type={:?}, outputs={}, labels={:?}",
            info.model_type, info.num_outputs, info.label_source
        );
        Ok(Arc::new(classifier))
    }
}
