//! Multi-label emotion analysis over an ONNX sequence-classification model.
//!
//! The model is fetched from the hub on first use, loaded once per process,
//! and served over HTTP. Each emotion is scored independently with a sigmoid,
//! so a text can carry several emotions at once.
//!
//! # Basic Usage
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use emotion_api::{EmotionClassifier, ModelManager, ModelSource};
//!
//! let manager = ModelManager::new_default()?;
//! let model_dir = manager.ensure_model_downloaded(&ModelSource::default()).await?;
//!
//! let classifier = EmotionClassifier::builder()
//!     .with_model_dir(model_dir)?
//!     .build()?;
//!
//! for emotion in classifier.predict("I am so happy today!", 0.05)? {
//!     println!("{}: {:.3}", emotion.label, emotion.score);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Serving
//!
//! [`EmotionService`] wraps a [`ModelLoader`] with a lazy, load-once guard and
//! [`server::router`] exposes it as `/health`, `/warmup` and `/predict`.

pub mod classifier;
pub mod config;
pub mod labels;
pub mod model_manager;
mod runtime;
pub mod server;
pub mod service;

pub use classifier::{
    ClassifierError, ClassifierInfo, EmotionClassifier, EmotionClassifierBuilder, EmotionModel,
    EmotionPrediction,
};
pub use config::Config;
pub use labels::{LabelSource, LabelTable, ResolvedLabels, GOEMOTIONS_LABELS};
pub use model_manager::{ModelError, ModelManager, ModelSource};
pub use runtime::{create_session_builder, RuntimeConfig, RuntimeError};
pub use service::{
    EmotionService, LoadError, ModelLoader, ModelLocation, ModelState, ModelStatus, OnnxModelLoader,
    PredictionResponse, ServiceError, WarmupReport, WarmupStatus, DEFAULT_THRESHOLD,
};

/// Initializes `env_logger`, defaulting to `info` when `RUST_LOG` is unset.
pub fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}
