use std::path::PathBuf;

use serde::{Deserialize, Serialize};

mod error;
mod inference;
mod model;
pub mod builder;
#[allow(clippy::module_inception)]
mod classifier;
pub mod utils;

pub use error::ClassifierError;
pub use model::ModelConfig;
pub use classifier::EmotionClassifier;
pub use builder::{EmotionClassifierBuilder, DEFAULT_MAX_SEQUENCE_LENGTH};

use crate::labels::{LabelSource, ResolvedLabels};

/// One emotion whose probability exceeded the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionPrediction {
    pub label: String,
    pub score: f32,
}

/// A loaded multi-label text model, as seen by the inference service.
///
/// `logits` is called from blocking worker threads, so implementations must
/// be shareable across threads.
pub trait EmotionModel: Send + Sync {
    /// Label table resolved when the model was loaded.
    fn labels(&self) -> &ResolvedLabels;

    /// Raw per-class scores for `text`, one entry per output class.
    fn logits(&self, text: &str) -> Result<Vec<f32>, ClassifierError>;
}

/// Information about a loaded classifier
#[derive(Debug, Clone)]
pub struct ClassifierInfo {
    /// Path to the ONNX model file
    pub model_path: PathBuf,
    /// Path to the tokenizer file
    pub tokenizer_path: PathBuf,
    /// `model_type` from the model config, when present
    pub model_type: Option<String>,
    /// Number of logits the model produces
    pub num_outputs: usize,
    /// Labels in class-index order
    pub labels: Vec<String>,
    /// Whether the labels came from the model or the fixed table
    pub label_source: LabelSource,
}
