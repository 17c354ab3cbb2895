use std::path::PathBuf;
use std::sync::Arc;
use ort::session::Session;
use tokenizers::Tokenizer;

use super::error::ClassifierError;
use super::inference::SequenceClassification;
use super::utils::{rank_emotions, sigmoid_all};
use super::{ClassifierInfo, EmotionModel, EmotionPrediction};
use crate::labels::ResolvedLabels;

/// A thread-safe multi-label emotion classifier backed by an ONNX
/// sequence-classification model.
///
/// The tokenizer and session are shared through `Arc`, so the classifier can
/// be wrapped in an `Arc` itself and used from many threads at once.
pub struct EmotionClassifier {
    pub(crate) model_path: PathBuf,
    pub(crate) tokenizer_path: PathBuf,
    pub(crate) tokenizer: Arc<Tokenizer>,
    pub(crate) session: Arc<Session>,
    pub(crate) labels: ResolvedLabels,
    pub(crate) num_outputs: usize,
    pub(crate) model_type: Option<String>,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<EmotionClassifier>();
    }
};

impl SequenceClassification for EmotionClassifier {
    fn tokenizer(&self) -> Option<&Tokenizer> {
        Some(&self.tokenizer)
    }

    fn session(&self) -> Option<&Session> {
        Some(&self.session)
    }
}

impl EmotionModel for EmotionClassifier {
    fn labels(&self) -> &ResolvedLabels {
        &self.labels
    }

    fn logits(&self, text: &str) -> Result<Vec<f32>, ClassifierError> {
        self.forward(text)
    }
}

impl EmotionClassifier {
    /// Creates a new EmotionClassifierBuilder for fluent construction
    pub fn builder() -> super::builder::EmotionClassifierBuilder {
        super::builder::EmotionClassifierBuilder::new()
    }

    /// Returns information about the loaded model
    pub fn info(&self) -> ClassifierInfo {
        ClassifierInfo {
            model_path: self.model_path.clone(),
            tokenizer_path: self.tokenizer_path.clone(),
            model_type: self.model_type.clone(),
            num_outputs: self.num_outputs,
            labels: self.labels.table.as_slice().to_vec(),
            label_source: self.labels.source,
        }
    }

    /// Number of tokens the model sees for `text` after truncation.
    pub fn count_tokens(&self, text: &str) -> Result<usize, ClassifierError> {
        SequenceClassification::count_tokens(self, text)
    }

    /// Scores every emotion independently and returns those above `threshold`,
    /// highest first.
    pub fn predict(&self, text: &str, threshold: f32) -> Result<Vec<EmotionPrediction>, ClassifierError> {
        let probs = sigmoid_all(&self.logits(text)?);
        Ok(rank_emotions(&probs, &self.labels.table, threshold))
    }
}
