use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokenizers::{PaddingParams, Tokenizer, TruncationParams};
use ort::session::Session;
use log::{info, error};

use super::error::ClassifierError;
use super::inference::SequenceClassification;
use super::classifier::EmotionClassifier;
use super::model::ModelConfig;
use crate::labels;
use crate::model_manager::{CONFIG_FILE_NAME, MODEL_FILE_NAME, TOKENIZER_FILE_NAME};
use crate::runtime::{RuntimeConfig, create_session_builder};

/// Maximum number of tokens fed to the model; longer inputs are truncated.
pub const DEFAULT_MAX_SEQUENCE_LENGTH: usize = 512;

const PROBE_TEXT: &str = "Test input to infer the number of labels";

/// A builder for constructing an EmotionClassifier with a fluent interface.
#[derive(Debug)]
pub struct EmotionClassifierBuilder {
    model_path: Option<PathBuf>,
    tokenizer_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
    max_sequence_length: usize,
    runtime_config: RuntimeConfig,
}

impl Default for EmotionClassifierBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Tokenizer and session borrowed during `build`, before the classifier exists.
struct Probe<'a> {
    tokenizer: &'a Tokenizer,
    session: &'a Session,
}

impl SequenceClassification for Probe<'_> {
    fn tokenizer(&self) -> Option<&Tokenizer> {
        Some(self.tokenizer)
    }

    fn session(&self) -> Option<&Session> {
        Some(self.session)
    }
}

impl EmotionClassifierBuilder {
    /// Creates a new empty builder with default configuration
    pub fn new() -> Self {
        Self {
            model_path: None,
            tokenizer_path: None,
            config_path: None,
            max_sequence_length: DEFAULT_MAX_SEQUENCE_LENGTH,
            runtime_config: RuntimeConfig::default(),
        }
    }

    /// Sets the runtime configuration for ONNX model execution
    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime_config = config;
        self
    }

    /// Overrides the truncation length (512 tokens by default).
    pub fn with_max_sequence_length(mut self, max_sequence_length: usize) -> Self {
        self.max_sequence_length = max_sequence_length;
        self
    }

    /// Uses the artifacts of a model directory: `model.onnx`, `tokenizer.json`
    /// and, if present, `config.json`.
    ///
    /// # Example
    /// ```no_run
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// use emotion_api::EmotionClassifier;
    ///
    /// let classifier = EmotionClassifier::builder()
    ///     .with_model_dir("models/goemotions")?
    ///     .build()?;
    /// let emotions = classifier.predict("I am so happy today!", 0.05)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_model_dir(self, model_dir: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let dir = model_dir.as_ref();
        let config_path = dir.join(CONFIG_FILE_NAME);
        self.with_custom_model(
            dir.join(MODEL_FILE_NAME),
            dir.join(TOKENIZER_FILE_NAME),
            config_path.exists().then_some(config_path),
        )
    }

    /// Sets explicit model, tokenizer and (optional) config paths.
    ///
    /// # Errors
    /// - the paths are already set
    /// - a given file does not exist
    pub fn with_custom_model(
        mut self,
        model_path: impl Into<PathBuf>,
        tokenizer_path: impl Into<PathBuf>,
        config_path: Option<PathBuf>,
    ) -> Result<Self, ClassifierError> {
        if self.model_path.is_some() || self.tokenizer_path.is_some() {
            return Err(ClassifierError::BuildError("Model and tokenizer paths already set".to_string()));
        }

        let model_path = model_path.into();
        let tokenizer_path = tokenizer_path.into();
        for path in [Some(&model_path), Some(&tokenizer_path), config_path.as_ref()].into_iter().flatten() {
            if !path.exists() {
                return Err(ClassifierError::BuildError(format!("File not found: {}", path.display())));
            }
        }

        self.model_path = Some(model_path);
        self.tokenizer_path = Some(tokenizer_path);
        self.config_path = config_path;
        Ok(self)
    }

    fn load_tokenizer(&self, path: &Path) -> Result<Tokenizer, ClassifierError> {
        let mut tokenizer = Tokenizer::from_file(path)
            .map_err(|e| {
                error!("Failed to load tokenizer: {}", e);
                ClassifierError::BuildError(format!("Failed to load tokenizer: {}", e))
            })?;

        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: self.max_sequence_length,
                ..Default::default()
            }))
            .map_err(|e| ClassifierError::BuildError(format!("Failed to set truncation: {}", e)))?;
        tokenizer.with_padding(Some(PaddingParams::default()));

        info!("Tokenizer loaded successfully");
        Ok(tokenizer)
    }

    /// Loads tokenizer, session and label metadata and returns the classifier.
    ///
    /// The number of output classes is measured with one probe inference, and
    /// the label table is resolved against it once, here.
    pub fn build(self) -> Result<EmotionClassifier, ClassifierError> {
        let (model_path, tokenizer_path) = match (&self.model_path, &self.tokenizer_path) {
            (Some(model), Some(tokenizer)) => (model.clone(), tokenizer.clone()),
            _ => return Err(ClassifierError::BuildError("Model and tokenizer paths must be set".to_string())),
        };

        let tokenizer = self.load_tokenizer(&tokenizer_path)?;

        let session = create_session_builder(&self.runtime_config)?
            .commit_from_file(&model_path)?;
        Self::validate_model(&session)?;
        info!("Model structure validated successfully");

        let config = match &self.config_path {
            Some(path) => ModelConfig::from_file(path)?,
            None => ModelConfig::default(),
        };

        let mut model_labels = config.label_table();
        if labels::install_fallback(&mut model_labels) {
            info!("Updated model config with GoEmotions labels");
        }

        let num_outputs = Probe { tokenizer: &tokenizer, session: &session }
            .forward(PROBE_TEXT)?
            .len();
        if num_outputs == 0 {
            return Err(ClassifierError::BuildError("Model produced no logits".to_string()));
        }
        info!("Inferred {} output classes from model", num_outputs);

        let resolved = labels::resolve(model_labels.as_ref(), num_outputs);
        info!("Using {:?} label table ({} labels)", resolved.source, resolved.len());

        Ok(EmotionClassifier {
            model_path,
            tokenizer_path,
            tokenizer: Arc::new(tokenizer),
            session: Arc::new(session),
            labels: resolved,
            num_outputs,
            model_type: config.model_type,
        })
    }

    /// Validates that the model has the expected input/output structure
    fn validate_model(session: &Session) -> Result<(), ClassifierError> {
        for required in ["input_ids", "attention_mask"] {
            if !session.inputs.iter().any(|input| input.name == required) {
                return Err(ClassifierError::ModelError(format!(
                    "Model is missing required input '{}'",
                    required
                )));
            }
        }

        if session.outputs.is_empty() {
            return Err(ClassifierError::ModelError(
                "Model must have at least 1 output for logits".to_string()
            ));
        }

        Ok(())
    }
}
