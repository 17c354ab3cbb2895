use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::error::ClassifierError;
use crate::labels::LabelTable;

/// The parts of a transformers `config.json` the classifier cares about.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub id2label: Option<HashMap<String, String>>,
    #[serde(default)]
    pub model_type: Option<String>,
    #[serde(default)]
    pub problem_type: Option<String>,
}

impl ModelConfig {
    pub fn from_file(path: &Path) -> Result<Self, ClassifierError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| ClassifierError::BuildError(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ClassifierError> {
        serde_json::from_str(raw)
            .map_err(|e| ClassifierError::BuildError(format!("Invalid model config: {}", e)))
    }

    /// The model's own label table, if `id2label` is present and well formed.
    pub fn label_table(&self) -> Option<LabelTable> {
        self.id2label.as_ref().and_then(LabelTable::from_id2label)
    }
}
