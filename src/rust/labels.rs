//! GoEmotions label taxonomy and label-table resolution.
//!
//! The fixed table is only a fallback: a model that ships its own, properly
//! named `id2label` table of the right size keeps it. The choice is made once,
//! when the model is loaded.

use std::collections::HashMap;

use log::warn;

/// The 27 GoEmotions emotions plus `neutral`, in class-index order.
pub const GOEMOTIONS_LABELS: [&str; 28] = [
    "admiration", "amusement", "anger", "annoyance", "approval", "caring",
    "confusion", "curiosity", "desire", "disappointment", "disapproval", "disgust",
    "embarrassment", "excitement", "fear", "gratitude", "grief", "joy",
    "love", "nervousness", "optimism", "pride", "realization", "relief",
    "remorse", "sadness", "surprise", "neutral",
];

/// Prefix used by auto-generated label names (`LABEL_0`, `LABEL_1`, ...).
pub const PLACEHOLDER_PREFIX: &str = "LABEL_";

/// Ordered label names; position is the class index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    pub fn new(labels: Vec<impl Into<String>>) -> Self {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// The fixed GoEmotions table.
    pub fn goemotions() -> Self {
        Self::new(GOEMOTIONS_LABELS.to_vec())
    }

    /// Builds a table from a model config `id2label` map.
    ///
    /// Keys are stringified class indices. Returns `None` when a key is not an
    /// index or the indices do not cover `0..len` exactly.
    pub fn from_id2label(id2label: &HashMap<String, String>) -> Option<Self> {
        let mut slots: Vec<Option<String>> = vec![None; id2label.len()];
        for (key, label) in id2label {
            let index: usize = key.trim().parse().ok()?;
            let slot = slots.get_mut(index)?;
            *slot = Some(label.clone());
        }
        slots.into_iter().collect::<Option<Vec<_>>>().map(|labels| Self { labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }

    /// True if any entry is an auto-generated placeholder name.
    pub fn has_placeholders(&self) -> bool {
        self.labels.iter().any(|label| is_placeholder(label))
    }
}

/// Whether `label` looks like an auto-generated name such as `LABEL_3`.
pub fn is_placeholder(label: &str) -> bool {
    label.starts_with(PLACEHOLDER_PREFIX)
}

/// Where the resolved label table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelSource {
    /// The model's own `id2label` table.
    Model,
    /// The fixed GoEmotions table.
    Fallback,
}

/// Label table chosen for a loaded model, together with its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLabels {
    pub table: LabelTable,
    pub source: LabelSource,
}

impl ResolvedLabels {
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Replaces the model's label table with the fixed GoEmotions table when the
/// sizes match.
///
/// Returns `true` if the table was installed. On a size mismatch (or when the
/// model has no table at all) the model's labels are left untouched and a
/// warning is logged.
pub fn install_fallback(model_labels: &mut Option<LabelTable>) -> bool {
    match model_labels {
        Some(table) if table.len() == GOEMOTIONS_LABELS.len() => {
            *table = LabelTable::goemotions();
            true
        }
        Some(table) => {
            warn!(
                "Could not update model config - size mismatch: model has {} labels, expected {}",
                table.len(),
                GOEMOTIONS_LABELS.len()
            );
            false
        }
        None => {
            warn!(
                "Could not update model config - size mismatch: model has unknown labels, expected {}",
                GOEMOTIONS_LABELS.len()
            );
            false
        }
    }
}

/// Picks the label table used for every prediction of a loaded model.
///
/// The model's table wins if it has exactly `num_outputs` entries and none of
/// them is a placeholder; otherwise the fixed table is used.
pub fn resolve(model_labels: Option<&LabelTable>, num_outputs: usize) -> ResolvedLabels {
    match model_labels {
        Some(table) if table.len() == num_outputs && !table.has_placeholders() => ResolvedLabels {
            table: table.clone(),
            source: LabelSource::Model,
        },
        _ => {
            if num_outputs != GOEMOTIONS_LABELS.len() {
                warn!(
                    "Model output size ({}) doesn't match expected labels ({})",
                    num_outputs,
                    GOEMOTIONS_LABELS.len()
                );
            }
            ResolvedLabels {
                table: LabelTable::goemotions(),
                source: LabelSource::Fallback,
            }
        }
    }
}
