use std::collections::HashMap;

use ndarray::Array2;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{Encoding, Tokenizer};

use super::error::ClassifierError;

/// Runs a transformers sequence-classification model exported to ONNX.
///
/// The model is expected to:
/// - Accept `input_ids` and `attention_mask` (and optionally `token_type_ids`),
///   each of shape [batch_size, sequence_length]
/// - Output logits of shape [batch_size, num_labels] as its first output
///
/// Truncation to the maximum sequence length is configured on the tokenizer
/// itself, so long inputs are cut rather than rejected.
pub(crate) trait SequenceClassification {
    /// Returns the initialized tokenizer if available
    fn tokenizer(&self) -> Option<&Tokenizer>;

    /// Returns the initialized ONNX session if available
    fn session(&self) -> Option<&Session>;

    /// Encodes text with special tokens, truncated to the configured maximum length.
    fn encode(&self, text: &str) -> Result<Encoding, ClassifierError> {
        let tokenizer = self.tokenizer()
            .ok_or_else(|| ClassifierError::TokenizerError("Tokenizer not initialized".into()))?;

        tokenizer.encode(text, true)
            .map_err(|e| ClassifierError::TokenizerError(e.to_string()))
    }

    /// Number of tokens the model will actually see for `text`.
    fn count_tokens(&self, text: &str) -> Result<usize, ClassifierError> {
        self.encode(text).map(|encoding| encoding.get_ids().len())
    }

    /// Tokenizes `text` and runs one forward pass, returning the raw logits.
    ///
    /// # Errors
    /// - `TokenizerError` if the tokenizer is missing or encoding fails
    /// - `ModelError` if tensor creation, execution or output extraction fails
    fn forward(&self, text: &str) -> Result<Vec<f32>, ClassifierError> {
        let encoding = self.encode(text)?;
        let session = self.session()
            .ok_or_else(|| ClassifierError::ModelError("Session not initialized".into()))?;

        let seq_len = encoding.get_ids().len();
        let to_tensor = |values: &[u32], name: &str| -> Result<Tensor<i64>, ClassifierError> {
            let array = Array2::from_shape_vec(
                (1, seq_len),
                values.iter().map(|&x| x as i64).collect(),
            )
            .map_err(|e| ClassifierError::ModelError(format!("Failed to create {} array: {}", name, e)))?;
            Tensor::from_array(array)
                .map_err(|e| ClassifierError::ModelError(format!("Failed to create {} tensor: {}", name, e)))
        };

        let mut input_tensors = HashMap::new();
        input_tensors.insert("input_ids", to_tensor(encoding.get_ids(), "input_ids")?);
        input_tensors.insert("attention_mask", to_tensor(encoding.get_attention_mask(), "attention_mask")?);
        if session.inputs.iter().any(|input| input.name == "token_type_ids") {
            input_tensors.insert("token_type_ids", to_tensor(encoding.get_type_ids(), "token_type_ids")?);
        }

        let outputs = session.run(input_tensors)
            .map_err(|e| ClassifierError::ModelError(format!("Failed to run model: {}", e)))?;
        let logits = outputs[0].try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::ModelError(format!("Failed to extract output tensor: {}", e)))?;

        let shape = logits.shape();
        if shape.len() != 2 || shape[0] != 1 {
            return Err(ClassifierError::ModelError(format!(
                "Unexpected logits shape {:?}, expected [1, num_labels]",
                shape
            )));
        }

        Ok(logits.iter().copied().collect())
    }
}
