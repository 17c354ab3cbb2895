use super::EmotionPrediction;
use crate::labels::LabelTable;

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Independent per-class probabilities (multi-label, not a softmax).
pub fn sigmoid_all(logits: &[f32]) -> Vec<f32> {
    logits.iter().map(|&x| sigmoid(x)).collect()
}

/// Keeps classes scoring strictly above `threshold` that have a label, sorted
/// by score, highest first. Equal scores keep class-index order.
pub fn rank_emotions(probs: &[f32], labels: &LabelTable, threshold: f32) -> Vec<EmotionPrediction> {
    let mut emotions: Vec<EmotionPrediction> = probs
        .iter()
        .enumerate()
        .filter(|&(_, &score)| score > threshold)
        .filter_map(|(i, &score)| {
            labels.get(i).map(|label| EmotionPrediction {
                label: label.to_string(),
                score,
            })
        })
        .collect();

    emotions.sort_by(|a, b| b.score.total_cmp(&a.score));
    emotions
}
