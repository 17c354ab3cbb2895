#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use emotion_api::{
    ClassifierError, EmotionModel, EmotionService, LabelSource, LabelTable, LoadError, ModelLoader,
    ResolvedLabels,
};
use tokio::sync::Notify;

/// Returns the same logits for every input.
pub struct StaticModel {
    pub labels: ResolvedLabels,
    pub logits: Vec<f32>,
}

impl EmotionModel for StaticModel {
    fn labels(&self) -> &ResolvedLabels {
        &self.labels
    }

    fn logits(&self, _text: &str) -> Result<Vec<f32>, ClassifierError> {
        Ok(self.logits.clone())
    }
}

/// Always fails at inference time.
pub struct BrokenModel {
    pub labels: ResolvedLabels,
}

impl EmotionModel for BrokenModel {
    fn labels(&self) -> &ResolvedLabels {
        &self.labels
    }

    fn logits(&self, _text: &str) -> Result<Vec<f32>, ClassifierError> {
        Err(ClassifierError::PredictionError("session run failed".to_string()))
    }
}

pub fn goemotions() -> ResolvedLabels {
    ResolvedLabels {
        table: LabelTable::goemotions(),
        source: LabelSource::Fallback,
    }
}

/// Logits over the 28 GoEmotions classes: joy (17) and excitement (13) high,
/// everything else strongly negative.
pub fn happy_logits() -> Vec<f32> {
    let mut logits = vec![-6.0; 28];
    logits[17] = 3.0;
    logits[13] = 1.0;
    logits
}

pub enum Behavior {
    Ready(Arc<dyn EmotionModel>),
    Fail(String),
}

/// Loader that counts attempts and can be held open until released.
pub struct TestLoader {
    behavior: Behavior,
    pub calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

impl TestLoader {
    pub fn ready(model: impl EmotionModel + 'static) -> Arc<Self> {
        Arc::new(Self {
            behavior: Behavior::Ready(Arc::new(model)),
            calls: AtomicUsize::new(0),
            gate: None,
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            behavior: Behavior::Fail(message.to_string()),
            calls: AtomicUsize::new(0),
            gate: None,
        })
    }

    pub fn gated(model: impl EmotionModel + 'static, gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            behavior: Behavior::Ready(Arc::new(model)),
            calls: AtomicUsize::new(0),
            gate: Some(gate),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelLoader for TestLoader {
    async fn load(&self) -> Result<Arc<dyn EmotionModel>, LoadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match &self.behavior {
            Behavior::Ready(model) => Ok(Arc::clone(model)),
            Behavior::Fail(message) => Err(LoadError::Task(message.clone())),
        }
    }
}

pub fn service_with(loader: Arc<TestLoader>) -> EmotionService {
    EmotionService::new(loader, "test/goemotions")
}

pub fn happy_service() -> EmotionService {
    service_with(TestLoader::ready(StaticModel {
        labels: goemotions(),
        logits: happy_logits(),
    }))
}
