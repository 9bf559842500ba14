//! Bytes in, decision out: normalize, classify, decide.

use std::sync::Arc;

use tracing::debug;

use crate::classifier::Classifier;
use crate::decision::DecisionPolicy;
use crate::errors::Result;
use crate::models::PredictionResult;
use crate::preprocess::ImageNormalizer;

#[derive(Clone)]
pub struct Predictor {
    normalizer: ImageNormalizer,
    classifier: Arc<dyn Classifier>,
    policy: DecisionPolicy,
}

impl Predictor {
    pub fn new(normalizer: ImageNormalizer, classifier: Arc<dyn Classifier>, policy: DecisionPolicy) -> Self {
        Self {
            normalizer,
            classifier,
            policy,
        }
    }

    /// CPU-bound; call from a blocking context.
    pub fn predict(&self, bytes: &[u8]) -> Result<PredictionResult> {
        let tensor = self.normalizer.normalize(bytes)?;
        debug!(shape = ?tensor.shape(), "Image normalized");

        let probabilities = self.classifier.classify(&tensor)?;
        self.policy.decide(&probabilities)
    }
}
