//! The trained model, seen from the outside as tensor in, probabilities out.

use std::path::Path;

use anyhow::Context;
use tract_onnx::prelude::*;
use tracing::info;

use crate::errors::{Error, Result};
use crate::preprocess::ImageTensor;

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

pub trait Classifier: Send + Sync {
    /// One probability per class, in label-set order.
    fn classify(&self, input: &ImageTensor) -> Result<Vec<f32>>;
}

/// ONNX model run through tract. Loaded and optimized once; `run` takes
/// `&self` so a single instance serves every worker.
pub struct OnnxClassifier {
    plan: OnnxPlan,
    input_shape: [usize; 4],
}

impl OnnxClassifier {
    /// Load the model at `path` with its input pinned to `[1, height, width, 3]`.
    pub fn load(path: &Path, width: u32, height: u32) -> anyhow::Result<Self> {
        let input_shape = [1, height as usize, width as usize, 3];

        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .with_context(|| format!("loading ONNX model from {}", path.display()))?
            .with_input_fact(0, f32::fact(input_shape).into())
            .context("setting model input shape")?
            .into_optimized()
            .context("optimizing model")?
            .into_runnable()
            .context("making model runnable")?;

        info!(path = %path.display(), ?input_shape, "Loaded classification model");
        Ok(Self { plan, input_shape })
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&self, input: &ImageTensor) -> Result<Vec<f32>> {
        if input.shape() != self.input_shape {
            return Err(Error::classifier(format!(
                "input shape {:?} does not match model input {:?}",
                input.shape(),
                self.input_shape
            )));
        }

        let array = input.as_array();
        let tensor = tract_ndarray::Array4::from_shape_vec(array.dim(), array.iter().copied().collect())
            .map_err(|e| Error::classifier(format!("building input tensor: {e}")))?
            .into_tensor();

        let outputs = self
            .plan
            .run(tvec!(tensor.into()))
            .map_err(|e| Error::classifier(format!("inference failed: {e}")))?;

        let output = outputs
            .first()
            .ok_or_else(|| Error::classifier("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| Error::classifier(format!("reading model output: {e}")))?;

        Ok(view.iter().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = OnnxClassifier::load(&dir.path().join("absent.onnx"), 128, 128)
            .err()
            .unwrap();
        assert!(err.to_string().contains("absent.onnx"));
    }

    #[test]
    fn test_garbage_model_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        std::fs::write(&path, b"not a protobuf").unwrap();
        assert!(OnnxClassifier::load(&path, 128, 128).is_err());
    }
}
