use crate::errors::{Error, Result};
use crate::labels::ClassLabelSet;
use crate::models::PredictionResult;

/// Below this the top class is not trusted.
pub const CONFIDENCE_THRESHOLD: f32 = 0.5;

/// Label reported when the top class falls under [`CONFIDENCE_THRESHOLD`].
pub const UNKNOWN_LABEL: &str = "Unknown disease";

#[derive(Debug, Clone)]
pub struct DecisionPolicy {
    labels: ClassLabelSet,
}

/// Index of the largest value, first occurrence on ties. NaN never wins.
fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

impl DecisionPolicy {
    pub fn new(labels: ClassLabelSet) -> Self {
        Self { labels }
    }

    pub fn labels(&self) -> &ClassLabelSet {
        &self.labels
    }

    /// Pick the top class, or the unknown label if it is not confident enough.
    /// The confidence is reported as computed either way.
    pub fn decide(&self, probabilities: &[f32]) -> Result<PredictionResult> {
        if probabilities.len() != self.labels.len() {
            return Err(Error::classifier(format!(
                "model returned {} scores for {} labels",
                probabilities.len(),
                self.labels.len()
            )));
        }

        let idx = argmax(probabilities).ok_or_else(|| Error::classifier("model returned no usable scores"))?;
        let confidence = probabilities[idx];

        let label = if confidence < CONFIDENCE_THRESHOLD {
            UNKNOWN_LABEL
        } else {
            self.labels
                .get(idx)
                .ok_or_else(|| Error::classifier(format!("no label at index {idx}")))?
        };

        Ok(PredictionResult {
            label: label.to_string(),
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> DecisionPolicy {
        let labels = ClassLabelSet::new(vec!["blight".into(), "healthy".into(), "rust".into()]).unwrap();
        DecisionPolicy::new(labels)
    }

    #[test]
    fn test_confident_prediction() {
        let result = policy().decide(&[0.1, 0.85, 0.05]).unwrap();
        assert_eq!(
            result,
            PredictionResult {
                label: "healthy".into(),
                confidence: 0.85
            }
        );
    }

    #[test]
    fn test_low_confidence_is_unknown() {
        let result = policy().decide(&[0.3, 0.3, 0.4]).unwrap();
        assert_eq!(result.label, UNKNOWN_LABEL);
        assert_eq!(result.confidence, 0.4);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let result = policy().decide(&[0.5, 0.25, 0.25]).unwrap();
        assert_eq!(result.label, "blight");

        let result = policy().decide(&[0.25, 0.49999, 0.25]).unwrap();
        assert_eq!(result.label, UNKNOWN_LABEL);
    }

    #[test]
    fn test_ties_pick_first() {
        assert_eq!(argmax(&[0.2, 0.5, 0.5]), Some(1));
        let result = policy().decide(&[0.0, 0.5, 0.5]).unwrap();
        assert_eq!(result.label, "healthy");
    }

    #[test]
    fn test_nan_ignored() {
        assert_eq!(argmax(&[f32::NAN, 0.1, 0.9]), Some(2));
        assert_eq!(argmax(&[f32::NAN, f32::NAN]), None);
        assert!(matches!(
            policy().decide(&[f32::NAN, f32::NAN, f32::NAN]),
            Err(Error::ClassifierFailure { .. })
        ));
    }

    #[test]
    fn test_length_mismatch_is_classifier_failure() {
        assert!(matches!(
            policy().decide(&[0.9, 0.1]),
            Err(Error::ClassifierFailure { .. })
        ));
        assert!(matches!(policy().decide(&[]), Err(Error::ClassifierFailure { .. })));
    }

    #[test]
    fn test_deterministic() {
        let p = policy();
        let v = [0.05, 0.15, 0.8];
        assert_eq!(p.decide(&v).unwrap(), p.decide(&v).unwrap());
    }
}
