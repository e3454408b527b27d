//! Scorer: turns a feature vector into a positive-class probability.

use crate::domain::FeatureVector;
use crate::ports::{Classifier, ClassifierError};
use crate::LungscopeError;

fn failed(e: ClassifierError) -> LungscopeError {
    LungscopeError::PredictionFailed {
        reason: e.to_string(),
    }
}

/// Probability of the positive class for `vector`.
///
/// Uses the classifier's probability output when it has one, otherwise the
/// hard label as 0.0 or 1.0. Availability of the classifier is checked by
/// the caller before the pipeline starts.
///
/// # Errors
/// Returns `PredictionFailed` if the classifier errors or produces a value
/// outside [0, 1].
pub fn score(classifier: &dyn Classifier, vector: &FeatureVector) -> Result<f64, LungscopeError> {
    let features = vector.values();
    let probability = match classifier.predict_proba(features).map_err(failed)? {
        Some(p) => p,
        None => match classifier.predict(features).map_err(failed)? {
            0 => 0.0,
            1 => 1.0,
            other => {
                return Err(LungscopeError::PredictionFailed {
                    reason: format!("classifier returned label {other}, expected 0 or 1"),
                })
            }
        },
    };

    if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
        return Err(LungscopeError::PredictionFailed {
            reason: format!("probability {probability} outside [0, 1]"),
        });
    }
    Ok(probability)
}
