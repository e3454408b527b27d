//! Classifier port: the trained model, treated as an opaque scoring function.
//!
//! The pipeline never looks inside the model. It only needs a hard label,
//! optionally a positive-class probability, and optionally global feature
//! importances for explanations.

/// Errors raised by a classifier implementation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClassifierError {
    #[error("Feature count mismatch: got {got}, expected {expected}")]
    FeatureCount { got: usize, expected: usize },

    #[error("Non-finite model output: {0}")]
    NonFinite(f64),

    #[error("Inference failed: {0}")]
    Inference(String),
}

/// Trait for a trained binary classifier.
///
/// Implementations must be pure with respect to their inputs: the same
/// feature slice always gives the same output. They are shared across
/// threads behind an `Arc` and never mutated after loading.
pub trait Classifier: Send + Sync {
    /// Hard class prediction (0 or 1).
    ///
    /// # Errors
    /// Returns error if the features cannot be scored.
    fn predict(&self, features: &[f64]) -> Result<u8, ClassifierError>;

    /// Probability of the positive class, if the model exposes one.
    ///
    /// # Errors
    /// Returns error if the features cannot be scored.
    fn predict_proba(&self, _features: &[f64]) -> Result<Option<f64>, ClassifierError> {
        Ok(None)
    }

    /// Global (per-column, unsigned) feature importances.
    fn feature_importances(&self) -> Option<Vec<f64>> {
        None
    }

    /// Signed per-column coefficients, used to give importances a direction.
    fn coefficients(&self) -> Option<Vec<f64>> {
        None
    }

    /// Number of input features the model was trained on.
    fn n_features(&self) -> usize;
}
