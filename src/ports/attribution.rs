//! Attribution port: per-instance signed contributions (the SHAP role).

/// Errors raised while explaining a prediction.
///
/// These never fail a prediction; the service degrades to an empty factor
/// list.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExplainError {
    #[error("Explanation unavailable: {0}")]
    Unavailable(String),

    #[error("Attribution length mismatch: got {got}, expected {expected}")]
    Length { got: usize, expected: usize },
}

/// Trait for per-instance feature attribution.
pub trait Attributor: Send + Sync {
    /// Signed contribution of every feature to the positive-class output
    /// for this specific input, one value per column.
    ///
    /// # Errors
    /// Returns `ExplainError` if attribution cannot be computed.
    fn attribute(&self, features: &[f64]) -> Result<Vec<f64>, ExplainError>;
}
