//! Logistic adapter: Implementation of Classifier and Attributor.
//!
//! Scores a standardised linear model exported by the training pipeline:
//!
//! ```text
//! z_i   = (x_i - mean_i) / std_i
//! logit = intercept + Σ coef_i * z_i
//! p     = 1 / (1 + e^-logit)
//! ```
//!
//! Because the model is linear in `z`, the attribution `coef_i * z_i` is the
//! exact per-feature contribution to the logit relative to the training
//! mean, so this adapter doubles as the per-instance explainer.

use serde::{Deserialize, Serialize};

use crate::adapters::ArtifactError;
use crate::ports::{Attributor, Classifier, ClassifierError, ExplainError};

/// Scaler standard deviations below this are treated as 1 (constant column).
const MIN_STD: f64 = 1e-12;

/// Model parameters exported by the training pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedLogisticModel {
    pub feature_names: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub scaler_mean: Vec<f64>,
    pub scaler_std: Vec<f64>,
}

/// Logistic-regression classifier over standardised features.
#[derive(Debug, Clone)]
pub struct LogisticModel {
    params: ExportedLogisticModel,
    std_inv: Vec<f64>,
}

impl LogisticModel {
    /// Build from exported parameters after checking their shape.
    ///
    /// # Errors
    /// Returns `ArtifactError::InvalidModel` on empty, mismatched or
    /// non-finite parameters.
    pub fn new(params: ExportedLogisticModel) -> Result<Self, ArtifactError> {
        let n = params.feature_names.len();
        if n == 0 {
            return Err(ArtifactError::InvalidModel("model has no features".into()));
        }
        if params.coefficients.len() != n
            || params.scaler_mean.len() != n
            || params.scaler_std.len() != n
        {
            return Err(ArtifactError::InvalidModel(
                "Model parameter lengths do not match feature_names length".into(),
            ));
        }
        let all_finite = params
            .coefficients
            .iter()
            .chain(&params.scaler_mean)
            .chain(&params.scaler_std)
            .chain(std::iter::once(&params.intercept))
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(ArtifactError::InvalidModel(
                "model parameters must be finite".into(),
            ));
        }

        let std_inv = params
            .scaler_std
            .iter()
            .map(|s| if s.abs() < MIN_STD { 1.0 } else { 1.0 / s })
            .collect();

        Ok(Self { params, std_inv })
    }

    /// Parse and build from JSON text.
    ///
    /// # Errors
    /// Returns error if the JSON is malformed or the parameters invalid.
    pub fn from_json(content: &str) -> Result<Self, ArtifactError> {
        let params: ExportedLogisticModel = serde_json::from_str(content)
            .map_err(|e| ArtifactError::InvalidModel(e.to_string()))?;
        Self::new(params)
    }

    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.params.feature_names
    }

    fn check_len(&self, features: &[f64]) -> Result<(), ClassifierError> {
        let expected = self.params.feature_names.len();
        if features.len() != expected {
            return Err(ClassifierError::FeatureCount {
                got: features.len(),
                expected,
            });
        }
        Ok(())
    }

    fn standardize<'a>(&'a self, features: &'a [f64]) -> impl Iterator<Item = f64> + 'a {
        features
            .iter()
            .zip(&self.params.scaler_mean)
            .zip(&self.std_inv)
            .map(|((x, mean), inv)| (x - mean) * inv)
    }

    /// Per-feature terms `coef_i * z_i` of the logit.
    fn terms(&self, features: &[f64]) -> Vec<f64> {
        self.standardize(features)
            .zip(&self.params.coefficients)
            .map(|(z, c)| c * z)
            .collect()
    }

    fn logit(&self, features: &[f64]) -> f64 {
        self.params.intercept + self.terms(features).iter().sum::<f64>()
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl Classifier for LogisticModel {
    fn predict(&self, features: &[f64]) -> Result<u8, ClassifierError> {
        self.check_len(features)?;
        Ok(u8::from(self.logit(features) >= 0.0))
    }

    fn predict_proba(&self, features: &[f64]) -> Result<Option<f64>, ClassifierError> {
        self.check_len(features)?;
        let p = sigmoid(self.logit(features));
        if !p.is_finite() {
            return Err(ClassifierError::NonFinite(p));
        }
        Ok(Some(p))
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        Some(self.params.coefficients.iter().map(|c| c.abs()).collect())
    }

    fn coefficients(&self) -> Option<Vec<f64>> {
        Some(self.params.coefficients.clone())
    }

    fn n_features(&self) -> usize {
        self.params.feature_names.len()
    }
}

impl Attributor for LogisticModel {
    fn attribute(&self, features: &[f64]) -> Result<Vec<f64>, ExplainError> {
        let expected = self.params.feature_names.len();
        if features.len() != expected {
            return Err(ExplainError::Length {
                got: features.len(),
                expected,
            });
        }
        Ok(self.terms(features))
    }
}
