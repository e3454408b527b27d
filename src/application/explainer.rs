//! Explainer: picks the best available contribution source and ranks it.
//!
//! Per-instance attribution is preferred. Without it (or if it fails) the
//! classifier's global importances are used, signed by its coefficients
//! when it has them.

use crate::domain::{rank_contributions, FeatureVector, RiskFactor, Signs};
use crate::ports::ExplainError;

use super::ModelSnapshot;

/// Top `k` contributing factors for `vector` under `snapshot`.
///
/// # Errors
/// Returns `ExplainError` when no source is available or a source returns
/// the wrong number of values. Callers treat this as an empty explanation.
pub fn explain(
    snapshot: &ModelSnapshot,
    vector: &FeatureVector,
    k: usize,
) -> Result<Vec<RiskFactor>, ExplainError> {
    let columns = vector.columns().names();

    if let Some(attributor) = snapshot.attributor() {
        match attributor
            .attribute(vector.values())
            .and_then(|values| check_len(values, columns.len()))
        {
            Ok(values) => return Ok(rank_contributions(columns, &values, Signs::OfValues, k)),
            Err(e) => tracing::debug!("Attribution failed, using global importance: {}", e),
        }
    }

    let classifier = snapshot.classifier();
    let importances = classifier
        .feature_importances()
        .ok_or_else(|| ExplainError::Unavailable("model exposes no feature importances".into()))?;
    let importances = check_len(importances, columns.len())?;
    let signs = classifier
        .coefficients()
        .filter(|c| c.len() == columns.len());

    let signs = signs.as_deref().map_or(Signs::Unsigned, Signs::From);

    Ok(rank_contributions(columns, &importances, signs, k))
}

fn check_len(values: Vec<f64>, expected: usize) -> Result<Vec<f64>, ExplainError> {
    if values.len() == expected {
        Ok(values)
    } else {
        Err(ExplainError::Length {
            got: values.len(),
            expected,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::{ColumnOrder, DerivationConfig, EncoderRegistry, FactorDirection, PatientRecord};
    use crate::ports::{Attributor, Classifier, ClassifierError};

    struct Linear {
        importances: Option<Vec<f64>>,
        coefficients: Option<Vec<f64>>,
    }

    impl Classifier for Linear {
        fn predict(&self, _features: &[f64]) -> Result<u8, ClassifierError> {
            Ok(0)
        }

        fn feature_importances(&self) -> Option<Vec<f64>> {
            self.importances.clone()
        }

        fn coefficients(&self) -> Option<Vec<f64>> {
            self.coefficients.clone()
        }

        fn n_features(&self) -> usize {
            3
        }
    }

    struct Shap(Result<Vec<f64>, ExplainError>);

    impl Attributor for Shap {
        fn attribute(&self, _features: &[f64]) -> Result<Vec<f64>, ExplainError> {
            self.0.clone()
        }
    }

    fn columns() -> ColumnOrder {
        ColumnOrder::new("t", ["Age", "BMI", "Pack_Years"])
    }

    fn vector() -> FeatureVector {
        crate::domain::derive(
            &PatientRecord::default(),
            &EncoderRegistry::builtin(),
            &columns(),
            &DerivationConfig::default(),
        )
    }

    fn snapshot(linear: Linear) -> ModelSnapshot {
        ModelSnapshot::new(columns(), EncoderRegistry::builtin(), Arc::new(linear))
            .expect("valid snapshot")
    }

    #[test]
    fn test_prefers_attribution() {
        let s = snapshot(Linear {
            importances: Some(vec![9.0, 9.0, 9.0]),
            coefficients: None,
        })
        .with_attributor(Arc::new(Shap(Ok(vec![0.1, -0.4, 0.2]))));

        let factors = explain(&s, &vector(), 5).expect("explains");
        let names: Vec<_> = factors.iter().map(|f| f.feature_name.as_str()).collect();
        assert_eq!(names, vec!["BMI", "Pack_Years", "Age"]);
        assert_eq!(factors[0].direction, FactorDirection::Negative);
        assert!((factors[0].contribution - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_falls_back_to_signed_importance() {
        let s = snapshot(Linear {
            importances: Some(vec![0.5, 0.1, 0.9]),
            coefficients: Some(vec![-0.5, 0.1, 0.9]),
        })
        .with_attributor(Arc::new(Shap(Err(ExplainError::Unavailable("down".into())))));

        let factors = explain(&s, &vector(), 2).expect("explains");
        assert_eq!(factors.len(), 2);
        assert_eq!(factors[0].feature_name, "Pack_Years");
        assert_eq!(factors[1].feature_name, "Age");
        assert_eq!(factors[1].direction, FactorDirection::Negative);
    }

    #[test]
    fn test_unsigned_importance_is_positive() {
        let s = snapshot(Linear {
            importances: Some(vec![0.5, 0.0, 0.0]),
            coefficients: None,
        });
        let factors = explain(&s, &vector(), 5).expect("explains");
        assert_eq!(factors.len(), 3);
        assert!(factors.iter().all(|f| f.direction == FactorDirection::Positive));
    }

    #[test]
    fn test_no_source_is_unavailable() {
        let s = snapshot(Linear {
            importances: None,
            coefficients: None,
        });
        assert!(matches!(
            explain(&s, &vector(), 5),
            Err(ExplainError::Unavailable(_))
        ));

        let wrong = snapshot(Linear {
            importances: Some(vec![1.0]),
            coefficients: None,
        });
        assert!(matches!(
            explain(&wrong, &vector(), 5),
            Err(ExplainError::Length { got: 1, expected: 3 })
        ));
    }
}
