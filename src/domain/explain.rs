//! Ranking of per-feature contributions into top risk factors.

use serde::{Deserialize, Serialize};

/// Default number of factors reported per prediction.
pub const DEFAULT_TOP_K: usize = 5;

/// Whether a feature pushed the prediction up or down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactorDirection {
    Positive,
    Negative,
}

impl FactorDirection {
    /// `Positive` iff `signed > 0`.
    #[must_use]
    pub fn of(signed: f64) -> Self {
        if signed > 0.0 {
            Self::Positive
        } else {
            Self::Negative
        }
    }
}

/// A contributing feature, magnitude reported as an absolute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub feature_name: String,
    pub contribution: f64,
    pub direction: FactorDirection,
}

/// Where a factor's direction comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signs<'a> {
    /// Values are signed contributions; their own sign decides.
    OfValues,
    /// Direction follows the matching entry (model coefficients).
    From(&'a [f64]),
    /// Values are unsigned importances with nothing to sign them; every
    /// factor is `Positive`.
    Unsigned,
}

impl Signs<'_> {
    fn direction(&self, index: usize, value: f64) -> FactorDirection {
        match self {
            Self::OfValues => FactorDirection::of(value),
            Self::From(signs) => signs
                .get(index)
                .map_or(FactorDirection::Positive, |&s| FactorDirection::of(s)),
            Self::Unsigned => FactorDirection::Positive,
        }
    }
}

/// Rank `values` (one per column) by absolute magnitude and keep the top `k`.
///
/// Equal magnitudes keep column order. Non-finite values are dropped.
#[must_use]
pub fn rank_contributions(
    columns: &[String],
    values: &[f64],
    signs: Signs<'_>,
    k: usize,
) -> Vec<RiskFactor> {
    let mut indexed: Vec<(usize, f64)> = values
        .iter()
        .copied()
        .enumerate()
        .take(columns.len())
        .filter(|(_, v)| v.is_finite())
        .collect();

    // Stable sort keeps the lower index first on ties.
    indexed.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));

    indexed
        .into_iter()
        .take(k)
        .map(|(i, v)| RiskFactor {
            feature_name: columns[i].clone(),
            contribution: v.abs(),
            direction: signs.direction(i, v),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cols(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("f{i}")).collect()
    }

    #[test]
    fn test_ranked_by_absolute_value() {
        let factors = rank_contributions(&cols(4), &[0.1, -0.8, 0.3, 0.05], Signs::OfValues, 3);
        let names: Vec<_> = factors.iter().map(|f| f.feature_name.as_str()).collect();
        assert_eq!(names, vec!["f1", "f2", "f0"]);
        assert_eq!(factors[0].direction, FactorDirection::Negative);
        assert!((factors[0].contribution - 0.8).abs() < f64::EPSILON);
        assert_eq!(factors[1].direction, FactorDirection::Positive);
    }

    #[test]
    fn test_ties_keep_column_order() {
        let factors = rank_contributions(&cols(4), &[0.2, -0.5, 0.5, 0.2], Signs::OfValues, 4);
        let names: Vec<_> = factors.iter().map(|f| f.feature_name.as_str()).collect();
        assert_eq!(names, vec!["f1", "f2", "f0", "f3"]);
    }

    #[test]
    fn test_signs_override_direction() {
        let factors =
            rank_contributions(&cols(2), &[0.4, 0.6], Signs::From(&[1.5, -2.0]), DEFAULT_TOP_K);
        assert_eq!(factors[0].feature_name, "f1");
        assert_eq!(factors[0].direction, FactorDirection::Negative);
        assert_eq!(factors[1].direction, FactorDirection::Positive);
    }

    #[test]
    fn test_fewer_than_k_and_empty() {
        assert_eq!(rank_contributions(&cols(2), &[0.1, 0.2], Signs::OfValues, 5).len(), 2);
        assert!(rank_contributions(&[], &[], Signs::OfValues, 5).is_empty());
        assert!(rank_contributions(&cols(3), &[0.1, 0.2, 0.3], Signs::OfValues, 0).is_empty());
    }

    #[test]
    fn test_zero_signed_value_is_negative() {
        let factors = rank_contributions(&cols(1), &[0.0], Signs::OfValues, 1);
        assert_eq!(factors[0].direction, FactorDirection::Negative);
    }

    #[test]
    fn test_unsigned_importances_are_positive() {
        let factors = rank_contributions(&cols(3), &[0.0, 0.4, 0.0], Signs::Unsigned, 3);
        assert_eq!(factors[0].feature_name, "f1");
        assert!(factors
            .iter()
            .all(|f| f.direction == FactorDirection::Positive));
    }

    #[test]
    fn test_non_finite_values_dropped() {
        let factors = rank_contributions(&cols(3), &[f64::NAN, 0.2, f64::INFINITY], Signs::OfValues, 5);
        assert_eq!(factors.len(), 1);
        assert_eq!(factors[0].feature_name, "f1");
    }

    proptest! {
        #[test]
        fn prop_sorted_and_bounded(
            values in proptest::collection::vec(-10.0..10.0f64, 0..40),
            k in 0usize..10,
        ) {
            let columns = cols(values.len());
            let factors = rank_contributions(&columns, &values, Signs::OfValues, k);
            prop_assert!(factors.len() <= k);
            prop_assert!(factors.len() <= values.len());
            for pair in factors.windows(2) {
                prop_assert!(pair[0].contribution >= pair[1].contribution);
            }
            prop_assert_eq!(&factors, &rank_contributions(&columns, &values, Signs::OfValues, k));
        }
    }
}
