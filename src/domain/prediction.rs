//! Prediction result types.
//!
//! A [`PredictionResult`] is built once per request by the prediction
//! service and never mutated afterwards.

use serde::{Deserialize, Serialize};

use super::explain::RiskFactor;
use super::risk::RiskTier;

/// Binary outcome at the decision threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictionLabel {
    /// Below threshold (negative class)
    Early,
    /// At or above threshold (positive class)
    Advanced,
}

impl PredictionLabel {
    /// Label for `probability` at `threshold`, inclusive.
    #[must_use]
    pub fn at_threshold(probability: f64, threshold: f64) -> Self {
        if probability >= threshold {
            Self::Advanced
        } else {
            Self::Early
        }
    }

    /// 0 for `Early`, 1 for `Advanced`.
    #[must_use]
    pub fn code(&self) -> u8 {
        match self {
            Self::Early => 0,
            Self::Advanced => 1,
        }
    }
}

impl std::fmt::Display for PredictionLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Early => write!(f, "Early"),
            Self::Advanced => write!(f, "Advanced"),
        }
    }
}

/// Complete result of one prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Unique identifier
    pub id: String,

    /// Caller's patient reference, if the record carried one
    pub patient_id: Option<String>,

    pub prediction: PredictionLabel,
    pub prediction_code: u8,

    /// Probability of the positive class, [0, 1]
    pub probability: f64,

    pub risk_tier: RiskTier,

    /// Tier as reported under the active profile
    pub risk_label: String,

    /// Distance from the decision boundary, [0, 1]
    pub confidence: f64,

    pub requires_review: bool,

    /// Best-effort; empty when no explanation source is available
    pub top_factors: Vec<RiskFactor>,

    pub recommendation: String,

    pub model_version: String,

    pub created_at: chrono::DateTime<chrono::Utc>,

    pub processing_time_ms: f64,
}

impl PredictionResult {
    /// Copy with the per-call fields (id, timestamp, timing) blanked, for
    /// comparing two runs.
    #[must_use]
    pub fn without_call_metadata(&self) -> Self {
        Self {
            id: String::new(),
            created_at: chrono::DateTime::<chrono::Utc>::UNIX_EPOCH,
            processing_time_ms: 0.0,
            ..self.clone()
        }
    }
}

/// Outcome of one record in a batch run that continues past failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BatchItem {
    Success { result: Box<PredictionResult> },
    Error { message: String },
}

impl BatchItem {
    #[must_use]
    pub fn result(&self) -> Option<&PredictionResult> {
        match self {
            Self::Success { result } => Some(result),
            Self::Error { .. } => None,
        }
    }
}

/// Results of a batch request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub items: Vec<BatchItem>,
    pub total_processed: usize,
    pub processing_time_ms: f64,
}

/// Generate a UUID v4 (random) using a CSPRNG.
///
/// ChaCha20Rng seeded from OS entropy, so ids cannot be predicted from
/// earlier ones.
pub(crate) fn uuid_v4() -> String {
    use rand::Rng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    let mut rng = ChaCha20Rng::from_entropy();
    let mut bytes: [u8; 16] = rng.gen();
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_at_threshold() {
        assert_eq!(PredictionLabel::at_threshold(0.5, 0.5), PredictionLabel::Advanced);
        assert_eq!(PredictionLabel::at_threshold(0.49, 0.5), PredictionLabel::Early);
        assert_eq!(PredictionLabel::Advanced.code(), 1);
        assert_eq!(PredictionLabel::Early.to_string(), "Early");
    }

    #[test]
    fn test_uuid_generation() {
        let id1 = uuid_v4();
        let id2 = uuid_v4();
        assert_ne!(id1, id2);
        assert_eq!(id1.len(), 36);
        assert_eq!(&id1[14..15], "4");
    }

    #[test]
    fn test_batch_item_serialization() {
        let item = BatchItem::Error {
            message: "bad age".into(),
        };
        let json = serde_json::to_value(&item).expect("serialize");
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "bad age");
        assert!(item.result().is_none());
    }
}
