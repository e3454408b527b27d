//! Probability → risk tier, confidence and review flag.
//!
//! Exactly one [`ThresholdTable`] is active per deployment. Every tier's
//! lower bound is inclusive, so a probability sitting on a boundary lands
//! in the higher tier.

use serde::{Deserialize, Serialize};

/// Ordinal risk classification.
///
/// Ordering follows severity, so `Low < Moderate < High < VeryHigh`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
    /// No significant indicators
    Low,
    /// Follow-up recommended ("medium" in the three-tier profile)
    Moderate,
    /// Specialist evaluation recommended
    High,
    /// Urgent evaluation recommended
    VeryHigh,
}

impl RiskTier {
    /// Label under a given profile.
    #[must_use]
    pub fn label(&self, profile: TierProfile) -> &'static str {
        match (profile, self) {
            (TierProfile::ThreeTier, Self::Low) => "low",
            (TierProfile::ThreeTier, Self::Moderate) => "medium",
            (TierProfile::ThreeTier, Self::High | Self::VeryHigh) => "high",
            (TierProfile::FourTier, Self::Low) => "LOW",
            (TierProfile::FourTier, Self::Moderate) => "MODERATE",
            (TierProfile::FourTier, Self::High) => "HIGH",
            (TierProfile::FourTier, Self::VeryHigh) => "VERY_HIGH",
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label(TierProfile::FourTier))
    }
}

/// Which risk scale a deployment reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierProfile {
    /// LOW / MODERATE / HIGH / VERY_HIGH
    #[default]
    FourTier,
    /// low / medium / high
    ThreeTier,
}

impl std::str::FromStr for TierProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "four_tier" | "4" | "four" => Ok(Self::FourTier),
            "three_tier" | "3" | "three" => Ok(Self::ThreeTier),
            other => Err(format!("unknown tier profile: {other}")),
        }
    }
}

/// Lower bounds of each tier above `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdTable {
    pub profile: TierProfile,
    pub moderate: f64,
    pub high: f64,
    /// Absent in the three-tier profile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub very_high: Option<f64>,
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self::four_tier()
    }
}

impl ThresholdTable {
    /// LOW <0.3, MODERATE [0.3,0.5), HIGH [0.5,0.7), VERY_HIGH >=0.7.
    #[must_use]
    pub fn four_tier() -> Self {
        Self {
            profile: TierProfile::FourTier,
            moderate: 0.3,
            high: 0.5,
            very_high: Some(0.7),
        }
    }

    /// low <0.4, medium [0.4,0.7), high >=0.7.
    #[must_use]
    pub fn three_tier() -> Self {
        Self {
            profile: TierProfile::ThreeTier,
            moderate: 0.4,
            high: 0.7,
            very_high: None,
        }
    }

    #[must_use]
    pub fn for_profile(profile: TierProfile) -> Self {
        match profile {
            TierProfile::FourTier => Self::four_tier(),
            TierProfile::ThreeTier => Self::three_tier(),
        }
    }

    /// Check that bounds lie in (0, 1], ascend strictly, and match the profile.
    ///
    /// # Errors
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        let mut bounds = vec![self.moderate, self.high];
        match (self.profile, self.very_high) {
            (TierProfile::FourTier, Some(v)) => bounds.push(v),
            (TierProfile::FourTier, None) => {
                return Err("four_tier profile requires a very_high bound".into())
            }
            (TierProfile::ThreeTier, Some(_)) => {
                return Err("three_tier profile must not set very_high".into())
            }
            (TierProfile::ThreeTier, None) => {}
        }

        if bounds.iter().any(|b| !b.is_finite() || *b <= 0.0 || *b > 1.0) {
            return Err(format!("tier bounds must lie in (0, 1]: {bounds:?}"));
        }
        if bounds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(format!("tier bounds must be strictly ascending: {bounds:?}"));
        }
        Ok(())
    }

    /// Tier for a probability.
    #[must_use]
    pub fn tier(&self, probability: f64) -> RiskTier {
        if self.very_high.is_some_and(|v| probability >= v) {
            RiskTier::VeryHigh
        } else if probability >= self.high {
            RiskTier::High
        } else if probability >= self.moderate {
            RiskTier::Moderate
        } else {
            RiskTier::Low
        }
    }
}

/// Inclusive probability band flagged for manual review.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReviewBand {
    pub lower: f64,
    pub upper: f64,
}

impl Default for ReviewBand {
    fn default() -> Self {
        Self {
            lower: 0.3,
            upper: 0.7,
        }
    }
}

impl ReviewBand {
    #[must_use]
    pub fn contains(&self, probability: f64) -> bool {
        (self.lower..=self.upper).contains(&probability)
    }
}

/// Output of [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub tier: RiskTier,
    pub requires_review: bool,
    pub confidence: f64,
}

/// Distance from the 0.5 decision boundary, scaled to [0, 1].
///
/// Not a calibrated confidence.
#[must_use]
pub fn confidence(probability: f64) -> f64 {
    ((probability - 0.5).abs() * 2.0).clamp(0.0, 1.0)
}

/// Classify a probability under the active table and review band.
#[must_use]
pub fn classify(probability: f64, table: &ThresholdTable, review: &ReviewBand) -> RiskAssessment {
    RiskAssessment {
        tier: table.tier(probability),
        requires_review: review.contains(probability),
        confidence: confidence(probability),
    }
}
