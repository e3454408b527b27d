//! Clinical recommendation text per risk tier.

use super::risk::{RiskTier, TierProfile};

/// Recommendation for a tier under the active profile.
///
/// The three-tier profile's top tier gets the urgent referral text, since
/// it covers everything at or above 0.7.
#[must_use]
pub fn recommend(tier: RiskTier, profile: TierProfile) -> &'static str {
    match (profile, tier) {
        (_, RiskTier::Low) => {
            "Low risk detected. Continue routine check-ups and maintain healthy habits."
        }
        (TierProfile::FourTier, RiskTier::Moderate) => {
            "Medical follow-up recommended within the next 3 months."
        }
        (TierProfile::ThreeTier, RiskTier::Moderate) => {
            "Medical follow-up required. Consider a low-dose CT scan within 3 months."
        }
        (TierProfile::FourTier, RiskTier::High) => {
            "Specialist evaluation recommended soon."
        }
        (TierProfile::FourTier, RiskTier::VeryHigh)
        | (TierProfile::ThreeTier, RiskTier::High | RiskTier::VeryHigh) => {
            "Urgent referral to pulmonary oncology. High-resolution CT and biopsy recommended."
        }
    }
}
