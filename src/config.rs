//! Pipeline configuration.
//!
//! Every constant the pipeline applies (tier thresholds, review band,
//! normalisation caps, top-K, batch cap) lives here and is supplied from
//! outside: built-in defaults, then an optional JSON file, then
//! `LUNGSCOPE_*` environment variables.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{DerivationConfig, ReviewBand, ThresholdTable, TierProfile, DEFAULT_TOP_K};
use crate::LungscopeError;

/// Default upper bound on records per batch request.
pub const DEFAULT_MAX_BATCH: usize = 100;

const TIER_PROFILE_ENV: &str = "LUNGSCOPE_TIER_PROFILE";
const TOP_K_ENV: &str = "LUNGSCOPE_TOP_K";
const MAX_BATCH_ENV: &str = "LUNGSCOPE_MAX_BATCH";
const PACK_YEARS_CAP_ENV: &str = "LUNGSCOPE_PACK_YEARS_CAP";
const BATCH_POLICY_ENV: &str = "LUNGSCOPE_BATCH_POLICY";

/// What a batch does when one record fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPolicy {
    /// Abort the whole batch and return no results.
    #[default]
    StopOnFirstFailure,
    /// Report each record's outcome individually.
    ContinueOnFailure,
}

impl std::str::FromStr for BatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stop_on_first_failure" | "stop" => Ok(Self::StopOnFirstFailure),
            "continue_on_failure" | "continue" => Ok(Self::ContinueOnFailure),
            other => Err(format!("unknown batch policy: {other}")),
        }
    }
}

/// Constants applied by the prediction pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub tiers: ThresholdTable,
    pub review: ReviewBand,
    /// Probability at or above which the label is `Advanced`.
    pub decision_threshold: f64,
    pub derivation: DerivationConfig,
    pub top_k: usize,
    pub max_batch: usize,
    pub batch_policy: BatchPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tiers: ThresholdTable::default(),
            review: ReviewBand::default(),
            decision_threshold: 0.5,
            derivation: DerivationConfig::default(),
            top_k: DEFAULT_TOP_K,
            max_batch: DEFAULT_MAX_BATCH,
            batch_policy: BatchPolicy::default(),
        }
    }
}

fn parse_env<T>(name: &str) -> Result<Option<T>, LungscopeError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| LungscopeError::Config(format!("{name}={v}: {e}"))),
        Err(_) => Ok(None),
    }
}

impl PipelineConfig {
    /// Load from a JSON file; missing fields take their defaults.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed.
    pub fn from_json_file(path: &Path) -> Result<Self, LungscopeError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Apply `LUNGSCOPE_*` environment overrides.
    ///
    /// Selecting a tier profile replaces the whole threshold table with that
    /// profile's canonical one.
    ///
    /// # Errors
    /// Returns error if a variable is set but does not parse.
    pub fn with_env_overrides(mut self) -> Result<Self, LungscopeError> {
        if let Some(profile) = parse_env::<TierProfile>(TIER_PROFILE_ENV)? {
            self.tiers = ThresholdTable::for_profile(profile);
        }
        if let Some(k) = parse_env::<usize>(TOP_K_ENV)? {
            self.top_k = k;
        }
        if let Some(max) = parse_env::<usize>(MAX_BATCH_ENV)? {
            self.max_batch = max;
        }
        if let Some(cap) = parse_env::<f64>(PACK_YEARS_CAP_ENV)? {
            self.derivation.pack_years_cap = cap;
        }
        if let Some(policy) = parse_env::<BatchPolicy>(BATCH_POLICY_ENV)? {
            self.batch_policy = policy;
        }
        Ok(self)
    }

    /// Defaults, then `path` if given, then environment; validated.
    ///
    /// # Errors
    /// Returns error if any source fails to load or the result is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, LungscopeError> {
        let base = match path {
            Some(p) => Self::from_json_file(p)?,
            None => Self::default(),
        };
        let config = base.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency.
    ///
    /// # Errors
    /// Returns `LungscopeError::Config` describing the first problem.
    pub fn validate(&self) -> Result<(), LungscopeError> {
        self.tiers.validate().map_err(LungscopeError::Config)?;

        let r = &self.review;
        if !(0.0..=1.0).contains(&r.lower) || !(0.0..=1.0).contains(&r.upper) || r.lower > r.upper {
            return Err(LungscopeError::Config(format!(
                "review band must satisfy 0 <= lower <= upper <= 1, got [{}, {}]",
                r.lower, r.upper
            )));
        }
        if !(0.0..=1.0).contains(&self.decision_threshold) {
            return Err(LungscopeError::Config(format!(
                "decision_threshold {} out of range [0, 1]",
                self.decision_threshold
            )));
        }

        let d = &self.derivation;
        if !d.pack_years_cap.is_finite() || d.pack_years_cap <= 0.0 {
            return Err(LungscopeError::Config(format!(
                "pack_years_cap must be positive, got {}",
                d.pack_years_cap
            )));
        }
        if d.weights.any_negative() {
            return Err(LungscopeError::Config(
                "composite weights must be finite and non-negative".into(),
            ));
        }
        // Small tolerance for decimal weights that do not sum exactly.
        if d.weights.sum() > 1.0 + 1e-9 {
            return Err(LungscopeError::Config(format!(
                "composite weights sum to {}, must be <= 1",
                d.weights.sum()
            )));
        }

        if self.max_batch == 0 {
            return Err(LungscopeError::Config("max_batch must be at least 1".into()));
        }
        Ok(())
    }
}
