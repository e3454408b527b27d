//! Prediction service: Orchestrates the scoring pipeline.
//!
//! Each prediction runs in two phases against one pinned snapshot:
//! - Mandatory: validate → derive features → score → classify risk
//! - Best-effort: explain, whose failure yields an empty factor list
//!
//! The service itself holds no per-patient state. It is `Send + Sync` and
//! can be shared across worker threads behind an `Arc`.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::adapters::BundleLoader;
use crate::config::{BatchPolicy, PipelineConfig};
use crate::domain::{
    classify, derive, recommendation, uuid_v4, BatchItem, BatchSummary, PatientRecord,
    PredictionLabel, PredictionResult,
};
use crate::LungscopeError;

use super::{explainer, scorer, ModelSnapshot, SnapshotHandle};

/// Summary of the loaded model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub version: String,
    pub n_features: usize,
    pub explainer_available: bool,
    pub loaded_at: DateTime<Utc>,
}

impl From<&ModelSnapshot> for ModelInfo {
    fn from(snapshot: &ModelSnapshot) -> Self {
        Self {
            version: snapshot.version().to_string(),
            n_features: snapshot.columns().len(),
            explainer_available: snapshot.attributor().is_some(),
            loaded_at: snapshot.loaded_at(),
        }
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Service for lung-cancer risk prediction.
#[derive(Debug)]
pub struct PredictionService {
    handle: Arc<SnapshotHandle>,
    config: PipelineConfig,
}

impl PredictionService {
    /// Create a service with no model loaded.
    ///
    /// # Errors
    /// Returns `Config` if `config` fails validation.
    pub fn new(config: PipelineConfig) -> Result<Self, LungscopeError> {
        Self::with_handle(config, Arc::new(SnapshotHandle::new()))
    }

    /// Create a service reading from a shared snapshot handle.
    ///
    /// # Errors
    /// Returns `Config` if `config` fails validation.
    pub fn with_handle(
        config: PipelineConfig,
        handle: Arc<SnapshotHandle>,
    ) -> Result<Self, LungscopeError> {
        config.validate()?;
        Ok(Self { handle, config })
    }

    #[must_use]
    pub fn handle(&self) -> &Arc<SnapshotHandle> {
        &self.handle
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// True iff a classifier, encoders and column order are loaded.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.handle.is_ready()
    }

    #[must_use]
    pub fn model_info(&self) -> Option<ModelInfo> {
        self.handle.current().ok().map(|s| ModelInfo::from(s.as_ref()))
    }

    /// Install `snapshot` as the current model.
    ///
    /// # Errors
    /// Returns error if the snapshot handle is unusable.
    pub fn install(&self, snapshot: ModelSnapshot) -> Result<ModelInfo, LungscopeError> {
        let info = ModelInfo::from(&snapshot);
        self.handle.install(snapshot)?;
        Ok(info)
    }

    /// Load the bundle in `dir` with the environment-configured loader and
    /// swap it in. The previous model keeps serving if loading fails.
    ///
    /// # Errors
    /// Returns error if the bundle fails to load or verify.
    pub fn reload(&self, dir: &Path) -> Result<ModelInfo, LungscopeError> {
        self.reload_with(&BundleLoader::from_env(), dir)
    }

    /// Like [`Self::reload`] with an explicit loader.
    ///
    /// # Errors
    /// Returns error if the bundle fails to load or verify.
    pub fn reload_with(&self, loader: &BundleLoader, dir: &Path) -> Result<ModelInfo, LungscopeError> {
        tracing::info!("Loading model bundle from {:?}", dir);
        let snapshot = ModelSnapshot::load(loader, dir).map_err(|e| {
            tracing::error!("Rejected model bundle from {:?}: {}", dir, e);
            e
        })?;
        self.install(snapshot)
    }

    /// Predict risk for one patient.
    ///
    /// # Errors
    /// - `ModelUnavailable` if no model is loaded (checked first)
    /// - `Validation` if a field is out of range
    /// - `PredictionFailed` if scoring fails
    pub fn predict(&self, record: &PatientRecord) -> Result<PredictionResult, LungscopeError> {
        let snapshot = self.handle.current()?;
        self.run(&snapshot, record)
    }

    /// Predict risk for several patients against one model snapshot.
    ///
    /// # Errors
    /// - `RejectedTooLarge` if there are more records than `max_batch`;
    ///   nothing is processed
    /// - `ModelUnavailable` if no model is loaded
    /// - `BatchAborted` under [`BatchPolicy::StopOnFirstFailure`] when a
    ///   record fails; no partial results are returned
    pub fn predict_batch(&self, records: &[PatientRecord]) -> Result<BatchSummary, LungscopeError> {
        let start = Instant::now();
        let max = self.config.max_batch;
        if records.len() > max {
            tracing::warn!("Rejected batch of {} records (max {})", records.len(), max);
            return Err(LungscopeError::RejectedTooLarge {
                size: records.len(),
                max,
            });
        }

        let snapshot = self.handle.current()?;
        tracing::info!(
            "Starting batch of {} records (model={}, policy={:?})",
            records.len(),
            snapshot.version(),
            self.config.batch_policy
        );

        let mut items = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            match (self.run(&snapshot, record), self.config.batch_policy) {
                (Ok(result), _) => items.push(BatchItem::Success {
                    result: Box::new(result),
                }),
                (Err(e), BatchPolicy::StopOnFirstFailure) => {
                    tracing::warn!("Batch aborted at record {}: {}", index, e);
                    return Err(LungscopeError::BatchAborted {
                        index,
                        source: Box::new(e),
                    });
                }
                (Err(e), BatchPolicy::ContinueOnFailure) => {
                    tracing::warn!("Batch record {} failed: {}", index, e);
                    items.push(BatchItem::Error {
                        message: e.to_string(),
                    });
                }
            }
        }

        let summary = BatchSummary {
            total_processed: items.len(),
            items,
            processing_time_ms: elapsed_ms(start),
        };
        tracing::info!(
            "Batch complete: {} records in {:.2}ms",
            summary.total_processed,
            summary.processing_time_ms
        );
        Ok(summary)
    }

    fn run(
        &self,
        snapshot: &ModelSnapshot,
        record: &PatientRecord,
    ) -> Result<PredictionResult, LungscopeError> {
        let start = Instant::now();

        tracing::debug!("Step 1: Validating record...");
        record.validate().map_err(LungscopeError::Validation)?;

        tracing::debug!("Step 2: Deriving {} features...", snapshot.columns().len());
        let vector = derive(
            record,
            snapshot.encoders(),
            snapshot.columns(),
            &self.config.derivation,
        );
        if let Some(bad) = vector.values().iter().position(|v| !v.is_finite()) {
            return Err(LungscopeError::PredictionFailed {
                reason: format!(
                    "derived feature {} is not finite",
                    snapshot.columns().names()[bad]
                ),
            });
        }

        tracing::debug!("Step 3: Scoring...");
        let probability = scorer::score(snapshot.classifier(), &vector)?;

        tracing::debug!("Step 4: Classifying risk...");
        let assessment = classify(probability, &self.config.tiers, &self.config.review);
        let threshold = snapshot
            .decision_threshold()
            .unwrap_or(self.config.decision_threshold);
        let prediction = PredictionLabel::at_threshold(probability, threshold);

        tracing::debug!("Step 5: Explaining...");
        let top_factors = match explainer::explain(snapshot, &vector, self.config.top_k) {
            Ok(factors) => factors,
            Err(e) => {
                tracing::warn!("Explanation unavailable: {}", e);
                Vec::new()
            }
        };

        let profile = self.config.tiers.profile;
        let result = PredictionResult {
            id: uuid_v4(),
            patient_id: record.id.clone(),
            prediction,
            prediction_code: prediction.code(),
            probability,
            risk_tier: assessment.tier,
            risk_label: assessment.tier.label(profile).to_string(),
            confidence: assessment.confidence,
            requires_review: assessment.requires_review,
            top_factors,
            recommendation: recommendation::recommend(assessment.tier, profile).to_string(),
            model_version: snapshot.version().to_string(),
            created_at: Utc::now(),
            processing_time_ms: elapsed_ms(start),
        };

        tracing::info!(
            "Prediction complete: id={}, probability={:.3}, risk={}, review={}",
            result.id,
            result.probability,
            result.risk_label,
            result.requires_review
        );
        Ok(result)
    }
}
