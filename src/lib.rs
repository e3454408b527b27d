//! # Lungscope
//!
//! Deterministic lung-cancer risk scoring with interpretable output.
//!
//! This crate provides:
//! - Versioned feature derivation from raw patient records
//! - Probability-threshold risk tiering, confidence and review flagging
//! - Ranked contributing factors from per-instance attribution or global
//!   importance
//! - Signed model artifact bundles, swapped atomically at runtime
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core types and pure pipeline functions (records, features, tiers)
//! - `ports`: Trait definitions for the trained model (classifier, attribution)
//! - `adapters`: Concrete implementations (logistic model, bundle loader, log sanitizer)
//! - `application`: The prediction service orchestrating domain and ports
//! - `config`: Externally supplied pipeline constants

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::{ModelInfo, ModelSnapshot, PredictionService, SnapshotHandle};
pub use config::PipelineConfig;
pub use domain::{PatientRecord, PredictionResult, RiskTier};

/// Result type for Lungscope operations
pub type Result<T> = std::result::Result<T, LungscopeError>;

fn join_field_errors(errors: &[domain::FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Main error type for Lungscope
#[derive(Debug, thiserror::Error)]
pub enum LungscopeError {
    #[error("Invalid patient data: {}", join_field_errors(.0))]
    Validation(Vec<domain::FieldError>),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Prediction failed: {reason}")]
    PredictionFailed { reason: String },

    #[error("Batch of {size} records exceeds the maximum of {max}")]
    RejectedTooLarge { size: usize, max: usize },

    #[error("Batch aborted at record {index}: {source}")]
    BatchAborted {
        index: usize,
        #[source]
        source: Box<LungscopeError>,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Model artifact error: {0}")]
    Artifact(#[from] adapters::ArtifactError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LungscopeError {
    /// Whether retrying after a model reload could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ModelUnavailable(_) => true,
            Self::BatchAborted { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}
