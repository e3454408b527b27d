//! Domain layer: Core types and pure pipeline functions.
//!
//! Nothing in here performs I/O or holds shared state; every function is a
//! pure function of its arguments and safe to call from any thread.

mod encoders;
pub mod explain;
pub mod features;
mod patient;
mod prediction;
pub mod recommendation;
pub mod risk;

pub use encoders::{columns, EncoderRegistry, LabelEncoder, UNSEEN_SENTINEL};
pub use explain::{rank_contributions, FactorDirection, RiskFactor, Signs, DEFAULT_TOP_K};
pub use features::{derive, ColumnOrder, CompositeWeights, DerivationConfig, FeatureVector};
pub use patient::{FieldError, PatientRecord, NO_COMORBIDITIES};
pub(crate) use prediction::uuid_v4;
pub use prediction::{BatchItem, BatchSummary, PredictionLabel, PredictionResult};
pub use recommendation::recommend;
pub use risk::{classify, confidence, ReviewBand, RiskAssessment, RiskTier, ThresholdTable, TierProfile};
