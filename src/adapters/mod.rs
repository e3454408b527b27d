//! Adapters layer: Concrete implementations of ports.
//!
//! These modules contain the actual integration with external artifacts:
//! - `logistic`: exported logistic-regression model (classifier + attribution)
//! - `bundle`: signed model artifact bundles on disk
//! - `sanitize`: PII filtering for logs

pub mod bundle;
pub mod logistic;
pub mod sanitize;

pub use bundle::{ArtifactError, BundleLoader, LoadedBundle, ModelConfig};
pub use logistic::LogisticModel;
