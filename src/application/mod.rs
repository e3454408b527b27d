//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the prediction use cases.

pub mod explainer;
mod prediction;
pub mod scorer;
mod snapshot;

pub use prediction::{ModelInfo, PredictionService};
pub use snapshot::{ModelSnapshot, SnapshotHandle};
