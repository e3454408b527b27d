//! Ports layer: Trait definitions for external collaborators.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the prediction pipeline and the trained model artifacts.

mod attribution;
mod classifier;

pub use attribution::{Attributor, ExplainError};
pub use classifier::{Classifier, ClassifierError};
