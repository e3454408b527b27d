//! Immutable model snapshots and the handle that swaps them.
//!
//! A snapshot bundles everything one model version needs to serve a
//! request: column order, encoders, classifier and optional attributor.
//! It is never mutated after construction; a reload builds a new one and
//! swaps the handle's reference. In-flight requests keep the `Arc` they
//! started with.

use std::path::Path;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use crate::adapters::{BundleLoader, LoadedBundle};
use crate::domain::{ColumnOrder, EncoderRegistry};
use crate::ports::{Attributor, Classifier};
use crate::LungscopeError;

/// Everything loaded for one model version.
pub struct ModelSnapshot {
    columns: ColumnOrder,
    encoders: EncoderRegistry,
    classifier: Arc<dyn Classifier>,
    attributor: Option<Arc<dyn Attributor>>,
    decision_threshold: Option<f64>,
    loaded_at: DateTime<Utc>,
}

impl std::fmt::Debug for ModelSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSnapshot")
            .field("version", &self.columns.version())
            .field("n_features", &self.columns.len())
            .field("encoders", &self.encoders.len())
            .field("explainer", &self.attributor.is_some())
            .field("loaded_at", &self.loaded_at)
            .finish_non_exhaustive()
    }
}

impl ModelSnapshot {
    /// Assemble a snapshot, checking the classifier against the column order.
    ///
    /// # Errors
    /// Returns `LungscopeError::Config` if the column order is empty, has a
    /// duplicate, or its length differs from the classifier's input size.
    pub fn new(
        columns: ColumnOrder,
        encoders: EncoderRegistry,
        classifier: Arc<dyn Classifier>,
    ) -> Result<Self, LungscopeError> {
        if columns.is_empty() {
            return Err(LungscopeError::Config("column order is empty".into()));
        }
        if let Some(i) = columns.first_duplicate() {
            return Err(LungscopeError::Config(format!(
                "duplicate feature column {:?}",
                columns.names()[i]
            )));
        }
        if classifier.n_features() != columns.len() {
            return Err(LungscopeError::Config(format!(
                "classifier expects {} features, column order has {}",
                classifier.n_features(),
                columns.len()
            )));
        }

        Ok(Self {
            columns,
            encoders,
            classifier,
            attributor: None,
            decision_threshold: None,
            loaded_at: Utc::now(),
        })
    }

    #[must_use]
    pub fn with_attributor(mut self, attributor: Arc<dyn Attributor>) -> Self {
        self.attributor = Some(attributor);
        self
    }

    /// Override the service's decision threshold for this model.
    #[must_use]
    pub fn with_decision_threshold(mut self, threshold: f64) -> Self {
        self.decision_threshold = Some(threshold);
        self
    }

    /// Build from a verified bundle.
    ///
    /// # Errors
    /// Returns error if the bundle's model and columns disagree.
    pub fn from_bundle(bundle: LoadedBundle) -> Result<Self, LungscopeError> {
        let model = Arc::new(bundle.model);
        let mut snapshot = Self::new(bundle.columns, bundle.encoders, model.clone())?;
        if bundle.explainer {
            snapshot = snapshot.with_attributor(model);
        }
        if let Some(t) = bundle.decision_threshold {
            snapshot = snapshot.with_decision_threshold(t);
        }
        Ok(snapshot)
    }

    /// Load, verify and assemble the bundle in `dir`.
    ///
    /// # Errors
    /// Returns error if the bundle fails verification.
    pub fn load(loader: &BundleLoader, dir: &Path) -> Result<Self, LungscopeError> {
        let bundle = loader.load(dir)?;
        Self::from_bundle(bundle)
    }

    #[must_use]
    pub fn version(&self) -> &str {
        self.columns.version()
    }

    #[must_use]
    pub fn columns(&self) -> &ColumnOrder {
        &self.columns
    }

    #[must_use]
    pub fn encoders(&self) -> &EncoderRegistry {
        &self.encoders
    }

    #[must_use]
    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    #[must_use]
    pub fn attributor(&self) -> Option<&dyn Attributor> {
        self.attributor.as_deref()
    }

    #[must_use]
    pub fn decision_threshold(&self) -> Option<f64> {
        self.decision_threshold
    }

    #[must_use]
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

/// Shared slot holding the current snapshot, if any.
#[derive(Debug, Default)]
pub struct SnapshotHandle {
    current: RwLock<Option<Arc<ModelSnapshot>>>,
}

fn poisoned() -> LungscopeError {
    LungscopeError::ModelUnavailable("model snapshot lock poisoned".into())
}

impl SnapshotHandle {
    /// Empty handle; not ready until a snapshot is installed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_snapshot(snapshot: ModelSnapshot) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(snapshot))),
        }
    }

    /// Swap in `snapshot`, returning the one it replaced.
    ///
    /// # Errors
    /// Returns `ModelUnavailable` if the lock is poisoned.
    pub fn install(
        &self,
        snapshot: ModelSnapshot,
    ) -> Result<Option<Arc<ModelSnapshot>>, LungscopeError> {
        let version = snapshot.version().to_string();
        let mut guard = self.current.write().map_err(|_| poisoned())?;
        let previous = guard.replace(Arc::new(snapshot));
        drop(guard);

        tracing::info!(
            "Installed model snapshot (version={}, replaced={})",
            version,
            previous.as_ref().map_or("none", |p| p.version())
        );
        Ok(previous)
    }

    /// Remove the current snapshot.
    ///
    /// # Errors
    /// Returns `ModelUnavailable` if the lock is poisoned.
    pub fn clear(&self) -> Result<Option<Arc<ModelSnapshot>>, LungscopeError> {
        let mut guard = self.current.write().map_err(|_| poisoned())?;
        let previous = guard.take();
        if previous.is_some() {
            tracing::info!("Model snapshot cleared");
        }
        Ok(previous)
    }

    /// The snapshot to serve a request from.
    ///
    /// # Errors
    /// Returns `ModelUnavailable` if nothing is installed.
    pub fn current(&self) -> Result<Arc<ModelSnapshot>, LungscopeError> {
        let guard = self.current.read().map_err(|_| poisoned())?;
        guard
            .clone()
            .ok_or_else(|| LungscopeError::ModelUnavailable("model not loaded".into()))
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.current
            .read()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }
}
