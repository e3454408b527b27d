//! Model artifact bundle loader.
//!
//! A bundle is a directory holding:
//!
//! - `model_config.json`: version, feature column order, encoders, decision
//!   threshold and whether per-instance attribution is enabled
//! - `model.json`: the exported logistic model
//! - `manifest.json` + `model.sig`: Ed25519 signature over a manifest that
//!   binds every file above by SHA-256
//!
//! # Security
//!
//! - Only bundles signed by the configured key are loaded
//! - In release builds, ALL bundles MUST have valid signatures
//! - Bound files are read once; the bytes that were hashed are the bytes
//!   that get parsed

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::adapters::logistic::LogisticModel;
use crate::domain::{ColumnOrder, EncoderRegistry};

pub const CONFIG_FILE: &str = "model_config.json";
pub const MODEL_FILE: &str = "model.json";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const SIGNATURE_FILE: &str = "model.sig";

/// Files every signed manifest must bind.
pub const REQUIRED_FILES: [&str; 2] = [CONFIG_FILE, MODEL_FILE];

/// Environment variable to allow loading unsigned bundles.
///
/// SECURITY: This bypass is compiled only in debug builds.
#[cfg(debug_assertions)]
const ALLOW_UNSIGNED_MODELS_ENV: &str = "LUNGSCOPE_ALLOW_UNSIGNED_MODELS";
const PUBKEY_FILE_ENV: &str = "LUNGSCOPE_MODEL_SIGNING_PUBKEY_B64_FILE";
const DOCKER_SECRET_PUBKEY: &str = "/run/secrets/lungscope_model_signing_pubkey_b64";
const MAX_AGE_ENV: &str = "LUNGSCOPE_MODEL_MAX_AGE_SECS";

/// Clock skew allowance for manifest timestamps, in seconds.
const MAX_CLOCK_SKEW_SECS: i64 = 300;

/// Bundle loading errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ArtifactError {
    #[error("Failed to read {path:?}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Invalid model config: {0}")]
    InvalidConfig(String),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Signature verification failed: {0}")]
    Signature(String),

    #[error("Model features do not match config columns at index {index}")]
    ColumnMismatch { index: usize },
}

/// The signed content of `manifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedManifest {
    pub version: u32,
    pub serial: u64,
    pub created_at: i64,
    /// File name -> lowercase hex SHA-256
    pub files: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

/// Contents of `model_config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub version: String,
    pub feature_columns: Vec<String>,
    /// Overrides for the built-in encoders, by column
    #[serde(default)]
    pub encoders: EncoderRegistry,
    #[serde(default)]
    pub prediction: PredictionSettings,
    /// Install the model as the per-instance attributor
    #[serde(default)]
    pub explainer: bool,
}

/// A verified bundle, ready to become a model snapshot.
#[derive(Debug, Clone)]
pub struct LoadedBundle {
    pub columns: ColumnOrder,
    pub encoders: EncoderRegistry,
    pub model: LogisticModel,
    pub decision_threshold: Option<f64>,
    pub explainer: bool,
    /// Manifest serial, `None` for an unsigned debug load
    pub serial: Option<u64>,
}

/// Lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn constant_time_eq_str(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes().iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

fn read_file(path: &Path) -> Result<Vec<u8>, ArtifactError> {
    fs::read(path).map_err(|e| ArtifactError::Read {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Decode a base64 Ed25519 verifying key.
///
/// # Errors
/// Returns error if the text is not base64 of exactly 32 valid key bytes.
pub fn verifying_key_from_b64(b64: &str) -> Result<VerifyingKey, ArtifactError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64.trim())
        .map_err(|_| ArtifactError::Signature("Invalid public key base64".into()))?;
    let pubkey: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| ArtifactError::Signature("Invalid public key length (expected 32 bytes)".into()))?;
    VerifyingKey::from_bytes(&pubkey)
        .map_err(|_| ArtifactError::Signature("Invalid verifying key".into()))
}

/// Loads and verifies bundles from disk.
#[derive(Debug, Clone, Default)]
pub struct BundleLoader {
    verifying_key: Option<VerifyingKey>,
    allow_unsigned: bool,
    max_age_secs: Option<i64>,
}

impl BundleLoader {
    /// Loader configured from `LUNGSCOPE_*` environment variables.
    ///
    /// The verifying key is resolved when a signed bundle is loaded.
    #[must_use]
    pub fn from_env() -> Self {
        #[cfg(debug_assertions)]
        let allow_unsigned = std::env::var(ALLOW_UNSIGNED_MODELS_ENV)
            .map(|v| v == "true")
            .unwrap_or(false);
        #[cfg(not(debug_assertions))]
        let allow_unsigned = false;

        let max_age_secs = std::env::var(MAX_AGE_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|v| *v > 0);

        Self {
            verifying_key: None,
            allow_unsigned,
            max_age_secs,
        }
    }

    #[must_use]
    pub fn with_verifying_key(mut self, key: VerifyingKey) -> Self {
        self.verifying_key = Some(key);
        self
    }

    /// Accept bundles without a signature. Debug builds only.
    #[cfg(debug_assertions)]
    #[must_use]
    pub fn allowing_unsigned(mut self) -> Self {
        self.allow_unsigned = true;
        self
    }

    #[must_use]
    pub fn with_max_age_secs(mut self, secs: i64) -> Self {
        self.max_age_secs = Some(secs);
        self
    }

    /// Load and verify the bundle in `dir`.
    ///
    /// # Errors
    /// Returns error if the signature, any bound file hash, the config or the
    /// model fails verification.
    pub fn load(&self, dir: &Path) -> Result<LoadedBundle, ArtifactError> {
        let files = match self.verify_manifest(dir)? {
            Some((manifest, files)) => {
                tracing::info!(
                    "Model bundle signature verified (serial={}, files={})",
                    manifest.serial,
                    files.len()
                );
                Some((manifest.serial, files))
            }
            None => None,
        };

        let (serial, config_bytes, model_bytes) = match files {
            Some((serial, mut files)) => {
                let config = files.remove(CONFIG_FILE).unwrap_or_default();
                let model = files.remove(MODEL_FILE).unwrap_or_default();
                (Some(serial), config, model)
            }
            None => (
                None,
                read_file(&dir.join(CONFIG_FILE))?,
                read_file(&dir.join(MODEL_FILE))?,
            ),
        };

        let config: ModelConfig = serde_json::from_slice(&config_bytes)
            .map_err(|e| ArtifactError::InvalidConfig(e.to_string()))?;
        let model_text = std::str::from_utf8(&model_bytes)
            .map_err(|e| ArtifactError::InvalidModel(e.to_string()))?;
        let model = LogisticModel::from_json(model_text)?;

        build_bundle(config, model, serial)
    }

    /// Verify `manifest.json` against `model.sig` and every bound file.
    ///
    /// Returns the manifest and the verified bytes of each bound file, or
    /// `None` when an unsigned load is permitted.
    fn verify_manifest(
        &self,
        dir: &Path,
    ) -> Result<Option<(SignedManifest, BTreeMap<String, Vec<u8>>)>, ArtifactError> {
        let sig_path = dir.join(SIGNATURE_FILE);
        let manifest_path = dir.join(MANIFEST_FILE);

        if !sig_path.exists() || !manifest_path.exists() {
            if self.allow_unsigned {
                tracing::warn!(
                    "Loading UNSIGNED model bundle from {:?}. \
                     This is only allowed in debug builds for testing.",
                    dir
                );
                return Ok(None);
            }
            tracing::error!(
                "Model bundle signature not found at {:?}. Signed bundles are required.",
                sig_path
            );
            return Err(ArtifactError::Signature("Model signature required".into()));
        }

        let sig_bytes = read_file(&sig_path)?;
        let signature = Signature::from_bytes(
            sig_bytes
                .as_slice()
                .try_into()
                .map_err(|_| ArtifactError::Signature("Invalid signature length (expected 64 bytes)".into()))?,
        );

        let manifest_content = read_file(&manifest_path)?;
        let key = match self.verifying_key {
            Some(key) => key,
            None => configured_public_key()?,
        };
        key.verify(&manifest_content, &signature).map_err(|_| {
            tracing::error!("Model bundle signature does not verify");
            ArtifactError::Signature("Invalid model signature".into())
        })?;

        let manifest: SignedManifest = serde_json::from_slice(&manifest_content)
            .map_err(|e| ArtifactError::Signature(format!("Invalid manifest.json format: {e}")))?;
        if manifest.version != 1 {
            return Err(ArtifactError::Signature(format!(
                "Unsupported manifest version: {}",
                manifest.version
            )));
        }
        self.check_timestamp(manifest.created_at)?;

        for required in REQUIRED_FILES {
            if !manifest.files.contains_key(required) {
                return Err(ArtifactError::Signature(format!(
                    "manifest.json must bind {required}"
                )));
            }
        }

        let mut verified = BTreeMap::new();
        for (rel, expected_hex) in &manifest.files {
            if rel.contains(['/', '\\']) || rel == ".." {
                return Err(ArtifactError::Signature(format!(
                    "Manifest entry {rel:?} must be a plain file name"
                )));
            }
            let bytes = read_file(&dir.join(rel))?;
            if !constant_time_eq_str(&sha256_hex(&bytes), expected_hex) {
                return Err(ArtifactError::Signature(format!("File hash mismatch for {rel}")));
            }
            verified.insert(rel.clone(), bytes);
        }

        Ok(Some((manifest, verified)))
    }

    fn check_timestamp(&self, created_at: i64) -> Result<(), ArtifactError> {
        let now = chrono::Utc::now().timestamp();
        if created_at > now + MAX_CLOCK_SKEW_SECS {
            return Err(ArtifactError::Signature(
                "manifest created_at is in the future".into(),
            ));
        }
        if let Some(max_age) = self.max_age_secs {
            if now.saturating_sub(created_at) > max_age {
                return Err(ArtifactError::Signature(
                    "manifest is older than allowed max age".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Verifying key from the deployment secret.
fn configured_public_key() -> Result<VerifyingKey, ArtifactError> {
    if let Ok(path) = std::env::var(PUBKEY_FILE_ENV) {
        let b64 = fs::read_to_string(path.trim()).map_err(|e| ArtifactError::Read {
            path: PathBuf::from(path.trim()),
            reason: e.to_string(),
        })?;
        return verifying_key_from_b64(&b64);
    }

    if Path::new(DOCKER_SECRET_PUBKEY).exists() {
        let b64 = fs::read_to_string(DOCKER_SECRET_PUBKEY).map_err(|e| ArtifactError::Read {
            path: PathBuf::from(DOCKER_SECRET_PUBKEY),
            reason: e.to_string(),
        })?;
        return verifying_key_from_b64(&b64);
    }

    Err(ArtifactError::Signature(format!(
        "No verifying key configured. Set {PUBKEY_FILE_ENV}."
    )))
}

fn build_bundle(
    config: ModelConfig,
    model: LogisticModel,
    serial: Option<u64>,
) -> Result<LoadedBundle, ArtifactError> {
    if config.version.trim().is_empty() {
        return Err(ArtifactError::InvalidConfig("version must not be empty".into()));
    }
    if config.feature_columns.is_empty() {
        return Err(ArtifactError::InvalidConfig(
            "feature_columns must not be empty".into(),
        ));
    }
    if let Some(t) = config.prediction.threshold {
        if !(0.0..=1.0).contains(&t) {
            return Err(ArtifactError::InvalidConfig(format!(
                "prediction.threshold {t} out of range [0, 1]"
            )));
        }
    }

    let columns = ColumnOrder::new(config.version.clone(), config.feature_columns.iter());
    if let Some(i) = columns.first_duplicate() {
        return Err(ArtifactError::InvalidConfig(format!(
            "duplicate feature column {:?}",
            columns.names()[i]
        )));
    }

    let names = model.feature_names();
    if names.len() != columns.len() {
        return Err(ArtifactError::ColumnMismatch {
            index: names.len().min(columns.len()),
        });
    }
    if let Some(index) = names.iter().zip(columns.names()).position(|(a, b)| a != b) {
        return Err(ArtifactError::ColumnMismatch { index });
    }

    let encoders = EncoderRegistry::builtin().merged_with(config.encoders);

    Ok(LoadedBundle {
        columns,
        encoders,
        model,
        decision_threshold: config.prediction.threshold,
        explainer: config.explainer,
        serial,
    })
}
