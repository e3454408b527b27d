//! Bundle signing utility for Lungscope model artifacts.
//!
//! Writes a signed manifest (`manifest.json`) and Ed25519 signature
//! (`model.sig`) binding `model_config.json` and `model.json` by SHA-256.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin sign_model -- <bundle_dir> [--serial <n>]
//! ```
//!
//! # Security
//!
//! - Signing seed sourced from a file or Docker secret, never argv
//! - Seed material zeroized after use

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose;
use base64::Engine;
use clap::Parser;
use ed25519_dalek::{Signature, Signer, SigningKey};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use lungscope::adapters::bundle::{
    sha256_hex, SignedManifest, MANIFEST_FILE, REQUIRED_FILES, SIGNATURE_FILE,
};

const KEY_FILE_ENV: &str = "LUNGSCOPE_MODEL_SIGNING_KEY_B64_FILE";
const DOCKER_SECRET_PATH: &str = "/run/secrets/lungscope_model_signing_key_b64";

#[derive(Zeroize, ZeroizeOnDrop)]
struct Seed([u8; 32]);

fn read_secret(path: &Path) -> Result<Zeroizing<String>, String> {
    let content = Zeroizing::new(
        fs::read_to_string(path).map_err(|e| format!("Failed reading signing key {path:?}: {e}"))?,
    );
    let secret = content.trim();
    if secret.is_empty() {
        return Err("Empty signing key".to_string());
    }
    Ok(Zeroizing::new(secret.to_string()))
}

fn read_signing_seed() -> Result<Seed, String> {
    let b64 = if let Ok(path) = env::var(KEY_FILE_ENV) {
        read_secret(Path::new(path.trim()))?
    } else if Path::new(DOCKER_SECRET_PATH).exists() {
        read_secret(Path::new(DOCKER_SECRET_PATH))?
    } else {
        return Err(format!(
            "Missing signing key. Set {KEY_FILE_ENV} or provide {DOCKER_SECRET_PATH}."
        ));
    };

    let raw = Zeroizing::new(
        general_purpose::STANDARD
            .decode(b64.as_bytes())
            .map_err(|e| format!("Invalid base64 in signing key: {e}"))?,
    );
    let bytes: [u8; 32] = raw.as_slice().try_into().map_err(|_| {
        format!(
            "Signing key seed must be 32 bytes after base64 decode (got {})",
            raw.len()
        )
    })?;
    Ok(Seed(bytes))
}

#[derive(Parser, Debug)]
#[command(name = "sign_model", version, about = "Sign a Lungscope model bundle")]
struct Cli {
    /// Bundle directory holding model_config.json and model.json
    bundle_dir: PathBuf,

    /// Manifest serial (defaults to the current Unix time)
    #[arg(long)]
    serial: Option<u64>,
}

fn main() -> Result<(), String> {
    let Cli {
        bundle_dir,
        serial: serial_arg,
    } = Cli::parse();

    let mut files = BTreeMap::new();
    for rel in REQUIRED_FILES {
        let path = bundle_dir.join(rel);
        let bytes = fs::read(&path).map_err(|e| format!("Failed to read {path:?}: {e}"))?;
        files.insert(rel.to_string(), sha256_hex(&bytes));
    }

    let created_at = chrono::Utc::now().timestamp();
    let serial = serial_arg.unwrap_or_else(|| u64::try_from(created_at).unwrap_or(1));

    let manifest = SignedManifest {
        version: 1,
        serial,
        created_at,
        files,
    };
    let manifest_bytes = serde_json::to_vec_pretty(&manifest)
        .map_err(|e| format!("Failed to serialize {MANIFEST_FILE}: {e}"))?;

    let mut seed = read_signing_seed()?;
    let signing_key = SigningKey::from_bytes(&seed.0);
    seed.zeroize();

    let manifest_path = bundle_dir.join(MANIFEST_FILE);
    fs::write(&manifest_path, &manifest_bytes)
        .map_err(|e| format!("Failed to write {manifest_path:?}: {e}"))?;

    let sig: Signature = signing_key.sign(&manifest_bytes);
    let sig_path = bundle_dir.join(SIGNATURE_FILE);
    fs::write(&sig_path, sig.to_bytes()).map_err(|e| format!("Failed to write {sig_path:?}: {e}"))?;

    println!("Signed manifest: {manifest_path:?} (serial={serial})");
    println!("Wrote signature: {sig_path:?}");
    println!(
        "Verifying key (base64): {}",
        general_purpose::STANDARD.encode(signing_key.verifying_key().as_bytes())
    );

    Ok(())
}
