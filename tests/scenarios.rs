//! End-to-end scenarios against the shipped demo model.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ed25519_dalek::{Signer, SigningKey};
use rand::RngCore;

use lungscope::adapters::bundle::{
    sha256_hex, SignedManifest, MANIFEST_FILE, REQUIRED_FILES, SIGNATURE_FILE,
};
use lungscope::adapters::{BundleLoader, LogisticModel};
use lungscope::config::BatchPolicy;
use lungscope::domain::{ColumnOrder, EncoderRegistry};
use lungscope::ports::{Classifier, ClassifierError};
use lungscope::{
    LungscopeError, ModelSnapshot, PatientRecord, PipelineConfig, PredictionService, RiskTier,
    SnapshotHandle,
};

const MODEL_JSON: &str = include_str!("../models/model.json");
const MODEL_CONFIG_JSON: &str = include_str!("../models/model_config.json");

fn demo_snapshot() -> ModelSnapshot {
    let model = Arc::new(LogisticModel::from_json(MODEL_JSON).expect("demo model parses"));
    ModelSnapshot::new(
        ColumnOrder::canonical("1.0.0"),
        EncoderRegistry::builtin(),
        model.clone(),
    )
    .expect("demo model matches canonical columns")
    .with_attributor(model)
}

fn demo_service(config: PipelineConfig) -> PredictionService {
    PredictionService::with_handle(config, Arc::new(SnapshotHandle::with_snapshot(demo_snapshot())))
        .expect("valid config")
}

fn scenario_a() -> PatientRecord {
    PatientRecord {
        age: 55.0,
        gender: "Male".into(),
        smoking_history: "Current".into(),
        pack_years: 30.0,
        bmi: 27.5,
        lung_function_pct: 75.0,
        chest_pain: true,
        shortness_of_breath: true,
        chronic_cough: true,
        family_history_cancer: true,
        ..Default::default()
    }
}

fn scenario_b() -> PatientRecord {
    PatientRecord {
        age: 25.0,
        smoking_history: "Never".into(),
        lung_function_pct: 95.0,
        ..Default::default()
    }
}

#[test]
fn test_scenario_a_high_risk_smoker() {
    let svc = demo_service(PipelineConfig::default());
    let result = svc.predict(&scenario_a()).expect("predicts");

    assert!(matches!(result.risk_tier, RiskTier::High | RiskTier::VeryHigh));
    let in_band = (0.3..=0.7).contains(&result.probability);
    assert_eq!(result.requires_review, in_band);
    assert_eq!(result.model_version, "1.0.0");

    assert_eq!(result.top_factors.len(), 5);
    for pair in result.top_factors.windows(2) {
        assert!(pair[0].contribution >= pair[1].contribution);
    }
}

#[test]
fn test_scenario_b_low_risk_never_smoker() {
    let svc = demo_service(PipelineConfig::default());
    let result = svc.predict(&scenario_b()).expect("predicts");

    assert_eq!(result.risk_tier, RiskTier::Low);
    assert!(!result.requires_review);
    assert_eq!(result.prediction_code, 0);
}

#[test]
fn test_scenario_c_oversized_batch_rejected() {
    let svc = demo_service(PipelineConfig::default());
    let records = vec![scenario_b(); 101];

    match svc.predict_batch(&records) {
        Err(LungscopeError::RejectedTooLarge { size, max }) => {
            assert_eq!(size, 101);
            assert_eq!(max, 100);
        }
        other => panic!("expected RejectedTooLarge, got {other:?}"),
    }

    let summary = svc.predict_batch(&records[..100]).expect("at the cap is fine");
    assert_eq!(summary.total_processed, 100);
}

/// Counts every scoring call.
struct Counting {
    calls: Arc<AtomicUsize>,
}

impl Classifier for Counting {
    fn predict(&self, _features: &[f64]) -> Result<u8, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(0)
    }

    fn n_features(&self) -> usize {
        29
    }
}

#[test]
fn test_scenario_d_unloaded_model() {
    let calls = Arc::new(AtomicUsize::new(0));
    let snapshot = ModelSnapshot::new(
        ColumnOrder::canonical("1.0.0"),
        EncoderRegistry::builtin(),
        Arc::new(Counting {
            calls: calls.clone(),
        }),
    )
    .expect("valid snapshot");
    let handle = Arc::new(SnapshotHandle::with_snapshot(snapshot));
    let svc = PredictionService::with_handle(PipelineConfig::default(), handle.clone())
        .expect("valid config");

    svc.predict(&scenario_b()).expect("loaded model scores");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    handle.clear().expect("clear");
    assert!(!svc.is_ready());

    let invalid = PatientRecord {
        age: 7.0,
        ..Default::default()
    };
    for record in [scenario_a(), scenario_b(), invalid] {
        let err = svc.predict(&record).expect_err("must fail");
        assert!(matches!(err, LungscopeError::ModelUnavailable(_)));
        assert!(err.is_retryable());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_predict_is_idempotent() {
    let svc = demo_service(PipelineConfig::default());
    let first = svc.predict(&scenario_a()).expect("predicts");
    let second = svc.predict(&scenario_a()).expect("predicts");

    assert_ne!(first.id, second.id);
    let a = serde_json::to_string(&first.without_call_metadata()).expect("serialize");
    let b = serde_json::to_string(&second.without_call_metadata()).expect("serialize");
    assert_eq!(a, b);
}

#[test]
fn test_batch_continue_reports_each_record() {
    let config = PipelineConfig {
        batch_policy: BatchPolicy::ContinueOnFailure,
        ..Default::default()
    };
    let svc = demo_service(config);
    let invalid = PatientRecord {
        bmi: 3.0,
        ..Default::default()
    };
    let summary = svc
        .predict_batch(&[scenario_a(), invalid, scenario_b()])
        .expect("runs");

    assert_eq!(summary.items.len(), 3);
    assert!(summary.items[1].result().is_none());
    assert_eq!(
        summary.items[2].result().map(|r| r.risk_tier),
        Some(RiskTier::Low)
    );
}

fn write_signed_demo_bundle(dir: &Path, key: &SigningKey) {
    std::fs::write(dir.join("model.json"), MODEL_JSON).expect("write model");
    std::fs::write(dir.join("model_config.json"), MODEL_CONFIG_JSON).expect("write config");

    let mut files = BTreeMap::new();
    for name in REQUIRED_FILES {
        let bytes = std::fs::read(dir.join(name)).expect("read");
        files.insert(name.to_string(), sha256_hex(&bytes));
    }
    let manifest = SignedManifest {
        version: 1,
        serial: 1,
        created_at: chrono::Utc::now().timestamp(),
        files,
    };
    let bytes = serde_json::to_vec(&manifest).expect("serialize manifest");
    std::fs::write(dir.join(MANIFEST_FILE), &bytes).expect("write manifest");
    std::fs::write(dir.join(SIGNATURE_FILE), key.sign(&bytes).to_bytes()).expect("write sig");
}

#[test]
fn test_reload_signed_bundle_and_keep_serving_on_failure() {
    let mut seed = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut seed);
    let key = SigningKey::from_bytes(&seed);
    let loader = BundleLoader::default().with_verifying_key(key.verifying_key());

    let good = tempfile::tempdir().expect("tempdir");
    write_signed_demo_bundle(good.path(), &key);

    let svc = PredictionService::new(PipelineConfig::default()).expect("valid config");
    assert!(!svc.is_ready());
    let info = svc.reload_with(&loader, good.path()).expect("reload");
    assert_eq!(info.version, "1.0.0");
    assert_eq!(info.n_features, 29);
    assert!(info.explainer_available);

    let from_disk = svc.predict(&scenario_a()).expect("predicts");
    let in_memory = demo_service(PipelineConfig::default())
        .predict(&scenario_a())
        .expect("predicts");
    assert_eq!(from_disk.probability, in_memory.probability);

    // A tampered bundle is refused and the loaded model keeps serving.
    let bad = tempfile::tempdir().expect("tempdir");
    write_signed_demo_bundle(bad.path(), &key);
    std::fs::write(bad.path().join("model_config.json"), "{}").expect("tamper");
    assert!(svc.reload_with(&loader, bad.path()).is_err());
    assert!(svc.predict(&scenario_b()).is_ok());
}

#[test]
fn test_concurrent_predictions_during_swap() {
    let svc = Arc::new(demo_service(PipelineConfig::default()));

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let svc = svc.clone();
            scope.spawn(move || {
                for _ in 0..50 {
                    let result = svc.predict(&scenario_a()).expect("always ready");
                    assert!(matches!(
                        result.risk_tier,
                        RiskTier::High | RiskTier::VeryHigh
                    ));
                }
            });
        }
        for _ in 0..20 {
            svc.handle().install(demo_snapshot()).expect("swap");
        }
    });
}
