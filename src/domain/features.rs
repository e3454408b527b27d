//! Feature derivation: patient record → fixed-order numeric vector.
//!
//! The column order is owned by the model version and shared by every
//! request served from it. Derivation computes every raw and derived value
//! by name, then projects them through the column order; a configured column
//! the deriver does not produce is filled with `0.0`.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::encoders::{columns as cat, EncoderRegistry};
use super::patient::PatientRecord;

/// Column names produced by [`derive`].
pub mod names {
    pub const AGE: &str = "Age";
    pub const YEARS_SMOKED: &str = "Years_Smoked";
    pub const PACK_YEARS: &str = "Pack_Years";
    pub const BMI: &str = "BMI";
    pub const LUNG_FUNCTION: &str = "Lung_Function_Test_Result";
    pub const AIR_QUALITY: &str = "Air_Quality_Index";
    pub const TUMOR_SIZE: &str = "Tumor_Size_cm";
    pub const AGE_18_40: &str = "Age_Group_18-40";
    pub const AGE_41_60: &str = "Age_Group_41-60";
    pub const AGE_61_PLUS: &str = "Age_Group_61+";
    pub const FAMILY_HISTORY: &str = "Family_History_Cancer";
    pub const TOXINS: &str = "Exposure_to_Toxins";
    pub const CHEST_PAIN: &str = "Chest_Pain_Symptoms";
    pub const SHORTNESS_OF_BREATH: &str = "Shortness_of_Breath";
    pub const CHRONIC_COUGH: &str = "Chronic_Cough";
    pub const WEIGHT_LOSS: &str = "Weight_Loss";
    pub const COMORBIDITIES: &str = "Comorbidities";
    pub const PREVIOUS_CANCER: &str = "Previous_Cancer_Diagnosis";
    pub const PACK_YEARS_NORMALIZED: &str = "Pack_Years_Normalized";
    pub const SMOKING_RISK_LEVEL: &str = "Smoking_Risk_Level";
    pub const SYMPTOM_COUNT: &str = "Symptom_Count";
    pub const ENVIRONMENTAL_RISK: &str = "Environmental_Risk";
    pub const RISK_SCORE_COMPOSITE: &str = "Risk_Score_Composite";
}

/// Canonical 29-column layout of model version 1.x.
pub const DEFAULT_COLUMNS: [&str; 29] = [
    names::AGE,
    names::YEARS_SMOKED,
    names::PACK_YEARS,
    names::BMI,
    names::LUNG_FUNCTION,
    names::AIR_QUALITY,
    names::TUMOR_SIZE,
    names::AGE_18_40,
    names::AGE_41_60,
    names::AGE_61_PLUS,
    cat::GENDER,
    cat::SMOKING_HISTORY,
    names::FAMILY_HISTORY,
    cat::OCCUPATION,
    names::TOXINS,
    cat::RESIDENTIAL_AREA,
    names::CHEST_PAIN,
    names::SHORTNESS_OF_BREATH,
    names::CHRONIC_COUGH,
    names::WEIGHT_LOSS,
    cat::PHYSICAL_ACTIVITY,
    cat::DIETARY_HABITS,
    names::COMORBIDITIES,
    names::PREVIOUS_CANCER,
    names::PACK_YEARS_NORMALIZED,
    names::SMOKING_RISK_LEVEL,
    names::SYMPTOM_COUNT,
    names::ENVIRONMENTAL_RISK,
    names::RISK_SCORE_COMPOSITE,
];

/// Air quality index above which the environment counts as a risk.
pub const AQI_RISK_THRESHOLD: f64 = 100.0;

/// Versioned, immutable column order. Cloning shares the underlying list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnOrder {
    version: Arc<str>,
    columns: Arc<[String]>,
}

impl ColumnOrder {
    #[must_use]
    pub fn new<I, S>(version: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let version: String = version.into();
        Self {
            version: Arc::from(version),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// The canonical layout, tagged with `version`.
    #[must_use]
    pub fn canonical(version: impl Into<String>) -> Self {
        Self::new(version, DEFAULT_COLUMNS)
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Position of the first duplicated column name, if any.
    #[must_use]
    pub fn first_duplicate(&self) -> Option<usize> {
        let mut seen = std::collections::BTreeSet::new();
        self.columns.iter().position(|c| !seen.insert(c.as_str()))
    }
}

/// Numeric features in [`ColumnOrder`] order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    columns: ColumnOrder,
    values: Vec<f64>,
}

impl FeatureVector {
    #[must_use]
    pub fn columns(&self) -> &ColumnOrder {
        &self.columns
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of a named column.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<f64> {
        self.columns
            .names()
            .iter()
            .position(|c| c == column)
            .map(|i| self.values[i])
    }
}

/// Weights of the composite risk score. Fixed constants, not learned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeWeights {
    pub age: f64,
    pub pack_years: f64,
    pub symptoms: f64,
    pub family_history: f64,
    pub environment: f64,
    pub lung_function: f64,
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            age: 0.15,
            pack_years: 0.25,
            symptoms: 0.20,
            family_history: 0.15,
            environment: 0.10,
            lung_function: 0.15,
        }
    }
}

impl CompositeWeights {
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.age
            + self.pack_years
            + self.symptoms
            + self.family_history
            + self.environment
            + self.lung_function
    }

    fn all(&self) -> [f64; 6] {
        [
            self.age,
            self.pack_years,
            self.symptoms,
            self.family_history,
            self.environment,
            self.lung_function,
        ]
    }

    #[must_use]
    pub fn any_negative(&self) -> bool {
        self.all().iter().any(|w| *w < 0.0 || !w.is_finite())
    }
}

/// Constants used by the derived features.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DerivationConfig {
    /// Pack-years at which `Pack_Years_Normalized` saturates at 1.0.
    pub pack_years_cap: f64,
    pub weights: CompositeWeights,
}

impl Default for DerivationConfig {
    fn default() -> Self {
        Self {
            pack_years_cap: 100.0,
            weights: CompositeWeights::default(),
        }
    }
}

/// One-hot age bucket: (18–40, 41–60, 61+).
#[must_use]
pub fn age_buckets(age: f64) -> [f64; 3] {
    if age <= 40.0 {
        [1.0, 0.0, 0.0]
    } else if age <= 60.0 {
        [0.0, 1.0, 0.0]
    } else {
        [0.0, 0.0, 1.0]
    }
}

/// `min(pack_years / cap, 1.0)`, floored at zero.
#[must_use]
pub fn pack_years_normalized(pack_years: f64, cap: f64) -> f64 {
    (pack_years / cap).clamp(0.0, 1.0)
}

/// Ordinal 0–3: 0 for never-smokers, else tiered by pack-years.
#[must_use]
pub fn smoking_risk_level(never_smoker: bool, pack_years: f64) -> u8 {
    if never_smoker {
        0
    } else if pack_years > 30.0 {
        3
    } else if pack_years > 15.0 {
        2
    } else {
        1
    }
}

/// Count of positive symptom flags, 0–4.
#[must_use]
pub fn symptom_count(record: &PatientRecord) -> u8 {
    record.symptoms().iter().filter(|s| **s).count() as u8
}

/// Poor air (AQI > 100) plus toxin exposure, 0–2.
#[must_use]
pub fn environmental_risk(air_quality_index: f64, exposure_to_toxins: bool) -> u8 {
    u8::from(air_quality_index > AQI_RISK_THRESHOLD) + u8::from(exposure_to_toxins)
}

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn is_never_smoker(record: &PatientRecord) -> bool {
    record.smoking_history.trim().eq_ignore_ascii_case("never")
}

/// Every feature the deriver knows how to produce, by column name.
fn named_features(
    record: &PatientRecord,
    encoders: &EncoderRegistry,
    config: &DerivationConfig,
) -> BTreeMap<&'static str, f64> {
    let mut f = BTreeMap::new();

    f.insert(names::AGE, record.age);
    f.insert(names::YEARS_SMOKED, record.years_smoked);
    f.insert(names::PACK_YEARS, record.pack_years);
    f.insert(names::BMI, record.bmi);
    f.insert(names::LUNG_FUNCTION, record.lung_function_pct);
    f.insert(names::AIR_QUALITY, record.air_quality_index);
    f.insert(names::TUMOR_SIZE, record.tumor_size_cm);

    let [young, middle, senior] = age_buckets(record.age);
    f.insert(names::AGE_18_40, young);
    f.insert(names::AGE_41_60, middle);
    f.insert(names::AGE_61_PLUS, senior);

    f.insert(cat::GENDER, encoders.encode(cat::GENDER, &record.gender));
    f.insert(
        cat::SMOKING_HISTORY,
        encoders.encode(cat::SMOKING_HISTORY, &record.smoking_history),
    );
    f.insert(cat::OCCUPATION, encoders.encode(cat::OCCUPATION, &record.occupation));
    f.insert(
        cat::RESIDENTIAL_AREA,
        encoders.encode(cat::RESIDENTIAL_AREA, &record.residential_area),
    );
    f.insert(
        cat::PHYSICAL_ACTIVITY,
        encoders.encode(cat::PHYSICAL_ACTIVITY, &record.physical_activity_level),
    );
    f.insert(
        cat::DIETARY_HABITS,
        encoders.encode(cat::DIETARY_HABITS, &record.dietary_habits),
    );

    f.insert(names::FAMILY_HISTORY, flag(record.family_history_cancer));
    f.insert(names::TOXINS, flag(record.exposure_to_toxins));
    f.insert(names::CHEST_PAIN, flag(record.chest_pain));
    f.insert(names::SHORTNESS_OF_BREATH, flag(record.shortness_of_breath));
    f.insert(names::CHRONIC_COUGH, flag(record.chronic_cough));
    f.insert(names::WEIGHT_LOSS, flag(record.weight_loss));
    f.insert(names::PREVIOUS_CANCER, flag(record.previous_cancer_diagnosis));
    f.insert(names::COMORBIDITIES, record.comorbidities_count() as f64);

    let pyn = pack_years_normalized(record.pack_years, config.pack_years_cap);
    let symptoms = f64::from(symptom_count(record));
    let environment = f64::from(environmental_risk(
        record.air_quality_index,
        record.exposure_to_toxins,
    ));

    f.insert(names::PACK_YEARS_NORMALIZED, pyn);
    f.insert(
        names::SMOKING_RISK_LEVEL,
        f64::from(smoking_risk_level(is_never_smoker(record), record.pack_years)),
    );
    f.insert(names::SYMPTOM_COUNT, symptoms);
    f.insert(names::ENVIRONMENTAL_RISK, environment);

    let w = &config.weights;
    let composite = (record.age / 100.0) * w.age
        + pyn * w.pack_years
        + (symptoms / 4.0) * w.symptoms
        + flag(record.family_history_cancer) * w.family_history
        + environment * w.environment
        + (1.0 - record.lung_function_pct / 100.0) * w.lung_function;
    f.insert(names::RISK_SCORE_COMPOSITE, composite);

    f
}

/// Derive the feature vector for `record` in `columns` order.
///
/// Pure: the same record, encoders, order and config always produce the
/// same vector. The record must already have passed
/// [`PatientRecord::validate`].
#[must_use]
pub fn derive(
    record: &PatientRecord,
    encoders: &EncoderRegistry,
    columns: &ColumnOrder,
    config: &DerivationConfig,
) -> FeatureVector {
    let named = named_features(record, encoders, config);
    let values = columns
        .names()
        .iter()
        .map(|c| named.get(c.as_str()).copied().unwrap_or(0.0))
        .collect();

    FeatureVector {
        columns: columns.clone(),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::encoders::UNSEEN_SENTINEL;
    use proptest::prelude::*;

    fn scenario_a() -> PatientRecord {
        PatientRecord {
            age: 55.0,
            gender: "Male".into(),
            smoking_history: "Current".into(),
            years_smoked: 20.0,
            pack_years: 30.0,
            bmi: 27.5,
            lung_function_pct: 75.0,
            air_quality_index: 80.0,
            chest_pain: true,
            shortness_of_breath: true,
            chronic_cough: true,
            family_history_cancer: true,
            comorbidities: Some("DIABETES,HYPERTENSION".into()),
            occupation: "Construction Worker".into(),
            physical_activity_level: "Low".into(),
            ..Default::default()
        }
    }

    fn derive_default(record: &PatientRecord) -> FeatureVector {
        derive(
            record,
            &EncoderRegistry::builtin(),
            &ColumnOrder::canonical("1.0.0"),
            &DerivationConfig::default(),
        )
    }

    #[test]
    fn test_canonical_vector_shape() {
        let v = derive_default(&scenario_a());
        assert_eq!(v.len(), 29);
        assert_eq!(v.columns().version(), "1.0.0");
        assert!(v.values().iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_scenario_a_derived_values() {
        let v = derive_default(&scenario_a());
        assert_eq!(v.get(names::AGE_41_60), Some(1.0));
        assert_eq!(v.get(names::AGE_18_40), Some(0.0));
        assert_eq!(v.get(cat::SMOKING_HISTORY), Some(2.0));
        assert_eq!(v.get(cat::GENDER), Some(1.0));
        assert_eq!(v.get(cat::OCCUPATION), Some(2.0));
        assert_eq!(v.get(names::SYMPTOM_COUNT), Some(3.0));
        assert_eq!(v.get(names::ENVIRONMENTAL_RISK), Some(0.0));
        assert_eq!(v.get(names::COMORBIDITIES), Some(2.0));
        // 30 pack-years is not > 30
        assert_eq!(v.get(names::SMOKING_RISK_LEVEL), Some(2.0));
        assert_eq!(v.get(names::PACK_YEARS_NORMALIZED), Some(0.3));

        let expected = 0.55 * 0.15 + 0.3 * 0.25 + 0.75 * 0.20 + 0.15 + 0.0 + 0.25 * 0.15;
        let composite = v.get(names::RISK_SCORE_COMPOSITE).expect("present");
        assert!((composite - expected).abs() < 1e-12);
    }

    #[test]
    fn test_missing_and_unknown_columns_zero_filled() {
        let order = ColumnOrder::new("2.0.0", ["Symptom_Count", "Radon_Exposure", "Age"]);
        let v = derive(
            &scenario_a(),
            &EncoderRegistry::builtin(),
            &order,
            &DerivationConfig::default(),
        );
        assert_eq!(v.values(), &[3.0, 0.0, 55.0]);
    }

    #[test]
    fn test_unseen_categorical_is_sentinel() {
        let record = PatientRecord {
            residential_area: "Orbital".into(),
            ..Default::default()
        };
        let v = derive_default(&record);
        assert_eq!(v.get(cat::RESIDENTIAL_AREA), Some(UNSEEN_SENTINEL));
    }

    #[test]
    fn test_never_smoker_risk_level_zero() {
        let record = PatientRecord {
            smoking_history: "Never".into(),
            pack_years: 45.0,
            ..Default::default()
        };
        assert_eq!(derive_default(&record).get(names::SMOKING_RISK_LEVEL), Some(0.0));
    }

    #[test]
    fn test_smoking_risk_breakpoints() {
        assert_eq!(smoking_risk_level(false, 0.0), 1);
        assert_eq!(smoking_risk_level(false, 15.0), 1);
        assert_eq!(smoking_risk_level(false, 15.5), 2);
        assert_eq!(smoking_risk_level(false, 30.0), 2);
        assert_eq!(smoking_risk_level(false, 30.1), 3);
        assert_eq!(smoking_risk_level(true, 80.0), 0);
    }

    #[test]
    fn test_environmental_risk() {
        assert_eq!(environmental_risk(100.0, false), 0);
        assert_eq!(environmental_risk(101.0, false), 1);
        assert_eq!(environmental_risk(150.0, true), 2);
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let a = derive_default(&scenario_a());
        let b = derive_default(&scenario_a());
        assert_eq!(a, b);
    }

    #[test]
    fn test_duplicate_column_detection() {
        let order = ColumnOrder::new("x", ["Age", "BMI", "Age"]);
        assert_eq!(order.first_duplicate(), Some(2));
        assert_eq!(ColumnOrder::canonical("x").first_duplicate(), None);
    }

    proptest! {
        #[test]
        fn prop_exactly_one_age_bucket(age in 18.0..=120.0f64) {
            let buckets = age_buckets(age);
            prop_assert_eq!(buckets.iter().sum::<f64>(), 1.0);
            prop_assert!(buckets.iter().all(|b| *b == 0.0 || *b == 1.0));
        }

        #[test]
        fn prop_pack_years_normalized_monotone_and_bounded(
            a in 0.0..500.0f64,
            b in 0.0..500.0f64,
        ) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let n_lo = pack_years_normalized(lo, 100.0);
            let n_hi = pack_years_normalized(hi, 100.0);
            prop_assert!(n_lo <= n_hi);
            prop_assert!((0.0..=1.0).contains(&n_lo));
            prop_assert!((0.0..=1.0).contains(&n_hi));
            if hi >= 100.0 {
                prop_assert_eq!(n_hi, 1.0);
            }
        }

        #[test]
        fn prop_symptom_count_matches_flags(flags in proptest::array::uniform4(any::<bool>())) {
            let record = PatientRecord {
                chest_pain: flags[0],
                shortness_of_breath: flags[1],
                chronic_cough: flags[2],
                weight_loss: flags[3],
                ..Default::default()
            };
            let expected = flags.iter().filter(|f| **f).count() as u8;
            prop_assert_eq!(symptom_count(&record), expected);
        }

        #[test]
        fn prop_valid_records_give_full_finite_vectors(
            age in 18.0..=120.0f64,
            bmi in 10.0..=60.0f64,
            lung in 0.0..=150.0f64,
            pack_years in 0.0..200.0f64,
            aqi in 0.0..=500.0f64,
        ) {
            let record = PatientRecord {
                age,
                bmi,
                lung_function_pct: lung,
                pack_years,
                air_quality_index: aqi,
                smoking_history: "Former".into(),
                ..Default::default()
            };
            prop_assert!(record.validate().is_ok());
            let v = derive_default(&record);
            prop_assert_eq!(v.len(), DEFAULT_COLUMNS.len());
            prop_assert!(v.values().iter().all(|x| x.is_finite()));
        }
    }
}
