//! Patient record types for lung-cancer risk prediction.
//!
//! A record arrives as loosely-typed transport data: numeric measurements,
//! categorical labels as free strings, and boolean symptom/history flags.
//! Categorical values are encoded later by the [`EncoderRegistry`]; this
//! module only checks numeric ranges.
//!
//! [`EncoderRegistry`]: super::EncoderRegistry

use serde::{Deserialize, Serialize};

/// Sentinel meaning "no comorbidities" in the comorbidities field.
pub const NO_COMORBIDITIES: &str = "NONE";

/// Raw clinical record for a single patient.
///
/// Field defaults mirror what the intake forms submit when a value is left
/// blank, so partially-filled JSON still deserializes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientRecord {
    /// Caller-supplied reference (never used as a feature)
    pub id: Option<String>,

    // Demographics
    /// Age in years, [18, 120]
    pub age: f64,
    pub gender: String,

    // Smoking
    pub years_smoked: f64,
    /// Packs per day × years smoked, >= 0
    pub pack_years: f64,
    /// Never / Former / Current
    pub smoking_history: String,

    // Measurements
    /// Body mass index, [10, 60]
    pub bmi: f64,
    /// FEV1 as percent of predicted, [0, 150]
    #[serde(alias = "lung_function_test_result")]
    pub lung_function_pct: f64,
    /// [0, 500]
    pub air_quality_index: f64,
    pub tumor_size_cm: f64,

    // Environment and lifestyle
    /// Urban / Suburban / Rural
    pub residential_area: String,
    /// Low / Moderate / High
    pub physical_activity_level: String,
    /// Poor / Average / Good
    pub dietary_habits: String,
    pub occupation: String,
    pub exposure_to_toxins: bool,

    // Symptoms
    #[serde(alias = "chest_pain_symptoms")]
    pub chest_pain: bool,
    pub shortness_of_breath: bool,
    pub chronic_cough: bool,
    pub weight_loss: bool,

    // History
    pub family_history_cancer: bool,
    pub previous_cancer_diagnosis: bool,
    /// Comma-separated list, or `NONE`
    pub comorbidities: Option<String>,
}

impl Default for PatientRecord {
    fn default() -> Self {
        Self {
            id: None,
            age: 45.0,
            gender: "Male".to_string(),
            years_smoked: 0.0,
            pack_years: 0.0,
            smoking_history: "Never".to_string(),
            bmi: 25.0,
            lung_function_pct: 85.0,
            air_quality_index: 50.0,
            tumor_size_cm: 0.0,
            residential_area: "Urban".to_string(),
            physical_activity_level: "Moderate".to_string(),
            dietary_habits: "Average".to_string(),
            occupation: "Unknown".to_string(),
            exposure_to_toxins: false,
            chest_pain: false,
            shortness_of_breath: false,
            chronic_cough: false,
            weight_loss: false,
            family_history_cancer: false,
            previous_cancer_diagnosis: false,
            comorbidities: Some(NO_COMORBIDITIES.to_string()),
        }
    }
}

/// A single failed range check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn check_range(
    errors: &mut Vec<FieldError>,
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) {
    if !value.is_finite() {
        errors.push(FieldError {
            field,
            message: format!("{value} is not a finite number"),
        });
    } else if !(min..=max).contains(&value) {
        errors.push(FieldError {
            field,
            message: format!("{value} out of range [{min}, {max}]"),
        });
    }
}

fn check_non_negative(errors: &mut Vec<FieldError>, field: &'static str, value: f64) {
    check_range(errors, field, value, 0.0, f64::MAX);
}

impl PatientRecord {
    /// Validate every numeric field against its clinical range.
    ///
    /// Categorical strings are not checked: unseen labels degrade to a
    /// fallback encoding at derivation time rather than failing.
    ///
    /// # Errors
    /// Returns every failed check, not just the first.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        check_range(&mut errors, "age", self.age, 18.0, 120.0);
        check_range(&mut errors, "bmi", self.bmi, 10.0, 60.0);
        check_range(&mut errors, "lung_function_pct", self.lung_function_pct, 0.0, 150.0);
        check_range(&mut errors, "air_quality_index", self.air_quality_index, 0.0, 500.0);
        check_range(&mut errors, "tumor_size_cm", self.tumor_size_cm, 0.0, 20.0);
        check_non_negative(&mut errors, "pack_years", self.pack_years);
        check_non_negative(&mut errors, "years_smoked", self.years_smoked);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Symptom flags in canonical order: chest pain, shortness of breath,
    /// chronic cough, weight loss.
    #[must_use]
    pub fn symptoms(&self) -> [bool; 4] {
        [
            self.chest_pain,
            self.shortness_of_breath,
            self.chronic_cough,
            self.weight_loss,
        ]
    }

    /// Number of listed comorbidities; `None`, blank and `NONE` count as zero.
    #[must_use]
    pub fn comorbidities_count(&self) -> usize {
        match self.comorbidities.as_deref().map(str::trim) {
            None | Some("") => 0,
            Some(s) if s.eq_ignore_ascii_case(NO_COMORBIDITIES) => 0,
            Some(s) => s.split(',').count(),
        }
    }
}
