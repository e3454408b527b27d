//! Categorical label encoders learned at training time.
//!
//! Each encoder maps a label to its index in a fixed, ordered class list.
//! Lookup is case-insensitive and ignores surrounding whitespace. Unseen
//! labels never fail: they go to the encoder's fallback class when one is
//! configured, else to [`UNSEEN_SENTINEL`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Encoding used for a label the encoder has never seen.
pub const UNSEEN_SENTINEL: f64 = -1.0;

/// Column names of the categorical features.
pub mod columns {
    pub const GENDER: &str = "Gender";
    pub const SMOKING_HISTORY: &str = "Smoking_History";
    pub const RESIDENTIAL_AREA: &str = "Residential_Area";
    pub const PHYSICAL_ACTIVITY: &str = "Physical_Activity_Level";
    pub const DIETARY_HABITS: &str = "Dietary_Habits";
    pub const OCCUPATION: &str = "Occupation";
}

/// Occupations known to the default encoder. Anything else is `Other`.
const DEFAULT_OCCUPATIONS: [&str; 12] = [
    "Other",
    "Office Worker",
    "Construction Worker",
    "Mining",
    "Factory Worker",
    "Farmer",
    "Driver",
    "Healthcare",
    "Teacher",
    "Engineer",
    "Retired",
    "Unemployed",
];

/// Ordered label → index encoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fallback: Option<String>,
}

impl LabelEncoder {
    /// Create an encoder with no fallback class (unseen → sentinel).
    #[must_use]
    pub fn new<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            classes: classes.into_iter().map(Into::into).collect(),
            fallback: None,
        }
    }

    /// Route unseen labels to `fallback` instead of the sentinel.
    ///
    /// The fallback is ignored at lookup time if it is not itself a class.
    #[must_use]
    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }

    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    fn index_of(&self, label: &str) -> Option<usize> {
        let label = label.trim();
        self.classes
            .iter()
            .position(|c| c.eq_ignore_ascii_case(label))
    }

    /// Encode a label.
    #[must_use]
    pub fn encode(&self, label: &str) -> f64 {
        self.index_of(label)
            .or_else(|| self.fallback.as_deref().and_then(|f| self.index_of(f)))
            .map_or(UNSEEN_SENTINEL, |idx| idx as f64)
    }

    /// Whether `label` is a known class (fallbacks do not count).
    #[must_use]
    pub fn knows(&self, label: &str) -> bool {
        self.index_of(label).is_some()
    }
}

/// Encoders keyed by feature column. Read-only once built.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncoderRegistry {
    encoders: BTreeMap<String, LabelEncoder>,
}

impl EncoderRegistry {
    /// An empty registry: every lookup yields the sentinel.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Encoders matching the training pipeline's label order.
    #[must_use]
    pub fn builtin() -> Self {
        let mut encoders = BTreeMap::new();
        encoders.insert(
            columns::GENDER.to_string(),
            LabelEncoder::new(["Female", "Male"]),
        );
        encoders.insert(
            columns::SMOKING_HISTORY.to_string(),
            LabelEncoder::new(["Never", "Former", "Current"]),
        );
        encoders.insert(
            columns::RESIDENTIAL_AREA.to_string(),
            LabelEncoder::new(["Urban", "Suburban", "Rural"]),
        );
        encoders.insert(
            columns::PHYSICAL_ACTIVITY.to_string(),
            LabelEncoder::new(["Low", "Moderate", "High"]),
        );
        encoders.insert(
            columns::DIETARY_HABITS.to_string(),
            LabelEncoder::new(["Poor", "Average", "Good"]),
        );
        encoders.insert(
            columns::OCCUPATION.to_string(),
            LabelEncoder::new(DEFAULT_OCCUPATIONS).with_fallback("Other"),
        );
        Self { encoders }
    }

    /// Overlay `other` on top of `self`; encoders in `other` win.
    #[must_use]
    pub fn merged_with(mut self, other: EncoderRegistry) -> Self {
        self.encoders.extend(other.encoders);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, encoder: LabelEncoder) {
        self.encoders.insert(column.into(), encoder);
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&LabelEncoder> {
        self.encoders.get(column)
    }

    /// Encode `label` for `column`; a column without an encoder yields the
    /// sentinel.
    #[must_use]
    pub fn encode(&self, column: &str, label: &str) -> f64 {
        self.encoders
            .get(column)
            .map_or(UNSEEN_SENTINEL, |e| e.encode(label))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.encoders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.encoders.is_empty()
    }
}
