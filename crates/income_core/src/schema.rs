//! Feature schema for the census income dataset
//!
//! Column names, the inference request record and the salary bracket label.
//! Feature vectors are always laid out in [`FEATURE_COLUMNS`] order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Input columns in feature-vector order
pub const FEATURE_COLUMNS: [&str; 10] = [
    "age",
    "workclass",
    "education",
    "marital-status",
    "occupation",
    "relationship",
    "race",
    "gender",
    "hours-per-week",
    "native-country",
];

/// Columns encoded as ordinal category codes
pub const CATEGORICAL_COLUMNS: [&str; 8] = [
    "workclass",
    "education",
    "marital-status",
    "occupation",
    "relationship",
    "race",
    "gender",
    "native-country",
];

/// Columns passed through as raw integers
pub const NUMERIC_COLUMNS: [&str; 2] = ["age", "hours-per-week"];

/// Label column
pub const TARGET_COLUMN: &str = "income";

/// Sentinel used by the raw dataset for missing values
pub const MISSING_SENTINEL: &str = "?";

/// Whether a feature column holds integers or categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

/// Kind of a known feature column, `None` for anything outside the schema
pub fn column_kind(column: &str) -> Option<ColumnKind> {
    if NUMERIC_COLUMNS.contains(&column) {
        Some(ColumnKind::Numeric)
    } else if CATEGORICAL_COLUMNS.contains(&column) {
        Some(ColumnKind::Categorical)
    } else {
        None
    }
}

/// A single feature value borrowed from a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Numeric(i64),
    /// `None` when the category is missing
    Categorical(Option<&'a str>),
}

/// Raw, not yet encoded, feature values for one person
///
/// This is the request shape handed in by callers. Values are not validated
/// against the known category lists; unknown categories fall into the
/// encoder's overflow bucket at inference time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IncomeRecord {
    pub age: i64,
    pub workclass: String,
    pub education: String,
    pub marital_status: String,
    pub occupation: String,
    pub relationship: String,
    pub race: String,
    pub gender: String,
    pub hours_per_week: i64,
    pub native_country: String,
}

fn categorical(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

impl IncomeRecord {
    /// Look up a feature by its column name
    pub fn field(&self, column: &str) -> Option<FieldValue<'_>> {
        let value = match column {
            "age" => FieldValue::Numeric(self.age),
            "hours-per-week" => FieldValue::Numeric(self.hours_per_week),
            "workclass" => FieldValue::Categorical(categorical(&self.workclass)),
            "education" => FieldValue::Categorical(categorical(&self.education)),
            "marital-status" => FieldValue::Categorical(categorical(&self.marital_status)),
            "occupation" => FieldValue::Categorical(categorical(&self.occupation)),
            "relationship" => FieldValue::Categorical(categorical(&self.relationship)),
            "race" => FieldValue::Categorical(categorical(&self.race)),
            "gender" => FieldValue::Categorical(categorical(&self.gender)),
            "native-country" => FieldValue::Categorical(categorical(&self.native_country)),
            _ => return None,
        };

        Some(value)
    }

    /// Categorical value of `column`, `None` if missing or not categorical
    pub fn category(&self, column: &str) -> Option<&str> {
        match self.field(column)? {
            FieldValue::Categorical(value) => value,
            FieldValue::Numeric(_) => None,
        }
    }
}

/// Salary bracket predicted by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IncomeBracket {
    #[serde(rename = "<=50K")]
    AtMost50K,
    #[serde(rename = ">50K")]
    Above50K,
}

impl IncomeBracket {
    /// All labels in class-index order (lexical order of the label strings)
    pub const ALL: [IncomeBracket; 2] = [IncomeBracket::AtMost50K, IncomeBracket::Above50K];

    pub fn as_str(&self) -> &'static str {
        match self {
            IncomeBracket::AtMost50K => "<=50K",
            IncomeBracket::Above50K => ">50K",
        }
    }

    /// Position of this label in the classifier's class list
    pub fn class_index(&self) -> usize {
        match self {
            IncomeBracket::AtMost50K => 0,
            IncomeBracket::Above50K => 1,
        }
    }

    pub fn from_class_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Class names as stored in the model artifact
    pub fn class_names() -> Vec<String> {
        Self::ALL.iter().map(|label| label.as_str().to_string()).collect()
    }
}

impl fmt::Display for IncomeBracket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a label string is neither bracket
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown income label: {0:?}")]
pub struct ParseBracketError(pub String);

impl FromStr for IncomeBracket {
    type Err = ParseBracketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // The census test split writes labels with a trailing period.
        let trimmed = s.trim();
        let label = trimmed.strip_suffix('.').unwrap_or(trimmed);
        match label {
            "<=50K" => Ok(IncomeBracket::AtMost50K),
            ">50K" => Ok(IncomeBracket::Above50K),
            _ => Err(ParseBracketError(s.to_string())),
        }
    }
}
