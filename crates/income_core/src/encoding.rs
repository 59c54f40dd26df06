//! Ordinal category encoders
//!
//! Each categorical column gets a [`CategoryEncoder`]: the sorted list of
//! categories seen at training time, where a category's code is its index.
//! Encoders are fitted once, persisted next to the classifier and only ever
//! looked up afterwards.
//!
//! Lookups never fail. A category that was not seen during training maps to
//! the overflow bucket `classes.len()`, one past the highest known code, and a
//! column with no encoder at all maps to `0`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

use crate::schema::{FieldValue, IncomeRecord, FEATURE_COLUMNS};
use crate::serde_canon::{hash_canonical_hex, CanonicalError};

/// Category used for residual missing values when fitting
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Metric counting overflow-bucket lookups, labelled by column
pub const UNSEEN_CATEGORY_METRIC: &str = "income_unseen_category_total";

/// Outcome of looking a category up in an encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeLookup {
    /// Category seen during training
    Known(i64),
    /// Category not seen during training; carries the overflow code
    Unseen(i64),
    /// No encoder exists for the column
    MissingEncoder,
}

impl CodeLookup {
    pub fn code(&self) -> i64 {
        match *self {
            CodeLookup::Known(code) | CodeLookup::Unseen(code) => code,
            CodeLookup::MissingEncoder => 0,
        }
    }

    pub fn is_fallback(&self) -> bool {
        !matches!(self, CodeLookup::Known(_))
    }
}

/// Sorted category list for a single column
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEncoder {
    classes: Vec<String>,
}

impl CategoryEncoder {
    /// Fit from observed values; `None` is recorded as [`UNKNOWN_CATEGORY`]
    pub fn fit<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let classes: BTreeSet<&str> = values
            .into_iter()
            .map(|value| value.unwrap_or(UNKNOWN_CATEGORY))
            .collect();

        Self {
            classes: classes.into_iter().map(str::to_string).collect(),
        }
    }

    /// Build an encoder from an explicit class list (sorted and deduplicated)
    pub fn from_classes<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let classes: BTreeSet<String> = classes.into_iter().map(Into::into).collect();
        Self {
            classes: classes.into_iter().collect(),
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Code for a known category
    pub fn code(&self, value: &str) -> Option<i64> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(value))
            .ok()
            .map(|idx| idx as i64)
    }

    /// Code for any value, falling back to the overflow bucket
    pub fn lookup(&self, value: Option<&str>) -> CodeLookup {
        let value = value.unwrap_or(UNKNOWN_CATEGORY);
        match self.code(value) {
            Some(code) => CodeLookup::Known(code),
            None => CodeLookup::Unseen(self.classes.len() as i64),
        }
    }

    /// Category for a code, if it is a known one
    pub fn decode(&self, code: i64) -> Option<&str> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| self.classes.get(idx))
            .map(String::as_str)
    }

    /// Class list is strictly increasing
    fn is_sorted_and_unique(&self) -> bool {
        self.classes.windows(2).all(|pair| pair[0] < pair[1])
    }
}

/// Feature vector for one record plus the columns that fell back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRecord {
    pub features: Vec<i64>,
    pub fallbacks: Vec<&'static str>,
}

/// One encoder per categorical column
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderSet {
    encoders: BTreeMap<String, CategoryEncoder>,
}

impl EncoderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit an encoder for every nominated column
    ///
    /// `values_of` yields the observed values of a column; missing values are
    /// passed as `None`.
    pub fn fit<'a, F, I>(columns: &[&'static str], mut values_of: F) -> Self
    where
        F: FnMut(&'static str) -> I,
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let encoders = columns
            .iter()
            .map(|&column| (column.to_string(), CategoryEncoder::fit(values_of(column))))
            .collect();

        Self { encoders }
    }

    pub fn insert(&mut self, column: impl Into<String>, encoder: CategoryEncoder) {
        self.encoders.insert(column.into(), encoder);
    }

    pub fn get(&self, column: &str) -> Option<&CategoryEncoder> {
        self.encoders.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.encoders.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.encoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoders.is_empty()
    }

    /// Code for a categorical value of `column`
    pub fn encode_value(&self, column: &str, value: Option<&str>) -> CodeLookup {
        match self.encoders.get(column) {
            Some(encoder) => encoder.lookup(value),
            None => CodeLookup::MissingEncoder,
        }
    }

    /// Encode a request record in inference mode
    ///
    /// Numeric columns pass through unchanged. Every fallback is logged and
    /// counted under [`UNSEEN_CATEGORY_METRIC`].
    pub fn encode_record(&self, record: &IncomeRecord) -> EncodedRecord {
        let mut features = Vec::with_capacity(FEATURE_COLUMNS.len());
        let mut fallbacks = Vec::new();

        for column in FEATURE_COLUMNS {
            match record.field(column) {
                Some(FieldValue::Numeric(value)) => features.push(value),
                Some(FieldValue::Categorical(value)) => {
                    let lookup = self.encode_value(column, value);
                    if lookup.is_fallback() {
                        warn!(
                            column,
                            value = value.unwrap_or(UNKNOWN_CATEGORY),
                            code = lookup.code(),
                            "category not seen during training, using fallback code"
                        );
                        metrics::counter!(UNSEEN_CATEGORY_METRIC, "column" => column).increment(1);
                        fallbacks.push(column);
                    }
                    features.push(lookup.code());
                }
                None => features.push(0),
            }
        }

        EncodedRecord {
            features,
            fallbacks,
        }
    }

    /// Reject encoders whose class lists are not sorted and unique
    pub fn validate(&self) -> Result<(), String> {
        for (column, encoder) in &self.encoders {
            if !encoder.is_sorted_and_unique() {
                return Err(format!("encoder for {column} is not sorted and unique"));
            }
        }
        Ok(())
    }

    /// Canonical digest binding a classifier to this encoder set
    pub fn hash_hex(&self) -> Result<String, CanonicalError> {
        hash_canonical_hex(self)
    }
}
