//! CSV dataset loading and cleaning
//!
//! Reads the census income CSV (header row required), trims every cell,
//! treats `?` and empty cells as missing and drops any row with a missing
//! value in any column. Columns outside the schema are ignored apart from
//! taking part in that drop rule.

use csv::{ReaderBuilder, StringRecord, Trim};
use income_core::schema::{
    IncomeBracket, IncomeRecord, FEATURE_COLUMNS, MISSING_SENTINEL, TARGET_COLUMN,
};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::errors::DatasetError;

/// One cleaned row: raw features plus the label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledRecord {
    pub record: IncomeRecord,
    pub label: IncomeBracket,
}

/// Cleaned training data
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    pub records: Vec<LabeledRecord>,
    /// Data rows read from the source, before cleaning
    pub rows_read: usize,
    /// Rows dropped for containing a missing value
    pub rows_dropped: usize,
}

/// Positions of the schema columns in the CSV header
struct ColumnIndex {
    features: [usize; FEATURE_COLUMNS.len()],
    target: usize,
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord) -> Result<Self, DatasetError> {
        let position = |name: &str| {
            headers
                .iter()
                .position(|header| header == name)
                .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))
        };

        let mut features = [0usize; FEATURE_COLUMNS.len()];
        for (slot, column) in features.iter_mut().zip(FEATURE_COLUMNS) {
            *slot = position(column)?;
        }

        Ok(Self {
            features,
            target: position(TARGET_COLUMN)?,
        })
    }
}

fn is_missing(cell: &str) -> bool {
    cell.is_empty() || cell == MISSING_SENTINEL
}

impl Dataset {
    /// Load and clean a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let dataset = Self::from_reader(file)?;
        info!(
            path = %path.display(),
            rows = dataset.len(),
            columns = FEATURE_COLUMNS.len() + 1,
            dropped = dataset.rows_dropped,
            "Dataset loaded"
        );
        Ok(dataset)
    }

    /// Load and clean CSV data from any reader
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DatasetError> {
        let mut csv = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(reader);

        let index = ColumnIndex::from_headers(csv.headers()?)?;

        let mut records = Vec::new();
        let mut rows_read = 0usize;
        let mut rows_dropped = 0usize;

        for row in csv.records() {
            let row = row?;
            rows_read += 1;

            if row.iter().any(is_missing) {
                rows_dropped += 1;
                continue;
            }

            let line = row.position().map(|pos| pos.line()).unwrap_or(0);
            records.push(parse_row(&row, &index, line)?);
        }

        if rows_dropped > 0 {
            debug!(rows_dropped, "Dropped rows with missing values");
        }

        if records.is_empty() {
            return Err(DatasetError::Empty {
                dropped: rows_dropped,
            });
        }

        Ok(Self {
            records,
            rows_read,
            rows_dropped,
        })
    }

    /// Wrap already-clean records
    pub fn from_records(records: Vec<LabeledRecord>) -> Self {
        let rows_read = records.len();
        Self {
            records,
            rows_read,
            rows_dropped: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Label of every row, in row order
    pub fn labels(&self) -> Vec<IncomeBracket> {
        self.records.iter().map(|row| row.label).collect()
    }

    /// Row count per label, in class-index order
    pub fn class_counts(&self) -> Vec<(IncomeBracket, usize)> {
        IncomeBracket::ALL
            .iter()
            .map(|&label| {
                let count = self.records.iter().filter(|row| row.label == label).count();
                (label, count)
            })
            .collect()
    }

    /// Values of a categorical column, `None` where missing
    pub fn column_values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = Option<&'a str>> + 'a {
        self.records.iter().map(move |row| row.record.category(column))
    }
}

fn parse_row(row: &StringRecord, index: &ColumnIndex, line: u64) -> Result<LabeledRecord, DatasetError> {
    let cell = |idx: usize| row.get(idx).unwrap_or_default();
    let [age, workclass, education, marital_status, occupation, relationship, race, gender, hours_per_week, native_country] =
        index.features;

    let number = |idx: usize, column: &str| {
        let value = cell(idx);
        value.parse::<i64>().map_err(|_| DatasetError::InvalidNumber {
            line,
            column: column.to_string(),
            value: value.to_string(),
        })
    };

    let record = IncomeRecord {
        age: number(age, "age")?,
        workclass: cell(workclass).to_string(),
        education: cell(education).to_string(),
        marital_status: cell(marital_status).to_string(),
        occupation: cell(occupation).to_string(),
        relationship: cell(relationship).to_string(),
        race: cell(race).to_string(),
        gender: cell(gender).to_string(),
        hours_per_week: number(hours_per_week, "hours-per-week")?,
        native_country: cell(native_country).to_string(),
    };

    let raw_label = cell(index.target);
    let label = raw_label
        .parse::<IncomeBracket>()
        .map_err(|_| DatasetError::InvalidLabel {
            line,
            value: raw_label.to_string(),
        })?;

    Ok(LabeledRecord { record, label })
}
