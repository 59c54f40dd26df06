use income_core::CoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading and cleaning the raw dataset
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read dataset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("dataset is missing required column {0:?}")]
    MissingColumn(String),

    #[error("line {line}, column {column:?}: {value:?} is not an integer")]
    InvalidNumber {
        line: u64,
        column: String,
        value: String,
    },

    #[error("line {line}: {value:?} is not an income label")]
    InvalidLabel { line: u64, value: String },

    #[error("dataset has no usable rows after cleaning ({dropped} rows dropped)")]
    Empty { dropped: usize },
}

/// Errors returned by a training run
///
/// A failed run never touches previously saved artifacts.
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("cannot train on an empty dataset")]
    EmptyDataset,

    #[error("training data contains a single class: {0}")]
    SingleClass(String),

    #[error("train/test split failed: {0}")]
    Split(String),

    #[error("invalid training configuration: {0}")]
    Config(String),

    #[error("no trained model to save")]
    NotTrained,

    #[error("artifact error: {0}")]
    Artifact(#[from] CoreError),
}

/// Errors returned by a prediction request
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("model is not ready: train or load a model first")]
    NotReady,

    #[error("encoded record has {actual} features, model expects {expected}")]
    FeatureMismatch { expected: usize, actual: usize },

    #[error("model returned unknown class index {0}")]
    UnknownClass(usize),
}

/// Errors loading the pipeline configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value {value:?} for {key}")]
    InvalidEnv { key: String, value: String },
}
