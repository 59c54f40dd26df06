//! Salary bracket trainer and prediction pipeline
//!
//! Loads and cleans the census income dataset, fits the categorical encoders,
//! trains a deterministic random forest with class-balanced weights and
//! exposes the trained pair through [`PredictionPipeline`].

pub mod cart;
pub mod config;
pub mod dataset;
pub mod deterministic;
pub mod errors;
pub mod evaluation;
pub mod forest;
pub mod pipeline;
pub mod split;

pub use config::{ClassWeight, ForestConfig, MaxFeatures, PipelineConfig, SplitConfig};
pub use dataset::{Dataset, LabeledRecord};
pub use deterministic::{LcgRng, SplitTieBreaker};
pub use errors::{ConfigError, DatasetError, PredictionError, TrainingError};
pub use evaluation::{accuracy, ClassificationReport};
pub use forest::ForestTrainer;
pub use pipeline::{describe_metrics, PipelineState, PredictionPipeline, TrainOutcome, TrainingReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
