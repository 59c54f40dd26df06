//! Inference-side core of the salary bracket predictor
//!
//! Everything a serving process needs once a model has been trained:
//!
//! - `schema`: column names, the request record and the income label
//! - `encoding`: per-column ordinal encoders with an overflow bucket for
//!   categories not seen during training
//! - `forest`: random forest model format and deterministic inference
//! - `artifacts`: atomic save/load of the classifier and encoder pair
//! - `prediction`: values returned to callers
//! - `serde_canon`: canonical JSON and BLAKE3 hashing

pub mod artifacts;
pub mod encoding;
pub mod errors;
pub mod forest;
pub mod prediction;
pub mod schema;
pub mod serde_canon;

pub use artifacts::{ArtifactStore, ModelBundle, SavedArtifacts, ENCODERS_FILE, MODEL_FILE};
pub use encoding::{CategoryEncoder, CodeLookup, EncodedRecord, EncoderSet, UNKNOWN_CATEGORY};
pub use errors::CoreError;
pub use forest::{ClassScore, Forest, ForestMetadata, Node, Tree, SCALE};
pub use prediction::{Prediction, PredictionRecord};
pub use schema::{
    IncomeBracket, IncomeRecord, CATEGORICAL_COLUMNS, FEATURE_COLUMNS, MISSING_SENTINEL,
    NUMERIC_COLUMNS, TARGET_COLUMN,
};

/// Crate version string recorded in reports
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
