//! Prediction values handed back to callers
//!
//! The pipeline does not store predictions. Callers that keep a history
//! build a [`PredictionRecord`] and persist it themselves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::{IncomeBracket, IncomeRecord};

/// Label and confidence for one request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: IncomeBracket,
    /// Probability of `label`, in `[0, 1]`
    pub confidence: f64,
}

/// A request, its prediction and the model that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub record: IncomeRecord,
    pub label: IncomeBracket,
    pub confidence: f64,
    pub model_hash: String,
    pub created_at: DateTime<Utc>,
}

impl PredictionRecord {
    pub fn new(record: IncomeRecord, prediction: Prediction, model_hash: impl Into<String>) -> Self {
        Self {
            record,
            label: prediction.label,
            confidence: prediction.confidence,
            model_hash: model_hash.into(),
            created_at: Utc::now(),
        }
    }

    pub fn is_high_income(&self) -> bool {
        self.label == IncomeBracket::Above50K
    }
}
