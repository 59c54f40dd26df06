//! Random forest classifier with deterministic inference
//!
//! Probabilities are averaged over trees in fixed-point integer arithmetic,
//! so the same model and feature vector always yield the same bits.

use super::tree::Tree;
use crate::serde_canon::{hash_canonical_hex, to_canonical_json, CanonicalError};
use serde::{Deserialize, Serialize};

/// Fixed-point scale for probabilities and importances (1e6)
pub const SCALE: i64 = 1_000_000;

/// Current artifact format version
pub const FORMAT_VERSION: i32 = 1;

/// Training provenance stored with the model; excluded from the structure hash
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForestMetadata {
    /// Unix timestamp (seconds) of the training run
    pub trained_at: i64,
    pub train_samples: usize,
    pub test_samples: usize,
    /// Held-out accuracy in units of [`SCALE`]
    pub accuracy: i64,
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: i64,
}

/// Ensemble of classification trees over encoded feature vectors
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Forest {
    /// Model format version
    pub version: i32,

    /// Fixed-point scale of leaf probabilities
    pub scale: i64,

    /// Class names in class-index order
    pub classes: Vec<String>,

    /// Feature names in feature-vector order
    pub feature_names: Vec<String>,

    pub trees: Vec<Tree>,

    /// Mean decrease in impurity per feature, in units of `scale`
    pub feature_importances: Vec<i64>,

    /// Hash of the encoder set the model was trained with
    pub encoder_hash: String,

    #[serde(default)]
    pub metadata: ForestMetadata,
}

/// Winning class and its averaged probability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassScore {
    pub class_index: usize,
    /// Probability in units of [`SCALE`]
    pub probability: i64,
}

impl ClassScore {
    /// Probability as a float in `[0, 1]`
    pub fn confidence(&self) -> f64 {
        (self.probability as f64 / SCALE as f64).clamp(0.0, 1.0)
    }
}

/// The learned part of a forest, used for hashing
#[derive(Serialize)]
struct ForestStructure<'a> {
    version: i32,
    scale: i64,
    classes: &'a [String],
    feature_names: &'a [String],
    trees: &'a [Tree],
}

impl Forest {
    pub fn new(classes: Vec<String>, feature_names: Vec<String>, trees: Vec<Tree>) -> Self {
        let feature_importances = vec![0; feature_names.len()];
        Self {
            version: FORMAT_VERSION,
            scale: SCALE,
            classes,
            feature_names,
            trees,
            feature_importances,
            encoder_hash: String::new(),
            metadata: ForestMetadata::default(),
        }
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Validate model structure
    pub fn validate(&self) -> Result<(), String> {
        if self.version != FORMAT_VERSION {
            return Err(format!("Unsupported model version: {}", self.version));
        }
        if self.scale <= 0 {
            return Err(format!("Invalid scale: {}", self.scale));
        }
        if self.classes.len() < 2 {
            return Err(format!("Expected at least 2 classes, got {}", self.classes.len()));
        }
        if self.trees.is_empty() {
            return Err("Model has no trees".to_string());
        }
        if self.feature_importances.len() != self.feature_names.len() {
            return Err(format!(
                "{} feature importances for {} features",
                self.feature_importances.len(),
                self.feature_names.len()
            ));
        }

        let (n_classes, n_features) = (self.n_classes(), self.n_features());
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(n_classes, n_features)
                .map_err(|e| format!("Tree {i} validation failed: {e}"))?;
        }

        Ok(())
    }

    /// Class probabilities averaged over all trees, in units of `scale`
    pub fn predict_proba(&self, features: &[i64]) -> Vec<i64> {
        let mut sums = vec![0i64; self.n_classes()];

        for tree in &self.trees {
            if let Some(distribution) = tree.leaf_distribution(features) {
                for (sum, &p) in sums.iter_mut().zip(distribution) {
                    *sum = sum.saturating_add(p);
                }
            }
        }

        let n_trees = self.trees.len().max(1) as i64;
        sums.into_iter().map(|sum| sum / n_trees).collect()
    }

    /// Most probable class; ties go to the lower class index
    pub fn predict(&self, features: &[i64]) -> ClassScore {
        let proba = self.predict_proba(features);
        let mut best = ClassScore {
            class_index: 0,
            probability: proba.first().copied().unwrap_or(0),
        };

        for (class_index, &probability) in proba.iter().enumerate().skip(1) {
            if probability > best.probability {
                best = ClassScore {
                    class_index,
                    probability,
                };
            }
        }

        best
    }

    /// Feature names paired with importances, most important first
    pub fn ranked_importances(&self) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self
            .feature_names
            .iter()
            .zip(&self.feature_importances)
            .map(|(name, &importance)| (name.as_str(), importance as f64 / self.scale as f64))
            .collect();
        // Stable sort keeps schema order among equal importances.
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    pub fn to_canonical_json(&self) -> Result<String, CanonicalError> {
        to_canonical_json(self)
    }

    /// BLAKE3 hash of the learned structure, excluding training metadata
    pub fn structure_hash_hex(&self) -> Result<String, CanonicalError> {
        hash_canonical_hex(&ForestStructure {
            version: self.version,
            scale: self.scale,
            classes: &self.classes,
            feature_names: &self.feature_names,
            trees: &self.trees,
        })
    }
}
