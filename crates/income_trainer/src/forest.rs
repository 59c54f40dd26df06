//! Random forest trainer
//!
//! Each tree is grown on its own bootstrap sample by a [`CartBuilder`], with
//! an RNG seeded from the run seed and the tree index. Trees are grown in
//! parallel and collected in index order, so the result does not depend on
//! the thread count.

use income_core::forest::{Forest, ForestMetadata, SCALE};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::cart::{BuiltTree, CartBuilder, TreeConfig};
use crate::config::{ClassWeight, ForestConfig};
use crate::deterministic::{xxhash64_i64, LcgRng};
use crate::errors::TrainingError;

/// Per-class sample weights in units of [`SCALE`]
///
/// `Balanced` weighs class `c` by `n / (k * count_c)`; absent classes get 0.
pub fn class_weights(labels: &[usize], n_classes: usize, mode: ClassWeight) -> Vec<i64> {
    match mode {
        ClassWeight::Uniform => vec![SCALE; n_classes],
        ClassWeight::Balanced => {
            let mut counts = vec![0i64; n_classes];
            for &label in labels {
                counts[label] += 1;
            }
            let n = labels.len() as i128;
            counts
                .iter()
                .map(|&count| {
                    if count == 0 {
                        0
                    } else {
                        (n * SCALE as i128 / (n_classes as i128 * count as i128)) as i64
                    }
                })
                .collect()
        }
    }
}

/// Random forest trainer
pub struct ForestTrainer {
    config: ForestConfig,
}

impl ForestTrainer {
    pub fn new(config: ForestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    /// Fit a forest on an encoded feature matrix
    ///
    /// `labels[i]` is the class index of `features[i]`, and must be below
    /// `classes.len()`.
    pub fn fit(
        &self,
        features: &[Vec<i64>],
        labels: &[usize],
        classes: Vec<String>,
        feature_names: Vec<String>,
    ) -> Result<Forest, TrainingError> {
        self.config.validate().map_err(TrainingError::Config)?;

        if features.is_empty() {
            return Err(TrainingError::EmptyDataset);
        }
        if features.len() != labels.len() {
            return Err(TrainingError::Config(format!(
                "{} feature rows but {} labels",
                features.len(),
                labels.len()
            )));
        }
        if let Some(row) = features.iter().position(|row| row.len() != feature_names.len()) {
            return Err(TrainingError::Config(format!(
                "row {row} has {} features, expected {}",
                features[row].len(),
                feature_names.len()
            )));
        }
        let n_classes = classes.len();
        if let Some(&label) = labels.iter().find(|&&label| label >= n_classes) {
            return Err(TrainingError::Config(format!(
                "label {label} out of range for {n_classes} classes"
            )));
        }

        let per_class = class_weights(labels, n_classes, self.config.class_weight);
        let weights: Vec<i64> = labels.iter().map(|&label| per_class[label]).collect();

        let tree_config = TreeConfig {
            max_depth: self.config.max_depth,
            min_samples_split: self.config.min_samples_split,
            min_samples_leaf: self.config.min_samples_leaf,
            max_features: self.config.max_features.resolve(feature_names.len()),
        };

        info!(
            n_estimators = self.config.n_estimators,
            samples = features.len(),
            max_features = tree_config.max_features,
            "Training random forest"
        );

        let builder = CartBuilder::new(features, labels, &weights, n_classes, tree_config);
        let n_samples = features.len();

        let built: Vec<BuiltTree> = (0..self.config.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = LcgRng::new(xxhash64_i64(&[tree_idx as i64], self.config.seed));
                let sample = self.draw_sample(n_samples, &mut rng);
                let tree = builder.build(&sample, &mut rng);
                debug!(
                    tree = tree_idx,
                    nodes = tree.tree.nodes.len(),
                    depth = tree.tree.depth(),
                    "Tree grown"
                );
                tree
            })
            .collect();

        let feature_importances = mean_decrease_impurity(&built, feature_names.len());
        let trees = built.into_iter().map(|built| built.tree).collect();

        let mut forest = Forest::new(classes, feature_names, trees);
        forest.feature_importances = feature_importances;
        forest.metadata = ForestMetadata {
            n_estimators: self.config.n_estimators,
            max_depth: self.config.max_depth,
            min_samples_split: self.config.min_samples_split,
            min_samples_leaf: self.config.min_samples_leaf,
            seed: self.config.seed,
            train_samples: n_samples,
            ..ForestMetadata::default()
        };

        Ok(forest)
    }

    /// Bootstrap sample (with replacement) or every row
    fn draw_sample(&self, n_samples: usize, rng: &mut LcgRng) -> Vec<usize> {
        if self.config.bootstrap {
            (0..n_samples).map(|_| rng.next_range(n_samples)).collect()
        } else {
            (0..n_samples).collect()
        }
    }
}

/// Feature importances summing to [`SCALE`]
///
/// Each tree's impurity decreases are normalised to sum to one before
/// averaging. Trees that never split contribute nothing.
fn mean_decrease_impurity(trees: &[BuiltTree], n_features: usize) -> Vec<i64> {
    let mut sums = vec![0i128; n_features];

    for tree in trees {
        let total: i128 = tree.importances.iter().sum();
        if total <= 0 {
            continue;
        }
        for (sum, &gain) in sums.iter_mut().zip(&tree.importances) {
            *sum += gain * SCALE as i128 / total;
        }
    }

    let total: i128 = sums.iter().sum();
    if total <= 0 {
        return vec![0; n_features];
    }
    sums.iter()
        .map(|&sum| (sum * SCALE as i128 / total) as i64)
        .collect()
}
