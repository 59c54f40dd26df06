//! CART (Classification and Regression Tree) builder
//!
//! Grows one classification tree by exact-greedy search over the distinct
//! values of each candidate feature, scoring splits by weighted Gini
//! impurity decrease. All impurity arithmetic is integer (`i128`), so the
//! same inputs always grow the same tree.
//!
//! For a node with per-class weight sums `w_c` and total `W`, `W * gini`
//! equals `W - sum(w_c^2) / W`. Minimising the children's weighted impurity
//! is therefore the same as maximising `sum(w_c^2) / W` summed over the
//! children, and the gain of a split is that sum minus the parent's.

use income_core::forest::{Node, Tree, SCALE};
use std::collections::BTreeMap;

use crate::deterministic::{LcgRng, SplitTieBreaker};

/// Growth limits for a single tree
#[derive(Clone, Debug)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Non-constant features examined per split
    pub max_features: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 15,
            min_samples_split: 10,
            min_samples_leaf: 4,
            max_features: usize::MAX,
        }
    }
}

/// Split candidate with gain and tie-breaker
#[derive(Debug, Clone)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: i64,
    gain: i128,
    tie_breaker: SplitTieBreaker,
}

impl SplitCandidate {
    fn new(feature_idx: usize, threshold: i64, gain: i128, node_id: usize) -> Self {
        Self {
            feature_idx,
            threshold,
            gain,
            tie_breaker: SplitTieBreaker::new(feature_idx, threshold, node_id),
        }
    }

    fn beats(&self, other: &SplitCandidate) -> bool {
        self.gain > other.gain || (self.gain == other.gain && self.tie_breaker < other.tie_breaker)
    }
}

/// A grown tree and the impurity decrease credited to each feature
#[derive(Debug, Clone)]
pub struct BuiltTree {
    pub tree: Tree,
    pub importances: Vec<i128>,
}

/// Classification tree builder over an encoded training matrix
pub struct CartBuilder<'a> {
    features: &'a [Vec<i64>],
    labels: &'a [usize],
    /// Class weight of each row, fixed-point
    weights: &'a [i64],
    n_classes: usize,
    feature_count: usize,
    config: TreeConfig,
}

impl<'a> CartBuilder<'a> {
    pub fn new(
        features: &'a [Vec<i64>],
        labels: &'a [usize],
        weights: &'a [i64],
        n_classes: usize,
        config: TreeConfig,
    ) -> Self {
        assert_eq!(features.len(), labels.len());
        assert_eq!(features.len(), weights.len());

        let feature_count = features.first().map_or(0, Vec::len);

        Self {
            features,
            labels,
            weights,
            n_classes,
            feature_count,
            config,
        }
    }

    /// Grow a tree on `sample`, a list of row indices that may repeat
    pub fn build(&self, sample: &[usize], rng: &mut LcgRng) -> BuiltTree {
        let mut nodes = Vec::new();
        let mut importances = vec![0i128; self.feature_count];

        self.build_node(sample, 0, &mut nodes, &mut importances, rng);

        BuiltTree {
            tree: Tree::new(nodes),
            importances,
        }
    }

    /// Recursively build tree nodes, returning the index of the new node
    fn build_node(
        &self,
        indices: &[usize],
        depth: usize,
        nodes: &mut Vec<Node>,
        importances: &mut [i128],
        rng: &mut LcgRng,
    ) -> i32 {
        let current_idx = nodes.len();
        let class_totals = self.class_weights(indices);

        let pure = class_totals.iter().filter(|&&w| w > 0).count() <= 1;
        if pure
            || depth >= self.config.max_depth
            || indices.len() < self.config.min_samples_split
            || indices.len() < 2 * self.config.min_samples_leaf
        {
            nodes.push(Node::leaf(current_idx as i32, leaf_distribution(&class_totals)));
            return current_idx as i32;
        }

        let split = match self.find_best_split(indices, &class_totals, current_idx, rng) {
            Some(split) if split.gain > 0 => split,
            _ => {
                nodes.push(Node::leaf(current_idx as i32, leaf_distribution(&class_totals)));
                return current_idx as i32;
            }
        };

        let (left_indices, right_indices) =
            self.split_samples(indices, split.feature_idx, split.threshold);
        importances[split.feature_idx] += split.gain;

        // Reserve space for current node
        nodes.push(Node::internal(
            current_idx as i32,
            split.feature_idx as i32,
            split.threshold,
            -1,
            -1,
        ));

        let left_idx = self.build_node(&left_indices, depth + 1, nodes, importances, rng);
        let right_idx = self.build_node(&right_indices, depth + 1, nodes, importances, rng);

        nodes[current_idx].left = left_idx;
        nodes[current_idx].right = right_idx;

        current_idx as i32
    }

    /// Best split over a random subset of the node's non-constant features
    ///
    /// Constant features do not count towards `max_features`, so a node only
    /// becomes a leaf for lack of candidates once every feature was tried.
    fn find_best_split(
        &self,
        indices: &[usize],
        class_totals: &[i64],
        node_id: usize,
        rng: &mut LcgRng,
    ) -> Option<SplitCandidate> {
        let parent_score = gini_score(class_totals);
        let order = rng.sample_indices(self.feature_count, self.feature_count);

        let mut best: Option<SplitCandidate> = None;
        let mut examined = 0usize;

        for feature_idx in order {
            if examined >= self.config.max_features {
                break;
            }

            let histogram = self.histogram(indices, feature_idx);
            if histogram.len() < 2 {
                continue;
            }
            examined += 1;

            let mut left_count = 0usize;
            let mut left_weights = vec![0i64; self.n_classes];
            let mut right_weights = class_totals.to_vec();
            let last_value = histogram.keys().next_back().copied();

            for (&value, (count, weights)) in &histogram {
                if Some(value) == last_value {
                    break;
                }

                left_count += count;
                for class in 0..self.n_classes {
                    left_weights[class] += weights[class];
                    right_weights[class] -= weights[class];
                }

                let right_count = indices.len() - left_count;
                if left_count < self.config.min_samples_leaf
                    || right_count < self.config.min_samples_leaf
                {
                    continue;
                }

                let gain = gini_score(&left_weights) + gini_score(&right_weights) - parent_score;
                let candidate = SplitCandidate::new(feature_idx, value, gain, node_id);

                if best.as_ref().map_or(true, |current| candidate.beats(current)) {
                    best = Some(candidate);
                }
            }
        }

        best
    }

    /// Sample count and per-class weight for each distinct feature value
    fn histogram(&self, indices: &[usize], feature_idx: usize) -> BTreeMap<i64, (usize, Vec<i64>)> {
        let mut histogram: BTreeMap<i64, (usize, Vec<i64>)> = BTreeMap::new();

        for &idx in indices {
            let value = self.features[idx][feature_idx];
            let entry = histogram
                .entry(value)
                .or_insert_with(|| (0, vec![0i64; self.n_classes]));
            entry.0 += 1;
            entry.1[self.labels[idx]] += self.weights[idx];
        }

        histogram
    }

    /// Split samples based on threshold
    fn split_samples(&self, indices: &[usize], feature_idx: usize, threshold: i64) -> (Vec<usize>, Vec<usize>) {
        indices
            .iter()
            .partition(|&&idx| self.features[idx][feature_idx] <= threshold)
    }

    /// Sum of row weights per class
    fn class_weights(&self, indices: &[usize]) -> Vec<i64> {
        let mut totals = vec![0i64; self.n_classes];
        for &idx in indices {
            totals[self.labels[idx]] += self.weights[idx];
        }
        totals
    }
}

/// `sum(w_c^2) / W`, the quantity a split maximises
fn gini_score(class_weights: &[i64]) -> i128 {
    let total: i128 = class_weights.iter().map(|&w| w as i128).sum();
    if total == 0 {
        return 0;
    }
    let squares: i128 = class_weights.iter().map(|&w| (w as i128) * (w as i128)).sum();
    squares / total
}

/// Class probabilities of a leaf in units of `SCALE`
fn leaf_distribution(class_weights: &[i64]) -> Vec<i64> {
    let total: i128 = class_weights.iter().map(|&w| w as i128).sum();
    if total == 0 {
        let uniform = SCALE / class_weights.len().max(1) as i64;
        return vec![uniform; class_weights.len()];
    }
    class_weights
        .iter()
        .map(|&w| ((w as i128 * SCALE as i128) / total) as i64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_weights(n: usize) -> Vec<i64> {
        vec![SCALE; n]
    }

    fn all_rows(n: usize) -> Vec<usize> {
        (0..n).collect()
    }

    #[test]
    fn test_separable_feature_gives_single_split() {
        // feature 0 separates the classes at 30; feature 1 is noise
        let features = vec![
            vec![20, 5],
            vec![25, 1],
            vec![28, 7],
            vec![30, 3],
            vec![41, 5],
            vec![45, 2],
            vec![50, 7],
            vec![60, 1],
        ];
        let labels = vec![0, 0, 0, 0, 1, 1, 1, 1];
        let weights = unit_weights(8);

        let config = TreeConfig {
            max_depth: 4,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: 2,
        };
        let builder = CartBuilder::new(&features, &labels, &weights, 2, config);
        let built = builder.build(&all_rows(8), &mut LcgRng::new(42));

        let root = &built.tree.nodes[0];
        assert_eq!(root.feature_idx, 0);
        assert_eq!(root.threshold, 30);
        assert_eq!(built.tree.nodes.len(), 3);
        assert_eq!(built.tree.leaf_distribution(&[22, 0]), Some(&[SCALE, 0][..]));
        assert_eq!(built.tree.leaf_distribution(&[55, 0]), Some(&[0, SCALE][..]));
        assert!(built.importances[0] > 0);
        assert_eq!(built.importances[1], 0);
    }

    #[test]
    fn test_leaf_only_tree() {
        let features = vec![vec![100]];
        let labels = vec![1];
        let weights = unit_weights(1);

        let builder = CartBuilder::new(&features, &labels, &weights, 2, TreeConfig::default());
        let built = builder.build(&[0], &mut LcgRng::new(1));

        assert_eq!(built.tree.nodes.len(), 1);
        assert_eq!(built.tree.nodes[0].leaf, Some(vec![0, SCALE]));
    }

    #[test]
    fn test_min_samples_leaf_is_respected() {
        let features: Vec<Vec<i64>> = (0..12).map(|i| vec![i]).collect();
        let labels: Vec<usize> = (0..12).map(|i| usize::from(i == 11)).collect();
        let weights = unit_weights(12);

        let config = TreeConfig {
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 4,
            max_features: 1,
        };
        let builder = CartBuilder::new(&features, &labels, &weights, 2, config);
        let built = builder.build(&all_rows(12), &mut LcgRng::new(42));

        for node in built.tree.nodes.iter().filter(|n| !n.is_leaf()) {
            let left = features.iter().filter(|f| f[0] <= node.threshold).count();
            assert!(left >= 4);
        }
        // The lone positive can never be isolated in a leaf of its own.
        let dist = built.tree.leaf_distribution(&[11]).unwrap();
        assert!(dist[1] < SCALE);
    }

    #[test]
    fn test_class_weights_shift_leaf_distribution() {
        // Three negatives and one positive with equal features: one leaf.
        let features = vec![vec![1], vec![1], vec![1], vec![1]];
        let labels = vec![0, 0, 0, 1];
        let balanced = vec![SCALE * 2 / 3, SCALE * 2 / 3, SCALE * 2 / 3, SCALE * 2];

        let builder = CartBuilder::new(&features, &labels, &balanced, 2, TreeConfig::default());
        let built = builder.build(&all_rows(4), &mut LcgRng::new(42));

        let dist = built.tree.nodes[0].leaf.clone().unwrap();
        assert!((dist[0] - SCALE / 2).abs() <= 1);
        assert!((dist[1] - SCALE / 2).abs() <= 1);
    }

    #[test]
    fn test_depth_limit() {
        let features: Vec<Vec<i64>> = (0..64).map(|i| vec![i]).collect();
        let labels: Vec<usize> = (0..64).map(|i| (i % 2) as usize).collect();
        let weights = unit_weights(64);

        let config = TreeConfig {
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: 1,
        };
        let builder = CartBuilder::new(&features, &labels, &weights, 2, config);
        let built = builder.build(&all_rows(64), &mut LcgRng::new(42));

        assert!(built.tree.depth() <= 3);
        assert!(built.tree.validate(2, 1).is_ok());
    }

    #[test]
    fn test_same_seed_same_tree() {
        let features: Vec<Vec<i64>> = (0..40).map(|i| vec![i % 7, i % 5, i % 3]).collect();
        let labels: Vec<usize> = (0..40).map(|i| usize::from(i % 7 > 3)).collect();
        let weights = unit_weights(40);
        let config = TreeConfig {
            max_depth: 5,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: 1,
        };

        let builder = CartBuilder::new(&features, &labels, &weights, 2, config);
        let a = builder.build(&all_rows(40), &mut LcgRng::new(9));
        let b = builder.build(&all_rows(40), &mut LcgRng::new(9));
        assert_eq!(a.tree, b.tree);
        assert_eq!(a.importances, b.importances);
    }

    #[test]
    fn test_gini_score() {
        assert_eq!(gini_score(&[0, 0]), 0);
        assert_eq!(gini_score(&[4, 0]), 4);
        assert_eq!(gini_score(&[2, 2]), 2);
    }
}
