//! Stratified train/test split
//!
//! Each class is shuffled on its own seeded RNG and `round(count * fraction)`
//! of its rows go to the test side, so both partitions keep the label
//! proportions of the full dataset.

use crate::deterministic::{xxhash64_i64, LcgRng};

/// Row indices of the two partitions, each sorted ascending
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StratifiedSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split row indices by class label
///
/// `labels[i]` is the class index of row `i`. Every class present must have
/// at least two rows so that it can appear on both sides.
pub fn stratified_split(
    labels: &[usize],
    n_classes: usize,
    test_fraction: f64,
    seed: i64,
) -> Result<StratifiedSplit, String> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(format!("test fraction must be in (0, 1), got {test_fraction}"));
    }

    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
    for (row, &label) in labels.iter().enumerate() {
        let bucket = by_class
            .get_mut(label)
            .ok_or_else(|| format!("row {row} has class {label}, expected < {n_classes}"))?;
        bucket.push(row);
    }

    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();

    for (class, mut rows) in by_class.into_iter().enumerate() {
        match rows.len() {
            0 => continue,
            1 => {
                return Err(format!(
                    "class {class} has a single row; each class needs at least 2"
                ))
            }
            count => {
                let n_test = ((count as f64 * test_fraction).round() as usize).clamp(1, count - 1);
                let mut rng = LcgRng::new(xxhash64_i64(&[class as i64], seed));
                rng.shuffle(&mut rows);
                test.extend_from_slice(&rows[..n_test]);
                train.extend_from_slice(&rows[n_test..]);
            }
        }
    }

    if train.is_empty() || test.is_empty() {
        return Err("split produced an empty partition".to_string());
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok(StratifiedSplit { train, test })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn imbalanced_labels() -> Vec<usize> {
        // 75 rows of class 0, 25 of class 1, interleaved
        (0..100).map(|i| usize::from(i % 4 == 3)).collect()
    }

    #[test]
    fn test_proportions_are_preserved() {
        let labels = imbalanced_labels();
        let split = stratified_split(&labels, 2, 0.2, 42).unwrap();

        assert_eq!(split.train.len(), 80);
        assert_eq!(split.test.len(), 20);

        let positives = |rows: &[usize]| rows.iter().filter(|&&row| labels[row] == 1).count();
        assert_eq!(positives(&split.test), 5);
        assert_eq!(positives(&split.train), 20);
    }

    #[test]
    fn test_partitions_are_disjoint_and_complete() {
        let labels = imbalanced_labels();
        let split = stratified_split(&labels, 2, 0.2, 42).unwrap();

        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..labels.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_is_seeded() {
        let labels = imbalanced_labels();
        let a = stratified_split(&labels, 2, 0.2, 42).unwrap();
        let b = stratified_split(&labels, 2, 0.2, 42).unwrap();
        let c = stratified_split(&labels, 2, 0.2, 43).unwrap();

        assert_eq!(a, b);
        assert_ne!(a.test, c.test);
    }

    #[test]
    fn test_small_class_keeps_one_row_each_side() {
        let labels = vec![0, 0, 0, 0, 0, 0, 0, 0, 1, 1];
        let split = stratified_split(&labels, 2, 0.2, 42).unwrap();

        let test_positives = split.test.iter().filter(|&&row| labels[row] == 1).count();
        assert_eq!(test_positives, 1);
        assert_eq!(split.test.len(), 3);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(stratified_split(&[0, 0, 1], 2, 0.2, 42).is_err());
        assert!(stratified_split(&[0, 0, 2], 2, 0.2, 42).is_err());
        assert!(stratified_split(&[0, 1, 0, 1], 2, 0.0, 42).is_err());
        assert!(stratified_split(&[], 2, 0.2, 42).is_err());
    }
}
