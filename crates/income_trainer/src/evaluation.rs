//! Held-out evaluation: accuracy, per-class precision/recall/F1 and the
//! confusion matrix.
//!
//! Ratios with a zero denominator are reported as 0.

use serde::Serialize;
use std::fmt;

/// Fraction of predictions equal to the true label
pub fn accuracy(truth: &[usize], predicted: &[usize]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let correct = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
    correct as f64 / truth.len() as f64
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Precision, recall and F1 of one class
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Number of true samples of this class
    pub support: usize,
}

/// Averaged precision, recall and F1
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Classification report over a labelled evaluation set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: AverageMetrics,
    pub weighted_avg: AverageMetrics,
    /// `confusion[t][p]` counts samples of class `t` predicted as `p`
    pub confusion: Vec<Vec<usize>>,
    pub support: usize,
}

impl ClassificationReport {
    /// Build a report from true and predicted class indices
    ///
    /// Indices at or above `class_names.len()` are ignored.
    pub fn new(truth: &[usize], predicted: &[usize], class_names: &[String]) -> Self {
        let k = class_names.len();
        let mut confusion = vec![vec![0usize; k]; k];
        for (&t, &p) in truth.iter().zip(predicted) {
            if t < k && p < k {
                confusion[t][p] += 1;
            }
        }

        let classes: Vec<ClassMetrics> = class_names
            .iter()
            .enumerate()
            .map(|(c, label)| {
                let true_positive = confusion[c][c];
                let predicted_as_c: usize = confusion.iter().map(|row| row[c]).sum();
                let support: usize = confusion[c].iter().sum();

                let precision = ratio(true_positive, predicted_as_c);
                let recall = ratio(true_positive, support);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };

                ClassMetrics {
                    label: label.clone(),
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect();

        let support: usize = classes.iter().map(|m| m.support).sum();
        let macro_avg = average(&classes, |_| 1.0);
        let weighted_avg = average(&classes, |m| m.support as f64);

        Self {
            classes,
            accuracy: accuracy(truth, predicted),
            macro_avg,
            weighted_avg,
            confusion,
            support,
        }
    }
}

fn average<F>(classes: &[ClassMetrics], weight: F) -> AverageMetrics
where
    F: Fn(&ClassMetrics) -> f64,
{
    let total: f64 = classes.iter().map(&weight).sum();
    if total == 0.0 {
        return AverageMetrics {
            precision: 0.0,
            recall: 0.0,
            f1: 0.0,
        };
    }
    let mean = |value: fn(&ClassMetrics) -> f64| {
        classes.iter().map(|m| weight(m) * value(m)).sum::<f64>() / total
    };
    AverageMetrics {
        precision: mean(|m| m.precision),
        recall: mean(|m| m.recall),
        f1: mean(|m| m.f1),
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|m| m.label.len())
            .chain(["weighted avg".len()])
            .max()
            .unwrap_or(0);

        writeln!(
            f,
            "{:>width$}  {:>9}  {:>9}  {:>9}  {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for m in &self.classes {
            writeln!(
                f,
                "{:>width$}  {:>9.2}  {:>9.2}  {:>9.2}  {:>9}",
                m.label, m.precision, m.recall, m.f1, m.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$}  {:>9}  {:>9}  {:>9.2}  {:>9}",
            "accuracy", "", "", self.accuracy, self.support
        )?;
        for (name, avg) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>width$}  {:>9.2}  {:>9.2}  {:>9.2}  {:>9}",
                name, avg.precision, avg.recall, avg.f1, self.support
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        vec!["<=50K".to_string(), ">50K".to_string()]
    }

    #[test]
    fn test_accuracy() {
        assert_eq!(accuracy(&[0, 1, 1, 0], &[0, 1, 0, 0]), 0.75);
        assert_eq!(accuracy(&[], &[]), 0.0);
    }

    #[test]
    fn test_report_values() {
        // 6 negatives (5 right), 4 positives (2 right)
        let truth = vec![0, 0, 0, 0, 0, 0, 1, 1, 1, 1];
        let predicted = vec![0, 0, 0, 0, 0, 1, 1, 1, 0, 0];
        let report = ClassificationReport::new(&truth, &predicted, &names());

        assert_eq!(report.confusion, vec![vec![5, 1], vec![2, 2]]);
        assert_eq!(report.support, 10);
        assert!((report.accuracy - 0.7).abs() < 1e-12);

        let neg = &report.classes[0];
        assert!((neg.precision - 5.0 / 7.0).abs() < 1e-12);
        assert!((neg.recall - 5.0 / 6.0).abs() < 1e-12);
        assert_eq!(neg.support, 6);

        let pos = &report.classes[1];
        assert!((pos.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((pos.recall - 0.5).abs() < 1e-12);

        let expected_macro = (neg.recall + pos.recall) / 2.0;
        assert!((report.macro_avg.recall - expected_macro).abs() < 1e-12);
        let expected_weighted = (neg.recall * 6.0 + pos.recall * 4.0) / 10.0;
        assert!((report.weighted_avg.recall - expected_weighted).abs() < 1e-12);
    }

    #[test]
    fn test_never_predicted_class_scores_zero() {
        let report = ClassificationReport::new(&[0, 1, 1], &[0, 0, 0], &names());
        assert_eq!(report.classes[1].precision, 0.0);
        assert_eq!(report.classes[1].recall, 0.0);
        assert_eq!(report.classes[1].f1, 0.0);
    }

    #[test]
    fn test_display_lists_every_class() {
        let report = ClassificationReport::new(&[0, 1], &[0, 1], &names());
        let table = report.to_string();
        assert!(table.contains("<=50K"));
        assert!(table.contains(">50K"));
        assert!(table.contains("weighted avg"));
        assert!(table.contains("1.00"));
    }
}
