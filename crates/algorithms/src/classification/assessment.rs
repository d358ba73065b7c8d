//! Accuracy assessment for classification trees
//!
//! Rows of the confusion matrix are actual classes, columns are predicted
//! classes, both indexed by the tree's label alphabet.

use ndarray::Array2;
use std::fmt;
use landcart_core::sample::LabelAlphabet;
use landcart_core::{Error, Result};

use super::training::TrainingSet;
use super::tree::DecisionTree;

/// Square confusion matrix over class indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    counts: Array2<usize>,
}

impl ConfusionMatrix {
    pub fn new(n_classes: usize) -> Self {
        Self {
            counts: Array2::zeros((n_classes, n_classes)),
        }
    }

    /// Number of classes
    pub fn n_classes(&self) -> usize {
        self.counts.nrows()
    }

    /// Count one observation.
    ///
    /// # Errors
    /// [`Error::IndexOutOfBounds`] for a class index outside the matrix.
    pub fn record(&mut self, actual: usize, predicted: usize) -> Result<()> {
        let n = self.n_classes();
        match self.counts.get_mut((actual, predicted)) {
            Some(cell) => {
                *cell += 1;
                Ok(())
            }
            None => Err(Error::IndexOutOfBounds {
                row: actual,
                col: predicted,
                rows: n,
                cols: n,
            }),
        }
    }

    /// Observations with this actual and predicted class
    pub fn get(&self, actual: usize, predicted: usize) -> usize {
        self.counts.get((actual, predicted)).copied().unwrap_or(0)
    }

    pub fn counts(&self) -> &Array2<usize> {
        &self.counts
    }

    /// Total observations
    pub fn total(&self) -> usize {
        self.counts.sum()
    }

    fn correct(&self) -> usize {
        self.counts.diag().sum()
    }

    /// Share of correctly classified observations
    pub fn overall_accuracy(&self) -> Option<f64> {
        ratio(self.correct(), self.total())
    }

    /// Cohen's kappa: agreement corrected for chance.
    ///
    /// `None` when the matrix is empty or chance agreement is total.
    pub fn kappa(&self) -> Option<f64> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        let n = total as f64;
        let observed = self.correct() as f64 / n;
        let expected: f64 = self
            .counts
            .rows()
            .into_iter()
            .zip(self.counts.columns())
            .map(|(row, col)| (row.sum() as f64 / n) * (col.sum() as f64 / n))
            .sum();

        if (1.0 - expected).abs() < f64::EPSILON {
            return None;
        }
        Some((observed - expected) / (1.0 - expected))
    }

    /// Producer's accuracy (recall): correct / actual count for `class`
    pub fn producers_accuracy(&self, class: usize) -> Option<f64> {
        if class >= self.n_classes() {
            return None;
        }
        ratio(self.counts[(class, class)], self.counts.row(class).sum())
    }

    /// User's accuracy (precision): correct / predicted count for `class`
    pub fn users_accuracy(&self, class: usize) -> Option<f64> {
        if class >= self.n_classes() {
            return None;
        }
        ratio(self.counts[(class, class)], self.counts.column(class).sum())
    }

    /// Render with class labels as row and column headers
    pub fn display<'a>(&'a self, alphabet: &'a LabelAlphabet) -> LabeledMatrix<'a> {
        LabeledMatrix { matrix: self, alphabet }
    }
}

fn ratio(num: usize, den: usize) -> Option<f64> {
    (den > 0).then(|| num as f64 / den as f64)
}

/// Resubstitution assessment: classify every training sample with `tree`.
///
/// # Errors
/// [`Error::BandMismatch`] if the training set's bands differ from the tree's.
pub fn evaluate(tree: &DecisionTree, training: &TrainingSet) -> Result<ConfusionMatrix> {
    if tree.bands() != training.bands() {
        let band = training
            .bands()
            .iter()
            .find(|b| !tree.bands().contains(*b))
            .or_else(|| tree.bands().iter().find(|b| !training.bands().contains(*b)))
            .or_else(|| {
                training
                    .bands()
                    .iter()
                    .zip(tree.bands())
                    .find_map(|(a, b)| (a != b).then_some(a))
            });
        return Err(Error::BandMismatch {
            band: band.cloned().unwrap_or_default(),
        });
    }

    let mut matrix = ConfusionMatrix::new(tree.alphabet().len());
    for sample in training.samples() {
        let actual = tree
            .alphabet()
            .index_of(training.alphabet().label(sample.class()).unwrap_or_default())
            .ok_or_else(|| Error::Algorithm(format!("label of sample '{}' unknown to tree", sample.key())))?;
        matrix.record(actual, tree.classify(sample.values()))?;
    }
    Ok(matrix)
}

/// [`ConfusionMatrix`] paired with its labels for printing
pub struct LabeledMatrix<'a> {
    matrix: &'a ConfusionMatrix,
    alphabet: &'a LabelAlphabet,
}

impl fmt::Display for LabeledMatrix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels = self.alphabet.labels();
        let width = labels.iter().map(String::len).max().unwrap_or(0).max(6);

        write!(f, "{:width$}", "")?;
        for label in labels {
            write!(f, " {label:>width$}")?;
        }
        writeln!(f)?;
        for (i, label) in labels.iter().enumerate() {
            write!(f, "{label:width$}")?;
            for j in 0..labels.len() {
                write!(f, " {:>width$}", self.matrix.get(i, j))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::{train, TreeParams};
    use approx::assert_relative_eq;
    use landcart_core::sample::{LabelOrder, LabeledSample};

    fn matrix(cells: &[(usize, usize, usize)], n: usize) -> ConfusionMatrix {
        let mut m = ConfusionMatrix::new(n);
        for &(a, p, times) in cells {
            for _ in 0..times {
                m.record(a, p).unwrap();
            }
        }
        m
    }

    #[test]
    fn test_metrics() {
        // actual 0: 45 right, 5 wrong; actual 1: 10 wrong, 40 right
        let m = matrix(&[(0, 0, 45), (0, 1, 5), (1, 0, 10), (1, 1, 40)], 2);
        assert_eq!(m.total(), 100);
        assert_relative_eq!(m.overall_accuracy().unwrap(), 0.85);
        assert_relative_eq!(m.producers_accuracy(0).unwrap(), 0.9);
        assert_relative_eq!(m.users_accuracy(0).unwrap(), 45.0 / 55.0);
        // expected agreement 0.5*0.55 + 0.5*0.45 = 0.5
        assert_relative_eq!(m.kappa().unwrap(), 0.7, epsilon = 1e-12);
    }

    #[test]
    fn test_undefined_ratios() {
        let empty = ConfusionMatrix::new(2);
        assert_eq!(empty.overall_accuracy(), None);
        assert_eq!(empty.kappa(), None);

        let m = matrix(&[(0, 0, 3)], 2);
        assert_eq!(m.producers_accuracy(1), None);
        assert_eq!(m.users_accuracy(1), None);
        assert_eq!(m.producers_accuracy(7), None);
        // a single class everywhere: chance agreement is total
        assert_eq!(m.kappa(), None);
    }

    #[test]
    fn test_record_out_of_range() {
        let mut m = ConfusionMatrix::new(2);
        assert!(matches!(m.record(2, 0), Err(Error::IndexOutOfBounds { .. })));
        assert_eq!(m.total(), 0);
    }

    #[test]
    fn test_evaluate_resubstitution() {
        let alphabet = LabelAlphabet::from_labels(["urban", "water"], LabelOrder::Lexicographic);
        let samples = vec![
            LabeledSample::new("s1", vec![10.0], 1),
            LabeledSample::new("s2", vec![80.0], 0),
            LabeledSample::new("s3", vec![12.0], 1),
            LabeledSample::new("s4", vec![75.0], 0),
        ];
        let ts = TrainingSet::new(vec!["red".into()], alphabet, samples).unwrap();
        let tree = train(&ts, &TreeParams::default()).unwrap();

        let m = evaluate(&tree, &ts).unwrap();
        assert_eq!(m.total(), 4);
        assert_relative_eq!(m.overall_accuracy().unwrap(), 1.0);
        assert_relative_eq!(m.kappa().unwrap(), 1.0);

        let text = m.display(tree.alphabet()).to_string();
        assert!(text.lines().next().unwrap().contains("urban"));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn test_evaluate_band_mismatch() {
        let alphabet = LabelAlphabet::from_labels(["a", "b"], LabelOrder::Lexicographic);
        let samples = vec![LabeledSample::new("s1", vec![1.0], 0), LabeledSample::new("s2", vec![2.0], 1)];
        let red = TrainingSet::new(vec!["red".into()], alphabet.clone(), samples.clone()).unwrap();
        let nir = TrainingSet::new(vec!["nir".into()], alphabet, samples).unwrap();

        let tree = train(&red, &TreeParams::default()).unwrap();
        assert!(matches!(evaluate(&tree, &nir), Err(Error::BandMismatch { band }) if band == "nir"));
    }
}
