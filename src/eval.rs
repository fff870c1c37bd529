//! Classification error measurement and confusion matrices
//!
//! Pure reporting: nothing here mutates a model.

use crate::core::{FeatureVector, LearnError, Result};
use crate::model::{check_paired, ClassMap, LinearModel};
use std::fmt::{self, Debug, Display};
use std::hash::Hash;
use std::sync::Arc;

/// Fraction of examples `model` misclassifies
pub fn test_classification<L, V>(model: &LinearModel<L>, fvs: &[V], truths: &[L]) -> Result<f64>
where
    L: Eq + Hash + Clone + Debug,
    V: FeatureVector,
{
    test_classification_with(model, fvs, truths, |_, _| {})
}

/// Like [`test_classification`], calling `record(truth, predicted)` for every
/// example
pub fn test_classification_with<L, V, F>(
    model: &LinearModel<L>,
    fvs: &[V],
    truths: &[L],
    mut record: F,
) -> Result<f64>
where
    L: Eq + Hash + Clone + Debug,
    V: FeatureVector,
    F: FnMut(&L, &L),
{
    check_paired(fvs.len(), truths.len())?;
    if fvs.is_empty() {
        return Err(LearnError::EmptyDataset);
    }

    let mut errors = 0usize;
    for (fv, truth) in fvs.iter().zip(truths) {
        model.class_index(truth)?;
        let predicted = model.classify(fv)?;
        if predicted != truth {
            errors += 1;
        }
        record(truth, predicted);
    }

    Ok(errors as f64 / fvs.len() as f64)
}

/// Counts per (true class, predicted class) pair
#[derive(Debug, Clone)]
pub struct ConfusionMatrix<L> {
    classes: Arc<ClassMap<L>>,
    counts: Vec<usize>,
}

impl<L> ConfusionMatrix<L>
where
    L: Eq + Hash + Clone + Debug,
{
    pub fn new(classes: Arc<ClassMap<L>>) -> Self {
        let n = classes.len();
        Self {
            classes,
            counts: vec![0; n * n],
        }
    }

    /// Empty matrix over the classes of `model`
    pub fn for_model(model: &LinearModel<L>) -> Self {
        Self::new(model.classes().clone())
    }

    /// Classify every example and tabulate the outcome
    pub fn from_predictions<V: FeatureVector>(
        model: &LinearModel<L>,
        fvs: &[V],
        truths: &[L],
    ) -> Result<Self> {
        let mut matrix = Self::for_model(model);
        let mut failure = None;
        test_classification_with(model, fvs, truths, |truth, predicted| {
            if let Err(e) = matrix.record(truth, predicted) {
                failure.get_or_insert(e);
            }
        })?;
        match failure {
            Some(e) => Err(e),
            None => Ok(matrix),
        }
    }

    pub fn record(&mut self, truth: &L, predicted: &L) -> Result<()> {
        let t = self.classes.index_of(truth)?;
        let p = self.classes.index_of(predicted)?;
        let n = self.classes.len();
        self.counts[t * n + p] += 1;
        Ok(())
    }

    pub fn count(&self, truth: &L, predicted: &L) -> Result<usize> {
        let t = self.classes.index_of(truth)?;
        let p = self.classes.index_of(predicted)?;
        Ok(self.counts[t * self.classes.len() + p])
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Number of examples on the diagonal
    pub fn correct(&self) -> usize {
        let n = self.classes.len();
        (0..n).map(|i| self.counts[i * n + i]).sum()
    }

    /// Overall accuracy, 0 when nothing was recorded
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.correct() as f64 / total as f64
        }
    }

    /// Accuracy over the examples whose true class is `label`
    ///
    /// `None` when no such example was recorded.
    pub fn class_accuracy(&self, label: &L) -> Result<Option<f64>> {
        let t = self.classes.index_of(label)?;
        Ok(self.row_accuracy(t))
    }

    fn row_accuracy(&self, t: usize) -> Option<f64> {
        let n = self.classes.len();
        let row = &self.counts[t * n..(t + 1) * n];
        let row_total: usize = row.iter().sum();
        if row_total == 0 {
            None
        } else {
            Some(row[t] as f64 / row_total as f64)
        }
    }
}

impl<L> Display for ConfusionMatrix<L>
where
    L: Eq + Hash + Clone + Debug + Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<String> = self.classes.labels().iter().map(|l| l.to_string()).collect();
        let n = labels.len();
        let width = labels
            .iter()
            .map(|l| l.len())
            .chain(self.counts.iter().map(|c| c.to_string().len()))
            .chain(std::iter::once("true\\pred".len()))
            .max()
            .unwrap_or(1);

        write!(f, "{:>width$}", "true\\pred")?;
        for label in &labels {
            write!(f, " {label:>width$}")?;
        }
        writeln!(f, " {:>8}", "accuracy")?;

        for (t, label) in labels.iter().enumerate() {
            write!(f, "{label:>width$}")?;
            for p in 0..n {
                write!(f, " {:>width$}", self.counts[t * n + p])?;
            }
            match self.row_accuracy(t) {
                Some(acc) => writeln!(f, " {:>7.2}%", acc * 100.0)?,
                None => writeln!(f, " {:>8}", "-")?,
            }
        }

        write!(
            f,
            "overall accuracy: {:.2}% ({}/{})",
            self.accuracy() * 100.0,
            self.correct(),
            self.total()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DenseVector;

    fn identity_model() -> LinearModel<&'static str> {
        let mut model = LinearModel::new(["a", "b"], 2).expect("Model should build");
        model.weights_row_mut(0).copy_from_slice(&[1.0, 0.0]);
        model.weights_row_mut(1).copy_from_slice(&[0.0, 1.0]);
        model
    }

    #[test]
    fn test_empty_dataset_fails() {
        let model = identity_model();
        let fvs: Vec<DenseVector> = Vec::new();
        assert!(matches!(
            test_classification(&model, &fvs, &[]),
            Err(LearnError::EmptyDataset)
        ));
    }

    #[test]
    fn test_length_mismatch_fails() {
        let model = identity_model();
        let fvs = vec![DenseVector::new(vec![1.0, 0.0])];
        assert!(matches!(
            test_classification(&model, &fvs, &["a", "b"]),
            Err(LearnError::LengthMismatch {
                features: 1,
                labels: 2
            })
        ));
    }

    #[test]
    fn test_unknown_truth_fails() {
        let model = identity_model();
        let fvs = vec![DenseVector::new(vec![1.0, 0.0])];
        assert!(matches!(
            test_classification(&model, &fvs, &["z"]),
            Err(LearnError::UnknownClass(_))
        ));
    }

    #[test]
    fn test_error_rate_and_recorder() {
        let model = identity_model();
        let fvs = vec![
            DenseVector::new(vec![1.0, 0.0]),
            DenseVector::new(vec![0.0, 1.0]),
            DenseVector::new(vec![2.0, 1.0]),
            DenseVector::new(vec![0.0, 3.0]),
        ];
        let truths = ["a", "b", "b", "a"];

        let mut seen = Vec::new();
        let error = test_classification_with(&model, &fvs, &truths, |t, p| seen.push((*t, *p)))
            .expect("Evaluation should succeed");

        assert_eq!(error, 0.5);
        assert_eq!(seen, vec![("a", "a"), ("b", "b"), ("b", "a"), ("a", "b")]);
    }

    #[test]
    fn test_confusion_matrix_counts() {
        let model = identity_model();
        let fvs = vec![
            DenseVector::new(vec![1.0, 0.0]),
            DenseVector::new(vec![1.0, 0.0]),
            DenseVector::new(vec![0.0, 1.0]),
            DenseVector::new(vec![2.0, 1.0]),
        ];
        let truths = ["a", "a", "b", "b"];

        let matrix = ConfusionMatrix::from_predictions(&model, &fvs, &truths)
            .expect("Evaluation should succeed");

        assert_eq!(matrix.count(&"a", &"a").expect("count"), 2);
        assert_eq!(matrix.count(&"b", &"a").expect("count"), 1);
        assert_eq!(matrix.count(&"b", &"b").expect("count"), 1);
        assert_eq!(matrix.total(), 4);
        assert_eq!(matrix.accuracy(), 0.75);
        assert_eq!(matrix.class_accuracy(&"a").expect("known"), Some(1.0));
        assert_eq!(matrix.class_accuracy(&"b").expect("known"), Some(0.5));
    }

    #[test]
    fn test_confusion_matrix_record_and_display() {
        let model = identity_model();
        let mut matrix = ConfusionMatrix::for_model(&model);
        assert_eq!(matrix.accuracy(), 0.0);
        assert_eq!(matrix.class_accuracy(&"a").expect("known"), None);

        matrix.record(&"a", &"b").expect("record");
        matrix.record(&"a", &"a").expect("record");
        assert!(matrix.record(&"a", &"q").is_err());

        let text = matrix.to_string();
        assert!(text.contains("true\\pred"));
        assert!(text.contains("50.00%"));
        assert!(text.ends_with("overall accuracy: 50.00% (1/2)"));
    }
}
