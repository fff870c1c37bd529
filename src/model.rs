//! Multiclass linear scoring model
//!
//! A [`LinearModel`] holds a `C x D` weight matrix (row-major, one row per
//! class), a bias per class, and the fixed bijection between class labels and
//! row indices `0..C`.

use crate::core::{FeatureVector, LearnError, Result};
use crate::vector::row_dot;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

/// Bijection between class labels and row indices
///
/// Immutable once built; models copied from one another share it.
#[derive(Debug)]
pub struct ClassMap<L> {
    class_index: HashMap<L, usize>,
    index_class: Vec<L>,
}

impl<L> ClassMap<L>
where
    L: Eq + Hash + Clone + Debug,
{
    /// Build the mapping; labels get indices in the order given
    pub fn new<I: IntoIterator<Item = L>>(labels: I) -> Result<Self> {
        let mut class_index = HashMap::new();
        let mut index_class = Vec::new();

        for label in labels {
            if class_index.contains_key(&label) {
                return Err(LearnError::DuplicateClass(format!("{label:?}")));
            }
            class_index.insert(label.clone(), index_class.len());
            index_class.push(label);
        }

        if index_class.is_empty() {
            return Err(LearnError::InvalidDimension(
                "class set must not be empty".to_string(),
            ));
        }

        Ok(Self {
            class_index,
            index_class,
        })
    }

    /// Row index of `label`
    pub fn index_of(&self, label: &L) -> Result<usize> {
        self.class_index
            .get(label)
            .copied()
            .ok_or_else(|| LearnError::UnknownClass(format!("{label:?}")))
    }

    /// Label stored at row `index`
    pub fn label(&self, index: usize) -> Option<&L> {
        self.index_class.get(index)
    }

    /// Labels in index order
    pub fn labels(&self) -> &[L] {
        &self.index_class
    }

    pub fn len(&self) -> usize {
        self.index_class.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index_class.is_empty()
    }
}

/// Index and value of the maximum score
///
/// Ties go to the lowest index. Returns `None` for an empty slice.
pub fn best(scores: &[f64]) -> Option<(usize, f64)> {
    let (&first, rest) = scores.split_first()?;
    let mut best = (0, first);
    for (i, &s) in rest.iter().enumerate() {
        if s > best.1 {
            best = (i + 1, s);
        }
    }
    Some(best)
}

/// Indices of the `k` highest scores, descending
///
/// The sort is stable, so equal scores keep ascending index order.
pub fn top_k(scores: &[f64], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order.truncate(k);
    order
}

/// Multiclass linear model: score(x) = W x + b
#[derive(Debug, Clone)]
pub struct LinearModel<L> {
    weights: Vec<f64>,
    bias: Vec<f64>,
    dim: usize,
    classes: Arc<ClassMap<L>>,
}

impl<L> LinearModel<L>
where
    L: Eq + Hash + Clone + Debug,
{
    /// Zero-initialized model over `labels` with `dim` features
    pub fn new<I: IntoIterator<Item = L>>(labels: I, dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(LearnError::InvalidDimension(
                "dimensionality must be positive".to_string(),
            ));
        }
        let classes = Arc::new(ClassMap::new(labels)?);
        Ok(Self::zeros(classes, dim))
    }

    /// Zero-initialized model over an existing class mapping
    pub fn zeros(classes: Arc<ClassMap<L>>, dim: usize) -> Self {
        let n_classes = classes.len();
        Self {
            weights: vec![0.0; n_classes * dim],
            bias: vec![0.0; n_classes],
            dim,
            classes,
        }
    }

    /// Assemble a model from a row-major `C x D` weight matrix and biases
    pub fn from_parts(
        classes: Arc<ClassMap<L>>,
        dim: usize,
        weights: Vec<f64>,
        bias: Vec<f64>,
    ) -> Result<Self> {
        if dim == 0 {
            return Err(LearnError::InvalidDimension(
                "dimensionality must be positive".to_string(),
            ));
        }
        let n_classes = classes.len();
        if weights.len() != n_classes * dim {
            return Err(LearnError::InvalidDimension(format!(
                "weight matrix has {} entries, expected {n_classes} x {dim}",
                weights.len()
            )));
        }
        if bias.len() != n_classes {
            return Err(LearnError::InvalidDimension(format!(
                "bias has {} entries, expected {n_classes}",
                bias.len()
            )));
        }
        Ok(Self {
            weights,
            bias,
            dim,
            classes,
        })
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn classes(&self) -> &Arc<ClassMap<L>> {
        &self.classes
    }

    pub fn class_index(&self, label: &L) -> Result<usize> {
        self.classes.index_of(label)
    }

    pub fn class_at(&self, index: usize) -> Option<&L> {
        self.classes.label(index)
    }

    /// True if both models use the same class mapping instance
    pub fn shares_classes_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.classes, &other.classes)
    }

    /// Whole weight matrix, row-major
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub(crate) fn weights_mut(&mut self) -> &mut [f64] {
        &mut self.weights
    }

    /// Weight vector of class row `c`
    ///
    /// # Panics
    ///
    /// Panics if `c >= self.num_classes()`.
    pub fn weights_row(&self, c: usize) -> &[f64] {
        &self.weights[c * self.dim..(c + 1) * self.dim]
    }

    pub(crate) fn weights_row_mut(&mut self, c: usize) -> &mut [f64] {
        &mut self.weights[c * self.dim..(c + 1) * self.dim]
    }

    pub fn bias(&self) -> &[f64] {
        &self.bias
    }

    /// Set the bias of class row `c`
    ///
    /// # Panics
    ///
    /// Panics if `c >= self.num_classes()`.
    pub fn set_bias(&mut self, c: usize, value: f64) {
        self.bias[c] = value;
    }

    /// Fail if `fv` has entries beyond the model's dimensionality
    pub fn check_dim<V: FeatureVector>(&self, fv: &V) -> Result<()> {
        let actual = fv.required_dim();
        if actual > self.dim {
            return Err(LearnError::DimensionMismatch {
                expected: self.dim,
                actual,
            });
        }
        Ok(())
    }

    /// Scores W x + b, one per class
    pub fn score<V: FeatureVector>(&self, fv: &V) -> Result<Vec<f64>> {
        self.check_dim(fv)?;
        Ok(self.score_unchecked(fv))
    }

    pub(crate) fn score_unchecked<V: FeatureVector>(&self, fv: &V) -> Vec<f64> {
        self.weights
            .chunks_exact(self.dim)
            .zip(&self.bias)
            .map(|(row, b)| row_dot(row, fv) + b)
            .collect()
    }

    /// Label of the highest-scoring class
    pub fn classify<V: FeatureVector>(&self, fv: &V) -> Result<&L> {
        let scores = self.score(fv)?;
        let (index, _) = best_of(&scores);
        self.classes
            .label(index)
            .ok_or_else(|| LearnError::UnknownClass(format!("index {index}")))
    }

    /// Validate a training set against this model and resolve every label
    /// to its row index
    pub(crate) fn prepare_examples<V: FeatureVector>(
        &self,
        fvs: &[V],
        truths: &[L],
    ) -> Result<Vec<usize>> {
        check_paired(fvs.len(), truths.len())?;
        if fvs.is_empty() {
            return Err(LearnError::EmptyDataset);
        }
        fvs.iter()
            .zip(truths)
            .map(|(fv, truth)| {
                self.check_dim(fv)?;
                self.class_index(truth)
            })
            .collect()
    }

    /// weights += other.weights
    pub(crate) fn accumulate(&mut self, other: &Self) {
        for (acc, w) in self.weights.iter_mut().zip(&other.weights) {
            *acc += w;
        }
    }

    /// weights *= factor
    pub(crate) fn scale_weights(&mut self, factor: f64) {
        for w in self.weights.iter_mut() {
            *w *= factor;
        }
    }
}

/// Fail unless the two paired sequences have equal length
pub(crate) fn check_paired(features: usize, labels: usize) -> Result<()> {
    if features != labels {
        return Err(LearnError::LengthMismatch { features, labels });
    }
    Ok(())
}

/// `best` for a model's score vector, which always has at least one entry
pub(crate) fn best_of(scores: &[f64]) -> (usize, f64) {
    best(scores).unwrap_or((0, f64::NEG_INFINITY))
}
