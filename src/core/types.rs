//! Core type definitions: feature vectors and trainer configuration

use crate::core::{FeatureVector, LearnError, Result};
use serde::{Deserialize, Serialize};

/// Sparse vector representation with sorted, unique indices
#[derive(Clone, Debug, PartialEq)]
pub struct SparseVector {
    /// Sorted indices of non-zero elements
    pub indices: Vec<usize>,
    /// Values corresponding to indices
    pub values: Vec<f64>,
}

impl SparseVector {
    /// Create a new sparse vector, ensuring indices are sorted
    pub fn new(indices: Vec<usize>, values: Vec<f64>) -> Self {
        assert_eq!(
            indices.len(),
            values.len(),
            "Indices and values must have same length"
        );

        let mut pairs: Vec<_> = indices.into_iter().zip(values).collect();
        pairs.sort_by_key(|&(idx, _)| idx);
        assert!(
            pairs.windows(2).all(|w| w[0].0 != w[1].0),
            "Indices must be unique"
        );

        let (indices, values): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        Self { indices, values }
    }

    /// Create an empty sparse vector
    pub fn empty() -> Self {
        Self {
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Build from a dense slice, keeping only non-zero values
    pub fn from_dense(values: &[f64]) -> Self {
        let (indices, values) = values
            .iter()
            .enumerate()
            .filter(|(_, &v)| v != 0.0)
            .map(|(i, &v)| (i, v))
            .unzip();
        Self { indices, values }
    }

    /// Number of non-zero elements
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Check if vector is empty
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

pub struct SparseEntries<'a> {
    indices: std::slice::Iter<'a, usize>,
    values: std::slice::Iter<'a, f64>,
}

impl Iterator for SparseEntries<'_> {
    type Item = (usize, f64);

    fn next(&mut self) -> Option<Self::Item> {
        Some((*self.indices.next()?, *self.values.next()?))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.indices.size_hint()
    }
}

impl FeatureVector for SparseVector {
    type Entries<'a> = SparseEntries<'a>;

    fn entries(&self) -> SparseEntries<'_> {
        SparseEntries {
            indices: self.indices.iter(),
            values: self.values.iter(),
        }
    }

    fn get(&self, index: usize) -> f64 {
        match self.indices.binary_search(&index) {
            Ok(pos) => self.values[pos],
            Err(_) => 0.0,
        }
    }

    fn stored_len(&self) -> usize {
        self.indices.len()
    }

    fn required_dim(&self) -> usize {
        self.indices.last().map_or(0, |&i| i + 1)
    }

    fn as_sparse(&self) -> Option<&SparseVector> {
        Some(self)
    }
}

/// Dense vector: one value per feature dimension
#[derive(Clone, Debug, PartialEq)]
pub struct DenseVector {
    pub values: Vec<f64>,
}

impl DenseVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// All-zero vector of the given length
    pub fn zeros(dim: usize) -> Self {
        Self {
            values: vec![0.0; dim],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Vec<f64>> for DenseVector {
    fn from(values: Vec<f64>) -> Self {
        Self { values }
    }
}

pub struct DenseEntries<'a> {
    inner: std::iter::Enumerate<std::slice::Iter<'a, f64>>,
}

impl Iterator for DenseEntries<'_> {
    type Item = (usize, f64);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .by_ref()
            .find(|(_, &v)| v != 0.0)
            .map(|(i, &v)| (i, v))
    }
}

impl FeatureVector for DenseVector {
    type Entries<'a> = DenseEntries<'a>;

    fn entries(&self) -> DenseEntries<'_> {
        DenseEntries {
            inner: self.values.iter().enumerate(),
        }
    }

    fn get(&self, index: usize) -> f64 {
        self.values.get(index).copied().unwrap_or(0.0)
    }

    fn stored_len(&self) -> usize {
        self.values.len()
    }

    fn required_dim(&self) -> usize {
        self.values.len()
    }
}

/// Either representation, for callers holding a mixed collection
#[derive(Clone, Debug, PartialEq)]
pub enum FeatureVec {
    Dense(DenseVector),
    Sparse(SparseVector),
}

pub enum FeatureVecEntries<'a> {
    Dense(DenseEntries<'a>),
    Sparse(SparseEntries<'a>),
}

impl Iterator for FeatureVecEntries<'_> {
    type Item = (usize, f64);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Dense(it) => it.next(),
            Self::Sparse(it) => it.next(),
        }
    }
}

impl FeatureVector for FeatureVec {
    type Entries<'a> = FeatureVecEntries<'a>;

    fn entries(&self) -> FeatureVecEntries<'_> {
        match self {
            Self::Dense(v) => FeatureVecEntries::Dense(v.entries()),
            Self::Sparse(v) => FeatureVecEntries::Sparse(v.entries()),
        }
    }

    fn get(&self, index: usize) -> f64 {
        match self {
            Self::Dense(v) => v.get(index),
            Self::Sparse(v) => v.get(index),
        }
    }

    fn stored_len(&self) -> usize {
        match self {
            Self::Dense(v) => v.stored_len(),
            Self::Sparse(v) => v.stored_len(),
        }
    }

    fn required_dim(&self) -> usize {
        match self {
            Self::Dense(v) => v.required_dim(),
            Self::Sparse(v) => v.required_dim(),
        }
    }

    fn as_sparse(&self) -> Option<&SparseVector> {
        match self {
            Self::Dense(_) => None,
            Self::Sparse(v) => Some(v),
        }
    }
}

impl From<DenseVector> for FeatureVec {
    fn from(v: DenseVector) -> Self {
        Self::Dense(v)
    }
}

impl From<SparseVector> for FeatureVec {
    fn from(v: SparseVector) -> Self {
        Self::Sparse(v)
    }
}

/// Output of an external binary solver for one class
#[derive(Debug, Clone, PartialEq)]
pub struct BinarySolution {
    /// Dense weight vector, one entry per feature dimension
    pub weights: Vec<f64>,
    pub bias: f64,
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(LearnError::InvalidParameter(format!(
            "{name} must be positive and finite, got {value}"
        )))
    }
}

fn check_iterations(iterations: usize) -> Result<()> {
    if iterations == 0 {
        return Err(LearnError::InvalidParameter(
            "iterations must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Configuration for the multiclass perceptron
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptronConfig {
    /// Step size applied to every row update
    pub learn_rate: f64,
    /// Return the averaged model instead of the last working model
    pub average: bool,
    /// Number of full passes over the data
    pub iterations: usize,
    /// Compute the training error after every pass
    pub track_error: bool,
}

impl Default for PerceptronConfig {
    fn default() -> Self {
        Self {
            learn_rate: 1.0,
            average: true,
            iterations: 40,
            track_error: true,
        }
    }
}

impl PerceptronConfig {
    pub fn with_learn_rate(mut self, learn_rate: f64) -> Self {
        self.learn_rate = learn_rate;
        self
    }

    pub fn with_average(mut self, average: bool) -> Self {
        self.average = average;
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_track_error(mut self, track_error: bool) -> Self {
        self.track_error = track_error;
        self
    }

    /// Parse from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        check_positive("learn_rate", self.learn_rate)?;
        check_iterations(self.iterations)
    }
}

/// Numeric settings of the Hildreth QP solver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HildrethConfig {
    /// KKT convergence threshold
    pub eps: f64,
    /// Floor separating "inactive" from "at bound"
    pub zero: f64,
    /// Iteration budget per solve
    pub max_iterations: usize,
}

impl Default for HildrethConfig {
    fn default() -> Self {
        Self {
            eps: 1e-8,
            zero: 1e-12,
            max_iterations: 10_000,
        }
    }
}

impl HildrethConfig {
    pub fn validate(&self) -> Result<()> {
        check_positive("eps", self.eps)?;
        if !(self.zero.is_finite() && self.zero >= 0.0) {
            return Err(LearnError::InvalidParameter(format!(
                "zero must be non-negative and finite, got {}",
                self.zero
            )));
        }
        if self.max_iterations == 0 {
            return Err(LearnError::InvalidParameter(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the MIRA trainer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiraConfig {
    /// Return the averaged model instead of the last working model
    pub average: bool,
    /// Upper bound for every dual variable
    pub c: f64,
    /// Number of highest-scoring classes constrained per example
    pub k: usize,
    /// Number of full passes over the data
    pub iterations: usize,
    /// Compute the training error after every pass
    pub track_error: bool,
    pub hildreth: HildrethConfig,
}

impl Default for MiraConfig {
    fn default() -> Self {
        Self {
            average: true,
            c: 0.1,
            k: 1,
            iterations: 20,
            track_error: true,
            hildreth: HildrethConfig::default(),
        }
    }
}

impl MiraConfig {
    pub fn with_average(mut self, average: bool) -> Self {
        self.average = average;
        self
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_track_error(mut self, track_error: bool) -> Self {
        self.track_error = track_error;
        self
    }

    pub fn with_hildreth(mut self, hildreth: HildrethConfig) -> Self {
        self.hildreth = hildreth;
        self
    }

    /// Parse from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        check_positive("c", self.c)?;
        if self.k == 0 {
            return Err(LearnError::InvalidParameter(
                "k must be at least 1".to_string(),
            ));
        }
        check_iterations(self.iterations)?;
        self.hildreth.validate()
    }
}
