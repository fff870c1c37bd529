//! Core traits shared by the model, the trainers and the QP solver

use crate::core::{BinarySolution, Result, SparseVector};

/// Capability set every feature vector representation provides.
///
/// The trainers are generic over this trait so the same update loop runs over
/// dense and sparse inputs. `entries` yields only explicitly stored non-zero
/// values, in ascending index order.
pub trait FeatureVector {
    type Entries<'a>: Iterator<Item = (usize, f64)>
    where
        Self: 'a;

    /// Iterate `(index, value)` pairs of the non-zero entries
    fn entries(&self) -> Self::Entries<'_>;

    /// Value at `index` (0 if not stored)
    fn get(&self, index: usize) -> f64;

    /// Number of stored entries (length for dense, nnz for sparse)
    fn stored_len(&self) -> usize;

    /// Smallest model dimensionality able to hold this vector
    fn required_dim(&self) -> usize;

    /// Squared L2 norm
    fn squared_norm(&self) -> f64 {
        self.entries().map(|(_, v)| v * v).sum()
    }

    /// Borrow as a sorted sparse vector when that is the storage
    fn as_sparse(&self) -> Option<&SparseVector> {
        None
    }
}

/// Inner products between the direction vectors of a small QP.
///
/// The Hildreth solver only ever asks for `inner(i, j)`; how the directions are
/// stored is up to the implementor.
pub trait GramSource {
    /// Number of direction vectors
    fn len(&self) -> usize;

    /// Inner product of directions `i` and `j`
    fn inner(&self, i: usize, j: usize) -> f64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// External binary (one-vs-rest) solver.
///
/// Receives a `+1/-1` label per example and the shared feature vectors, and
/// returns a dense weight vector of length `dim` plus a bias.
pub trait BinarySolver: Send + Sync {
    fn solve<V: FeatureVector + Sync>(
        &self,
        labels: &[f64],
        features: &[V],
        dim: usize,
    ) -> Result<BinarySolution>;
}
