//! Operations over feature vectors
//!
//! Every function here is generic over [`FeatureVector`], so it runs
//! unchanged on dense and sparse inputs. Sparse inputs only touch their
//! stored entries.

use crate::core::{FeatureVector, SparseVector};
use std::cmp::Ordering;

/// Dot product u^T * v
///
/// Two sparse operands are merged over their sorted indices. Otherwise the
/// operand with fewer stored entries is iterated and the other one looked up,
/// so sparse x dense costs O(nnz). Only indices stored in both operands
/// contribute, in ascending order, which makes the result independent of
/// argument order.
pub fn dot<U: FeatureVector, V: FeatureVector>(u: &U, v: &V) -> f64 {
    if let (Some(x), Some(y)) = (u.as_sparse(), v.as_sparse()) {
        return sparse_dot(x, y);
    }
    if u.stored_len() <= v.stored_len() {
        u.entries().map(|(i, x)| x * v.get(i)).sum()
    } else {
        v.entries().map(|(i, y)| u.get(i) * y).sum()
    }
}

/// Squared L2 norm
pub fn squared_norm<V: FeatureVector>(v: &V) -> f64 {
    v.squared_norm()
}

/// Indices of the non-zero entries, ascending
pub fn nonzero_indices<V: FeatureVector>(v: &V) -> Vec<usize> {
    v.entries().map(|(i, _)| i).collect()
}

/// Merge two sorted index lists, O(nnz(x) + nnz(y))
pub fn sparse_dot(x: &SparseVector, y: &SparseVector) -> f64 {
    let mut xs = x.entries().peekable();
    let mut ys = y.entries().peekable();
    let mut sum = 0.0;

    loop {
        let ((i, a), (j, b)) = match (xs.peek(), ys.peek()) {
            (Some(&l), Some(&r)) => (l, r),
            _ => break,
        };
        match i.cmp(&j) {
            Ordering::Less => {
                xs.next();
            }
            Ordering::Greater => {
                ys.next();
            }
            Ordering::Equal => {
                sum += a * b;
                xs.next();
                ys.next();
            }
        }
    }
    sum
}

/// Dot product of a dense weight row with a feature vector
///
/// The caller guarantees `fv.required_dim() <= row.len()`.
pub(crate) fn row_dot<V: FeatureVector>(row: &[f64], fv: &V) -> f64 {
    fv.entries().map(|(d, x)| row[d] * x).sum()
}

/// row += scale * fv, touching only the non-zero entries of `fv`
pub(crate) fn add_scaled<V: FeatureVector>(row: &mut [f64], fv: &V, scale: f64) {
    for (d, x) in fv.entries() {
        row[d] += scale * x;
    }
}
