//! One-vs-rest assembly over an external binary solver
//!
//! Each class gets its own `+1/-1` labelling of the training set and is handed
//! to the solver as an independent task. The tasks run on the rayon pool and
//! each one fills a disjoint row of the result, so nothing is shared between
//! them beyond read-only inputs.

use crate::core::{BinarySolution, BinarySolver, FeatureVector, LearnError, Result};
use crate::model::{ClassMap, LinearModel};
use log::{debug, info};
use rayon::prelude::*;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

/// `+1` for examples of class `c`, `-1` for everything else
fn binary_labels(targets: &[usize], c: usize) -> Vec<f64> {
    targets
        .iter()
        .map(|&t| if t == c { 1.0 } else { -1.0 })
        .collect()
}

/// Train one binary problem per class and stack the results into a model
pub fn train_one_vs_rest<L, V, S>(
    solver: &S,
    fvs: &[V],
    truths: &[L],
    classes: Arc<ClassMap<L>>,
    dim: usize,
) -> Result<LinearModel<L>>
where
    L: Eq + Hash + Clone + Debug,
    V: FeatureVector + Sync,
    S: BinarySolver,
{
    if dim == 0 {
        return Err(LearnError::InvalidDimension(
            "dimensionality must be positive".to_string(),
        ));
    }
    let template = LinearModel::zeros(classes, dim);
    let targets = template.prepare_examples(fvs, truths)?;
    let n_classes = template.num_classes();

    debug!(
        "dispatching {n_classes} one-vs-rest problems over {} examples",
        fvs.len()
    );

    let solutions: Vec<BinarySolution> = (0..n_classes)
        .into_par_iter()
        .map(|c| {
            let labels = binary_labels(&targets, c);
            let solution = solver.solve(&labels, fvs, dim)?;
            if solution.weights.len() != dim {
                return Err(LearnError::Solver(format!(
                    "class {c}: expected {dim} weights, got {}",
                    solution.weights.len()
                )));
            }
            Ok(solution)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut weights = Vec::with_capacity(n_classes * dim);
    let mut bias = Vec::with_capacity(n_classes);
    for solution in solutions {
        weights.extend_from_slice(&solution.weights);
        bias.push(solution.bias);
    }

    info!("one-vs-rest model assembled: {n_classes} classes, {dim} dims");
    LinearModel::from_parts(template.classes().clone(), dim, weights, bias)
}
