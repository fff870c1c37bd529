//! Multiclass perceptron with optional weight averaging
//!
//! On a mistake every class row moves: the true class is pulled toward the
//! example by `learn_rate * x`, every other class is pushed away by
//! `learn_rate * x / (C - 1)`. The bias is never updated.

use crate::core::{FeatureVector, LearnError, PerceptronConfig, Result};
use crate::eval::test_classification;
use crate::model::{best_of, LinearModel};
use crate::vector::add_scaled;
use log::{debug, info};
use std::fmt::Debug;
use std::hash::Hash;

/// Online perceptron state: working model, running sum, pass counter
pub struct PerceptronTrainer<L> {
    config: PerceptronConfig,
    working: LinearModel<L>,
    accumulator: Option<LinearModel<L>>,
    passes: usize,
    last_pass_len: usize,
    history: Vec<f64>,
}

impl<L> PerceptronTrainer<L>
where
    L: Eq + Hash + Clone + Debug,
{
    /// Start training from `init`
    pub fn new(init: LinearModel<L>, config: PerceptronConfig) -> Result<Self> {
        config.validate()?;
        let accumulator = config
            .average
            .then(|| LinearModel::zeros(init.classes().clone(), init.dim()));
        Ok(Self {
            config,
            working: init,
            accumulator,
            passes: 0,
            last_pass_len: 0,
            history: Vec::new(),
        })
    }

    pub fn config(&self) -> &PerceptronConfig {
        &self.config
    }

    /// The model being updated in place
    pub fn working_model(&self) -> &LinearModel<L> {
        &self.working
    }

    /// Number of completed passes
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Training error after each pass, when tracked
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    /// One pass over the examples, in order
    ///
    /// Returns the training error of the working model after the pass when
    /// `track_error` is set.
    pub fn run_pass<V: FeatureVector>(&mut self, fvs: &[V], truths: &[L]) -> Result<Option<f64>> {
        let targets = self.working.prepare_examples(fvs, truths)?;

        let mut mistakes = 0usize;
        for (fv, &tidx) in fvs.iter().zip(&targets) {
            let scores = self.working.score_unchecked(fv);
            let (predicted, _) = best_of(&scores);
            if predicted != tidx {
                mistakes += 1;
                self.update(fv, tidx);
            }
        }

        self.passes += 1;
        self.last_pass_len = fvs.len();
        debug!(
            "perceptron pass {}: {mistakes} mistakes over {} examples",
            self.passes,
            fvs.len()
        );

        if !self.config.track_error {
            return Ok(None);
        }
        let error = test_classification(&self.working, fvs, truths)?;
        info!(
            "perceptron pass {}/{}: training error {error:.4}",
            self.passes, self.config.iterations
        );
        self.history.push(error);
        Ok(Some(error))
    }

    fn update<V: FeatureVector>(&mut self, fv: &V, tidx: usize) {
        let n_classes = self.working.num_classes();
        let rate = self.config.learn_rate;
        let push = -1.0 / (n_classes as f64 - 1.0);

        for c in 0..n_classes {
            let sign = if c == tidx { 1.0 } else { push };
            add_scaled(self.working.weights_row_mut(c), fv, sign * rate);
            // The running sum takes a snapshot after every row touched.
            if let Some(acc) = self.accumulator.as_mut() {
                acc.accumulate(&self.working);
            }
        }
    }

    /// Final model: the averaged weights when averaging, otherwise the
    /// working model
    pub fn finish(self) -> Result<LinearModel<L>> {
        let Some(acc) = self.accumulator else {
            return Ok(self.working);
        };
        let events = self.last_pass_len * self.passes;
        if events == 0 {
            return Err(LearnError::EmptyDataset);
        }

        let mut averaged = self.working;
        averaged.weights_mut().copy_from_slice(acc.weights());
        averaged.scale_weights(1.0 / events as f64);
        Ok(averaged)
    }
}

/// Train a perceptron for `config.iterations` passes starting from `init`
pub fn train_perceptron<L, V>(
    fvs: &[V],
    truths: &[L],
    init: &LinearModel<L>,
    config: &PerceptronConfig,
) -> Result<LinearModel<L>>
where
    L: Eq + Hash + Clone + Debug,
    V: FeatureVector,
{
    let mut trainer = PerceptronTrainer::new(init.clone(), config.clone())?;
    debug!(
        "training perceptron: {} examples, {} classes, {} dims",
        fvs.len(),
        init.num_classes(),
        init.dim()
    );
    for _ in 0..config.iterations {
        trainer.run_pass(fvs, truths)?;
    }
    trainer.finish()
}
