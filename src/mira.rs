//! Margin-Infused Relaxed Algorithm (MIRA)
//!
//! Per example the trainer asks for the true class to beat each competitor by
//! at least the loss between the two labels, with the smallest change to the
//! weights and each step bounded by `C`.
//!
//! With `k == 1` only the best-scoring class is constrained and the update has
//! a closed form. With `k > 1` the `k` best classes are constrained together
//! and the step sizes come from the Hildreth solver. Every constraint shares
//! the direction `2 x`; the classes differ only through their margins.

use crate::core::{FeatureVector, GramSource, LearnError, MiraConfig, Result};
use crate::eval::test_classification;
use crate::hildreth::Hildreth;
use crate::model::{best_of, top_k, LinearModel};
use crate::vector::add_scaled;
use log::{debug, info, warn};
use std::fmt::Debug;
use std::hash::Hash;

/// Loss between the true and the predicted label
pub type LossFn<L> = fn(&L, &L) -> f64;

/// 0 when the labels agree, 1 otherwise
pub fn zero_one_loss<L: PartialEq>(truth: &L, predicted: &L) -> f64 {
    if truth == predicted {
        0.0
    } else {
        1.0
    }
}

/// `count` copies of the same direction vector
struct SharedDirection {
    count: usize,
    squared_norm: f64,
}

impl GramSource for SharedDirection {
    fn len(&self) -> usize {
        self.count
    }

    fn inner(&self, _i: usize, _j: usize) -> f64 {
        self.squared_norm
    }
}

/// Online MIRA state: working model, running sum, QP workspace
pub struct MiraTrainer<L, F = LossFn<L>> {
    config: MiraConfig,
    loss: F,
    k: usize,
    working: LinearModel<L>,
    accumulator: Option<LinearModel<L>>,
    solver: Hildreth,
    margins: Vec<f64>,
    passes: usize,
    last_pass_len: usize,
    history: Vec<f64>,
}

impl<L> MiraTrainer<L>
where
    L: Eq + Hash + Clone + Debug,
{
    /// Trainer using the 0/1 loss
    pub fn new(init: LinearModel<L>, config: MiraConfig) -> Result<Self> {
        Self::with_loss(init, config, zero_one_loss::<L> as LossFn<L>)
    }
}

impl<L, F> MiraTrainer<L, F>
where
    L: Eq + Hash + Clone + Debug,
    F: Fn(&L, &L) -> f64,
{
    /// Trainer using a caller-supplied loss `loss(truth, predicted)`
    pub fn with_loss(init: LinearModel<L>, config: MiraConfig, loss: F) -> Result<Self> {
        config.validate()?;

        let n_classes = init.num_classes();
        let k = config.k.min(n_classes);
        if config.k > n_classes {
            warn!(
                "k = {} exceeds the {n_classes} classes, using k = {k}",
                config.k
            );
        }

        let accumulator = config
            .average
            .then(|| LinearModel::zeros(init.classes().clone(), init.dim()));
        let solver = Hildreth::new(config.hildreth.clone(), config.c, k);

        Ok(Self {
            config,
            loss,
            k,
            working: init,
            accumulator,
            solver,
            margins: Vec::with_capacity(k),
            passes: 0,
            last_pass_len: 0,
            history: Vec::new(),
        })
    }

    pub fn config(&self) -> &MiraConfig {
        &self.config
    }

    /// Number of constrained classes actually used
    pub fn k(&self) -> usize {
        self.k
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
        if self.k == 1 {
            if let Some(i) = fvs.iter().position(|fv| fv.squared_norm() == 0.0) {
                return Err(LearnError::NumericDegenerate(format!(
                    "feature vector {i} has zero norm"
                )));
            }
        }

        for ((fv, truth), &tidx) in fvs.iter().zip(truths).zip(&targets) {
            if self.k == 1 {
                self.update_one_best(fv, truth, tidx)?;
            } else {
                self.update_k_best(fv, truth, tidx)?;
            }
            if let Some(acc) = self.accumulator.as_mut() {
                acc.accumulate(&self.working);
            }
        }

        self.passes += 1;
        self.last_pass_len = fvs.len();

        if !self.config.track_error {
            return Ok(None);
        }
        let error = test_classification(&self.working, fvs, truths)?;
        info!(
            "mira pass {}/{}: training error {error:.4}",
            self.passes, self.config.iterations
        );
        self.history.push(error);
        Ok(Some(error))
    }

    fn update_one_best<V: FeatureVector>(
        &mut self,
        fv: &V,
        truth: &L,
        tidx: usize,
    ) -> Result<()> {
        let scores = self.working.score_unchecked(fv);
        let target_score = scores[tidx];
        let (bidx, best_score) = best_of(&scores);

        let loss = match self.working.class_at(bidx) {
            Some(predicted) => (self.loss)(truth, predicted),
            None => return Err(LearnError::UnknownClass(format!("index {bidx}"))),
        };
        let dist = target_score - best_score;
        let alpha = ((loss - dist) / (2.0 * fv.squared_norm())).min(self.config.c);

        add_scaled(self.working.weights_row_mut(bidx), fv, -alpha);
        add_scaled(self.working.weights_row_mut(tidx), fv, alpha);
        Ok(())
    }

    fn update_k_best<V: FeatureVector>(&mut self, fv: &V, truth: &L, tidx: usize) -> Result<()> {
        let scores = self.working.score_unchecked(fv);
        let target_score = scores[tidx];
        let candidates = top_k(&scores, self.k);

        self.margins.clear();
        for &cidx in &candidates {
            let loss = match self.working.class_at(cidx) {
                Some(label) => (self.loss)(truth, label),
                None => return Err(LearnError::UnknownClass(format!("index {cidx}"))),
            };
            self.margins.push(loss - (target_score - scores[cidx]));
        }

        let directions = SharedDirection {
            count: candidates.len(),
            squared_norm: 4.0 * fv.squared_norm(),
        };
        self.solver.solve(&directions, &self.margins)?;

        for (&cidx, &alpha) in candidates.iter().zip(self.solver.alpha()) {
            add_scaled(self.working.weights_row_mut(cidx), fv, -alpha);
            add_scaled(self.working.weights_row_mut(tidx), fv, alpha);
        }
        Ok(())
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

/// Train with MIRA under the 0/1 loss for `config.iterations` passes
pub fn train_mira<L, V>(
    fvs: &[V],
    truths: &[L],
    init: &LinearModel<L>,
    config: &MiraConfig,
) -> Result<LinearModel<L>>
where
    L: Eq + Hash + Clone + Debug,
    V: FeatureVector,
{
    train_mira_with_loss(fvs, truths, init, config, zero_one_loss::<L>)
}

/// Train with MIRA under a caller-supplied loss
pub fn train_mira_with_loss<L, V, F>(
    fvs: &[V],
    truths: &[L],
    init: &LinearModel<L>,
    config: &MiraConfig,
    loss: F,
) -> Result<LinearModel<L>>
where
    L: Eq + Hash + Clone + Debug,
    V: FeatureVector,
    F: Fn(&L, &L) -> f64,
{
    let mut trainer = MiraTrainer::with_loss(init.clone(), config.clone(), loss)?;
    debug!(
        "training mira: {} examples, {} classes, {} dims, k = {}, C = {}",
        fvs.len(),
        init.num_classes(),
        init.dim(),
        trainer.k(),
        config.c
    );
    for _ in 0..config.iterations {
        trainer.run_pass(fvs, truths)?;
    }
    trainer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DenseVector, SparseVector};
    use approx::assert_relative_eq;

    fn three_class_data() -> (Vec<SparseVector>, Vec<&'static str>) {
        let fvs = vec![
            SparseVector::new(vec![0, 1], vec![3.0, 0.2]),
            SparseVector::new(vec![1, 2], vec![3.0, 0.1]),
            SparseVector::new(vec![2], vec![3.0]),
            SparseVector::new(vec![0], vec![2.5]),
            SparseVector::new(vec![1], vec![2.5]),
            SparseVector::new(vec![0, 2], vec![0.3, 2.5]),
        ];
        let truths = vec!["a", "b", "c", "a", "b", "c"];
        (fvs, truths)
    }

    fn margin(model: &LinearModel<&'static str>, fv: &DenseVector, tidx: usize) -> f64 {
        let scores = model.score(fv).expect("score");
        let best_other = scores
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != tidx)
            .map(|(_, &s)| s)
            .fold(f64::NEG_INFINITY, f64::max);
        scores[tidx] - best_other
    }

    fn single_pass(config: MiraConfig, fv: DenseVector, truth: &'static str) -> LinearModel<&'static str> {
        let init = LinearModel::new(["a", "b", "c"], 2).expect("Model should build");
        let mut trainer = MiraTrainer::new(init, config.with_average(false)).expect("trainer");
        trainer.run_pass(&[fv], &[truth]).expect("pass");
        trainer.finish().expect("finish")
    }

    #[test]
    fn test_one_best_closed_form_update() {
        let fv = DenseVector::new(vec![1.0, 2.0]);
        let init = LinearModel::new(["a", "b", "c"], 2).expect("Model should build");
        let before = margin(&init, &fv, 2);

        let model = single_pass(MiraConfig::default().with_c(1.0), fv.clone(), "c");

        // loss 1, dist 0, |x|^2 = 5: alpha = 1 / 10
        assert_relative_eq!(model.weights_row(0)[0], -0.1);
        assert_relative_eq!(model.weights_row(0)[1], -0.2);
        assert_eq!(model.weights_row(1), &[0.0, 0.0]);
        assert_relative_eq!(model.weights_row(2)[0], 0.1);
        assert_relative_eq!(model.weights_row(2)[1], 0.2);
        assert!(margin(&model, &fv, 2) > before);
    }

    #[test]
    fn test_one_best_step_clamped_at_c() {
        let model = single_pass(
            MiraConfig::default().with_c(0.05),
            DenseVector::new(vec![1.0, 2.0]),
            "b",
        );
        assert_relative_eq!(model.weights_row(0)[1], -0.1);
        assert_relative_eq!(model.weights_row(1)[1], 0.1);
    }

    #[test]
    fn test_one_best_update_propagates_result() {
        let init = LinearModel::new(["a", "b"], 2).expect("Model should build");
        let mut trainer =
            MiraTrainer::new(init, MiraConfig::default().with_c(1.0)).expect("trainer");
        let fv = DenseVector::new(vec![0.0, 2.0]);

        trainer.update_one_best(&fv, &"b", 1).expect("update");

        // loss 1, dist 0, |x|^2 = 4: alpha = 1 / 8
        assert_relative_eq!(trainer.working_model().weights_row(0)[1], -0.25);
        assert_relative_eq!(trainer.working_model().weights_row(1)[1], 0.25);
    }

    #[test]
    fn test_correct_prediction_gives_zero_step() {
        let model = single_pass(MiraConfig::default(), DenseVector::new(vec![1.0, 1.0]), "a");
        assert!(model.weights().iter().all(|&w| w == 0.0));
    }

    #[test]
    fn test_zero_norm_vector_is_degenerate() {
        let init = LinearModel::new(["a", "b"], 2).expect("Model should build");
        let mut trainer = MiraTrainer::new(init, MiraConfig::default()).expect("trainer");
        let fvs = vec![DenseVector::new(vec![1.0, 0.0]), DenseVector::zeros(2)];

        assert!(matches!(
            trainer.run_pass(&fvs, &["b", "a"]),
            Err(LearnError::NumericDegenerate(_))
        ));
        // Rejected before any update
        assert!(trainer.working_model().weights().iter().all(|&w| w == 0.0));
    }

    #[test]
    fn test_zero_norm_vector_with_k_best_takes_no_step() {
        let model = single_pass(
            MiraConfig::default().with_k(2),
            DenseVector::zeros(2),
            "b",
        );
        assert!(model.weights().iter().all(|&w| w == 0.0));
    }

    #[test]
    fn test_k_best_update_via_hildreth() {
        let model = single_pass(
            MiraConfig::default().with_c(10.0).with_k(3),
            DenseVector::new(vec![1.0, 0.0]),
            "c",
        );

        // Margins (1, 1, 0) over a shared Gram value of 4: alpha = (0.25, 0, 0)
        assert_relative_eq!(model.weights_row(0)[0], -0.25);
        assert_eq!(model.weights_row(1)[0], 0.0);
        assert_relative_eq!(model.weights_row(2)[0], 0.25);
    }

    #[test]
    fn test_k_larger_than_class_count_is_clamped() {
        let init = LinearModel::new(["a", "b", "c"], 2).expect("Model should build");
        let trainer = MiraTrainer::new(init, MiraConfig::default().with_k(7)).expect("trainer");
        assert_eq!(trainer.k(), 3);

        let clamped = single_pass(
            MiraConfig::default().with_c(10.0).with_k(7),
            DenseVector::new(vec![1.0, 0.0]),
            "c",
        );
        let exact = single_pass(
            MiraConfig::default().with_c(10.0).with_k(3),
            DenseVector::new(vec![1.0, 0.0]),
            "c",
        );
        assert_eq!(clamped.weights(), exact.weights());
    }

    #[test]
    fn test_custom_loss_scales_step() {
        let init = LinearModel::new(["a", "b", "c"], 2).expect("Model should build");
        let config = MiraConfig::default().with_c(1.0).with_average(false).with_iterations(1);
        let fvs = vec![DenseVector::new(vec![1.0, 2.0])];

        let model = train_mira_with_loss(&fvs, &["c"], &init, &config, |t, p| {
            if t == p {
                0.0
            } else {
                3.0
            }
        })
        .expect("Training");

        assert_relative_eq!(model.weights_row(2)[0], 0.3);
    }

    #[test]
    fn test_single_example_average_matches_working_model() {
        let init = LinearModel::new(["a", "b", "c"], 2).expect("Model should build");
        let fvs = vec![DenseVector::new(vec![0.5, -1.5])];
        let base = MiraConfig::default().with_iterations(1).with_c(1.0);

        let averaged = train_mira(&fvs, &["b"], &init, &base).expect("averaged");
        let plain = train_mira(&fvs, &["b"], &init, &base.clone().with_average(false))
            .expect("plain");

        // One accumulation event: sum / 1 equals the working model
        for (a, p) in averaged.weights().iter().zip(plain.weights()) {
            assert_relative_eq!(*a, *p);
        }
    }

    #[test]
    fn test_converges_on_separable_data() {
        let (fvs, truths) = three_class_data();
        let init = LinearModel::new(["a", "b", "c"], 3).expect("Model should build");

        for k in 1..=3 {
            for average in [false, true] {
                let config = MiraConfig::default().with_k(k).with_average(average);
                let model = train_mira(&fvs, &truths, &init, &config).expect("Training");
                assert_eq!(
                    test_classification(&model, &fvs, &truths).expect("eval"),
                    0.0,
                    "k = {k}, average = {average}"
                );
            }
        }
    }

    #[test]
    fn test_dense_and_sparse_train_identically() {
        let (sparse, truths) = three_class_data();
        let dense: Vec<DenseVector> = sparse
            .iter()
            .map(|s| {
                let mut values = vec![0.0; 3];
                for (&i, &v) in s.indices.iter().zip(&s.values) {
                    values[i] = v;
                }
                DenseVector::new(values)
            })
            .collect();
        let init = LinearModel::new(["a", "b", "c"], 3).expect("Model should build");
        let config = MiraConfig::default().with_k(2).with_iterations(3);

        let a = train_mira(&sparse, &truths, &init, &config).expect("sparse");
        let b = train_mira(&dense, &truths, &init, &config).expect("dense");
        assert_eq!(a.weights(), b.weights());
    }

    #[test]
    fn test_history_and_bias_preserved() {
        let (fvs, truths) = three_class_data();
        let mut init = LinearModel::new(["a", "b", "c"], 3).expect("Model should build");
        init.set_bias(1, 0.25);

        let config = MiraConfig::default().with_iterations(4);
        let mut trainer = MiraTrainer::new(init, config).expect("trainer");
        for _ in 0..4 {
            trainer.run_pass(&fvs, &truths).expect("pass");
        }
        assert_eq!(trainer.history().len(), 4);
        assert_eq!(trainer.passes(), 4);

        let model = trainer.finish().expect("finish");
        assert_eq!(model.bias(), &[0.0, 0.25, 0.0]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let init = LinearModel::new(["a", "b"], 2).expect("Model should build");
        assert!(matches!(
            MiraTrainer::new(init.clone(), MiraConfig::default().with_k(0)),
            Err(LearnError::InvalidParameter(_))
        ));
        assert!(matches!(
            MiraTrainer::new(init, MiraConfig::default().with_c(0.0)),
            Err(LearnError::InvalidParameter(_))
        ));
    }
}
