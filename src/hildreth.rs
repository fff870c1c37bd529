//! Hildreth's active-set solver for small box-constrained QPs
//!
//! Given direction vectors a_1..a_k and target margins b_1..b_k, finds dual
//! variables alpha_i in [0, C] by repeatedly moving the coordinate with the
//! largest KKT violation. MIRA uses it to compute exact k-best updates.
//!
//! The workspace is allocated once per trainer and reset at the start of every
//! solve. Columns of the Gram matrix are computed lazily the first time their
//! coordinate is moved, tracked by an explicit `computed` flag per column.

use crate::core::{FeatureVector, GramSource, HildrethConfig, LearnError, Result};
use crate::vector::dot;
use log::debug;

impl<V: FeatureVector> GramSource for [V] {
    fn len(&self) -> usize {
        <[V]>::len(self)
    }

    fn inner(&self, i: usize, j: usize) -> f64 {
        dot(&self[i], &self[j])
    }
}

/// How a solve terminated
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HildrethOutcome {
    /// Coordinate steps taken
    ///
    /// A step that leaves `alpha` unchanged ends the solve, so this can be
    /// lower than running the loop until convergence or the iteration cap.
    pub iterations: usize,
    /// Largest KKT violation left
    pub max_kkt: f64,
    /// `max_kkt` fell below the threshold
    pub converged: bool,
}

/// Reusable solver workspace
#[derive(Debug, Clone)]
pub struct Hildreth {
    config: HildrethConfig,
    c: f64,
    alpha: Vec<f64>,
    f: Vec<f64>,
    kkt: Vec<f64>,
    /// Gram matrix, row-major k x k
    gram: Vec<f64>,
    computed: Vec<bool>,
}

impl Hildreth {
    /// Workspace for problems of up to `capacity` candidates with box bound `c`
    pub fn new(config: HildrethConfig, c: f64, capacity: usize) -> Self {
        Self {
            config,
            c,
            alpha: Vec::with_capacity(capacity),
            f: Vec::with_capacity(capacity),
            kkt: Vec::with_capacity(capacity),
            gram: Vec::with_capacity(capacity * capacity),
            computed: Vec::with_capacity(capacity),
        }
    }

    pub fn config(&self) -> &HildrethConfig {
        &self.config
    }

    /// Box bound on every dual variable
    pub fn c(&self) -> f64 {
        self.c
    }

    /// Dual variables of the last solve
    pub fn alpha(&self) -> &[f64] {
        &self.alpha
    }

    /// Residuals F of the last solve
    pub fn residuals(&self) -> &[f64] {
        &self.f
    }

    /// Whether Gram column `j` was computed during the last solve
    pub fn is_computed(&self, j: usize) -> bool {
        self.computed.get(j).copied().unwrap_or(false)
    }

    fn reset(&mut self, k: usize) {
        for buf in [&mut self.alpha, &mut self.f, &mut self.kkt] {
            buf.clear();
            buf.resize(k, 0.0);
        }
        self.gram.clear();
        self.gram.resize(k * k, 0.0);
        self.computed.clear();
        self.computed.resize(k, false);
    }

    /// Solve for `alpha` given the directions and target margins `b`
    ///
    /// Running out of iterations is not an error: the returned outcome says
    /// whether the solve converged and `alpha()` holds the best effort either
    /// way.
    pub fn solve<G>(&mut self, directions: &G, b: &[f64]) -> Result<HildrethOutcome>
    where
        G: GramSource + ?Sized,
    {
        if directions.len() != b.len() {
            return Err(LearnError::InvalidParameter(format!(
                "{} directions but {} margins",
                directions.len(),
                b.len()
            )));
        }

        let k = b.len();
        self.reset(k);
        let eps = self.config.eps;
        let zero = self.config.zero;
        let max_iterations = self.config.max_iterations;

        let mut max_kkt = f64::NEG_INFINITY;
        let mut max_i = 0;
        for i in 0..k {
            self.gram[i * k + i] = directions.inner(i, i);
            self.f[i] = b[i];
            self.kkt[i] = b[i];
            if self.kkt[i] > max_kkt {
                max_kkt = self.kkt[i];
                max_i = i;
            }
        }

        let mut iterations = 0;
        while max_kkt >= eps && iterations < max_iterations {
            let j = max_i;
            let a_jj = self.gram[j * k + j];
            let diff_alpha = if a_jj <= zero { 0.0 } else { self.f[j] / a_jj };

            let try_alpha = self.alpha[j] + diff_alpha;
            let add_alpha = if try_alpha < 0.0 {
                -self.alpha[j]
            } else if try_alpha > self.c {
                self.c - self.alpha[j]
            } else {
                diff_alpha
            };
            self.alpha[j] += add_alpha;

            if !self.computed[j] {
                for i in 0..k {
                    self.gram[i * k + j] = directions.inner(i, j);
                }
                self.computed[j] = true;
            }

            max_kkt = f64::NEG_INFINITY;
            for i in 0..k {
                self.f[i] -= add_alpha * self.gram[i * k + j];
                self.kkt[i] = if self.c - self.alpha[i] <= zero {
                    -self.f[i]
                } else if self.alpha[i] > zero {
                    self.f[i].abs()
                } else {
                    self.f[i]
                };
                if self.kkt[i] > max_kkt {
                    max_kkt = self.kkt[i];
                    max_i = i;
                }
            }
            iterations += 1;

            // A zero step leaves F and alpha untouched, so every later
            // iteration would pick the same coordinate again.
            if add_alpha == 0.0 {
                break;
            }
        }

        let converged = max_kkt < eps;
        if !converged {
            debug!(
                "hildreth stopped after {iterations} iterations with max kkt {max_kkt:.3e} (k = {k})"
            );
        }

        Ok(HildrethOutcome {
            iterations,
            max_kkt,
            converged,
        })
    }
}
