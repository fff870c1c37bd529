//! Online training of multiclass linear classifiers
//!
//! A [`LinearModel`] scores a feature vector against one weight row per class.
//! Two online trainers update it one example at a time: the multiclass
//! perceptron and MIRA, whose k-best variant solves a small dual QP per
//! example with Hildreth's algorithm. Batch training through an external
//! binary solver is available as one-vs-rest assembly.

pub mod core;
pub mod eval;
pub mod hildreth;
pub mod mira;
pub mod model;
pub mod ovr;
pub mod perceptron;
pub mod vector;

// Re-export main types for convenience
pub use crate::core::traits::*;
pub use crate::core::types::*;
pub use crate::core::{LearnError, Result};
pub use crate::eval::{test_classification, test_classification_with, ConfusionMatrix};
pub use crate::hildreth::{Hildreth, HildrethOutcome};
pub use crate::mira::{train_mira, train_mira_with_loss, zero_one_loss, MiraTrainer};
pub use crate::model::{best, top_k, ClassMap, LinearModel};
pub use crate::ovr::train_one_vs_rest;
pub use crate::perceptron::{train_perceptron, PerceptronTrainer};
pub use crate::vector::{dot, nonzero_indices, sparse_dot, squared_norm};

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
