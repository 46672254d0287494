//! Hidden Markov structured-output model (HM-SVM).
//!
//! The crate provides the pieces a structured SVM solver needs to learn a
//! sequence labeller: the joint feature map Ψ(x, y), loss-augmented Viterbi
//! decoding, the Hamming loss and the constraints of the QP. The solver
//! itself lives outside of this crate and talks to the model through
//! [`StructuredModel`].

pub mod dataset;
pub mod evaluation;
pub mod quark;
pub mod structure;

pub use dataset::{Dataset, Observation};
pub use evaluation::Evaluation;
pub use quark::Quark;
pub use structure::hmsvm::{
    simulate::{simulate_two_state_model, SimulationParams},
    HmsvmLabels, HmsvmModel, StateSequence,
};
pub use structure::{
    constraints::{ConstrainedBlocks, Constraints, DenseMatrix, ModelParams},
    loss::{HammingLoss, Loss},
    model::{ResultSet, StructuredModel},
    weights::Weights,
};

/// Errors reported by the model and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed argument: out of range state, length mismatch, bad weight vector.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Raised by [`StructuredModel::check_training_setup`] for the first bad example.
    #[error("inconsistent training data at example {index}: {reason}")]
    InconsistentTrainingData { index: usize, reason: String },
    /// A sequence with no time steps.
    #[error("degenerate sequence: {0}")]
    DegenerateSequence(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
