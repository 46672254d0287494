//! Hidden Markov SVM: a linear-chain model whose joint feature vector holds
//! state transition counts, per-state sums of the observed features and the
//! start and end states of the sequence.

mod context;
pub mod feature;
pub mod labels;
pub mod model;
pub mod simulate;

pub use feature::{FeatureMap, Layout};
pub use labels::{HmsvmLabels, StateSequence};
pub use model::HmsvmModel;
