use crate::Result;

use super::constraints::Constraints;

/// Output of [`StructuredModel::argmax`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet<Y> {
    /// The highest scoring structure.
    pub argmax: Y,
    /// Ψ(x, argmax).
    pub psi_pred: Vec<f64>,
    /// Ψ(x, y_true), only for loss-augmented calls.
    pub psi_truth: Option<Vec<f64>>,
    /// Model score of `argmax`, loss term excluded.
    pub score: f64,
    /// Δ(y_true, argmax), zero unless loss-augmented.
    pub delta: f64,
}

impl<Y> ResultSet<Y> {
    /// The objective maximised by loss-augmented inference.
    #[inline]
    pub fn augmented_score(&self) -> f64 {
        self.score + self.delta
    }
}

/// What a structured SVM solver needs from a model.
///
/// Implementations answer every query through `&self` so examples can be
/// processed concurrently once the model is built.
pub trait StructuredModel {
    type Label;

    /// Dimension of the joint feature space, i.e. of `w`.
    fn get_dim(&self) -> usize;

    /// Ψ(x_i, y).
    fn get_joint_feature_vector(&self, feat_idx: usize, y: &Self::Label) -> Result<Vec<f64>>;

    /// Best structure for example `feat_idx` under `w`; with `training` the
    /// score is augmented by the loss against the example's true label.
    fn argmax(&self, w: &[f64], feat_idx: usize, training: bool) -> Result<ResultSet<Self::Label>>;

    /// Δ(y1, y2).
    fn delta_loss(&self, y1: &Self::Label, y2: &Self::Label) -> Result<f64>;

    /// Constraints and regulariser of the QP, computed once before optimisation.
    fn init_opt(&self) -> Constraints;

    /// Validates the training data, reporting the first offending example.
    fn check_training_setup(&self) -> Result<()>;
}
