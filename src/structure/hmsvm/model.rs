use std::time::Instant;

use crate::{
    dataset::{Dataset, Observation},
    structure::{
        constraints::{ConstrainedBlocks, ConstraintBuilder, Constraints, ModelParams},
        loss::{HammingLoss, Loss},
        model::{ResultSet, StructuredModel},
    },
    Error, Result,
};

use super::{
    context::ViterbiContext,
    feature::{FeatureMap, Layout},
    labels::{HmsvmLabels, StateSequence},
};

/// Hidden Markov structured-output model over a labelled training set.
///
/// `w` is laid out as described by [`Layout`]. The model also owns two fixed
/// boundary distributions, `p` over start states and `q` over end states,
/// which are added to the learned start and end weights when decoding. They
/// default to zero, in which case the decoder score equals `dot(w, Ψ)`.
/// A `-inf` entry forbids a state at that end of the sequence.
#[derive(Debug)]
pub struct HmsvmModel {
    features: Dataset,
    labels: HmsvmLabels,
    feature_map: FeatureMap,
    params: ModelParams,
    p: Vec<f64>,
    q: Vec<f64>,
}

impl HmsvmModel {
    pub fn new(features: Dataset, labels: HmsvmLabels) -> Result<Self> {
        Self::with_params(features, labels, ModelParams::default())
    }

    pub fn with_params(features: Dataset, labels: HmsvmLabels, params: ModelParams) -> Result<Self> {
        let S = labels.num_states();
        Self::with_num_states(features, labels, S, params)
    }

    /// Builds a model over `num_states` states regardless of how many states the
    /// labels were declared with, e.g. to apply weights learned elsewhere.
    /// Labels using a state beyond that are reported by
    /// [`StructuredModel::check_training_setup`].
    pub fn with_num_states(
        features: Dataset,
        labels: HmsvmLabels,
        num_states: usize,
        params: ModelParams,
    ) -> Result<Self> {
        let S = num_states;
        let D = features.num_features;
        if S == 0 || D == 0 {
            return Err(Error::InvalidInput(format!(
                "number of states and features must be positive (S: {S}, D: {D})"
            )));
        }
        let layout = Layout::new(S, D);
        log::info!(
            "hmsvm model (S: {S}, D: {D}, N: {}, dim: {})",
            labels.num_labels(),
            layout.dim()
        );
        Ok(Self {
            features,
            labels,
            feature_map: FeatureMap::new(layout),
            params,
            p: vec![0.0; S],
            q: vec![0.0; S],
        })
    }

    /// Replaces the start (`p`) and end (`q`) distributions, each of length S.
    pub fn set_boundary_distributions(&mut self, p: Vec<f64>, q: Vec<f64>) -> Result<()> {
        let S = self.num_states();
        if p.len() != S || q.len() != S {
            return Err(Error::InvalidInput(format!(
                "boundary distributions must have {S} entries (got {} and {})",
                p.len(),
                q.len()
            )));
        }
        if p.iter().chain(&q).any(|x| x.is_nan() || *x == f64::INFINITY) {
            return Err(Error::InvalidInput(
                "boundary distributions must be finite or -inf".into(),
            ));
        }
        self.p = p;
        self.q = q;
        Ok(())
    }

    pub fn start_distribution(&self) -> &[f64] {
        &self.p
    }

    pub fn end_distribution(&self) -> &[f64] {
        &self.q
    }

    pub fn layout(&self) -> &Layout {
        self.feature_map.layout()
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    pub fn num_states(&self) -> usize {
        self.layout().num_states
    }

    pub fn num_features(&self) -> usize {
        self.layout().num_features
    }

    pub fn features(&self) -> &Dataset {
        &self.features
    }

    pub fn labels(&self) -> &HmsvmLabels {
        &self.labels
    }

    fn observation(&self, feat_idx: usize) -> Result<&Observation> {
        self.features.get(feat_idx).ok_or_else(|| {
            Error::InvalidInput(format!(
                "feature index {feat_idx} out of range (N: {})",
                self.features.len()
            ))
        })
    }

    /// Decodes `obs` under `w`, optionally augmented by the loss against
    /// `truth`. Returns the path and its score with the loss excluded.
    pub fn decode(
        &self,
        w: &[f64],
        obs: &Observation,
        truth: Option<&StateSequence>,
    ) -> Result<(StateSequence, f64)> {
        let layout = self.layout();
        layout.check_weights(w)?;
        if obs.is_empty() {
            return Err(Error::DegenerateSequence("observation has no steps".into()));
        }
        if obs.num_features() != layout.num_features {
            return Err(Error::InvalidInput(format!(
                "observation has {} features per step, expected {}",
                obs.num_features(),
                layout.num_features
            )));
        }
        if let Some(y) = truth {
            layout.check_pair(obs, y)?;
        }

        let mut ctx = ViterbiContext::new(layout.num_states, obs.len());
        ctx.set_weights(layout, w, &self.p, &self.q);
        ctx.set_observation(layout, w, obs);

        let loss: &dyn Loss = &HammingLoss;
        let mut path = vec![0; obs.len()];
        let augmented = ctx.viterbi(&mut path, truth.map(|y| (loss, y.states())));
        let score = ctx.score(&path);
        log::debug!("viterbi (T: {}): augmented {augmented}, score {score}", obs.len());
        Ok((StateSequence::new(path), score))
    }
}

impl StructuredModel for HmsvmModel {
    type Label = StateSequence;

    fn get_dim(&self) -> usize {
        self.layout().dim()
    }

    fn get_joint_feature_vector(&self, feat_idx: usize, y: &StateSequence) -> Result<Vec<f64>> {
        self.feature_map.build(self.observation(feat_idx)?, y)
    }

    fn argmax(&self, w: &[f64], feat_idx: usize, training: bool) -> Result<ResultSet<StateSequence>> {
        let obs = self.observation(feat_idx)?;
        let truth = if training {
            let y = self.labels.get_label(feat_idx).ok_or_else(|| {
                Error::InvalidInput(format!(
                    "label index {feat_idx} out of range (N: {})",
                    self.labels.num_labels()
                ))
            })?;
            Some(y)
        } else {
            None
        };

        let (argmax, score) = self.decode(w, obs, truth)?;
        let psi_pred = self.feature_map.build(obs, &argmax)?;
        let (psi_truth, delta) = match truth {
            Some(y) => (
                Some(self.feature_map.build(obs, y)?),
                self.delta_loss(y, &argmax)?,
            ),
            None => (None, 0.0),
        };
        Ok(ResultSet {
            argmax,
            psi_pred,
            psi_truth,
            score,
            delta,
        })
    }

    fn delta_loss(&self, y1: &StateSequence, y2: &StateSequence) -> Result<f64> {
        HammingLoss.delta(y1, y2)
    }

    fn init_opt(&self) -> Constraints {
        let layout = self.layout();
        let mut builder = ConstraintBuilder::new(layout.dim(), &self.params);
        for (block, range) in [
            (ConstrainedBlocks::TRANSMISSION, layout.transmission()),
            (ConstrainedBlocks::EMISSION, layout.emission()),
            (ConstrainedBlocks::START, layout.start()),
            (ConstrainedBlocks::END, layout.end()),
        ] {
            if self.params.constrained.contains(block) {
                builder = builder.nonnegative(range);
            }
        }
        builder.build()
    }

    fn check_training_setup(&self) -> Result<()> {
        let begin = Instant::now();
        let S = self.num_states();
        let D = self.num_features();
        if S == 0 || D == 0 {
            return Err(Error::InvalidInput(format!(
                "number of states and features must be positive (S: {S}, D: {D})"
            )));
        }
        if self.labels.num_labels() != self.features.len() {
            return Err(Error::InvalidInput(format!(
                "{} labels for {} observations",
                self.labels.num_labels(),
                self.features.len()
            )));
        }
        for (i, (obs, y)) in self.features.seqs.iter().zip(self.labels.iter()).enumerate() {
            let reason = match self.layout().check_pair(obs, y) {
                Err(Error::InvalidInput(reason)) | Err(Error::DegenerateSequence(reason)) => Some(reason),
                Err(e) => Some(e.to_string()),
                Ok(()) if self.p[y[0]] == f64::NEG_INFINITY => {
                    Some(format!("start state {} is forbidden", y[0]))
                }
                Ok(()) if self.q[y[y.len() - 1]] == f64::NEG_INFINITY => {
                    Some(format!("end state {} is forbidden", y[y.len() - 1]))
                }
                Ok(()) => None,
            };
            if let Some(reason) = reason {
                log::warn!("training data rejected at example {i}: {reason}");
                return Err(Error::InconsistentTrainingData { index: i, reason });
            }
        }
        log::info!(
            "training setup ok ({} sequences, {} items, time cost: {:?})",
            self.features.len(),
            self.features.total_items(),
            begin.elapsed()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn model() -> HmsvmModel {
        let mut ds = Dataset::new(1);
        ds.push(Observation::from_rows(&[vec![1.0], vec![-1.0], vec![2.0]]).unwrap()).unwrap();
        ds.push(Observation::from_rows(&[vec![0.5]]).unwrap()).unwrap();
        let mut labels = HmsvmLabels::new(2).unwrap();
        labels.add_label(vec![0, 1, 0]).unwrap();
        labels.add_label(vec![1]).unwrap();
        HmsvmModel::new(ds, labels).unwrap()
    }

    #[test]
    fn dim() {
        let model = model();
        assert_eq!(model.get_dim(), 2 * 2 + 2 * 1 + 2 * 2);
        assert_eq!(model.num_states(), 2);
        assert_eq!(model.num_features(), 1);
    }

    #[test]
    fn no_features() {
        let labels = HmsvmLabels::new(2).unwrap();
        let ret = HmsvmModel::new(Dataset::new(0), labels);
        assert!(matches!(ret, Err(Error::InvalidInput(..))));
    }

    #[test]
    fn setup_ok() {
        model().check_training_setup().unwrap();
    }

    #[test]
    fn setup_length_mismatch() {
        let mut ds = Dataset::new(1);
        ds.push(Observation::from_rows(&[vec![1.0], vec![2.0]]).unwrap()).unwrap();
        ds.push(Observation::from_rows(&[vec![1.0]]).unwrap()).unwrap();
        let mut labels = HmsvmLabels::new(2).unwrap();
        labels.add_label(vec![0, 1]).unwrap();
        labels.add_label(vec![0, 0]).unwrap();
        let model = HmsvmModel::new(ds, labels).unwrap();
        match model.check_training_setup() {
            Err(Error::InconsistentTrainingData { index, .. }) => assert_eq!(index, 1),
            r => panic!("unexpected result: {r:?}"),
        }
    }

    #[test]
    fn setup_state_out_of_range() {
        let mut ds = Dataset::new(1);
        ds.push(Observation::from_rows(&[vec![1.0]]).unwrap()).unwrap();
        ds.push(Observation::from_rows(&[vec![1.0], vec![0.0]]).unwrap()).unwrap();
        let mut labels = HmsvmLabels::new(3).unwrap();
        labels.add_label(vec![1]).unwrap();
        labels.add_label(vec![0, 2]).unwrap();
        let model = HmsvmModel::with_num_states(ds, labels, 2, ModelParams::default()).unwrap();
        assert_eq!(model.get_dim(), 4 + 2 + 4);
        match model.check_training_setup() {
            Err(Error::InconsistentTrainingData { index, reason }) => {
                assert_eq!(index, 1);
                assert!(reason.contains("state 2"), "{reason}");
            }
            r => panic!("unexpected result: {r:?}"),
        }
    }

    #[test]
    fn setup_empty_sequence() {
        let mut ds = Dataset::new(1);
        ds.push(Observation::new(1)).unwrap();
        let mut labels = HmsvmLabels::new(2).unwrap();
        labels.add_label(Vec::new()).unwrap();
        let model = HmsvmModel::new(ds, labels).unwrap();
        assert!(matches!(
            model.check_training_setup(),
            Err(Error::InconsistentTrainingData { index: 0, .. })
        ));
    }

    #[test]
    fn setup_forbidden_boundary() {
        let mut model = model();
        model
            .set_boundary_distributions(vec![0.0, f64::NEG_INFINITY], vec![0.0, 0.0])
            .unwrap();
        match model.check_training_setup() {
            Err(Error::InconsistentTrainingData { index, reason }) => {
                assert_eq!(index, 1);
                assert!(reason.contains("start state 1"), "{reason}");
            }
            r => panic!("unexpected result: {r:?}"),
        }
    }

    #[test]
    fn setup_forbidden_end() {
        let mut model = model();
        model
            .set_boundary_distributions(vec![0.0, 0.0], vec![f64::NEG_INFINITY, 0.0])
            .unwrap();
        match model.check_training_setup() {
            Err(Error::InconsistentTrainingData { index, reason }) => {
                assert_eq!(index, 0);
                assert!(reason.contains("end state 0"), "{reason}");
            }
            r => panic!("unexpected result: {r:?}"),
        }
    }

    #[test]
    fn setup_label_count_mismatch() {
        let mut ds = Dataset::new(1);
        ds.push(Observation::from_rows(&[vec![1.0]]).unwrap()).unwrap();
        ds.push(Observation::from_rows(&[vec![2.0]]).unwrap()).unwrap();
        let mut labels = HmsvmLabels::new(2).unwrap();
        labels.add_label(vec![0]).unwrap();
        let model = HmsvmModel::new(ds, labels).unwrap();
        assert!(matches!(model.check_training_setup(), Err(Error::InvalidInput(..))));
    }

    #[test]
    fn boundary_distribution_length() {
        let mut model = model();
        let ret = model.set_boundary_distributions(vec![0.0], vec![0.0, 0.0]);
        assert!(matches!(ret, Err(Error::InvalidInput(..))));
        let ret = model.set_boundary_distributions(vec![0.0, f64::NAN], vec![0.0, 0.0]);
        assert!(matches!(ret, Err(Error::InvalidInput(..))));
    }

    #[test]
    fn argmax_result_set() {
        let model = model();
        let w: Vec<f64> = (0..model.get_dim()).map(|i| 0.1 * i as f64 - 0.3).collect();
        let res = model.argmax(&w, 0, true).unwrap();
        let truth = model.labels().get_label(0).unwrap();
        assert_eq!(res.psi_truth, Some(model.get_joint_feature_vector(0, truth).unwrap()));
        assert_eq!(res.psi_pred, model.get_joint_feature_vector(0, &res.argmax).unwrap());
        assert_eq!(res.delta, model.delta_loss(truth, &res.argmax).unwrap());
        let dot: f64 = w.iter().zip(&res.psi_pred).map(|(a, b)| a * b).sum();
        assert_relative_eq!(res.score, dot, epsilon = 1e-12);

        let res = model.argmax(&w, 1, false).unwrap();
        assert!(res.psi_truth.is_none());
        assert_eq!(res.delta, 0.0);
    }

    #[test]
    fn argmax_invalid() {
        let model = model();
        let w = vec![0.0; model.get_dim()];
        assert!(matches!(model.argmax(&w[1..], 0, false), Err(Error::InvalidInput(..))));
        assert!(matches!(model.argmax(&w, 2, false), Err(Error::InvalidInput(..))));
    }

    #[test]
    fn init_opt_default() {
        let model = model();
        let layout = *model.layout();
        let cons = model.init_opt();
        assert_eq!(cons.dim(), model.get_dim());
        assert!(layout.transmission().all(|j| cons.lb[j] == 0.0));
        assert!(layout.emission().all(|j| cons.lb[j] == f64::NEG_INFINITY));
        assert!(layout.start().chain(layout.end()).all(|j| cons.lb[j] == 0.0));
        assert_eq!(cons.c.rows, model.get_dim());
    }

    #[test]
    fn init_opt_params() {
        let mut ds = Dataset::new(1);
        ds.push(Observation::from_rows(&[vec![1.0]]).unwrap()).unwrap();
        let mut labels = HmsvmLabels::new(2).unwrap();
        labels.add_label(vec![0]).unwrap();
        let mut params = ModelParams::default();
        params
            .set_all(&["constraints.transmission=0", "constraints.explicit=1"])
            .unwrap();
        let model = HmsvmModel::with_params(ds, labels, params).unwrap();
        let layout = *model.layout();
        let cons = model.init_opt();
        assert!(layout.transmission().all(|j| cons.lb[j] == f64::NEG_INFINITY));
        assert_eq!(cons.a.rows, 4);
        assert!(cons.is_feasible(&vec![0.0; model.get_dim()], 0.0));
    }
}
