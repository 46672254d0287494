use std::ops::Range;

use crate::{dataset::Observation, Error, Result};

/// Position of each block inside `w` and Ψ:
/// `[transmission S·S | emission S·D | start S | end S]`.
///
/// The transmission block is row-major with the previous state as the row,
/// the emission block holds one D-slice per state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub num_states: usize,
    pub num_features: usize,
}

impl Layout {
    pub fn new(num_states: usize, num_features: usize) -> Self {
        Self {
            num_states,
            num_features,
        }
    }

    #[inline]
    pub fn dim(&self) -> usize {
        let (S, D) = (self.num_states, self.num_features);
        S * S + S * D + 2 * S
    }

    pub fn transmission(&self) -> Range<usize> {
        0..self.num_states * self.num_states
    }

    pub fn emission(&self) -> Range<usize> {
        let begin = self.transmission().end;
        begin..begin + self.num_states * self.num_features
    }

    pub fn start(&self) -> Range<usize> {
        let begin = self.emission().end;
        begin..begin + self.num_states
    }

    pub fn end(&self) -> Range<usize> {
        let begin = self.start().end;
        begin..begin + self.num_states
    }

    /// Index of the transition `prev -> curr`.
    #[inline]
    pub fn trans_index(&self, prev: usize, curr: usize) -> usize {
        self.num_states * prev + curr
    }

    /// Emission slice of `state`.
    #[inline]
    pub fn emission_block(&self, state: usize) -> Range<usize> {
        let begin = self.num_states * self.num_states + self.num_features * state;
        begin..begin + self.num_features
    }

    pub fn check_weights(&self, w: &[f64]) -> Result<()> {
        if w.len() != self.dim() {
            return Err(Error::InvalidInput(format!(
                "weight vector has {} entries, expected {}",
                w.len(),
                self.dim()
            )));
        }
        Ok(())
    }

    /// Checks that `obs` and `label` can be combined under this layout.
    pub fn check_pair(&self, obs: &Observation, label: &[usize]) -> Result<()> {
        if label.is_empty() {
            return Err(Error::DegenerateSequence("label sequence has no steps".into()));
        }
        if obs.num_features() != self.num_features {
            return Err(Error::InvalidInput(format!(
                "observation has {} features per step, expected {}",
                obs.num_features(),
                self.num_features
            )));
        }
        if obs.len() != label.len() {
            return Err(Error::InvalidInput(format!(
                "observation has {} steps, label has {}",
                obs.len(),
                label.len()
            )));
        }
        if let Some((t, s)) = label.iter().enumerate().find(|(_, &s)| s >= self.num_states) {
            return Err(Error::InvalidInput(format!(
                "state {s} at step {t} is out of range [0, {})",
                self.num_states
            )));
        }
        Ok(())
    }

    /// `dot(w, Ψ(obs, label))` without building Ψ.
    pub fn score(&self, w: &[f64], obs: &Observation, label: &[usize]) -> Result<f64> {
        self.check_weights(w)?;
        self.check_pair(obs, label)?;
        let T = label.len();
        let mut r = w[self.start().start + label[0]] + w[self.end().start + label[T - 1]];
        for t in 0..T {
            if t > 0 {
                r += w[self.trans_index(label[t - 1], label[t])];
            }
            r += dot(&w[self.emission_block(label[t])], obs.row(t));
        }
        Ok(r)
    }
}

#[inline]
pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Builds the joint feature vector Ψ(x, y).
#[derive(Debug, Clone, Copy)]
pub struct FeatureMap {
    layout: Layout,
}

impl FeatureMap {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Ψ(obs, label): transition counts, per-state sums of the observed
    /// features and one-hot start and end states.
    pub fn build(&self, obs: &Observation, label: &[usize]) -> Result<Vec<f64>> {
        self.layout.check_pair(obs, label)?;
        let mut psi = vec![0.0; self.layout.dim()];
        for t in 0..label.len() {
            self.add_transmission(&mut psi, label, t);
            self.add_emission(&mut psi, obs.row(t), label[t]);
        }
        psi[self.layout.start().start + label[0]] += 1.0;
        psi[self.layout.end().start + label[label.len() - 1]] += 1.0;
        Ok(psi)
    }

    /* Transition from y[t-1] to y[t]; nothing for the first step. */
    #[inline]
    fn add_transmission(&self, psi: &mut [f64], label: &[usize], t: usize) {
        if t > 0 {
            psi[self.layout.trans_index(label[t - 1], label[t])] += 1.0;
        }
    }

    #[inline]
    fn add_emission(&self, psi: &mut [f64], x: &[f64], state: usize) {
        for (p, v) in psi[self.layout.emission_block(state)].iter_mut().zip(x) {
            *p += v;
        }
    }
}
