use crate::{Error, Result};

/// Structural loss Δ between two state paths.
///
/// `position` must decompose `delta` over time steps, i.e.
/// `delta(truth, y) == Σ_t position(truth, t, y[t])`, so that a decoder can
/// fold it into its recurrence.
pub trait Loss {
    fn delta(&self, y1: &[usize], y2: &[usize]) -> Result<f64>;
    fn position(&self, truth: &[usize], t: usize, state: usize) -> f64;
}

/// Number of positions at which two equal-length paths differ.
#[derive(Debug, Default, Clone, Copy)]
pub struct HammingLoss;

impl Loss for HammingLoss {
    fn delta(&self, y1: &[usize], y2: &[usize]) -> Result<f64> {
        if y1.len() != y2.len() {
            return Err(Error::InvalidInput(format!(
                "hamming loss of sequences with different lengths ({} != {})",
                y1.len(),
                y2.len()
            )));
        }
        Ok(y1.iter().zip(y2).filter(|(a, b)| a != b).count() as f64)
    }

    #[inline]
    fn position(&self, truth: &[usize], t: usize, state: usize) -> f64 {
        if truth[t] != state {
            1.0
        } else {
            0.0
        }
    }
}
