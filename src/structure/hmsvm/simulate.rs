use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    dataset::{Dataset, Observation},
    Error, Result,
};

use super::labels::HmsvmLabels;

/// Shape of a synthetic two-state data set.
#[derive(Debug, Clone)]
pub struct SimulationParams {
    pub num_examples: usize,
    /// Steps per sequence.
    pub length: usize,
    pub num_features: usize,
    /// Trailing features that carry no information about the state.
    pub num_noise_features: usize,
    /// Inclusive range of the length of a run in one state.
    pub block_len: (usize, usize),
    /// Standard deviation of the additive noise.
    pub noise: f64,
    pub seed: u64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            num_examples: 100,
            length: 250,
            num_features: 10,
            num_noise_features: 2,
            block_len: (10, 50),
            noise: 0.5,
            seed: 17,
        }
    }
}

/* Approximately standard normal: Irwin-Hall with 12 terms. */
fn standard_noise(rng: &mut StdRng) -> f64 {
    (0..12).map(|_| rng.random::<f64>()).sum::<f64>() - 6.0
}

/// Generates sequences over two states that alternate in runs of random
/// length, starting in state 0. The informative features of a step are the
/// state plus noise, the noise features are pure noise.
pub fn simulate_two_state_model(params: &SimulationParams) -> Result<(Dataset, HmsvmLabels)> {
    let (min_block, max_block) = params.block_len;
    if params.num_features == 0 || params.num_noise_features > params.num_features {
        return Err(Error::InvalidInput(format!(
            "invalid feature counts ({} features, {} noise features)",
            params.num_features, params.num_noise_features
        )));
    }
    if params.length == 0 || min_block == 0 || min_block > max_block {
        return Err(Error::InvalidInput(format!(
            "invalid sequence shape (length: {}, block length: {min_block}..={max_block})",
            params.length
        )));
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let informative = params.num_features - params.num_noise_features;
    let mut ds = Dataset::new(params.num_features);
    let mut labels = HmsvmLabels::with_capacity(params.num_examples, 2)?;
    let mut row = vec![0.0; params.num_features];
    for _ in 0..params.num_examples {
        let mut path = Vec::with_capacity(params.length);
        let mut state = 0;
        while path.len() < params.length {
            let run = rng.random_range(min_block..=max_block).min(params.length - path.len());
            path.extend(std::iter::repeat(state).take(run));
            state = 1 - state;
        }

        let mut obs = Observation::new(params.num_features);
        for &s in &path {
            for (f, x) in row.iter_mut().enumerate() {
                let signal = if f < informative { s as f64 } else { 0.0 };
                *x = signal + params.noise * standard_noise(&mut rng);
            }
            obs.push(&row)?;
        }
        ds.push(obs)?;
        labels.add_label(path)?;
    }
    log::info!(
        "simulated two-state model (N: {}, T: {}, D: {}, noise features: {})",
        params.num_examples,
        params.length,
        params.num_features,
        params.num_noise_features
    );
    Ok((ds, labels))
}
