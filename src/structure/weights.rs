use std::{fs::File, io::BufWriter, path::Path};

use serde::{Deserialize, Serialize};

use crate::{quark::Quark, Error, Result};

use super::{constraints::ModelParams, hmsvm::Layout};

/// A weight vector together with the shape it was learned for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub num_states: usize,
    pub num_features: usize,
    /// State names, indexed by state id.
    #[serde(default)]
    pub states: Quark,
    #[serde(default)]
    pub params: ModelParams,
    pub w: Vec<f64>,
}

impl Weights {
    pub fn dim(num_states: usize, num_features: usize) -> usize {
        Layout::new(num_states, num_features).dim()
    }

    pub fn zeros(num_states: usize, num_features: usize) -> Self {
        Self {
            num_states,
            num_features,
            states: Quark::numbered(num_states),
            params: ModelParams::default(),
            w: vec![0.0; Self::dim(num_states, num_features)],
        }
    }

    fn validate(&self) -> Result<()> {
        let dim = Self::dim(self.num_states, self.num_features);
        if self.w.len() != dim {
            return Err(Error::InvalidInput(format!(
                "weight vector has {} entries, expected {dim} for S = {}, D = {}",
                self.w.len(),
                self.num_states,
                self.num_features
            )));
        }
        Ok(())
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = File::open(path)?;
        let this: Self = serde_json::from_reader(f)?;
        this.validate()?;
        Ok(this)
    }

    pub fn to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.validate()?;
        let f = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(f, self)?;
        Ok(())
    }
}
