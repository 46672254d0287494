use std::ops::Range;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

bitflags! {
    /// Blocks of `w` whose entries are bounded below by zero.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ConstrainedBlocks: u8 {
        const TRANSMISSION = 0x01;
        const EMISSION = 0x02;
        const START = 0x04;
        const END = 0x08;
        const BOUNDARY = Self::START.bits() | Self::END.bits();
    }
}

impl Default for ConstrainedBlocks {
    fn default() -> Self {
        Self::TRANSMISSION | Self::BOUNDARY
    }
}

/// Row-major dense matrix.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DenseMatrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl DenseMatrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn scaled_identity(n: usize, c: f64) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.data[n * i + i] = c;
        }
        m
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[self.cols * i + j]
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[self.cols * i..self.cols * (i + 1)]
    }

    fn push_row(&mut self, row: &[f64]) {
        debug_assert_eq!(row.len(), self.cols);
        self.data.extend_from_slice(row);
        self.rows += 1;
    }
}

/// Feasible region and regulariser handed to the QP solver:
/// `A·w <= a`, `B·w == b`, `lb <= w <= ub`, objective term `½ wᵀCw`.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraints {
    pub a: DenseMatrix,
    pub a_vec: Vec<f64>,
    pub b: DenseMatrix,
    pub b_vec: Vec<f64>,
    pub lb: Vec<f64>,
    pub ub: Vec<f64>,
    pub c: DenseMatrix,
}

impl Constraints {
    pub fn dim(&self) -> usize {
        self.lb.len()
    }

    /// Whether `w` satisfies every constraint up to `eps`.
    pub fn is_feasible(&self, w: &[f64], eps: f64) -> bool {
        if w.len() != self.dim() {
            return false;
        }
        let dot = |row: &[f64]| row.iter().zip(w).map(|(x, y)| x * y).sum::<f64>();
        let boxed = w
            .iter()
            .zip(self.lb.iter().zip(&self.ub))
            .all(|(&x, (&lo, &hi))| x >= lo - eps && x <= hi + eps);
        let ineq = (0..self.a.rows).all(|i| dot(self.a.row(i)) <= self.a_vec[i] + eps);
        let eq = (0..self.b.rows).all(|i| (dot(self.b.row(i)) - self.b_vec[i]).abs() <= eps);
        boxed && ineq && eq
    }
}

/// Accumulates bounds over a `dim`-dimensional weight vector.
#[derive(Debug)]
pub struct ConstraintBuilder {
    dim: usize,
    lb: Vec<f64>,
    ub: Vec<f64>,
    c: f64,
    explicit_inequalities: bool,
}

impl ConstraintBuilder {
    pub fn new(dim: usize, params: &ModelParams) -> Self {
        Self {
            dim,
            lb: vec![f64::NEG_INFINITY; dim],
            ub: vec![f64::INFINITY; dim],
            c: params.c,
            explicit_inequalities: params.explicit_inequalities,
        }
    }

    pub fn nonnegative(mut self, block: Range<usize>) -> Self {
        for j in block {
            self.lb[j] = 0.0;
        }
        self
    }

    pub fn build(self) -> Constraints {
        let mut a = DenseMatrix::zeros(0, self.dim);
        let mut a_vec = Vec::new();
        if self.explicit_inequalities {
            /* -w_j <= -lb_j for every finite lower bound. */
            let mut row = vec![0.0; self.dim];
            for (j, &lo) in self.lb.iter().enumerate() {
                if lo.is_finite() {
                    row[j] = -1.0;
                    a.push_row(&row);
                    a_vec.push(-lo);
                    row[j] = 0.0;
                }
            }
        }
        Constraints {
            a,
            a_vec,
            b: DenseMatrix::zeros(0, self.dim),
            b_vec: Vec::new(),
            lb: self.lb,
            ub: self.ub,
            c: DenseMatrix::scaled_identity(self.dim, self.c),
        }
    }
}

/// Tunable settings of the model, see [`ModelParams::set`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    /// Blocks of `w` constrained to be non-negative.
    pub constrained: ConstrainedBlocks,
    /// Diagonal of the regularisation matrix C.
    pub c: f64,
    /// Also emit the non-negativity bounds as rows of A.
    pub explicit_inequalities: bool,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            constrained: ConstrainedBlocks::default(),
            c: 1.0,
            explicit_inequalities: false,
        }
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(Error::InvalidInput(format!("invalid {name} value: {value}"))),
    }
}

impl ModelParams {
    /// Sets a parameter by name, as given on the command line with `-p name=value`.
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        let block = match name {
            "constraints.transmission" => ConstrainedBlocks::TRANSMISSION,
            "constraints.emission" => ConstrainedBlocks::EMISSION,
            "constraints.start" => ConstrainedBlocks::START,
            "constraints.end" => ConstrainedBlocks::END,
            "constraints.explicit" => {
                self.explicit_inequalities = parse_flag(name, value)?;
                return Ok(());
            }
            "c" => {
                let c = value
                    .parse::<f64>()
                    .map_err(|_| Error::InvalidInput(format!("invalid c value: {value}")))?;
                if !(c > 0.0 && c.is_finite()) {
                    return Err(Error::InvalidInput(format!("c must be positive: {value}")));
                }
                self.c = c;
                return Ok(());
            }
            _ => return Err(Error::InvalidInput(format!("unknown parameter: {name}"))),
        };
        self.constrained.set(block, parse_flag(name, value)?);
        Ok(())
    }

    /// Applies a list of `name=value` strings.
    pub fn set_all<S: AsRef<str>>(&mut self, parameters: &[S]) -> Result<()> {
        for s in parameters {
            let s = s.as_ref();
            let (name, value) = s
                .split_once('=')
                .ok_or_else(|| Error::InvalidInput(format!("expected name=value, got {s}")))?;
            self.set(name.trim(), value.trim())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_bounds() {
        let params = ModelParams::default();
        let cons = ConstraintBuilder::new(5, &params).nonnegative(1..3).build();
        assert_eq!(cons.lb, vec![f64::NEG_INFINITY, 0.0, 0.0, f64::NEG_INFINITY, f64::NEG_INFINITY]);
        assert!(cons.ub.iter().all(|x| *x == f64::INFINITY));
        assert_eq!(cons.a.rows, 0);
        assert_eq!(cons.b.rows, 0);
        assert_eq!(cons.c.get(4, 4), 1.0);
        assert_eq!(cons.c.get(4, 3), 0.0);
    }

    #[test]
    fn explicit_inequalities() {
        let params = ModelParams {
            explicit_inequalities: true,
            c: 0.5,
            ..Default::default()
        };
        let cons = ConstraintBuilder::new(4, &params).nonnegative(2..4).build();
        assert_eq!(cons.a.rows, 2);
        assert_eq!(cons.a.row(0), &[0.0, 0.0, -1.0, 0.0]);
        assert_eq!(cons.a.row(1), &[0.0, 0.0, 0.0, -1.0]);
        assert_eq!(cons.a_vec, vec![0.0, 0.0]);
        assert_eq!(cons.c.get(0, 0), 0.5);
        assert!(cons.is_feasible(&[-3.0, 7.0, 0.0, 1.0], 1e-12));
        assert!(!cons.is_feasible(&[-3.0, 7.0, -0.1, 1.0], 1e-12));
    }

    #[test]
    fn set_params() {
        let mut params = ModelParams::default();
        params
            .set_all(&["constraints.transmission=0", "constraints.emission=1", "c=2.5"])
            .unwrap();
        assert_eq!(params.constrained, ConstrainedBlocks::EMISSION | ConstrainedBlocks::BOUNDARY);
        assert_eq!(params.c, 2.5);
        assert!(matches!(params.set("c", "-1"), Err(Error::InvalidInput(..))));
        assert!(matches!(params.set("max_iterations", "10"), Err(Error::InvalidInput(..))));
        assert!(matches!(params.set_all(&["c"]), Err(Error::InvalidInput(..))));
    }

    #[test]
    fn params_json() {
        let params = ModelParams::default();
        let s = serde_json::to_string(&params).unwrap();
        let back: ModelParams = serde_json::from_str(&s).unwrap();
        assert_eq!(back, params);
    }
}
