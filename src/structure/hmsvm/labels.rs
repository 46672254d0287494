use std::ops::Deref;

use crate::{Error, Result};

/// One structured output: the hidden state of every time step.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateSequence {
    states: Vec<usize>,
}

impl StateSequence {
    pub fn new(states: Vec<usize>) -> Self {
        Self { states }
    }

    pub fn states(&self) -> &[usize] {
        &self.states
    }
}

impl Deref for StateSequence {
    type Target = [usize];

    fn deref(&self) -> &Self::Target {
        &self.states
    }
}

impl From<Vec<usize>> for StateSequence {
    fn from(states: Vec<usize>) -> Self {
        Self::new(states)
    }
}

/// Labels of a training set, index `i` belongs to example `i`.
#[derive(Debug, Clone, Default)]
pub struct HmsvmLabels {
    labels: Vec<StateSequence>,
    num_states: usize,
}

impl HmsvmLabels {
    pub fn new(num_states: usize) -> Result<Self> {
        Self::with_capacity(0, num_states)
    }

    pub fn with_capacity(num_labels: usize, num_states: usize) -> Result<Self> {
        if num_states == 0 {
            return Err(Error::InvalidInput("number of states must be positive".into()));
        }
        Ok(Self {
            labels: Vec::with_capacity(num_labels),
            num_states,
        })
    }

    /// Appends a label, all of whose states must be below `num_states`.
    pub fn add_label(&mut self, label: Vec<usize>) -> Result<()> {
        if let Some(&s) = label.iter().find(|&&s| s >= self.num_states) {
            return Err(Error::InvalidInput(format!(
                "label #{}: state {s} is out of range [0, {})",
                self.labels.len(),
                self.num_states
            )));
        }
        self.labels.push(StateSequence::new(label));
        Ok(())
    }

    pub fn get_label(&self, i: usize) -> Option<&StateSequence> {
        self.labels.get(i)
    }

    pub fn num_labels(&self) -> usize {
        self.labels.len()
    }

    pub fn num_states(&self) -> usize {
        self.num_states
    }

    pub fn iter(&self) -> impl Iterator<Item = &StateSequence> {
        self.labels.iter()
    }

    /// Every state of every label, in example order.
    pub fn to_double_vector(&self) -> Vec<f64> {
        self.labels
            .iter()
            .flat_map(|y| y.iter().map(|&s| s as f64))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_get() {
        let mut labels = HmsvmLabels::new(3).unwrap();
        labels.add_label(vec![0, 1, 2]).unwrap();
        labels.add_label(vec![2, 2]).unwrap();
        assert_eq!(labels.num_labels(), 2);
        assert_eq!(labels.num_states(), 3);
        assert_eq!(labels.get_label(1).unwrap().states(), &[2, 2]);
        assert!(labels.get_label(2).is_none());
        assert_eq!(labels.to_double_vector(), vec![0.0, 1.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn out_of_range() {
        let mut labels = HmsvmLabels::new(2).unwrap();
        assert!(matches!(labels.add_label(vec![0, 2]), Err(Error::InvalidInput(..))));
        assert_eq!(labels.num_labels(), 0);
    }

    #[test]
    fn no_states() {
        assert!(matches!(HmsvmLabels::new(0), Err(Error::InvalidInput(..))));
    }
}
