use std::io::{BufRead, BufReader, Read, Write};

use crate::{
    quark::{Quark, StringTable, TextVectorizer},
    structure::hmsvm::HmsvmLabels,
    Error, Result,
};

/// Dense time-major feature matrix of one sequence: T rows of D features.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    values: Vec<f64>,
    num_features: usize,
}

impl Observation {
    pub fn new(num_features: usize) -> Self {
        Self {
            values: Vec::new(),
            num_features,
        }
    }

    /// Builds an observation from per-step rows, all of which must have `D` entries.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let D = rows.first().map(Vec::len).unwrap_or_default();
        let mut obs = Self::new(D);
        for row in rows {
            obs.push(row)?;
        }
        Ok(obs)
    }

    pub fn push(&mut self, row: &[f64]) -> Result<()> {
        if row.len() != self.num_features {
            return Err(Error::InvalidInput(format!(
                "expected {} features per step, got {}",
                self.num_features,
                row.len()
            )));
        }
        self.values.extend_from_slice(row);
        Ok(())
    }

    /// Features of step `t`.
    #[inline]
    pub fn row(&self, t: usize) -> &[f64] {
        &self.values[self.num_features * t..self.num_features * (t + 1)]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        (0..self.len()).map(move |t| self.row(t))
    }

    #[inline]
    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn len(&self) -> usize {
        if self.num_features == 0 {
            0
        } else {
            self.values.len() / self.num_features
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Observations of a data set in example order.
#[derive(Debug, Default, Clone)]
pub struct Dataset {
    pub seqs: Vec<Observation>,
    pub num_features: usize,
}

impl Dataset {
    pub fn new(num_features: usize) -> Self {
        Self {
            seqs: Vec::new(),
            num_features,
        }
    }

    pub fn push(&mut self, obs: Observation) -> Result<()> {
        if obs.num_features() != self.num_features {
            return Err(Error::InvalidInput(format!(
                "observation #{} has {} features, data set has {}",
                self.seqs.len(),
                obs.num_features(),
                self.num_features
            )));
        }
        self.seqs.push(obs);
        Ok(())
    }

    pub fn get(&self, i: usize) -> Option<&Observation> {
        self.seqs.get(i)
    }

    pub fn len(&self) -> usize {
        self.seqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }

    pub fn max_length(&self) -> usize {
        self.seqs.iter().map(|x| x.len()).max().unwrap_or_default()
    }

    pub fn total_items(&self) -> usize {
        self.seqs.iter().map(|x| x.len()).sum()
    }

    /// Reads labelled sequences: one step per line as `state\tx1\tx2...`,
    /// sequences separated by blank lines.
    ///
    /// State names are interned into `states`, so reading several files with
    /// the same table keeps state ids consistent. The returned labels use
    /// `states.len()` after reading as the number of states.
    pub fn read_labelled<R: Read>(input: R, states: &mut Quark) -> Result<(Self, HmsvmLabels)> {
        let mut rows: Vec<Vec<f64>> = Vec::new();
        let mut path: Vec<usize> = Vec::new();
        let mut sequences: Vec<(Vec<Vec<f64>>, Vec<usize>)> = Vec::new();
        for line in BufReader::new(input).lines() {
            let line = line?;
            let line = line.trim_end();
            if !line.is_empty() {
                if let Some((state, values)) = line.split_once('\t') {
                    match values
                        .split('\t')
                        .map(str::parse::<f64>)
                        .collect::<std::result::Result<Vec<_>, _>>()
                    {
                        Ok(row) => {
                            rows.push(row);
                            path.push(states.find_or_insert(state));
                        }
                        Err(e) => log::warn!("invalid line: {line} ({e})"),
                    }
                } else {
                    log::warn!("invalid line: {line}");
                }
            } else if !rows.is_empty() {
                sequences.push((std::mem::take(&mut rows), std::mem::take(&mut path)));
            }
        }
        if !rows.is_empty() {
            sequences.push((rows, path));
        }

        let D = sequences
            .first()
            .and_then(|(rows, _)| rows.first())
            .map(Vec::len)
            .unwrap_or_default();
        let mut ds = Dataset::new(D);
        let mut labels = HmsvmLabels::with_capacity(sequences.len(), states.len().max(1))?;
        for (rows, path) in sequences {
            ds.push(Observation::from_rows(&rows)?)?;
            labels.add_label(path)?;
        }
        log::info!(
            "read {} sequences, {} items (S: {}, D: {})",
            ds.len(),
            ds.total_items(),
            states.len(),
            D
        );
        Ok((ds, labels))
    }

    /// Writes sequences in the format read by [`Dataset::read_labelled`].
    pub fn write_labelled<W: Write>(&self, mut out: W, labels: &HmsvmLabels, states: &Quark) -> Result<()> {
        if labels.num_labels() != self.len() {
            return Err(Error::InvalidInput(format!(
                "{} labels for {} observations",
                labels.num_labels(),
                self.len()
            )));
        }
        for (obs, y) in self.seqs.iter().zip(labels.iter()) {
            if obs.len() != y.len() {
                return Err(Error::InvalidInput(format!(
                    "observation has {} steps, label has {}",
                    obs.len(),
                    y.len()
                )));
            }
            for (row, &s) in obs.rows().zip(y.iter()) {
                match states.to_str(s) {
                    Some(name) => write!(out, "{name}")?,
                    None => write!(out, "{s}")?,
                }
                for x in row {
                    write!(out, "\t{x}")?;
                }
                writeln!(out)?;
            }
            writeln!(out)?;
        }
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observation_rows() {
        let obs = Observation::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap();
        assert_eq!(obs.len(), 3);
        assert_eq!(obs.num_features(), 2);
        assert_eq!(obs.row(1), &[3.0, 4.0]);
        assert_eq!(obs.rows().count(), 3);
    }

    #[test]
    fn observation_ragged_rows() {
        let ret = Observation::from_rows(&[vec![1.0, 2.0], vec![3.0]]);
        assert!(matches!(ret, Err(Error::InvalidInput(..))));
    }

    #[test]
    fn read_labelled() {
        let s = "rainy\t0.5\t1.0\nsunny\t1.5\t-1.0\n\nsunny\t2.0\t0.0\nsunny\t2.5\t0.0\nrainy\t0.0\t3.0\n\n";
        let mut states = Quark::default();
        let (ds, labels) = Dataset::read_labelled(s.as_bytes(), &mut states).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.num_features, 2);
        assert_eq!(ds.max_length(), 3);
        assert_eq!(ds.total_items(), 5);
        assert_eq!(labels.num_labels(), 2);
        assert_eq!(labels.num_states(), 2);
        assert_eq!(states.to_str(0), Some("rainy"));
        assert_eq!(labels.get_label(1).unwrap().states(), &[1, 1, 0]);
        assert_eq!(ds.get(1).unwrap().row(2), &[0.0, 3.0]);
    }

    #[test]
    fn read_labelled_skips_invalid_lines() {
        let s = "a\t1.0\nno-tab-here\nb\tnot-a-number\nb\t2.0";
        let mut states = Quark::default();
        let (ds, labels) = Dataset::read_labelled(s.as_bytes(), &mut states).unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.get(0).unwrap().len(), 2);
        assert_eq!(labels.get_label(0).unwrap().states(), &[0, 1]);
    }

    #[test]
    fn write_then_read() {
        let mut ds = Dataset::new(2);
        ds.push(Observation::from_rows(&[vec![0.25, -1.0], vec![3.0, 0.5]]).unwrap()).unwrap();
        let mut labels = HmsvmLabels::new(2).unwrap();
        labels.add_label(vec![1, 0]).unwrap();
        let mut buf = Vec::new();
        ds.write_labelled(&mut buf, &labels, &Quark::numbered(2)).unwrap();
        assert_eq!(String::from_utf8(buf.clone()).unwrap(), "1\t0.25\t-1\n0\t3\t0.5\n\n");

        let mut states = Quark::numbered(2);
        let (back, back_labels) = Dataset::read_labelled(buf.as_slice(), &mut states).unwrap();
        assert_eq!(back.seqs, ds.seqs);
        assert_eq!(back_labels.get_label(0).unwrap().states(), &[1, 0]);
    }

    #[test]
    fn read_labelled_inconsistent_width() {
        let s = "a\t1.0\t2.0\n\nb\t2.0\n";
        let mut states = Quark::default();
        let ret = Dataset::read_labelled(s.as_bytes(), &mut states);
        assert!(matches!(ret, Err(Error::InvalidInput(..))));
    }
}
