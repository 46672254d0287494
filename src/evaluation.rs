use std::fmt::Display;

use crate::quark::{Quark, StringTable};

/// State-wise performance values.
#[derive(Debug, Default, Clone)]
struct StateMeasure {
    /// Number of correct predictions.
    num_correct: usize,
    /** Number of occurrences of the state in the gold-standard data. */
    num_observation: usize,
    /** Number of predictions. */
    num_prediction: usize,
    precision: f64,
    recall: f64,
    fmeasure: f64,
}

/// Overall performance of predicted state paths against the reference.
#[derive(Debug)]
pub struct Evaluation {
    states: Quark,
    tbl: Vec<StateMeasure>,

    /** Number of correctly predicted items. */
    item_total_correct: usize,
    /** Total number of items. */
    item_total_num: usize,
    item_accuracy: f64,

    /** Number of correctly predicted sequences. */
    inst_total_correct: usize,
    /** Total number of sequences. */
    inst_total_num: usize,
    inst_accuracy: f64,

    /** Accumulated Hamming loss. */
    total_loss: f64,

    macro_precision: f64,
    macro_recall: f64,
    macro_fmeasure: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Estimation {
    pub precision: f64,
    pub recall: f64,
    pub fmeasure: f64,
    pub item_accuracy: f64,
    pub inst_accuracy: f64,
    /// Hamming loss per item.
    pub loss: f64,
}

impl Evaluation {
    pub fn new(states: Quark) -> Self {
        let n = states.len();
        Self {
            states,
            tbl: vec![StateMeasure::default(); n],
            item_total_correct: 0,
            item_total_num: 0,
            item_accuracy: 0.0,
            inst_total_correct: 0,
            inst_total_num: 0,
            inst_accuracy: 0.0,
            total_loss: 0.0,
            macro_precision: 0.0,
            macro_recall: 0.0,
            macro_fmeasure: 0.0,
        }
    }

    fn measure(&mut self, s: usize) -> &mut StateMeasure {
        if s >= self.tbl.len() {
            self.tbl.resize(s + 1, StateMeasure::default());
        }
        &mut self.tbl[s]
    }

    /// Adds one sequence; paths are compared position by position.
    pub fn accumulate(&mut self, reference: &[usize], prediction: &[usize]) {
        let mut matched = 0;
        for (&r, &p) in reference.iter().zip(prediction) {
            self.measure(r).num_observation += 1;
            self.measure(p).num_prediction += 1;
            if r == p {
                self.measure(r).num_correct += 1;
                self.item_total_correct += 1;
                matched += 1;
            }
            self.item_total_num += 1;
        }
        self.total_loss += (reference.len().max(prediction.len()) - matched) as f64;

        if matched == reference.len() && reference.len() == prediction.len() {
            self.inst_total_correct += 1;
        }
        self.inst_total_num += 1;
    }

    pub fn evaluate(&mut self) -> Estimation {
        self.macro_precision = 0.0;
        self.macro_recall = 0.0;
        self.macro_fmeasure = 0.0;
        let mut num_observed = 0;
        for lev in &mut self.tbl {
            lev.precision = 0.0;
            lev.recall = 0.0;
            lev.fmeasure = 0.0;
            if lev.num_observation == 0 {
                continue;
            }
            num_observed += 1;

            if lev.num_prediction > 0 {
                lev.precision = lev.num_correct as f64 / lev.num_prediction as f64;
            }
            lev.recall = lev.num_correct as f64 / lev.num_observation as f64;
            if lev.precision + lev.recall > 0.0 {
                lev.fmeasure = lev.precision * lev.recall * 2.0 / (lev.precision + lev.recall);
            }
            self.macro_precision += lev.precision;
            self.macro_recall += lev.recall;
            self.macro_fmeasure += lev.fmeasure;
        }

        if num_observed > 0 {
            self.macro_precision /= num_observed as f64;
            self.macro_recall /= num_observed as f64;
            self.macro_fmeasure /= num_observed as f64;
        }
        if self.item_total_num > 0 {
            self.item_accuracy = self.item_total_correct as f64 / self.item_total_num as f64;
        }
        if self.inst_total_num > 0 {
            self.inst_accuracy = self.inst_total_correct as f64 / self.inst_total_num as f64;
        }
        Estimation {
            precision: self.macro_precision,
            recall: self.macro_recall,
            fmeasure: self.macro_fmeasure,
            item_accuracy: self.item_accuracy,
            inst_accuracy: self.inst_accuracy,
            loss: if self.item_total_num > 0 {
                self.total_loss / self.item_total_num as f64
            } else {
                0.0
            },
        }
    }
}

impl Display for Evaluation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Performance by state (#match, #model, #ref) (precision, recall, F1):")?;
        for (s, lev) in self.tbl.iter().enumerate() {
            let name = self.states.to_str(s).map(str::to_string).unwrap_or_else(|| s.to_string());
            if lev.num_observation == 0 {
                writeln!(
                    f,
                    "\t{}: ({}, {}, {}) (******, ******, ******)",
                    name, lev.num_correct, lev.num_prediction, lev.num_observation
                )?;
            } else {
                writeln!(
                    f,
                    "\t{}: ({}, {}, {}) ({:.4}, {:.4}, {:.4})",
                    name,
                    lev.num_correct,
                    lev.num_prediction,
                    lev.num_observation,
                    lev.precision,
                    lev.recall,
                    lev.fmeasure
                )?;
            }
        }
        writeln!(
            f,
            "Macro-average precision, recall, F1: ({:.6}, {:.6}, {:.6})",
            self.macro_precision, self.macro_recall, self.macro_fmeasure
        )?;
        writeln!(
            f,
            "Item accuracy: {}/{} => {:.4}",
            self.item_total_correct, self.item_total_num, self.item_accuracy
        )?;
        writeln!(
            f,
            "Sequence accuracy: {}/{} => {:.4}",
            self.inst_total_correct, self.inst_total_num, self.inst_accuracy
        )
    }
}
