use crate::{dataset::Observation, structure::loss::Loss};

use super::feature::{dot, Layout};

/// Work space of the Viterbi decoder.
#[derive(Debug, Default)]
pub(crate) struct ViterbiContext {
    /// The total number of distinct states (S).
    pub num_states: usize,

    /// The number of items (T) in the current sequence.
    num_items: usize,

    /// The number of items the buffers can hold.
    cap_items: usize,

    /**
     * State scores.
     *  This is a [T][S] matrix whose element [t][s] is the emission score
     *  of state #s for the features observed at #t.
     */
    pub state: Vec<f64>,

    /**
     * Transition scores.
     *  This is a [S][S] matrix whose element [i][j] is the weight of the
     *  transition from state #i to state #j.
     */
    pub trans: Vec<f64>,

    /// Score of starting in each state.
    pub start: Vec<f64>,

    /// Score of ending in each state.
    pub end: Vec<f64>,

    /**
     * Alpha score matrix.
     *  This is a [T][S] matrix whose element [t][s] is the best score of a
     *  path starting at BOS and arriving at (t, s).
     */
    alpha_score: Vec<f64>,

    /**
     * Backward edges.
     *  This is a [T][S] matrix whose element [t][j] is the state #i at t-1
     *  that yields the maximum score to arrive at (t, j).
     */
    backward_edge: Vec<usize>,
}

impl ViterbiContext {
    pub fn new(S: usize, T: usize) -> Self {
        let mut this = Self {
            num_states: S,
            trans: vec![0.0; S * S],
            start: vec![0.0; S],
            end: vec![0.0; S],
            ..Default::default()
        };
        this.set_num_items(T);
        this
    }

    pub fn set_num_items(&mut self, T: usize) {
        let S = self.num_states;
        self.num_items = T;
        if self.cap_items < T {
            self.alpha_score.resize(T * S, 0.0);
            self.backward_edge.resize(T * S, 0);
            self.state.resize(T * S, 0.0);
            self.cap_items = T;
        }
    }

    /// Loads transition and boundary scores from `w`, adding the fixed
    /// boundary priors `p` and `q`. Independent of the observation.
    pub fn set_weights(&mut self, layout: &Layout, w: &[f64], p: &[f64], q: &[f64]) {
        let S = self.num_states;
        self.trans.copy_from_slice(&w[layout.transmission()]);
        let (start, end) = (layout.start().start, layout.end().start);
        for s in 0..S {
            self.start[s] = w[start + s] + p[s];
            self.end[s] = w[end + s] + q[s];
        }
    }

    /// Computes the emission scores of every (t, s) for `obs`.
    pub fn set_observation(&mut self, layout: &Layout, w: &[f64], obs: &Observation) {
        let S = self.num_states;
        self.set_num_items(obs.len());
        for t in 0..obs.len() {
            let x = obs.row(t);
            for s in 0..S {
                self.state[S * t + s] = dot(&w[layout.emission_block(s)], x);
            }
        }
    }

    /// Best path through the trellis, written to `labels`, and its score.
    ///
    /// With `truth`, the loss of each (t, s) against the true path is added
    /// to the state score, so the returned score is `score(y) + Δ(truth, y)`.
    /// Ties go to the lowest state index.
    pub fn viterbi(&mut self, labels: &mut [usize], truth: Option<(&dyn Loss, &[usize])>) -> f64 {
        let T = self.num_items;
        let S = self.num_states;
        debug_assert!(T > 0 && labels.len() == T);

        let node = |state: &[f64], t: usize, s: usize| -> f64 {
            let mut r = state[S * t + s];
            if let Some((loss, y)) = truth {
                r += loss.position(y, t, s);
            }
            r
        };

        /* Compute the scores at (0, *). */
        for j in 0..S {
            self.alpha_score[j] = self.start[j] + node(&self.state, 0, j);
        }

        /* Compute the scores at (t, *). */
        for t in 1..T {
            for j in 0..S {
                let mut max_score = f64::NEG_INFINITY;
                let mut argmax_score = 0;
                for i in 0..S {
                    /* Transit from (t-1, i) to (t, j). */
                    let score = self.alpha_score[S * (t - 1) + i] + self.trans[S * i + j];
                    if max_score < score {
                        max_score = score;
                        argmax_score = i;
                    }
                }
                /* Backward link (#t, #j) -> (#t-1, #i). */
                self.backward_edge[S * t + j] = argmax_score;
                self.alpha_score[S * t + j] = max_score + node(&self.state, t, j);
            }
        }

        /* Find the node (#T-1, #i) that reaches EOS with the maximum score. */
        let mut max_score = f64::NEG_INFINITY;
        labels[T - 1] = 0;
        for i in 0..S {
            let score = self.alpha_score[S * (T - 1) + i] + self.end[i];
            if max_score < score {
                max_score = score;
                labels[T - 1] = i;
            }
        }

        /* Tag labels by tracing the backward links. */
        for t in (0..T - 1).rev() {
            let i = labels[t + 1];
            labels[t] = self.backward_edge[S * (t + 1) + i];
        }
        max_score
    }

    /// Score of a given path under the loaded weights, loss excluded.
    pub fn score(&self, labels: &[usize]) -> f64 {
        assert!(!labels.is_empty(), "empty labels");
        let S = self.num_states;
        let T = self.num_items;

        /* Stay at (0, labels[0]). */
        let mut i = labels[0];
        let mut r = self.start[i] + self.state[i];

        /* Loop over the rest of items. */
        for t in 1..T {
            let j = labels[t];
            /* Transit from (t-1, i) to (t, j). */
            r += self.trans[S * i + j];
            r += self.state[S * t + j];
            i = j;
        }
        r + self.end[i]
    }
}
