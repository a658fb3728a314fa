//! Viterbi and forward-backward over a linear-chain label lattice.
//!
//! All scores are in the log domain: the state score of `(t, l)` is the sum
//! of the weights of the features active at `t` for label `l`, the
//! transition score of `(i, j)` the weight of moving from label `i` to `j`.

use ndarray::{Array1, Array2, ArrayView1};

/// `log(exp(a) + exp(b))` without overflow. Negative infinity is absorbing.
#[inline]
pub fn logsumexp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    a.max(b) + (-(a - b).abs()).exp().ln_1p()
}

/// Log-sum-exp over a sequence of values. Empty input yields negative infinity.
pub fn logsumexp_iter<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    values.into_iter().fold(f64::NEG_INFINITY, logsumexp)
}

/// Score tables of one input sequence.
#[derive(Debug, Clone)]
pub struct Lattice {
    /// State scores
    ///
    /// This is a `[T][L]` matrix whose element `[t][l]` presents total score
    /// of state features associating label #l at #t.
    pub state: Array2<f64>,
    /// Transition scores
    ///
    /// This is a `[L][L]` matrix whose element `[i][j]` represents the total
    /// score of transition features associating labels #i and #j.
    pub trans: Array2<f64>,
}

/// Forward and backward score matrices together with `log Z(x)`.
#[derive(Debug, Clone)]
pub struct ForwardBackward {
    /// `[T][L]`: log total score of paths from BOS arriving at (t, l)
    pub alpha: Array2<f64>,
    /// `[T][L]`: log total score of paths from (t, l) to EOS, excluding (t, l)
    pub beta: Array2<f64>,
    /// Log partition function
    pub log_z: f64,
}

impl Lattice {
    /// Zero-filled lattice for `num_items` positions and `num_labels` labels.
    pub fn new(num_labels: usize, num_items: usize) -> Self {
        Self {
            state: Array2::zeros((num_items, num_labels)),
            trans: Array2::zeros((num_labels, num_labels)),
        }
    }

    /// Lattice over `[T][L]` state scores and `[L][L]` transition scores.
    pub fn from_scores(state: Array2<f64>, trans: Array2<f64>) -> Self {
        debug_assert_eq!(state.ncols(), trans.nrows());
        debug_assert_eq!(trans.nrows(), trans.ncols());
        Self { state, trans }
    }

    /// Sequence length
    pub fn num_items(&self) -> usize {
        self.state.nrows()
    }

    /// Size of the label set
    pub fn num_labels(&self) -> usize {
        self.trans.nrows()
    }

    /// Most probable label sequence and its score.
    ///
    /// On equal scores the lower label id wins; callers must not rely on it.
    pub fn viterbi(&self) -> (Vec<u32>, f64) {
        let t_len = self.num_items();
        let l = self.num_labels();
        if t_len == 0 || l == 0 {
            return (Vec::new(), 0.0);
        }

        let mut score = Array2::<f64>::zeros((t_len, l));
        let mut backward_edge = Array2::<u32>::zeros((t_len, l));

        // Compute the scores at (0, *)
        score.row_mut(0).assign(&self.state.row(0));

        // Compute the scores at (t, *)
        for t in 1..t_len {
            for j in 0..l {
                let mut max_score = f64::NEG_INFINITY;
                let mut best_prev = 0;
                for i in 0..l {
                    // Transit from (t-1, i) to (t, j)
                    let s = score[[t - 1, i]] + self.trans[[i, j]];
                    if i == 0 || max_score < s {
                        max_score = s;
                        best_prev = i;
                    }
                }
                // Backward link (#t, #j) -> (#t-1, #i)
                backward_edge[[t, j]] = best_prev as u32;
                score[[t, j]] = max_score + self.state[[t, j]];
            }
        }

        // Find the label at T-1 that reaches EOS with the maximum score
        let (best, max_score) = argmax(score.row(t_len - 1));
        let mut labels = vec![0u32; t_len];
        labels[t_len - 1] = best as u32;

        // Tag labels by tracing the backward links
        for t in (0..t_len - 1).rev() {
            let next = labels[t + 1] as usize;
            labels[t] = backward_edge[[t + 1, next]];
        }

        (labels, max_score)
    }

    /// Forward scores: `alpha[0][l] = state[0][l]`,
    /// `alpha[t][l] = logsumexp_i(alpha[t-1][i] + trans[i][l]) + state[t][l]`.
    pub fn forward(&self) -> Array2<f64> {
        let t_len = self.num_items();
        let l = self.num_labels();
        let mut alpha = Array2::from_elem((t_len, l), f64::NEG_INFINITY);
        if t_len == 0 {
            return alpha;
        }
        alpha.row_mut(0).assign(&self.state.row(0));
        for t in 1..t_len {
            for j in 0..l {
                let sum = logsumexp_iter((0..l).map(|i| alpha[[t - 1, i]] + self.trans[[i, j]]));
                alpha[[t, j]] = sum + self.state[[t, j]];
            }
        }
        alpha
    }

    /// Backward scores: `beta[T-1][l] = 0`,
    /// `beta[t][l] = logsumexp_j(trans[l][j] + state[t+1][j] + beta[t+1][j])`.
    pub fn backward(&self) -> Array2<f64> {
        let t_len = self.num_items();
        let l = self.num_labels();
        let mut beta = Array2::from_elem((t_len, l), f64::NEG_INFINITY);
        if t_len == 0 {
            return beta;
        }
        beta.row_mut(t_len - 1).fill(0.0);
        for t in (0..t_len - 1).rev() {
            for i in 0..l {
                let sum = logsumexp_iter(
                    (0..l).map(|j| self.trans[[i, j]] + self.state[[t + 1, j]] + beta[[t + 1, j]]),
                );
                beta[[t, i]] = sum;
            }
        }
        beta
    }

    /// `log Z(x)`: log-sum-exp of the forward scores at the final position.
    /// An empty sequence has exactly one (empty) path, so `log Z = 0`.
    pub fn partition_function(alpha: &Array2<f64>) -> f64 {
        match alpha.nrows() {
            0 => 0.0,
            n => logsumexp_iter(alpha.row(n - 1).iter().copied()),
        }
    }

    /// Run forward and backward passes.
    pub fn forward_backward(&self) -> ForwardBackward {
        let alpha = self.forward();
        let beta = self.backward();
        let log_z = Self::partition_function(&alpha);
        ForwardBackward { alpha, beta, log_z }
    }

    /// Unnormalized log score of a given label sequence.
    pub fn path_score(&self, labels: &[u32]) -> f64 {
        let mut score = 0.0;
        for (t, &label) in labels.iter().enumerate() {
            score += self.state[[t, label as usize]];
            if t > 0 {
                score += self.trans[[labels[t - 1] as usize, label as usize]];
            }
        }
        score
    }
}

impl ForwardBackward {
    /// State marginals `P(y_t = l | x) = exp(alpha[t][l] + beta[t][l] - log Z)`.
    pub fn state_marginals(&self) -> Array2<f64> {
        let mut m = &self.alpha + &self.beta;
        m.mapv_inplace(|v| (v - self.log_z).exp());
        m
    }

    /// Transition marginals summed over positions:
    /// `Σ_t P(y_{t-1} = i, y_t = j | x)`.
    pub fn transition_marginals(&self, lattice: &Lattice) -> Array2<f64> {
        let l = lattice.num_labels();
        let mut m = Array2::zeros((l, l));
        for t in 1..lattice.num_items() {
            for i in 0..l {
                let a = self.alpha[[t - 1, i]];
                for j in 0..l {
                    let log_p = a
                        + lattice.trans[[i, j]]
                        + lattice.state[[t, j]]
                        + self.beta[[t, j]]
                        - self.log_z;
                    m[[i, j]] += log_p.exp();
                }
            }
        }
        m
    }
}

/// Index and value of the maximum; the first one wins on ties.
fn argmax(row: ArrayView1<'_, f64>) -> (usize, f64) {
    let mut best = 0;
    let mut max = f64::NEG_INFINITY;
    for (i, &v) in row.iter().enumerate() {
        if i == 0 || max < v {
            max = v;
            best = i;
        }
    }
    (best, max)
}

/// Normalize a vector of log scores into probabilities.
pub fn softmax(scores: &Array1<f64>) -> Array1<f64> {
    let z = logsumexp_iter(scores.iter().copied());
    scores.mapv(|v| (v - z).exp())
}
