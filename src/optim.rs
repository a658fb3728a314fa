//! Gradient-descent utilities shared by the trainers.
//!
//! Parameters live in a flat vector indexed by feature id (the dense form
//! of the feature → label weight table after the vocabulary pass). Every
//! update returns a fresh vector; the input weights are never touched.

use std::collections::BTreeMap;

use crate::errors::{Error, Result};

/// Why training stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Gradient L2-norm fell below `epsilon`
    GradientNorm,
    /// Relative loss improvement fell below `delta`
    LossDelta,
    /// `max_iterations` reached
    MaxIterations,
}

impl StopReason {
    pub(crate) fn to_u32(self) -> u32 {
        match self {
            Self::GradientNorm => 0,
            Self::LossDelta => 1,
            Self::MaxIterations => 2,
        }
    }

    pub(crate) fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(Self::GradientNorm),
            1 => Some(Self::LossDelta),
            2 => Some(Self::MaxIterations),
            _ => None,
        }
    }
}

/// Gradient-descent parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerParams {
    learning_rate: f64,
    decay: f64,
    c1: f64,
    c2: f64,
    max_iterations: usize,
    epsilon: f64,
    delta: f64,
}

impl Default for OptimizerParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            decay: 0.0,
            c1: 0.0,
            c2: 0.01,
            max_iterations: 100,
            epsilon: 1e-5,
            delta: 1e-6,
        }
    }
}

impl OptimizerParams {
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn set_learning_rate(&mut self, learning_rate: f64) -> Result<()> {
        if !(learning_rate > 0.0) || !learning_rate.is_finite() {
            return Err(Error::invalid_param("learning_rate must be positive"));
        }
        self.learning_rate = learning_rate;
        Ok(())
    }

    pub fn decay(&self) -> f64 {
        self.decay
    }

    /// Learning rate at iteration `t` is `learning_rate / (1 + decay * t)`.
    pub fn set_decay(&mut self, decay: f64) -> Result<()> {
        if decay < 0.0 || !decay.is_finite() {
            return Err(Error::invalid_param("decay must be non-negative"));
        }
        self.decay = decay;
        Ok(())
    }

    pub fn c1(&self) -> f64 {
        self.c1
    }

    pub fn set_c1(&mut self, c1: f64) -> Result<()> {
        if c1 < 0.0 || !c1.is_finite() {
            return Err(Error::invalid_param("c1 must be non-negative"));
        }
        self.c1 = c1;
        Ok(())
    }

    pub fn c2(&self) -> f64 {
        self.c2
    }

    pub fn set_c2(&mut self, c2: f64) -> Result<()> {
        if c2 < 0.0 || !c2.is_finite() {
            return Err(Error::invalid_param("c2 must be non-negative"));
        }
        self.c2 = c2;
        Ok(())
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn set_max_iterations(&mut self, max_iterations: usize) -> Result<()> {
        if max_iterations < 1 {
            return Err(Error::invalid_param("max_iterations must be at least 1"));
        }
        self.max_iterations = max_iterations;
        Ok(())
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn set_epsilon(&mut self, epsilon: f64) -> Result<()> {
        if epsilon < 0.0 || epsilon.is_nan() {
            return Err(Error::invalid_param("epsilon must be non-negative"));
        }
        self.epsilon = epsilon;
        Ok(())
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// Setting delta to 0 disables the loss-based convergence test.
    pub fn set_delta(&mut self, delta: f64) -> Result<()> {
        if delta < 0.0 || delta.is_nan() {
            return Err(Error::invalid_param("delta must be non-negative"));
        }
        self.delta = delta;
        Ok(())
    }
}

/// Plain batch gradient descent with L1/L2 regularization.
#[derive(Debug, Clone)]
pub struct GradientDescent {
    params: OptimizerParams,
}

impl GradientDescent {
    pub fn new(params: OptimizerParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &OptimizerParams {
        &self.params
    }

    /// Learning rate at the zero-based iteration `t`.
    pub fn learning_rate_at(&self, t: usize) -> f64 {
        self.params.learning_rate / (1.0 + self.params.decay * t as f64)
    }

    /// Add the L2 term `c2 * ||w||^2` to `loss` and `2 * c2 * w` to `gradient`.
    /// The L1 term `c1 * ||w||_1` only contributes to the loss; its
    /// gradient is handled by the proximal step in [`step`](Self::step).
    pub fn regularize(&self, weights: &[f64], gradient: &mut [f64], loss: f64) -> f64 {
        let c1 = self.params.c1;
        let c2 = self.params.c2;
        let mut loss = loss;
        if c2 > 0.0 {
            let two_c2 = 2.0 * c2;
            for (g, &w) in gradient.iter_mut().zip(weights) {
                *g += two_c2 * w;
                loss += c2 * w * w;
            }
        }
        if c1 > 0.0 {
            loss += c1 * weights.iter().map(|w| w.abs()).sum::<f64>();
        }
        loss
    }

    /// One descent step `w - eta * g`, followed by soft-thresholding when
    /// `c1 > 0`. Returns the new weights.
    pub fn step(&self, weights: &[f64], gradient: &[f64], iteration: usize) -> Vec<f64> {
        let eta = self.learning_rate_at(iteration);
        let threshold = eta * self.params.c1;
        weights
            .iter()
            .zip(gradient)
            .map(|(&w, &g)| {
                let w = w - eta * g;
                if threshold > 0.0 {
                    soft_threshold(w, threshold)
                } else {
                    w
                }
            })
            .collect()
    }

    /// Convergence test for the zero-based `iteration` that has just
    /// produced `loss` and a gradient of norm `grad_norm`.
    pub fn check(
        &self,
        iteration: usize,
        grad_norm: f64,
        prev_loss: Option<f64>,
        loss: f64,
    ) -> Option<StopReason> {
        if grad_norm < self.params.epsilon {
            return Some(StopReason::GradientNorm);
        }
        if let Some(prev) = prev_loss {
            if self.params.delta > 0.0 {
                let improvement = (prev - loss) / loss.abs().max(1.0);
                if improvement.abs() < self.params.delta {
                    return Some(StopReason::LossDelta);
                }
            }
        }
        if iteration + 1 >= self.params.max_iterations {
            return Some(StopReason::MaxIterations);
        }
        None
    }

    /// `true` once the gradient norm falls below `epsilon`, whatever the
    /// remaining iteration budget.
    pub fn has_converged(&self, grad_norm: f64) -> bool {
        grad_norm < self.params.epsilon
    }
}

#[inline]
fn soft_threshold(w: f64, threshold: f64) -> f64 {
    if w > threshold {
        w - threshold
    } else if w < -threshold {
        w + threshold
    } else {
        0.0
    }
}

/// Euclidean norm.
pub fn l2_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Two-level weight table `outer → inner → weight`; missing entries are 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NestedWeights<K1: Ord, K2: Ord> {
    table: BTreeMap<K1, BTreeMap<K2, f64>>,
}

impl<K1: Ord, K2: Ord> NestedWeights<K1, K2> {
    pub fn new() -> Self {
        Self {
            table: BTreeMap::new(),
        }
    }

    pub fn get(&self, outer: &K1, inner: &K2) -> f64 {
        self.table
            .get(outer)
            .and_then(|row| row.get(inner))
            .copied()
            .unwrap_or(0.0)
    }

    /// Add `value` to the entry, creating it if needed.
    pub fn add(&mut self, outer: K1, inner: K2, value: f64) {
        *self
            .table
            .entry(outer)
            .or_default()
            .entry(inner)
            .or_insert(0.0) += value;
    }

    pub fn row(&self, outer: &K1) -> Option<&BTreeMap<K2, f64>> {
        self.table.get(outer)
    }

    /// Number of stored (outer, inner) entries.
    pub fn len(&self) -> usize {
        self.table.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K1, &K2, f64)> + '_ {
        self.table
            .iter()
            .flat_map(|(o, row)| row.iter().map(move |(i, &w)| (o, i, w)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_returns_new_weights() {
        let gd = GradientDescent::new(OptimizerParams::default());
        let w = vec![1.0, -1.0];
        let g = vec![0.5, -0.5];
        let w2 = gd.step(&w, &g, 0);
        assert_eq!(w, vec![1.0, -1.0]);
        assert!((w2[0] - 0.95).abs() < 1e-12);
        assert!((w2[1] + 0.95).abs() < 1e-12);
    }

    #[test]
    fn test_l1_soft_threshold() {
        let mut params = OptimizerParams::default();
        params.set_c1(1.0).unwrap();
        params.set_learning_rate(0.1).unwrap();
        let gd = GradientDescent::new(params);
        let w2 = gd.step(&[0.05, 0.5, -0.5], &[0.0, 0.0, 0.0], 0);
        assert_eq!(w2[0], 0.0);
        assert!((w2[1] - 0.4).abs() < 1e-12);
        assert!((w2[2] + 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_regularize() {
        let mut params = OptimizerParams::default();
        params.set_c2(0.5).unwrap();
        let gd = GradientDescent::new(params);
        let mut g = vec![0.0, 0.0];
        let loss = gd.regularize(&[1.0, 2.0], &mut g, 1.0);
        assert!((loss - (1.0 + 0.5 * 5.0)).abs() < 1e-12);
        assert_eq!(g, vec![1.0, 2.0]);
    }

    #[test]
    fn test_converges_on_small_gradient_regardless_of_budget() {
        let mut params = OptimizerParams::default();
        params.set_max_iterations(1_000_000).unwrap();
        params.set_epsilon(1e-3).unwrap();
        let gd = GradientDescent::new(params);
        assert!(gd.has_converged(1e-4));
        assert!(!gd.has_converged(1e-2));
        assert_eq!(
            gd.check(3, 1e-4, Some(10.0), 5.0),
            Some(StopReason::GradientNorm)
        );
        assert_eq!(gd.check(3, 1.0, Some(10.0), 5.0), None);
    }

    #[test]
    fn test_loss_delta_and_cap() {
        let mut params = OptimizerParams::default();
        params.set_max_iterations(5).unwrap();
        params.set_delta(1e-3).unwrap();
        let gd = GradientDescent::new(params);
        assert_eq!(
            gd.check(1, 1.0, Some(2.0), 2.0 - 1e-6),
            Some(StopReason::LossDelta)
        );
        assert_eq!(gd.check(4, 1.0, Some(2.0), 1.0), Some(StopReason::MaxIterations));
    }

    #[test]
    fn test_decay_schedule() {
        let mut params = OptimizerParams::default();
        params.set_learning_rate(1.0).unwrap();
        params.set_decay(1.0).unwrap();
        let gd = GradientDescent::new(params);
        assert_eq!(gd.learning_rate_at(0), 1.0);
        assert_eq!(gd.learning_rate_at(1), 0.5);
    }

    #[test]
    fn test_param_validation() {
        let mut params = OptimizerParams::default();
        assert!(params.set_learning_rate(0.0).is_err());
        assert!(params.set_c2(-1.0).is_err());
        assert_eq!(
            params.set_c1(-1.0).unwrap_err().to_string(),
            "c1 must be non-negative"
        );
        assert!(params.set_max_iterations(0).is_err());
        assert!(params.set_delta(0.0).is_ok());
    }

    #[test]
    fn test_nested_weights_default_zero() {
        let mut w: NestedWeights<String, String> = NestedWeights::new();
        assert_eq!(w.get(&"w=cat".to_string(), &"NOUN".to_string()), 0.0);
        w.add("w=cat".to_string(), "NOUN".to_string(), 1.5);
        w.add("w=cat".to_string(), "NOUN".to_string(), 0.5);
        assert_eq!(w.get(&"w=cat".to_string(), &"NOUN".to_string()), 2.0);
        assert_eq!(w.len(), 1);
        assert_eq!(w.iter().count(), 1);
    }
}
