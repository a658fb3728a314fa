use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};
use ndarray::Array2;
use rayon::prelude::*;

use super::dataset::Instance;
use super::feature_gen::{FeatureGenerator, GenerateOptions};
use super::{CrfModel, CrfParams, Metadata};
use crate::errors::{Error, Result};
use crate::features::extract_sequence;
use crate::lattice::Lattice;
use crate::optim::{l2_norm, GradientDescent, StopReason};
use crate::token::Token;

/// Per-thread accumulator of the negative log-likelihood gradient.
struct Stats {
    /// Σ (gold score − log Z)
    loglik: f64,
    /// Expected minus observed feature counts
    grad: Vec<f64>,
}

impl Stats {
    fn new(num_features: usize) -> Self {
        Self {
            loglik: 0.0,
            grad: vec![0.0; num_features],
        }
    }

    fn merge(mut self, other: Stats) -> Stats {
        self.loglik += other.loglik;
        for (g, o) in self.grad.iter_mut().zip(other.grad) {
            *g += o;
        }
        self
    }

    fn accumulate(&mut self, fgen: &FeatureGenerator, trans: &Array2<f64>, w: &[f64], inst: &Instance) {
        let state = fgen.state_scores(&inst.items, w);
        let lattice = Lattice::from_scores(state, trans.clone());
        let fb = lattice.forward_backward();
        self.loglik += lattice.path_score(&inst.labels) - fb.log_z;

        // State features: expected under the marginals, observed on the gold path
        let marginals = fb.state_marginals();
        for (t, item) in inst.items.iter().enumerate() {
            let gold = inst.labels[t];
            for &aid in item {
                let refs = match fgen.attr_refs.get(aid as usize) {
                    Some(refs) => refs,
                    None => continue,
                };
                for &fid in &refs.fids {
                    let f = &fgen.features[fid as usize];
                    self.grad[fid as usize] += marginals[[t, f.dst as usize]];
                    if f.dst == gold {
                        self.grad[fid as usize] -= 1.0;
                    }
                }
            }
        }

        // Transition features
        let expected = fb.transition_marginals(&lattice);
        for refs in &fgen.label_refs {
            for &fid in &refs.fids {
                let f = &fgen.features[fid as usize];
                self.grad[fid as usize] += expected[[f.src as usize, f.dst as usize]];
            }
        }
        for pair in inst.labels.windows(2) {
            if let Some(fid) = fgen.transition_fid(pair[0], pair[1]) {
                self.grad[fid as usize] -= 1.0;
            }
        }
    }
}

/// Average negative log-likelihood and its gradient over all instances.
fn objective(fgen: &FeatureGenerator, instances: &[Instance], w: &[f64]) -> (f64, Vec<f64>) {
    let k = fgen.num_features();
    let trans = fgen.transition_scores(w);
    let stats = instances
        .par_iter()
        .fold(
            || Stats::new(k),
            |mut acc, inst| {
                acc.accumulate(fgen, &trans, w, inst);
                acc
            },
        )
        .reduce(|| Stats::new(k), Stats::merge);

    let n = instances.len().max(1) as f64;
    let mut grad = stats.grad;
    for g in &mut grad {
        *g /= n;
    }
    (-stats.loglik / n, grad)
}

fn validate<S: AsRef<str>>(data: &[(Vec<Token>, Vec<S>)]) -> Result<()> {
    if data.is_empty() {
        return Err(Error::EmptyTrainingSet);
    }
    for (index, (tokens, labels)) in data.iter().enumerate() {
        if tokens.len() != labels.len() {
            return Err(Error::LengthMismatch {
                index,
                tokens: tokens.len(),
                labels: labels.len(),
            });
        }
        if tokens.is_empty() {
            return Err(Error::EmptySequence(index));
        }
    }
    Ok(())
}

pub(crate) fn train<S: AsRef<str> + Sync>(
    model: &CrfModel,
    data: &[(Vec<Token>, Vec<S>)],
    params: &CrfParams,
) -> Result<CrfModel> {
    validate(data)?;

    // Gold labels; a fixed label set rejects anything outside it
    let mut labels = model.labels.clone();
    let fixed = !labels.is_empty();
    let mut label_ids = Vec::with_capacity(data.len());
    for (_, gold) in data {
        let mut ids = Vec::with_capacity(gold.len());
        for label in gold {
            let label = label.as_ref();
            let lid = if fixed {
                labels
                    .get(label)
                    .ok_or_else(|| Error::UnknownLabel(label.to_string()))?
            } else {
                labels.get_or_insert(label)
            };
            ids.push(lid);
        }
        label_ids.push(ids);
    }

    // Seeded features are keyed by the strings of the first extractor
    let extract = if model.is_trained() {
        if params.extract() != &model.extract {
            warn!("keeping the feature extraction options of the trained model");
        }
        model.extract.clone()
    } else {
        params.extract().clone()
    };
    let feature_sets: Vec<_> = data
        .par_iter()
        .map(|(tokens, _)| extract_sequence(tokens, &extract))
        .collect();

    let mut attrs = model.attrs.clone();
    let mut instances = Vec::with_capacity(data.len());
    for (sets, lids) in feature_sets.iter().zip(label_ids) {
        let mut inst = Instance::with_capacity(sets.len());
        for (set, lid) in sets.iter().zip(lids) {
            let item = set.iter().map(|f| attrs.get_or_insert(f)).collect();
            inst.push(item, lid);
        }
        instances.push(inst);
    }

    let seed = if model.fgen.num_features() > 0 {
        Some(&model.fgen)
    } else {
        None
    };
    let opts = GenerateOptions {
        min_freq: params.feature_minfreq(),
        possible_states: params.possible_states(),
    };
    let mut fgen = FeatureGenerator::generate(&instances, attrs.len(), labels.len(), opts, seed)?;
    debug!(
        "{} sequences, {} labels, {} attributes, {} features",
        instances.len(),
        labels.len(),
        attrs.len(),
        fgen.num_features()
    );

    let gd = GradientDescent::new(params.optimizer().clone());
    let mut weights = fgen.weights.clone();
    let mut loss_history = Vec::new();
    let mut prev_loss = None;
    let mut iteration = 0;
    let stop_reason = loop {
        let (loss, mut grad) = objective(&fgen, &instances, &weights);
        let loss = gd.regularize(&weights, &mut grad, loss);
        if !loss.is_finite() {
            return Err(Error::invalid_param(
                "training diverged, try a smaller learning_rate",
            ));
        }
        let norm = l2_norm(&grad);
        info!(
            "iteration {}: loss = {:.6}, ||g|| = {:.6}, eta = {:.6}",
            iteration + 1,
            loss,
            norm,
            gd.learning_rate_at(iteration)
        );
        loss_history.push(loss);

        match gd.check(iteration, norm, prev_loss, loss) {
            Some(StopReason::MaxIterations) => {
                weights = gd.step(&weights, &grad, iteration);
                break StopReason::MaxIterations;
            }
            Some(reason) => break reason,
            None => {}
        }
        weights = gd.step(&weights, &grad, iteration);
        prev_loss = Some(loss);
        iteration += 1;
    };
    debug!("stopped after {} iterations: {:?}", loss_history.len(), stop_reason);
    let final_loss = match stop_reason {
        StopReason::MaxIterations => {
            let (loss, mut grad) = objective(&fgen, &instances, &weights);
            gd.regularize(&weights, &mut grad, loss)
        }
        _ => loss_history.last().copied().unwrap_or(0.0),
    };
    fgen.weights = weights;

    let trained_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let metadata = Metadata {
        training_size: data.len(),
        iterations: loss_history.len(),
        final_loss,
        stop_reason,
        loss_history,
        trained_at,
    };

    Ok(CrfModel {
        labels,
        attrs,
        fgen,
        language: model.language.clone(),
        extract,
        metadata: Some(metadata),
    })
}
