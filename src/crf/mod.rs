//! Linear-chain conditional random field
//!
//! A model is created untrained with [`CrfModel::new`] and advanced with
//! [`CrfModel::train`], which returns a new model and leaves the receiver
//! untouched. Training another round on a trained model starts from its
//! weights.

use crate::dictionary::Dictionary;
use crate::errors::{Error, Result};
use crate::evaluation::Evaluation;
use crate::features::ExtractOptions;
use crate::optim::{NestedWeights, StopReason};
use crate::token::Token;

mod dataset;
mod feature_gen;
mod model_io;
mod params;
mod tagger;
mod trainer;

pub use self::params::CrfParams;
pub use self::tagger::Tagger;

pub(crate) use self::params::{bool_str, parse, parse_bool};

use self::feature_gen::{FeatureGenerator, FeatureType};

/// Facts recorded by the last training run.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    /// Number of training sequences
    pub training_size: usize,
    /// Number of optimizer iterations evaluated
    pub iterations: usize,
    /// Loss of the returned weights
    pub final_loss: f64,
    /// Which convergence test ended training
    pub stop_reason: StopReason,
    /// Loss of every evaluated iteration
    pub loss_history: Vec<f64>,
    /// Seconds since the Unix epoch
    pub trained_at: u64,
}

/// The CRF model
#[derive(Debug, Clone, PartialEq)]
pub struct CrfModel {
    labels: Dictionary,
    attrs: Dictionary,
    fgen: FeatureGenerator,
    language: Option<String>,
    extract: ExtractOptions,
    metadata: Option<Metadata>,
}

impl CrfModel {
    /// Create an untrained model over a fixed label set.
    ///
    /// An empty label set is filled from the gold labels of the first
    /// training run.
    pub fn new<I, S>(labels: I, language: Option<&str>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let labels: Dictionary = labels.into_iter().collect();
        Self {
            fgen: FeatureGenerator::empty(labels.len()),
            labels,
            attrs: Dictionary::new(),
            language: language.map(str::to_string),
            extract: ExtractOptions::default(),
            metadata: None,
        }
    }

    /// Train on `(tokens, labels)` pairs and return the trained model.
    pub fn train<S: AsRef<str> + Sync>(
        &self,
        data: &[(Vec<Token>, Vec<S>)],
        params: &CrfParams,
    ) -> Result<CrfModel> {
        trainer::train(self, data, params)
    }

    /// Get a tagger bound to this model
    pub fn tagger(&self) -> Tagger<'_> {
        Tagger::new(self)
    }

    /// Predict the label sequence of `tokens`.
    pub fn predict(&self, tokens: &[Token]) -> Result<Vec<String>> {
        let labels = self.tagger().tag(tokens)?;
        Ok(labels.into_iter().map(str::to_string).collect())
    }

    /// Tag every sequence of `data` and compare with the gold labels.
    pub fn evaluate<S: AsRef<str>>(&self, data: &[(Vec<Token>, Vec<S>)]) -> Result<Evaluation> {
        let tagger = self.tagger();
        let mut ev = Evaluation::new();
        for (index, (tokens, gold)) in data.iter().enumerate() {
            if tokens.len() != gold.len() {
                return Err(Error::LengthMismatch {
                    index,
                    tokens: tokens.len(),
                    labels: gold.len(),
                });
            }
            let predicted = tagger.tag(tokens)?;
            ev.accumulate(gold, &predicted);
        }
        ev.finalize();
        Ok(ev)
    }

    pub fn is_trained(&self) -> bool {
        self.metadata.is_some()
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Feature extraction options the model was trained with
    pub fn extract_options(&self) -> &ExtractOptions {
        &self.extract
    }

    /// Labels in id order
    pub fn labels(&self) -> Vec<&str> {
        self.labels.iter().map(|(s, _)| s).collect()
    }

    pub fn num_labels(&self) -> usize {
        self.labels.len()
    }

    /// Number of distinct feature strings
    pub fn num_attrs(&self) -> usize {
        self.attrs.len()
    }

    pub fn num_features(&self) -> usize {
        self.fgen.num_features()
    }

    pub(crate) fn label_name(&self, id: u32) -> &str {
        self.labels.get_name(id).unwrap_or_default()
    }

    /// Weight of the state feature `(feature, label)`; 0 when absent.
    pub fn state_weight(&self, feature: &str, label: &str) -> f64 {
        match (self.attrs.get(feature), self.labels.get(label)) {
            (Some(aid), Some(lid)) => self
                .fgen
                .state_fid(aid, lid)
                .map_or(0.0, |fid| self.fgen.weights[fid as usize]),
            _ => 0.0,
        }
    }

    /// Weight of the transition `prev -> curr`; 0 when absent.
    pub fn transition_weight(&self, prev: &str, curr: &str) -> f64 {
        match (self.labels.get(prev), self.labels.get(curr)) {
            (Some(i), Some(j)) => self
                .fgen
                .transition_fid(i, j)
                .map_or(0.0, |fid| self.fgen.weights[fid as usize]),
            _ => 0.0,
        }
    }

    /// State weights as a feature → label → weight table.
    pub fn feature_weights(&self) -> NestedWeights<String, String> {
        let mut table = NestedWeights::new();
        for (f, &w) in self.fgen.features.iter().zip(&self.fgen.weights) {
            if f.ftype == FeatureType::State {
                if let Some(name) = self.attrs.get_name(f.src) {
                    table.add(name.to_string(), self.label_name(f.dst).to_string(), w);
                }
            }
        }
        table
    }
}
