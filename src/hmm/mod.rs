//! Trigram hidden Markov model tagger
//!
//! Probabilities are estimated from counts with add-k smoothing:
//!
//! * emission `P(w | t) = (c(w, t) + k) / (c(t) + k·V)`, where `V` is the
//!   vocabulary size; a word never seen in training gets `k / (c(t) + k·V)`
//! * transition `P(t | t₋₂, t₋₁) = (c(t₋₂, t₋₁, t) + k) / (c(t₋₂, t₋₁) + k·T)`,
//!   with two `START` symbols padding the left of every sentence
//! * initial `P(t) = (c₀(t) + k) / (N + k·T)` over sentence-initial tags
//!
//! All tables are kept in the log domain and every entry is finite.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;
use ndarray::{Array1, Array2, Array3};

use crate::dictionary::Dictionary;
use crate::errors::{Error, Result};
use crate::evaluation::Evaluation;

mod decode;
mod model_io;
mod params;

pub use self::params::{DecodeMode, HmmDecodeOptions, HmmParams};

/// Facts recorded by training.
#[derive(Debug, Clone, PartialEq)]
pub struct HmmMetadata {
    /// Number of training sentences
    pub training_size: usize,
    /// Number of training tokens
    pub num_tokens: usize,
    /// Seconds since the Unix epoch
    pub trained_at: u64,
}

/// Estimated log-probability tables.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Tables {
    /// `[T]` sentence-initial tag
    pub initial: Array1<f64>,
    /// `[V][T]` emission of a known word
    pub emission: Array2<f64>,
    /// `[T]` emission of a word outside the vocabulary
    pub unseen: Array1<f64>,
    /// `[T+1][T+1][T]` trigram transition; index `T` is `START`
    pub transition: Array3<f64>,
}

/// The HMM tagger
#[derive(Debug, Clone, PartialEq)]
pub struct HmmTagger {
    params: HmmParams,
    tags: Dictionary,
    words: Dictionary,
    tables: Option<Tables>,
    metadata: Option<HmmMetadata>,
}

impl HmmTagger {
    /// Create an untrained tagger.
    pub fn new(params: HmmParams) -> Self {
        Self {
            params,
            tags: Dictionary::new(),
            words: Dictionary::new(),
            tables: None,
            metadata: None,
        }
    }

    pub fn params(&self) -> &HmmParams {
        &self.params
    }

    pub fn is_trained(&self) -> bool {
        self.tables.is_some()
    }

    pub fn metadata(&self) -> Option<&HmmMetadata> {
        self.metadata.as_ref()
    }

    /// Tags in id order
    pub fn tags(&self) -> Vec<&str> {
        self.tags.iter().map(|(s, _)| s).collect()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.words.len()
    }

    fn normalize<'w>(&self, word: &'w str) -> std::borrow::Cow<'w, str> {
        if self.params.lowercase() {
            word.to_lowercase().into()
        } else {
            word.into()
        }
    }

    /// Estimate the tables from `(words, tags)` pairs and return the
    /// trained tagger.
    pub fn train<W: AsRef<str>, T: AsRef<str>>(&self, data: &[(Vec<W>, Vec<T>)]) -> Result<HmmTagger> {
        if data.is_empty() {
            return Err(Error::EmptyTrainingSet);
        }
        for (index, (words, tags)) in data.iter().enumerate() {
            if words.len() != tags.len() {
                return Err(Error::LengthMismatch {
                    index,
                    tokens: words.len(),
                    labels: tags.len(),
                });
            }
            if words.is_empty() {
                return Err(Error::EmptySequence(index));
            }
        }

        let mut tags = Dictionary::new();
        let mut words = Dictionary::new();
        let mut emission_counts: HashMap<(u32, u32), f64> = HashMap::new();
        let mut trigram_counts: HashMap<(usize, usize, usize), f64> = HashMap::new();
        let mut initial_counts: HashMap<u32, f64> = HashMap::new();
        let mut num_tokens = 0;

        let mut sentences = Vec::with_capacity(data.len());
        for (ws, ts) in data {
            let mut sentence = Vec::with_capacity(ws.len());
            for (w, t) in ws.iter().zip(ts) {
                let wid = words.get_or_insert(&self.normalize(w.as_ref()));
                let tid = tags.get_or_insert(t.as_ref());
                sentence.push((wid, tid));
            }
            sentences.push(sentence);
        }

        let num_tags = tags.len();
        let start = num_tags;
        let mut tag_counts = vec![0.0; num_tags];
        for sentence in &sentences {
            *initial_counts.entry(sentence[0].1).or_insert(0.0) += 1.0;
            let (mut prev2, mut prev1) = (start, start);
            for &(wid, tid) in sentence {
                *emission_counts.entry((wid, tid)).or_insert(0.0) += 1.0;
                tag_counts[tid as usize] += 1.0;
                *trigram_counts.entry((prev2, prev1, tid as usize)).or_insert(0.0) += 1.0;
                prev2 = prev1;
                prev1 = tid as usize;
                num_tokens += 1;
            }
        }

        let k = self.params.smoothing();
        let v = words.len() as f64;
        let t = num_tags as f64;

        let n = sentences.len() as f64;
        let initial = Array1::from_shape_fn(num_tags, |tid| {
            let c = initial_counts.get(&(tid as u32)).copied().unwrap_or(0.0);
            ((c + k) / (n + k * t)).ln()
        });

        let mut emission = Array2::zeros((words.len(), num_tags));
        for ((wid, tid), value) in emission.indexed_iter_mut() {
            let c = emission_counts
                .get(&(wid as u32, tid as u32))
                .copied()
                .unwrap_or(0.0);
            *value = ((c + k) / (tag_counts[tid] + k * v)).ln();
        }
        let unseen = Array1::from_shape_fn(num_tags, |tid| (k / (tag_counts[tid] + k * v)).ln());

        let mut context_counts: HashMap<(usize, usize), f64> = HashMap::new();
        for (&(a, b, _), &c) in &trigram_counts {
            *context_counts.entry((a, b)).or_insert(0.0) += c;
        }
        let transition = Array3::from_shape_fn((num_tags + 1, num_tags + 1, num_tags), |(a, b, c)| {
            let tri = trigram_counts.get(&(a, b, c)).copied().unwrap_or(0.0);
            let ctx = context_counts.get(&(a, b)).copied().unwrap_or(0.0);
            ((tri + k) / (ctx + k * t)).ln()
        });

        debug!(
            "{} sentences, {} tokens, {} tags, {} word types",
            sentences.len(),
            num_tokens,
            num_tags,
            words.len()
        );

        let trained_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Ok(HmmTagger {
            params: self.params.clone(),
            tags,
            words,
            tables: Some(Tables {
                initial,
                emission,
                unseen,
                transition,
            }),
            metadata: Some(HmmMetadata {
                training_size: data.len(),
                num_tokens,
                trained_at,
            }),
        })
    }

    fn tables(&self) -> Result<&Tables> {
        self.tables
            .as_ref()
            .ok_or_else(|| Error::invalid_model("model is not trained"))
    }

    /// Log emission scores `[n][T]` of a word sequence.
    fn emissions<W: AsRef<str>>(&self, tables: &Tables, words: &[W]) -> Array2<f64> {
        let mut out = Array2::zeros((words.len(), self.tags.len()));
        for (i, w) in words.iter().enumerate() {
            let row = match self.words.get(&self.normalize(w.as_ref())) {
                Some(wid) => tables.emission.row(wid as usize),
                None => tables.unseen.view(),
            };
            out.row_mut(i).assign(&row);
        }
        out
    }

    /// Predict the tag sequence of `words`.
    pub fn predict<W: AsRef<str>>(&self, words: &[W], opts: &HmmDecodeOptions) -> Result<Vec<String>> {
        let (tags, _) = self.predict_with_score(words, opts)?;
        Ok(tags.into_iter().map(str::to_string).collect())
    }

    /// Predict the tag sequence together with the log score the selected
    /// decoder assigned to it. Only [`DecodeMode::ExactTrigram`] yields the
    /// joint log probability of words and tags.
    pub fn predict_with_score<W: AsRef<str>>(
        &self,
        words: &[W],
        opts: &HmmDecodeOptions,
    ) -> Result<(Vec<&str>, f64)> {
        let tables = self.tables()?;
        let emissions = self.emissions(tables, words);
        let (ids, score) = match opts.mode {
            DecodeMode::Approximate => decode::approximate(tables, &emissions),
            DecodeMode::ExactTrigram => decode::exact(tables, &emissions),
        };
        let tags = ids
            .into_iter()
            .map(|id| self.tags.get_name(id).unwrap_or_default())
            .collect();
        Ok((tags, score))
    }

    /// Tag every sentence of `data` and compare with the gold tags.
    pub fn evaluate<W: AsRef<str>, T: AsRef<str>>(
        &self,
        data: &[(Vec<W>, Vec<T>)],
        opts: &HmmDecodeOptions,
    ) -> Result<Evaluation> {
        let mut ev = Evaluation::new();
        for (index, (words, gold)) in data.iter().enumerate() {
            if words.len() != gold.len() {
                return Err(Error::LengthMismatch {
                    index,
                    tokens: words.len(),
                    labels: gold.len(),
                });
            }
            let (predicted, _) = self.predict_with_score(words, opts)?;
            ev.accumulate(gold, &predicted);
        }
        ev.finalize();
        Ok(ev)
    }

    /// `P(word | tag)`; `None` for an unknown tag or an untrained model.
    pub fn emission_prob(&self, word: &str, tag: &str) -> Option<f64> {
        let tables = self.tables.as_ref()?;
        let tid = self.tags.get(tag)? as usize;
        let log_p = match self.words.get(&self.normalize(word)) {
            Some(wid) => tables.emission[[wid as usize, tid]],
            None => tables.unseen[tid],
        };
        Some(log_p.exp())
    }

    /// `P(tag | prev2, prev1)`, where `None` stands for the `START` padding.
    pub fn transition_prob(&self, prev2: Option<&str>, prev1: Option<&str>, tag: &str) -> Option<f64> {
        let tables = self.tables.as_ref()?;
        let start = self.tags.len();
        let index = |t: Option<&str>| match t {
            Some(t) => self.tags.get(t).map(|id| id as usize),
            None => Some(start),
        };
        let a = index(prev2)?;
        let b = index(prev1)?;
        let c = self.tags.get(tag)? as usize;
        Some(tables.transition[[a, b, c]].exp())
    }

    /// `P(tag)` at the start of a sentence.
    pub fn initial_prob(&self, tag: &str) -> Option<f64> {
        let tables = self.tables.as_ref()?;
        let tid = self.tags.get(tag)? as usize;
        Some(tables.initial[tid].exp())
    }
}

impl Default for HmmTagger {
    fn default() -> Self {
        Self::new(HmmParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_det_noun() {
        let data = vec![(vec!["the", "cat"], vec!["det", "noun"])];
        let hmm = HmmTagger::default().train(&data).unwrap();
        let opts = HmmDecodeOptions::default();
        assert_eq!(hmm.predict(&["the", "cat"], &opts).unwrap(), vec!["det", "noun"]);
        assert_eq!(
            hmm.predict(&["the", "cat"], &HmmDecodeOptions::exact()).unwrap(),
            vec!["det", "noun"]
        );
        assert!((hmm.emission_prob("the", "det").unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert!((hmm.initial_prob("det").unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert!((hmm.transition_prob(None, Some("det"), "noun").unwrap() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_probabilities_are_positive_and_normalized() {
        let data = vec![
            (vec!["the", "cat", "sleeps"], vec!["det", "noun", "verb"]),
            (vec!["a", "dog", "barks"], vec!["det", "noun", "verb"]),
        ];
        let hmm = HmmTagger::default().train(&data).unwrap();
        let tags = hmm.tags();
        for word in ["the", "zebra", ""] {
            for tag in &tags {
                assert!(hmm.emission_prob(word, tag).unwrap() > 0.0);
            }
        }
        let contexts = [None, Some("det"), Some("noun"), Some("verb")];
        for a in contexts {
            for b in contexts {
                let sum: f64 = tags
                    .iter()
                    .map(|t| hmm.transition_prob(a, b, t).unwrap())
                    .inspect(|&p| assert!(p > 0.0))
                    .sum();
                assert!((sum - 1.0).abs() < 1e-12);
            }
        }
        let sum: f64 = tags.iter().map(|t| hmm.initial_prob(t).unwrap()).sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert_eq!(hmm.emission_prob("the", "adj"), None);
    }

    #[test]
    fn test_untrained_and_invalid_input() {
        let hmm = HmmTagger::default();
        assert!(hmm.predict(&["x"], &HmmDecodeOptions::default()).is_err());
        let empty: Vec<(Vec<&str>, Vec<&str>)> = Vec::new();
        assert!(matches!(hmm.train(&empty), Err(Error::EmptyTrainingSet)));
        let bad = vec![(vec!["a", "b"], vec!["x"])];
        assert!(matches!(hmm.train(&bad), Err(Error::LengthMismatch { .. })));
    }

    #[test]
    fn test_smoothing_constant() {
        let mut params = HmmParams::default();
        params.set_smoothing(0.5).unwrap();
        let data = vec![(vec!["the", "cat"], vec!["det", "noun"])];
        let hmm = HmmTagger::new(params).train(&data).unwrap();
        assert!((hmm.emission_prob("the", "det").unwrap() - 0.75).abs() < 1e-12);
        assert!((hmm.emission_prob("dog", "det").unwrap() - 0.25).abs() < 1e-12);
        assert!((hmm.initial_prob("det").unwrap() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_lowercase() {
        let mut params = HmmParams::default();
        params.set_lowercase(true);
        let data = vec![(vec!["The", "cat"], vec!["det", "noun"])];
        let hmm = HmmTagger::new(params).train(&data).unwrap();
        assert_eq!(hmm.vocabulary_size(), 2);
        assert_eq!(hmm.emission_prob("THE", "det"), hmm.emission_prob("the", "det"));
    }
}
