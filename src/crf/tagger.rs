use ndarray::Array2;

use super::CrfModel;
use crate::errors::{Error, Result};
use crate::features::extract_sequence;
use crate::lattice::Lattice;
use crate::token::Token;

/// The tagger provides the functionality for predicting label sequences for token sequences using a model
///
/// Taggers borrow the model read-only, so any number of them may run
/// concurrently against one trained model.
#[derive(Debug, Clone)]
pub struct Tagger<'a> {
    /// CRF model
    model: &'a CrfModel,
    /// Transition scores, computed once per tagger
    trans: Array2<f64>,
}

impl<'a> Tagger<'a> {
    pub(crate) fn new(model: &'a CrfModel) -> Self {
        let trans = model.fgen.transition_scores(&model.fgen.weights);
        Self { model, trans }
    }

    /// Build the score lattice of `tokens`; feature strings unknown to the
    /// model are ignored.
    fn lattice(&self, tokens: &[Token]) -> Result<Lattice> {
        if self.model.labels.is_empty() {
            return Err(Error::invalid_model("model has no labels"));
        }
        let model = self.model;
        let items: Vec<Vec<u32>> = extract_sequence(tokens, &model.extract)
            .iter()
            .map(|set| set.iter().filter_map(|f| model.attrs.get(f)).collect())
            .collect();
        let state = model.fgen.state_scores(&items, &model.fgen.weights);
        Ok(Lattice::from_scores(state, self.trans.clone()))
    }

    fn names(&self, ids: &[u32]) -> Vec<&'a str> {
        ids.iter().map(|&id| self.model.label_name(id)).collect()
    }

    /// Predict the label sequence for the token sequence.
    pub fn tag(&self, tokens: &[Token]) -> Result<Vec<&'a str>> {
        self.tag_with_score(tokens).map(|(labels, _)| labels)
    }

    /// Predict the label sequence together with its unnormalized log score.
    pub fn tag_with_score(&self, tokens: &[Token]) -> Result<(Vec<&'a str>, f64)> {
        let lattice = self.lattice(tokens)?;
        let (ids, score) = lattice.viterbi();
        Ok((self.names(&ids), score))
    }

    /// Per-position label probabilities, a `[T][L]` matrix whose columns
    /// follow [`CrfModel::labels`].
    pub fn marginals(&self, tokens: &[Token]) -> Result<Array2<f64>> {
        let lattice = self.lattice(tokens)?;
        Ok(lattice.forward_backward().state_marginals())
    }

    /// Conditional probability of `labels` given `tokens`.
    pub fn probability<S: AsRef<str>>(&self, tokens: &[Token], labels: &[S]) -> Result<f64> {
        if tokens.len() != labels.len() {
            return Err(Error::LengthMismatch {
                index: 0,
                tokens: tokens.len(),
                labels: labels.len(),
            });
        }
        let mut ids = Vec::with_capacity(labels.len());
        for label in labels {
            let label = label.as_ref();
            let id = self
                .model
                .labels
                .get(label)
                .ok_or_else(|| Error::UnknownLabel(label.to_string()))?;
            ids.push(id);
        }
        let lattice = self.lattice(tokens)?;
        let log_z = Lattice::partition_function(&lattice.forward());
        Ok((lattice.path_score(&ids) - log_z).exp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crf::CrfParams;
    use crate::token::tokens;

    fn model() -> CrfModel {
        let data = vec![
            (tokens(["The", "dog", "barks"]), vec!["DET", "NOUN", "VERB"]),
            (tokens(["A", "cat", "sleeps"]), vec!["DET", "NOUN", "VERB"]),
        ];
        let mut params = CrfParams::default();
        params.set("max_iterations", "30").unwrap();
        CrfModel::new(Vec::<String>::new(), None)
            .train(&data, &params)
            .unwrap()
    }

    #[test]
    fn test_tag() {
        let model = model();
        let tagger = model.tagger();
        assert_eq!(
            tagger.tag(&tokens(["The", "dog", "barks"])).unwrap(),
            vec!["DET", "NOUN", "VERB"]
        );
        assert!(tagger.tag(&[]).unwrap().is_empty());
        let (_, score) = tagger.tag_with_score(&[]).unwrap();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_marginals_and_probability() {
        let model = model();
        let tagger = model.tagger();
        let toks = tokens(["A", "dog", "sleeps"]);
        let m = tagger.marginals(&toks).unwrap();
        assert_eq!(m.dim(), (3, 3));
        for row in m.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }

        let p = tagger.probability(&toks, &["DET", "NOUN", "VERB"]).unwrap();
        assert!(p > 0.0 && p <= 1.0);
        let q = tagger.probability(&toks, &["VERB", "VERB", "VERB"]).unwrap();
        assert!(q < p);
        assert!(tagger.probability(&toks, &["DET"]).is_err());
        assert!(matches!(
            tagger.probability(&toks, &["DET", "NOUN", "ADJ"]),
            Err(Error::UnknownLabel(_))
        ));
    }

    #[test]
    fn test_model_without_labels() {
        let model = CrfModel::new(Vec::<String>::new(), None);
        assert!(model.tagger().tag(&tokens(["x"])).is_err());
    }
}
