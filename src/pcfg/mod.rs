//! Probabilistic context-free grammar and CYK parsing
//!
//! A [`PcfgModel`] is estimated from weighted rules or from parsed
//! sentences, compiled into Chomsky normal form and queried with a beam
//! bounded CYK chart. Queries never modify the grammar: words the lexicon
//! does not know are scored against every pre-terminal with the smoothed
//! unknown-word probability of that pre-terminal.

use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, warn};

use crate::errors::{Error, Result};
use crate::token::Token;

mod cache;
mod cnf;
mod cyk;
mod eval;
mod grammar;
mod model_io;
mod params;
mod tree;

pub use self::cache::GrammarCache;
pub use self::eval::ParseMetrics;
pub use self::grammar::{Grammar, Rule, Symbol};
pub use self::params::{ParseOptions, PcfgParams};
pub use self::tree::Tree;

use self::cnf::CnfGrammar;

/// Training data for [`PcfgModel::train`].
#[derive(Debug, Clone, PartialEq)]
pub enum PcfgData {
    /// Weighted `(lhs, rhs, count)` productions. A right-hand-side symbol
    /// that never appears as a left-hand side is a terminal.
    Rules(Vec<(String, Vec<String>, f64)>),
    /// Sentences with their gold trees
    Trees(Vec<(Vec<Token>, Tree)>),
}

impl PcfgData {
    fn len(&self) -> usize {
        match self {
            PcfgData::Rules(rules) => rules.len(),
            PcfgData::Trees(trees) => trees.len(),
        }
    }

    fn counts(&self) -> Result<Vec<(String, Vec<Symbol>, f64)>> {
        match self {
            PcfgData::Rules(rules) => {
                let lhs: BTreeSet<&str> = rules.iter().map(|(lhs, _, _)| lhs.as_str()).collect();
                Ok(rules
                    .iter()
                    .map(|(l, rhs, count)| {
                        let rhs = rhs
                            .iter()
                            .map(|s| {
                                if lhs.contains(s.as_str()) {
                                    Symbol::NonTerminal(s.clone())
                                } else {
                                    Symbol::Terminal(s.clone())
                                }
                            })
                            .collect();
                        (l.clone(), rhs, *count)
                    })
                    .collect())
            }
            PcfgData::Trees(trees) => {
                let mut counts = Vec::new();
                for (index, (tokens, tree)) in trees.iter().enumerate() {
                    if tree.is_leaf() {
                        return Err(Error::InvalidTree(format!("example {}: root is a bare word", index)));
                    }
                    let leaves = tree.leaves().len();
                    if leaves != tokens.len() {
                        return Err(Error::InvalidTree(format!(
                            "example {}: {} tokens but {} leaves",
                            index,
                            tokens.len(),
                            leaves
                        )));
                    }
                    collect_rules(tree, &mut counts);
                }
                Ok(counts)
            }
        }
    }
}

/// One `(parent, children)` production per node, top-down.
fn collect_rules(tree: &Tree, out: &mut Vec<(String, Vec<Symbol>, f64)>) {
    if let Tree::Node { label, children } = tree {
        let rhs = children
            .iter()
            .map(|child| match child {
                Tree::Leaf(word) => Symbol::Terminal(word.clone()),
                Tree::Node { label, .. } => Symbol::NonTerminal(label.clone()),
            })
            .collect();
        out.push((label.clone(), rhs, 1.0));
        for child in children {
            collect_rules(child, out);
        }
    }
}

/// A parse tree with its log probability.
#[derive(Debug, Clone, PartialEq)]
pub struct Parse {
    pub tree: Tree,
    pub log_prob: f64,
}

impl Parse {
    pub fn prob(&self) -> f64 {
        self.log_prob.exp()
    }
}

/// Facts recorded by training.
#[derive(Debug, Clone, PartialEq)]
pub struct PcfgMetadata {
    /// Number of training rules or trees
    pub training_size: usize,
    /// Number of distinct rules in the grammar
    pub num_rules: usize,
    /// Seconds since the Unix epoch
    pub trained_at: u64,
}

/// The PCFG parser
#[derive(Debug, Clone, PartialEq)]
pub struct PcfgModel {
    params: PcfgParams,
    grammar: Option<Grammar>,
    compiled: Option<CnfGrammar>,
    metadata: Option<PcfgMetadata>,
}

impl PcfgModel {
    /// Create an untrained model.
    pub fn new(params: PcfgParams) -> Self {
        Self {
            params,
            grammar: None,
            compiled: None,
            metadata: None,
        }
    }

    /// Wrap an existing grammar, such as one read by a [`GrammarCache`].
    pub fn from_grammar(grammar: Grammar, params: PcfgParams) -> Result<Self> {
        let compiled = CnfGrammar::compile(&grammar, params.cnf())?;
        Ok(Self {
            params,
            grammar: Some(grammar),
            compiled: Some(compiled),
            metadata: None,
        })
    }

    pub fn params(&self) -> &PcfgParams {
        &self.params
    }

    pub fn grammar(&self) -> Option<&Grammar> {
        self.grammar.as_ref()
    }

    pub fn is_trained(&self) -> bool {
        self.compiled.is_some()
    }

    pub fn metadata(&self) -> Option<&PcfgMetadata> {
        self.metadata.as_ref()
    }

    /// Estimate a grammar from `data` and return the trained model.
    pub fn train(&self, data: &PcfgData) -> Result<PcfgModel> {
        if data.len() == 0 {
            return Err(Error::EmptyTrainingSet);
        }
        let grammar = Grammar::from_counts(
            data.counts()?,
            self.params.smoothing(),
            self.params.start_symbol(),
            self.params.language(),
        )?;
        let compiled = CnfGrammar::compile(&grammar, self.params.cnf())?;
        debug!(
            "trained grammar from {} examples: {} rules",
            data.len(),
            grammar.len()
        );
        let trained_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Ok(PcfgModel {
            params: self.params.clone(),
            metadata: Some(PcfgMetadata {
                training_size: data.len(),
                num_rules: grammar.len(),
                trained_at,
            }),
            grammar: Some(grammar),
            compiled: Some(compiled),
        })
    }

    fn compiled(&self) -> Result<&CnfGrammar> {
        self.compiled
            .as_ref()
            .ok_or_else(|| Error::invalid_model("model is not trained"))
    }

    /// The most probable parse of `tokens`, or `None` when the grammar
    /// cannot derive them from the start symbol.
    pub fn predict(&self, tokens: &[Token], opts: &ParseOptions) -> Result<Option<Parse>> {
        Ok(self.predict_n_best(tokens, opts)?.into_iter().next())
    }

    /// Up to `opts.n_best()` parses of `tokens`, best first.
    pub fn predict_n_best(&self, tokens: &[Token], opts: &ParseOptions) -> Result<Vec<Parse>> {
        let compiled = self.compiled()?;
        let parses: Vec<Parse> = cyk::parse(compiled, tokens, opts)
            .into_iter()
            .map(|(tree, log_prob)| Parse { tree, log_prob })
            .collect();
        if parses.is_empty() && !tokens.is_empty() {
            warn!("no parse found for a sentence of {} tokens", tokens.len());
        }
        Ok(parses)
    }

    /// Parse every sentence of `data` and score the best trees against the
    /// gold trees.
    pub fn evaluate(&self, data: &[(Vec<Token>, Tree)], opts: &ParseOptions) -> Result<ParseMetrics> {
        let mut predicted = Vec::with_capacity(data.len());
        for (tokens, _) in data {
            predicted.push(self.predict(tokens, opts)?.map(|p| p.tree));
        }
        Ok(ParseMetrics::compute(
            data.iter()
                .zip(&predicted)
                .map(|((_, gold), pred)| (gold, pred.as_ref())),
        ))
    }
}

impl Default for PcfgModel {
    fn default() -> Self {
        Self::new(PcfgParams::default())
    }
}
