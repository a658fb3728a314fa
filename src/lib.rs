//! Pure Rust statistical sequence labelling and parsing
//!
//! This library provides three models that share one token type, one error
//! type and one persistence style:
//!
//! * [`CrfModel`]: a linear-chain conditional random field trained by
//!   gradient descent over forward-backward statistics
//! * [`HmmTagger`]: a trigram hidden Markov model with add-k smoothing
//! * [`PcfgModel`]: a probabilistic context-free grammar parsed with CYK
//!
//! Training never mutates a model; `train` returns a new one.
//!
//! # Examples
//!
//! ## CRF
//!
//! ```no_run
//! use stattag::{tokens, CrfModel, CrfParams};
//!
//! let data = vec![
//!     (tokens(["John", "lives", "in", "Paris"]), vec!["PER", "O", "O", "LOC"]),
//!     (tokens(["Mary", "visited", "London"]), vec!["PER", "O", "LOC"]),
//! ];
//! let mut params = CrfParams::default();
//! params.set("max_iterations", "50")?;
//!
//! let model = CrfModel::new(Vec::<String>::new(), Some("en")).train(&data, &params)?;
//! model.save("ner.crf")?;
//! let labels = model.predict(&tokens(["Anna", "lives", "in", "Berlin"]))?;
//! # Ok::<(), stattag::Error>(())
//! ```
//!
//! ## HMM
//!
//! ```
//! use stattag::{HmmDecodeOptions, HmmTagger};
//!
//! let data = vec![(vec!["the", "cat"], vec!["det", "noun"])];
//! let hmm = HmmTagger::default().train(&data)?;
//! let tags = hmm.predict(&["the", "cat"], &HmmDecodeOptions::default())?;
//! assert_eq!(tags, vec!["det", "noun"]);
//! # Ok::<(), stattag::Error>(())
//! ```
//!
//! ## PCFG
//!
//! ```
//! use stattag::{tokens, ParseOptions, PcfgModel, PcfgParams, Grammar};
//!
//! let grammar = Grammar::from_text(
//!     "S -> NP VP\nNP -> 'cats'\nVP -> 'sleep'",
//!     1.0,
//!     "S",
//!     None,
//! )?;
//! let model = PcfgModel::from_grammar(grammar, PcfgParams::default())?;
//! let parse = model.predict(&tokens(["cats", "sleep"]), &ParseOptions::default())?;
//! assert_eq!(parse.unwrap().tree.to_string(), "(S (NP cats) (VP sleep))");
//! # Ok::<(), stattag::Error>(())
//! ```

mod codec;
mod dictionary;
mod errors;
mod evaluation;
mod token;

/// Linear-chain conditional random fields
pub mod crf;
/// Token feature extraction
pub mod features;
/// Trigram hidden Markov model tagging
pub mod hmm;
/// Log-space Viterbi and forward-backward
pub mod lattice;
/// Gradient descent and weight tables
pub mod optim;
pub mod pcfg;

pub use self::crf::{CrfModel, CrfParams, Metadata, Tagger};
pub use self::errors::{Error, Result};
pub use self::evaluation::{Evaluation, LabelMeasure};
pub use self::features::{ExtractOptions, Families};
pub use self::hmm::{DecodeMode, HmmDecodeOptions, HmmMetadata, HmmParams, HmmTagger};
pub use self::optim::{NestedWeights, OptimizerParams, StopReason};
pub use self::pcfg::{
    Grammar, GrammarCache, Parse, ParseMetrics, ParseOptions, PcfgData, PcfgMetadata, PcfgModel,
    PcfgParams, Tree,
};
pub use self::token::{tokens, Token};
