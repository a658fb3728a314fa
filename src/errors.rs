//! Definition of errors.

use std::io;

use thiserror::Error;

/// A specialized Result type for this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type for training, decoding and model persistence.
#[derive(Debug, Error)]
pub enum Error {
    /// A parameter was given an invalid value.
    #[error("{0}")]
    InvalidParam(String),

    /// A string-keyed parameter name is not recognised.
    #[error("unknown parameter: {0}")]
    UnknownParam(String),

    /// A training example has a different number of tokens and labels.
    #[error("example {index}: {tokens} tokens but {labels} labels")]
    LengthMismatch {
        /// Position of the example in the training set.
        index: usize,
        /// Number of tokens.
        tokens: usize,
        /// Number of labels.
        labels: usize,
    },

    /// No training data was supplied.
    #[error("no training data")]
    EmptyTrainingSet,

    /// A training example has no tokens.
    #[error("example {0}: empty sequences are not allowed")]
    EmptySequence(usize),

    /// A gold label is not part of the model's label set.
    #[error("unknown label: {0}")]
    UnknownLabel(String),

    /// A training tree is malformed.
    #[error("invalid tree: {0}")]
    InvalidTree(String),

    /// A grammar is malformed.
    #[error("invalid grammar: {0}")]
    InvalidGrammar(String),

    /// A serialized model cannot be decoded.
    #[error("invalid model: {0}")]
    InvalidModel(String),

    /// An I/O error.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn invalid_param<S: Into<String>>(msg: S) -> Self {
        Self::InvalidParam(msg.into())
    }

    pub(crate) fn invalid_model<S: Into<String>>(msg: S) -> Self {
        Self::InvalidModel(msg.into())
    }
}
