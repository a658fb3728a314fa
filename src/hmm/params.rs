use crate::crf::{bool_str, parse, parse_bool};
use crate::errors::{Error, Result};

/// HMM estimation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct HmmParams {
    smoothing: f64,
    lowercase: bool,
}

impl Default for HmmParams {
    fn default() -> Self {
        Self {
            smoothing: 1.0,
            lowercase: false,
        }
    }
}

impl HmmParams {
    /// Add-k smoothing constant
    pub fn smoothing(&self) -> f64 {
        self.smoothing
    }

    pub fn set_smoothing(&mut self, smoothing: f64) -> Result<()> {
        if !(smoothing > 0.0) || !smoothing.is_finite() {
            return Err(Error::invalid_param("smoothing must be positive"));
        }
        self.smoothing = smoothing;
        Ok(())
    }

    /// Fold words to lowercase before counting and decoding
    pub fn lowercase(&self) -> bool {
        self.lowercase
    }

    pub fn set_lowercase(&mut self, lowercase: bool) {
        self.lowercase = lowercase;
    }

    /// Set a parameter by name.
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        match name {
            "smoothing" => self.set_smoothing(parse(name, value)?),
            "lowercase" => {
                self.set_lowercase(parse_bool(name, value)?);
                Ok(())
            }
            _ => Err(Error::UnknownParam(name.to_string())),
        }
    }

    /// Get a parameter by name.
    pub fn get(&self, name: &str) -> Result<String> {
        match name {
            "smoothing" => Ok(self.smoothing.to_string()),
            "lowercase" => Ok(bool_str(self.lowercase).to_string()),
            _ => Err(Error::UnknownParam(name.to_string())),
        }
    }
}

/// Trigram decoding strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeMode {
    /// Bigram lattice where the label two steps back is the best-scoring
    /// label of that column
    #[default]
    Approximate,
    /// Viterbi over label pairs, exact for the trigram model
    ExactTrigram,
}

/// HMM decoding options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HmmDecodeOptions {
    pub mode: DecodeMode,
}

impl HmmDecodeOptions {
    pub fn exact() -> Self {
        Self {
            mode: DecodeMode::ExactTrigram,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smoothing_validation() {
        let mut params = HmmParams::default();
        assert_eq!(params.smoothing(), 1.0);
        assert!(params.set_smoothing(0.0).is_err());
        assert!(params.set_smoothing(f64::NAN).is_err());
        params.set("smoothing", "0.5").unwrap();
        assert_eq!(params.get("smoothing").unwrap(), "0.5");
        params.set("lowercase", "true").unwrap();
        assert!(params.lowercase());
        assert!(matches!(params.set("c2", "1"), Err(Error::UnknownParam(_))));
    }
}
