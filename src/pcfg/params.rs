use crate::crf::{bool_str, parse, parse_bool};
use crate::errors::{Error, Result};

/// PCFG estimation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PcfgParams {
    smoothing: f64,
    start_symbol: String,
    cnf: bool,
    language: Option<String>,
}

impl Default for PcfgParams {
    fn default() -> Self {
        Self {
            smoothing: 1.0,
            start_symbol: "S".to_string(),
            cnf: true,
            language: None,
        }
    }
}

impl PcfgParams {
    /// Add-k constant applied to every rule count
    pub fn smoothing(&self) -> f64 {
        self.smoothing
    }

    pub fn set_smoothing(&mut self, smoothing: f64) -> Result<()> {
        if !(smoothing >= 0.0) || !smoothing.is_finite() {
            return Err(Error::invalid_param("smoothing must be non-negative"));
        }
        self.smoothing = smoothing;
        Ok(())
    }

    pub fn start_symbol(&self) -> &str {
        &self.start_symbol
    }

    pub fn set_start_symbol<S: Into<String>>(&mut self, start_symbol: S) -> Result<()> {
        let start_symbol = start_symbol.into();
        if start_symbol.trim().is_empty() {
            return Err(Error::invalid_param("start_symbol must not be empty"));
        }
        self.start_symbol = start_symbol;
        Ok(())
    }

    /// Binarize the grammar for parsing
    pub fn cnf(&self) -> bool {
        self.cnf
    }

    pub fn set_cnf(&mut self, cnf: bool) {
        self.cnf = cnf;
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn set_language<S: Into<String>>(&mut self, language: Option<S>) {
        self.language = language.map(Into::into);
    }

    /// Set a parameter by name.
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        match name {
            "smoothing" => self.set_smoothing(parse(name, value)?),
            "start_symbol" => self.set_start_symbol(value.trim()),
            "cnf" => {
                self.set_cnf(parse_bool(name, value)?);
                Ok(())
            }
            "language" => {
                let value = value.trim();
                self.set_language((!value.is_empty()).then(|| value));
                Ok(())
            }
            _ => Err(Error::UnknownParam(name.to_string())),
        }
    }

    /// Get a parameter by name.
    pub fn get(&self, name: &str) -> Result<String> {
        match name {
            "smoothing" => Ok(self.smoothing.to_string()),
            "start_symbol" => Ok(self.start_symbol.clone()),
            "cnf" => Ok(bool_str(self.cnf).to_string()),
            "language" => Ok(self.language.clone().unwrap_or_default()),
            _ => Err(Error::UnknownParam(name.to_string())),
        }
    }
}

/// Chart parsing options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    beam_width: usize,
    n_best: usize,
    max_unary_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            beam_width: 32,
            n_best: 1,
            max_unary_depth: 3,
        }
    }
}

impl ParseOptions {
    /// Maximum number of symbols kept in a chart cell
    pub fn beam_width(&self) -> usize {
        self.beam_width
    }

    pub fn set_beam_width(&mut self, beam_width: usize) -> Result<()> {
        if beam_width == 0 {
            return Err(Error::invalid_param("beam_width must be at least 1"));
        }
        self.beam_width = beam_width;
        Ok(())
    }

    /// Number of derivations kept per symbol and returned
    pub fn n_best(&self) -> usize {
        self.n_best
    }

    pub fn set_n_best(&mut self, n_best: usize) -> Result<()> {
        if n_best == 0 {
            return Err(Error::invalid_param("n_best must be at least 1"));
        }
        self.n_best = n_best;
        Ok(())
    }

    /// Rounds of unary rule application per cell
    pub fn max_unary_depth(&self) -> usize {
        self.max_unary_depth
    }

    pub fn set_max_unary_depth(&mut self, max_unary_depth: usize) {
        self.max_unary_depth = max_unary_depth;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params() {
        let mut params = PcfgParams::default();
        assert_eq!(params.start_symbol(), "S");
        params.set("start_symbol", "ROOT").unwrap();
        params.set("cnf", "false").unwrap();
        params.set("language", "de").unwrap();
        assert_eq!(params.get("start_symbol").unwrap(), "ROOT");
        assert_eq!(params.get("cnf").unwrap(), "0");
        assert_eq!(params.language(), Some("de"));
        assert!(params.set("smoothing", "-1").is_err());
        assert!(params.set("start_symbol", " ").is_err());
        assert!(matches!(params.get("beam"), Err(Error::UnknownParam(_))));
    }

    #[test]
    fn test_parse_options() {
        let mut opts = ParseOptions::default();
        assert_eq!(opts.beam_width(), 32);
        assert!(opts.set_beam_width(0).is_err());
        assert!(opts.set_n_best(0).is_err());
        opts.set_n_best(5).unwrap();
        assert_eq!(opts.n_best(), 5);
    }
}
