use std::str::FromStr;

use crate::errors::{Error, Result};
use crate::features::ExtractOptions;
use crate::optim::OptimizerParams;

/// CRF training parameters.
#[derive(Debug, Clone, Default)]
pub struct CrfParams {
    optimizer: OptimizerParams,
    extract: ExtractOptions,
    feature_minfreq: f64,
    possible_states: bool,
}

pub(crate) fn parse<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::invalid_param(format!("invalid value for {}: {}", name, value)))
}

impl CrfParams {
    pub fn optimizer(&self) -> &OptimizerParams {
        &self.optimizer
    }

    pub fn optimizer_mut(&mut self) -> &mut OptimizerParams {
        &mut self.optimizer
    }

    pub fn extract(&self) -> &ExtractOptions {
        &self.extract
    }

    pub fn extract_mut(&mut self) -> &mut ExtractOptions {
        &mut self.extract
    }

    /// Get minimum feature frequency
    pub fn feature_minfreq(&self) -> f64 {
        self.feature_minfreq
    }

    /// Set minimum feature frequency
    pub fn set_feature_minfreq(&mut self, feature_minfreq: f64) -> Result<()> {
        if feature_minfreq < 0.0 || feature_minfreq.is_nan() {
            return Err(Error::invalid_param("feature.minfreq must be non-negative"));
        }
        self.feature_minfreq = feature_minfreq;
        Ok(())
    }

    pub fn possible_states(&self) -> bool {
        self.possible_states
    }

    pub fn set_possible_states(&mut self, enabled: bool) {
        self.possible_states = enabled;
    }

    /// Set a parameter by name.
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        match name {
            "learning_rate" => self.optimizer.set_learning_rate(parse(name, value)?),
            "decay" => self.optimizer.set_decay(parse(name, value)?),
            "c1" => self.optimizer.set_c1(parse(name, value)?),
            "c2" => self.optimizer.set_c2(parse(name, value)?),
            "max_iterations" => self.optimizer.set_max_iterations(parse(name, value)?),
            "epsilon" => self.optimizer.set_epsilon(parse(name, value)?),
            "delta" => self.optimizer.set_delta(parse(name, value)?),
            "feature.minfreq" => self.set_feature_minfreq(parse(name, value)?),
            "feature.possible_states" => {
                self.set_possible_states(parse_bool(name, value)?);
                Ok(())
            }
            "feature.max_affix" => self.extract.set_max_affix_len(parse(name, value)?),
            "feature.gazetteer" => {
                self.extract.set_gazetteer(parse_bool(name, value)?);
                Ok(())
            }
            _ => Err(Error::UnknownParam(name.to_string())),
        }
    }

    /// Get a parameter by name.
    pub fn get(&self, name: &str) -> Result<String> {
        let value = match name {
            "learning_rate" => self.optimizer.learning_rate().to_string(),
            "decay" => self.optimizer.decay().to_string(),
            "c1" => self.optimizer.c1().to_string(),
            "c2" => self.optimizer.c2().to_string(),
            "max_iterations" => self.optimizer.max_iterations().to_string(),
            "epsilon" => self.optimizer.epsilon().to_string(),
            "delta" => self.optimizer.delta().to_string(),
            "feature.minfreq" => self.feature_minfreq.to_string(),
            "feature.possible_states" => bool_str(self.possible_states).to_string(),
            "feature.max_affix" => self.extract.max_affix_len().to_string(),
            "feature.gazetteer" => bool_str(self.extract.gazetteer()).to_string(),
            _ => return Err(Error::UnknownParam(name.to_string())),
        };
        Ok(value)
    }
}

/// Accepts `true`/`false` and `1`/`0`.
pub(crate) fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(Error::invalid_param(format!(
            "invalid value for {}: {}",
            name, value
        ))),
    }
}

pub(crate) fn bool_str(v: bool) -> &'static str {
    if v {
        "1"
    } else {
        "0"
    }
}
