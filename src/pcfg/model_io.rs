use std::fs;
use std::path::Path;

use super::cnf::CnfGrammar;
use super::{Grammar, PcfgMetadata, PcfgModel, PcfgParams, Rule, Symbol};
use crate::codec::{Decoder, Encoder};
use crate::errors::{Error, Result};

const MAGIC: &[u8; 4] = b"sPCF";
const VERSION: u32 = 1;

const NON_TERMINAL: u32 = 0;
const TERMINAL: u32 = 1;

fn write_rule(enc: &mut Encoder, rule: &Rule) -> Result<()> {
    enc.str(&rule.lhs)?;
    enc.len_u32(rule.rhs.len())?;
    for sym in &rule.rhs {
        match sym {
            Symbol::NonTerminal(s) => {
                enc.u32(NON_TERMINAL);
                enc.str(s)?;
            }
            Symbol::Terminal(s) => {
                enc.u32(TERMINAL);
                enc.str(s)?;
            }
        }
    }
    enc.f64(rule.prob);
    enc.f64(rule.count);
    enc.opt_str(rule.language.as_deref())
}

fn read_rule(dec: &mut Decoder<'_>) -> Result<Rule> {
    let lhs = dec.str()?;
    let len = dec.u32()?;
    let mut rhs = Vec::new();
    for _ in 0..len {
        let sym = match dec.u32()? {
            NON_TERMINAL => Symbol::NonTerminal(dec.str()?),
            TERMINAL => Symbol::Terminal(dec.str()?),
            kind => return Err(Error::invalid_model(format!("unknown symbol kind {}", kind))),
        };
        rhs.push(sym);
    }
    let prob = dec.f64()?;
    if !(prob > 0.0 && prob <= 1.0) {
        return Err(Error::invalid_model(format!("rule probability {} out of range", prob)));
    }
    Ok(Rule {
        lhs,
        rhs,
        prob,
        count: dec.f64()?,
        language: dec.opt_str()?,
    })
}

impl PcfgModel {
    /// Serialize the model. The compiled chart grammar is rebuilt on load.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut enc = Encoder::new();
        enc.bytes(MAGIC);
        enc.u32(VERSION);
        enc.f64(self.params.smoothing());
        enc.str(self.params.start_symbol())?;
        enc.u32(self.params.cnf() as u32);
        enc.opt_str(self.params.language())?;
        match &self.grammar {
            Some(grammar) => {
                enc.u32(1);
                enc.str(grammar.start_symbol())?;
                enc.f64(grammar.smoothing());
                enc.opt_str(grammar.language())?;
                enc.len_u32(grammar.len())?;
                for rule in grammar.rules() {
                    write_rule(&mut enc, rule)?;
                }
            }
            None => enc.u32(0),
        }
        match &self.metadata {
            Some(meta) => {
                enc.u32(1);
                enc.u64(meta.training_size as u64);
                enc.u64(meta.num_rules as u64);
                enc.u64(meta.trained_at);
            }
            None => enc.u32(0),
        }
        Ok(enc.buf)
    }

    /// Deserialize a model written by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(buf);
        dec.header(MAGIC, VERSION)?;
        let mut params = PcfgParams::default();
        let invalid = |e: Error| Error::invalid_model(e.to_string());
        params.set_smoothing(dec.f64()?).map_err(invalid)?;
        params.set_start_symbol(dec.str()?).map_err(invalid)?;
        params.set_cnf(dec.u32()? != 0);
        params.set_language(dec.opt_str()?);

        let grammar = match dec.u32()? {
            0 => None,
            _ => {
                let start = dec.str()?;
                let smoothing = dec.f64()?;
                let language = dec.opt_str()?;
                let len = dec.u32()?;
                let mut rules = Vec::new();
                for _ in 0..len {
                    rules.push(read_rule(&mut dec)?);
                }
                Some(Grammar::from_rules(rules, start, smoothing, language).map_err(invalid)?)
            }
        };
        let compiled = match &grammar {
            Some(grammar) => Some(CnfGrammar::compile(grammar, params.cnf()).map_err(invalid)?),
            None => None,
        };
        let metadata = match dec.u32()? {
            0 => None,
            _ => Some(PcfgMetadata {
                training_size: dec.u64()? as usize,
                num_rules: dec.u64()? as usize,
                trained_at: dec.u64()?,
            }),
        };

        Ok(Self {
            params,
            grammar,
            compiled,
            metadata,
        })
    }

    /// Write the model to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    /// Read a model from `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let buf = fs::read(path)?;
        Self::from_bytes(&buf)
    }
}
