use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;

use super::grammar::Grammar;
use super::params::PcfgParams;
use crate::errors::Result;

/// Grammars read from text files, keyed by canonical path.
///
/// Every grammar is estimated with the cache's parameters. Owners decide
/// how the cache is shared; loaded grammars are handed out as `Arc`s.
#[derive(Debug, Default)]
pub struct GrammarCache {
    params: PcfgParams,
    entries: HashMap<PathBuf, Arc<Grammar>>,
}

impl GrammarCache {
    pub fn new(params: PcfgParams) -> Self {
        Self {
            params,
            entries: HashMap::new(),
        }
    }

    /// Return the grammar at `path`, reading and estimating it on first use.
    pub fn get_or_load<P: AsRef<Path>>(&mut self, path: P) -> Result<Arc<Grammar>> {
        let key = fs::canonicalize(path.as_ref())?;
        if let Some(grammar) = self.entries.get(&key) {
            return Ok(Arc::clone(grammar));
        }
        let text = fs::read_to_string(&key)?;
        let grammar = Arc::new(Grammar::from_text(
            &text,
            self.params.smoothing(),
            self.params.start_symbol(),
            self.params.language(),
        )?);
        debug!("loaded grammar {} ({} rules)", key.display(), grammar.len());
        self.entries.insert(key, Arc::clone(&grammar));
        Ok(grammar)
    }

    pub fn contains<P: AsRef<Path>>(&self, path: P) -> bool {
        fs::canonicalize(path.as_ref())
            .map(|key| self.entries.contains_key(&key))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
