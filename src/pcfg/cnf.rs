//! Chomsky normal form
//!
//! Rules longer than two symbols are binarized right to left into
//! intermediate `A|<B-C>` symbols with probability one, and terminals that
//! share a right-hand side with other symbols get a `TERM_<w>` pre-terminal.
//! Unary rules between non-terminals are kept; the parser closes over them.

use std::collections::HashMap;

use log::debug;

use super::grammar::{Grammar, Symbol};
use crate::dictionary::Dictionary;
use crate::errors::{Error, Result};

/// What a compiled symbol stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SymbolKind {
    /// A symbol of the source grammar
    Plain,
    /// A symbol introduced by binarization
    Intermediate,
    /// A `TERM_<w>` pre-terminal wrapping one word
    Term,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BinaryRule {
    pub lhs: u32,
    pub left: u32,
    pub right: u32,
    pub log_prob: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct UnaryRule {
    pub lhs: u32,
    pub child: u32,
    pub log_prob: f64,
}

/// A grammar compiled for chart parsing.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CnfGrammar {
    pub symbols: Dictionary,
    pub kinds: Vec<SymbolKind>,
    pub start: u32,
    pub binary: Vec<BinaryRule>,
    /// Binary rule indices by left child
    pub binary_by_left: HashMap<u32, Vec<usize>>,
    pub unary: Vec<UnaryRule>,
    /// Unary rule indices by child
    pub unary_by_child: HashMap<u32, Vec<usize>>,
    /// Word → `(pre-terminal, log P(word | pre-terminal))`
    pub lexical: HashMap<String, Vec<(u32, f64)>>,
    /// Log probability of an unseen word under each plain pre-terminal
    pub unknown: HashMap<u32, f64>,
}

struct Builder {
    symbols: Dictionary,
    kinds: Vec<SymbolKind>,
    binary: HashMap<(u32, u32, u32), f64>,
    unary: HashMap<(u32, u32), f64>,
    lexical: HashMap<String, HashMap<u32, f64>>,
}

impl Builder {
    fn symbol(&mut self, name: &str, kind: SymbolKind) -> u32 {
        let id = self.symbols.get_or_insert(name);
        if id as usize == self.kinds.len() {
            self.kinds.push(kind);
        }
        id
    }

    /// Merge a rule into `table`, summing the probabilities of duplicates.
    fn add<K: std::hash::Hash + Eq>(table: &mut HashMap<K, f64>, key: K, prob: f64) {
        *table.entry(key).or_insert(0.0) += prob;
    }

    fn item(&mut self, sym: &Symbol) -> u32 {
        match sym {
            Symbol::NonTerminal(name) => self.symbol(name, SymbolKind::Plain),
            Symbol::Terminal(word) => {
                let id = self.symbol(&format!("TERM_{}", word), SymbolKind::Term);
                self.lexical
                    .entry(word.clone())
                    .or_default()
                    .insert(id, 1.0);
                id
            }
        }
    }
}

impl CnfGrammar {
    /// Compile `grammar`. Without `binarize`, a rule that is not already
    /// binary, unary or lexical is an error.
    pub fn compile(grammar: &Grammar, binarize: bool) -> Result<CnfGrammar> {
        let mut b = Builder {
            symbols: Dictionary::new(),
            kinds: Vec::new(),
            binary: HashMap::new(),
            unary: HashMap::new(),
            lexical: HashMap::new(),
        };
        // Source symbols first so their ids are stable
        for lhs in grammar.nonterminals() {
            b.symbol(lhs, SymbolKind::Plain);
        }

        for rule in grammar.rules() {
            let lhs = b.symbol(&rule.lhs, SymbolKind::Plain);
            match rule.rhs.as_slice() {
                [] => {
                    return Err(Error::InvalidGrammar(format!(
                        "rule for `{}` has no right-hand side",
                        rule.lhs
                    )))
                }
                [Symbol::Terminal(word)] => {
                    Builder::add(b.lexical.entry(word.clone()).or_default(), lhs, rule.prob);
                }
                [Symbol::NonTerminal(child)] => {
                    let child = b.symbol(child, SymbolKind::Plain);
                    Builder::add(&mut b.unary, (lhs, child), rule.prob);
                }
                [left, right] => {
                    if !binarize && (left.is_terminal() || right.is_terminal()) {
                        return Err(Error::InvalidGrammar(format!("`{}` is not in Chomsky normal form", rule)));
                    }
                    let left = b.item(left);
                    let right = b.item(right);
                    Builder::add(&mut b.binary, (lhs, left, right), rule.prob);
                }
                rhs => {
                    if !binarize {
                        return Err(Error::InvalidGrammar(format!("`{}` is not in Chomsky normal form", rule)));
                    }
                    let ids: Vec<u32> = rhs.iter().map(|sym| b.item(sym)).collect();
                    // A -> X1 A|<X2-..-Xn>, A|<X2-..-Xn> -> X2 A|<X3-..-Xn>, ...
                    let mut parent = lhs;
                    let mut prob = rule.prob;
                    for i in 0..ids.len() - 2 {
                        let rest: Vec<&str> = rhs[i + 1..].iter().map(Symbol::name).collect();
                        let name = format!("{}|<{}>", rule.lhs, rest.join("-"));
                        let child = b.symbol(&name, SymbolKind::Intermediate);
                        Builder::add(&mut b.binary, (parent, ids[i], child), prob);
                        parent = child;
                        prob = 1.0;
                    }
                    let n = ids.len();
                    Builder::add(&mut b.binary, (parent, ids[n - 2], ids[n - 1]), prob);
                }
            }
        }

        let start = b
            .symbols
            .get(grammar.start_symbol())
            .ok_or_else(|| Error::InvalidGrammar("start symbol has no rules".to_string()))?;

        // Intermediate rules reached from several source rules are shared, their
        // summed probability is capped back to one
        let mut binary: Vec<BinaryRule> = b
            .binary
            .into_iter()
            .map(|((lhs, left, right), prob)| {
                let prob = if b.kinds[lhs as usize] == SymbolKind::Intermediate {
                    1.0
                } else {
                    prob
                };
                BinaryRule {
                    lhs,
                    left,
                    right,
                    log_prob: prob.ln(),
                }
            })
            .collect();
        binary.sort_by_key(|r| (r.lhs, r.left, r.right));
        let mut binary_by_left: HashMap<u32, Vec<usize>> = HashMap::new();
        for (i, rule) in binary.iter().enumerate() {
            binary_by_left.entry(rule.left).or_default().push(i);
        }

        let mut unary: Vec<UnaryRule> = b
            .unary
            .into_iter()
            .map(|((lhs, child), prob)| UnaryRule {
                lhs,
                child,
                log_prob: prob.ln(),
            })
            .collect();
        unary.sort_by_key(|r| (r.lhs, r.child));
        let mut unary_by_child: HashMap<u32, Vec<usize>> = HashMap::new();
        for (i, rule) in unary.iter().enumerate() {
            unary_by_child.entry(rule.child).or_default().push(i);
        }

        let mut lexical: HashMap<String, Vec<(u32, f64)>> = HashMap::new();
        for (word, entries) in b.lexical {
            let mut entries: Vec<(u32, f64)> = entries
                .into_iter()
                .map(|(sym, prob)| (sym, prob.min(1.0).ln()))
                .collect();
            entries.sort_by_key(|&(sym, _)| sym);
            lexical.insert(word, entries);
        }

        // Unseen words: one extra pseudo-count shared with the known words
        let k = if grammar.smoothing() > 0.0 {
            grammar.smoothing()
        } else {
            1.0
        };
        let mut unknown = HashMap::new();
        for lhs in grammar.nonterminals() {
            if !grammar.is_preterminal(lhs) {
                continue;
            }
            if let Some(id) = b.symbols.get(lhs) {
                let (total, n) = grammar.lhs_total(lhs);
                unknown.insert(id, (k / (total + k * (n as f64 + 1.0))).ln());
            }
        }

        debug!(
            "compiled grammar: {} symbols, {} binary, {} unary, {} words",
            b.symbols.len(),
            binary.len(),
            unary.len(),
            lexical.len()
        );
        Ok(CnfGrammar {
            symbols: b.symbols,
            kinds: b.kinds,
            start,
            binary,
            binary_by_left,
            unary,
            unary_by_child,
            lexical,
            unknown,
        })
    }

    pub fn name(&self, id: u32) -> &str {
        self.symbols.get_name(id).unwrap_or_default()
    }

    pub fn kind(&self, id: u32) -> SymbolKind {
        self.kinds
            .get(id as usize)
            .copied()
            .unwrap_or(SymbolKind::Plain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grammar() -> Grammar {
        let nt = |s: &str| Symbol::NonTerminal(s.to_string());
        let t = |s: &str| Symbol::Terminal(s.to_string());
        Grammar::from_counts(
            vec![
                ("S".to_string(), vec![nt("NP"), nt("VP"), nt("PP")], 1.0),
                ("NP".to_string(), vec![t("the"), nt("N")], 1.0),
                ("N".to_string(), vec![t("cat")], 1.0),
                ("VP".to_string(), vec![nt("V")], 1.0),
                ("V".to_string(), vec![t("sat")], 1.0),
                ("PP".to_string(), vec![t("here")], 1.0),
            ],
            0.0,
            "S",
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_binarize() {
        let cnf = CnfGrammar::compile(&grammar(), true).unwrap();
        let inter = cnf.symbols.get("S|<VP-PP>").unwrap();
        assert_eq!(cnf.kind(inter), SymbolKind::Intermediate);
        let term = cnf.symbols.get("TERM_the").unwrap();
        assert_eq!(cnf.kind(term), SymbolKind::Term);
        assert_eq!(cnf.binary.len(), 3);
        assert_eq!(cnf.unary.len(), 1);
        assert_eq!(cnf.name(cnf.start), "S");
        // "the" is only produced by its TERM_ wrapper, which is not open to unseen words
        assert_eq!(cnf.lexical["the"], vec![(term, 0.0)]);
        assert!(!cnf.unknown.contains_key(&term));
        assert!(cnf.unknown.contains_key(&cnf.symbols.get("N").unwrap()));
    }

    #[test]
    fn test_requires_cnf_without_binarize() {
        assert!(matches!(
            CnfGrammar::compile(&grammar(), false),
            Err(Error::InvalidGrammar(_))
        ));
    }
}
