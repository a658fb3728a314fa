//! Probabilistic CYK chart parser
//!
//! Cells hold, for each symbol, up to `n_best` derivations ordered by log
//! probability. Derivations live in a single arena and point at their
//! children by index, so trees are only materialised for the start symbol
//! of the top cell.

use std::collections::BTreeMap;

use super::cnf::{CnfGrammar, SymbolKind};
use super::params::ParseOptions;
use super::tree::Tree;
use crate::token::Token;

#[derive(Debug, Clone, Copy)]
enum Back {
    /// Pre-terminal over the word at this position
    Word(usize),
    Unary(usize),
    Binary(usize, usize),
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    symbol: u32,
    log_prob: f64,
    back: Back,
}

type Cell = BTreeMap<u32, Vec<usize>>;
type Candidates = BTreeMap<u32, Vec<(f64, Back)>>;

struct Chart<'g> {
    grammar: &'g CnfGrammar,
    opts: &'g ParseOptions,
    entries: Vec<Entry>,
    cells: Vec<Cell>,
    n: usize,
}

/// Insert a candidate into a list sorted by descending score, keeping at
/// most `limit` items. Earlier candidates win ties.
fn offer(list: &mut Vec<(f64, Back)>, log_prob: f64, back: Back, limit: usize) {
    let pos = list.partition_point(|&(lp, _)| lp >= log_prob);
    if pos < limit {
        list.insert(pos, (log_prob, back));
        list.truncate(limit);
    }
}

impl<'g> Chart<'g> {
    fn new(grammar: &'g CnfGrammar, opts: &'g ParseOptions, n: usize) -> Self {
        Self {
            grammar,
            opts,
            entries: Vec::new(),
            cells: vec![Cell::new(); (n + 1) * (n + 1)],
            n,
        }
    }

    fn index(&self, i: usize, j: usize) -> usize {
        i * (self.n + 1) + j
    }

    /// Pre-terminals admitted for `token`, with their log probabilities.
    fn lexical(&self, token: &Token) -> Vec<(u32, f64)> {
        let g = self.grammar;
        let known = g.lexical.get(token.text.as_str());
        if let Some(id) = token.pos.as_deref().and_then(|pos| g.symbols.get(pos)) {
            if let Some(&unknown) = g.unknown.get(&id) {
                let log_prob = known
                    .and_then(|entries| entries.iter().find(|&&(sym, _)| sym == id))
                    .map_or(unknown, |&(_, lp)| lp);
                return vec![(id, log_prob)];
            }
        }
        let mut out: Vec<(u32, f64)> = known.cloned().unwrap_or_default();
        // A word seen only inside longer rules can still fill any open class
        if !out.iter().any(|&(sym, _)| g.kind(sym) == SymbolKind::Plain) {
            let mut open: Vec<(u32, f64)> = g.unknown.iter().map(|(&sym, &lp)| (sym, lp)).collect();
            open.sort_by_key(|&(sym, _)| sym);
            out.extend(open);
        }
        out
    }

    fn commit(&mut self, cell: usize, candidates: Candidates) -> Vec<usize> {
        let mut added = Vec::new();
        for (symbol, list) in candidates {
            let mut ids = Vec::with_capacity(list.len());
            for (log_prob, back) in list {
                ids.push(self.entries.len());
                added.push(self.entries.len());
                self.entries.push(Entry {
                    symbol,
                    log_prob,
                    back,
                });
            }
            self.cells[cell].insert(symbol, ids);
        }
        added
    }

    /// Apply unary rules to the entries of `cell`, a frontier at a time.
    fn close_unary(&mut self, cell: usize, mut frontier: Vec<usize>) {
        let g = self.grammar;
        let limit = self.opts.n_best();
        for _ in 0..self.opts.max_unary_depth() {
            let mut candidates = Candidates::new();
            for &e in &frontier {
                let entry = self.entries[e];
                if let Some(rules) = g.unary_by_child.get(&entry.symbol) {
                    for &r in rules {
                        let rule = &g.unary[r];
                        offer(
                            candidates.entry(rule.lhs).or_default(),
                            rule.log_prob + entry.log_prob,
                            Back::Unary(e),
                            limit,
                        );
                    }
                }
            }
            if candidates.is_empty() {
                break;
            }

            let mut next = Vec::new();
            for (symbol, list) in candidates {
                let existing = self.cells[cell].remove(&symbol).unwrap_or_default();
                let mut merged: Vec<(f64, Option<usize>, Back)> = existing
                    .iter()
                    .map(|&id| (self.entries[id].log_prob, Some(id), self.entries[id].back))
                    .collect();
                for (log_prob, back) in list {
                    let pos = merged.partition_point(|&(lp, _, _)| lp >= log_prob);
                    merged.insert(pos, (log_prob, None, back));
                }
                merged.truncate(limit);

                let mut ids = Vec::with_capacity(merged.len());
                for (log_prob, id, back) in merged {
                    let id = match id {
                        Some(id) => id,
                        None => {
                            let id = self.entries.len();
                            self.entries.push(Entry {
                                symbol,
                                log_prob,
                                back,
                            });
                            next.push(id);
                            id
                        }
                    };
                    ids.push(id);
                }
                self.cells[cell].insert(symbol, ids);
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
    }

    /// Keep the `beam_width` best symbols of `cell`.
    fn prune(&mut self, cell: usize) {
        let width = self.opts.beam_width();
        if self.cells[cell].len() <= width {
            return;
        }
        let mut ranked: Vec<(f64, u32)> = self.cells[cell]
            .iter()
            .filter_map(|(&sym, ids)| ids.first().map(|&id| (self.entries[id].log_prob, sym)))
            .collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        for &(_, sym) in &ranked[width..] {
            self.cells[cell].remove(&sym);
        }
    }

    fn fill(&mut self, tokens: &[Token]) {
        let g = self.grammar;
        let limit = self.opts.n_best();
        for (i, token) in tokens.iter().enumerate() {
            let cell = self.index(i, i + 1);
            let mut candidates = Candidates::new();
            for (sym, log_prob) in self.lexical(token) {
                offer(candidates.entry(sym).or_default(), log_prob, Back::Word(i), limit);
            }
            let added = self.commit(cell, candidates);
            self.close_unary(cell, added);
            self.prune(cell);
        }

        for len in 2..=self.n {
            for i in 0..=self.n - len {
                let j = i + len;
                let mut candidates = Candidates::new();
                for k in i + 1..j {
                    let left = &self.cells[self.index(i, k)];
                    let right = &self.cells[self.index(k, j)];
                    for (lsym, lids) in left {
                        let rules = match g.binary_by_left.get(lsym) {
                            Some(rules) => rules,
                            None => continue,
                        };
                        for &r in rules {
                            let rule = &g.binary[r];
                            let rids = match right.get(&rule.right) {
                                Some(rids) => rids,
                                None => continue,
                            };
                            for &le in lids {
                                for &re in rids {
                                    let log_prob =
                                        rule.log_prob + self.entries[le].log_prob + self.entries[re].log_prob;
                                    offer(
                                        candidates.entry(rule.lhs).or_default(),
                                        log_prob,
                                        Back::Binary(le, re),
                                        limit,
                                    );
                                }
                            }
                        }
                    }
                }
                let cell = self.index(i, j);
                let added = self.commit(cell, candidates);
                self.close_unary(cell, added);
                self.prune(cell);
            }
        }
    }

    /// Rebuild the subtrees of derivation `e`, splicing out binarization
    /// symbols.
    fn build(&self, tokens: &[Token], e: usize) -> Vec<Tree> {
        let entry = &self.entries[e];
        let children = match entry.back {
            Back::Word(i) => vec![Tree::leaf(tokens[i].text.as_str())],
            Back::Unary(c) => self.build(tokens, c),
            Back::Binary(l, r) => {
                let mut children = self.build(tokens, l);
                children.extend(self.build(tokens, r));
                children
            }
        };
        match self.grammar.kind(entry.symbol) {
            SymbolKind::Plain => vec![Tree::node(self.grammar.name(entry.symbol), children)],
            SymbolKind::Intermediate | SymbolKind::Term => children,
        }
    }
}

/// Parse `tokens`, returning up to `n_best` trees rooted at the start
/// symbol with their log probabilities, best first.
pub(crate) fn parse(grammar: &CnfGrammar, tokens: &[Token], opts: &ParseOptions) -> Vec<(Tree, f64)> {
    if tokens.is_empty() {
        return Vec::new();
    }
    let mut chart = Chart::new(grammar, opts, tokens.len());
    chart.fill(tokens);
    let top = chart.index(0, tokens.len());
    let ids = match chart.cells[top].get(&grammar.start) {
        Some(ids) => ids.clone(),
        None => return Vec::new(),
    };
    ids.into_iter()
        .filter_map(|id| {
            let tree = chart.build(tokens, id).into_iter().next()?;
            Some((tree, chart.entries[id].log_prob))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcfg::grammar::Grammar;
    use crate::token::tokens;

    const GRAMMAR: &str = r#"
        S -> NP VP [1]
        NP -> Det N [0.7]
        NP -> NP PP [0.3]
        VP -> V NP [0.6]
        VP -> VP PP [0.4]
        PP -> P NP [1]
        Det -> "the" [1]
        N -> "man" [0.5]
        N -> "telescope" [0.5]
        V -> "saw" [1]
        P -> "with" [1]
    "#;

    fn compile(text: &str) -> CnfGrammar {
        let grammar = Grammar::from_text(text, 0.0, "S", None).unwrap();
        CnfGrammar::compile(&grammar, true).unwrap()
    }

    #[test]
    fn test_best_parse() {
        let g = compile(GRAMMAR);
        let toks = tokens(vec!["the", "man", "saw", "the", "man"]);
        let parses = parse(&g, &toks, &ParseOptions::default());
        assert_eq!(parses.len(), 1);
        let (tree, log_prob) = &parses[0];
        assert_eq!(
            tree.to_string(),
            "(S (NP (Det the) (N man)) (VP (V saw) (NP (Det the) (N man))))"
        );
        let expected = (0.7f64 * 0.5 * 0.6 * 0.7 * 0.5).ln();
        assert!((log_prob - expected).abs() < 1e-9);
    }

    #[test]
    fn test_n_best_ambiguity() {
        let g = compile(GRAMMAR);
        let toks = tokens(vec!["the", "man", "saw", "the", "man", "with", "the", "telescope"]);
        let mut opts = ParseOptions::default();
        opts.set_n_best(3).unwrap();
        let parses = parse(&g, &toks, &opts);
        assert_eq!(parses.len(), 2);
        assert!(parses[0].1 >= parses[1].1);
        assert_ne!(parses[0].0, parses[1].0);
        for (tree, _) in &parses {
            assert_eq!(tree.leaves(), vec!["the", "man", "saw", "the", "man", "with", "the", "telescope"]);
        }
    }

    #[test]
    fn test_unknown_word_and_pos() {
        let grammar = Grammar::from_text(GRAMMAR, 1.0, "S", None).unwrap();
        let g = CnfGrammar::compile(&grammar, true).unwrap();
        let toks = tokens(vec!["the", "dog", "saw", "the", "man"]);
        assert_eq!(parse(&g, &toks, &ParseOptions::default()).len(), 1);

        // A POS hint restricts the word to that pre-terminal
        let toks = vec![
            Token::new("the"),
            Token::new("saw").with_pos("N"),
            Token::new("saw"),
            Token::new("the"),
            Token::new("man"),
        ];
        let parses = parse(&g, &toks, &ParseOptions::default());
        assert_eq!(
            parses[0].0.to_string(),
            "(S (NP (Det the) (N saw)) (VP (V saw) (NP (Det the) (N man))))"
        );
    }

    #[test]
    fn test_flat_rules_are_restored() {
        let g = compile(
            r#"
            S -> A B C [1]
            A -> "a" [1]
            B -> "b" [1]
            C -> "c" [1]
            "#,
        );
        let parses = parse(&g, &tokens(vec!["a", "b", "c"]), &ParseOptions::default());
        assert_eq!(parses[0].0.to_string(), "(S (A a) (B b) (C c))");
    }

    #[test]
    fn test_no_parse() {
        let g = compile(GRAMMAR);
        assert!(parse(&g, &[], &ParseOptions::default()).is_empty());
        assert!(parse(&g, &tokens(vec!["the", "saw"]), &ParseOptions::default()).is_empty());
    }
}
