use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::{debug, warn};

use crate::errors::{Error, Result};

/// One right-hand-side item of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Symbol {
    NonTerminal(String),
    Terminal(String),
}

impl Symbol {
    pub fn name(&self) -> &str {
        match self {
            Symbol::NonTerminal(s) | Symbol::Terminal(s) => s,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Symbol::Terminal(_))
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::NonTerminal(s) => write!(f, "{}", s),
            Symbol::Terminal(s) => write!(f, "{:?}", s),
        }
    }
}

/// A weighted production `lhs -> rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub lhs: String,
    pub rhs: Vec<Symbol>,
    /// Probability of the rule given its left-hand side
    pub prob: f64,
    /// Raw count the probability was estimated from
    pub count: f64,
    pub language: Option<String>,
}

impl Rule {
    /// `A -> "word"`
    pub fn is_lexical(&self) -> bool {
        matches!(self.rhs.as_slice(), [Symbol::Terminal(_)])
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ->", self.lhs)?;
        for sym in &self.rhs {
            write!(f, " {}", sym)?;
        }
        write!(f, " [{}]", self.prob)
    }
}

/// A probabilistic context-free grammar.
#[derive(Debug, Clone, PartialEq)]
pub struct Grammar {
    rules: Vec<Rule>,
    /// Rule indices by left-hand side
    by_lhs: BTreeMap<String, Vec<usize>>,
    /// Word → pre-terminals that can produce it
    lexicon: BTreeMap<String, BTreeSet<String>>,
    start: String,
    smoothing: f64,
    language: Option<String>,
}

impl Grammar {
    /// Estimate rule probabilities from `(lhs, rhs, count)` triples.
    ///
    /// Duplicate productions are merged. Each rule gets
    /// `(count + k) / (total(lhs) + k·rules(lhs))`, so the probabilities of
    /// every left-hand side sum to one. When `start` has no rules and the
    /// grammar has a single root symbol, that root becomes the start symbol.
    pub fn from_counts<I>(counts: I, smoothing: f64, start: &str, language: Option<&str>) -> Result<Grammar>
    where
        I: IntoIterator<Item = (String, Vec<Symbol>, f64)>,
    {
        if !(smoothing >= 0.0) || !smoothing.is_finite() {
            return Err(Error::invalid_param("smoothing must be non-negative"));
        }
        let mut merged: BTreeMap<(String, Vec<Symbol>), f64> = BTreeMap::new();
        for (lhs, rhs, count) in counts {
            if lhs.is_empty() {
                return Err(Error::InvalidGrammar("empty left-hand side".to_string()));
            }
            if rhs.is_empty() {
                return Err(Error::InvalidGrammar(format!("rule for `{}` has no right-hand side", lhs)));
            }
            if !(count > 0.0) || !count.is_finite() {
                return Err(Error::InvalidGrammar(format!(
                    "rule for `{}` has invalid count {}",
                    lhs, count
                )));
            }
            *merged.entry((lhs, rhs)).or_insert(0.0) += count;
        }
        if merged.is_empty() {
            return Err(Error::EmptyTrainingSet);
        }

        let mut totals: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
        for ((lhs, _), &count) in &merged {
            let entry = totals.entry(lhs.as_str()).or_insert((0.0, 0));
            entry.0 += count;
            entry.1 += 1;
        }

        let language = language.map(str::to_string);
        let mut rules = Vec::with_capacity(merged.len());
        for ((lhs, rhs), &count) in &merged {
            let (total, n) = totals[lhs.as_str()];
            let prob = (count + smoothing) / (total + smoothing * n as f64);
            rules.push(Rule {
                lhs: lhs.clone(),
                rhs: rhs.clone(),
                prob,
                count,
                language: language.clone(),
            });
        }

        let mut grammar = Grammar {
            rules,
            by_lhs: BTreeMap::new(),
            lexicon: BTreeMap::new(),
            start: start.to_string(),
            smoothing,
            language,
        };
        grammar.reindex();
        grammar.resolve_start()?;
        debug!(
            "grammar: {} rules, {} non-terminals, {} words, start symbol {}",
            grammar.rules.len(),
            grammar.by_lhs.len(),
            grammar.lexicon.len(),
            grammar.start
        );
        Ok(grammar)
    }

    /// Rebuild a grammar from stored rules without re-estimating.
    pub(crate) fn from_rules(
        rules: Vec<Rule>,
        start: String,
        smoothing: f64,
        language: Option<String>,
    ) -> Result<Grammar> {
        let mut grammar = Grammar {
            rules,
            by_lhs: BTreeMap::new(),
            lexicon: BTreeMap::new(),
            start,
            smoothing,
            language,
        };
        grammar.reindex();
        if !grammar.by_lhs.contains_key(&grammar.start) {
            return Err(Error::InvalidGrammar(format!(
                "start symbol `{}` has no rules",
                grammar.start
            )));
        }
        Ok(grammar)
    }

    fn reindex(&mut self) {
        self.by_lhs.clear();
        self.lexicon.clear();
        for (i, rule) in self.rules.iter().enumerate() {
            self.by_lhs.entry(rule.lhs.clone()).or_default().push(i);
            if let [Symbol::Terminal(word)] = rule.rhs.as_slice() {
                self.lexicon
                    .entry(word.clone())
                    .or_default()
                    .insert(rule.lhs.clone());
            }
        }
    }

    fn resolve_start(&mut self) -> Result<()> {
        if self.by_lhs.contains_key(&self.start) {
            return Ok(());
        }
        let on_rhs: BTreeSet<&str> = self
            .rules
            .iter()
            .flat_map(|r| r.rhs.iter())
            .filter(|s| !s.is_terminal())
            .map(Symbol::name)
            .collect();
        let roots: Vec<&String> = self
            .by_lhs
            .keys()
            .filter(|lhs| !on_rhs.contains(lhs.as_str()))
            .collect();
        match roots.as_slice() {
            [root] => {
                warn!(
                    "start symbol `{}` has no rules, using root symbol `{}`",
                    self.start, root
                );
                self.start = root.to_string();
                Ok(())
            }
            _ => Err(Error::InvalidGrammar(format!(
                "start symbol `{}` has no rules",
                self.start
            ))),
        }
    }

    /// Parse the text grammar format.
    ///
    /// One rule per line, `LHS -> RHS... [weight]`. Terminals are quoted
    /// with `"` or `'`, the weight is an optional count (default 1) and `#`
    /// starts a comment.
    pub fn from_text(text: &str, smoothing: f64, start: &str, language: Option<&str>) -> Result<Grammar> {
        let mut counts = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = strip_comment(line).trim();
            if line.is_empty() {
                continue;
            }
            let err = |msg: &str| Error::InvalidGrammar(format!("line {}: {}", lineno + 1, msg));
            let (lhs, rest) = line.split_once("->").ok_or_else(|| err("missing `->`"))?;
            let lhs = lhs.trim();
            if lhs.is_empty() || lhs.contains(char::is_whitespace) {
                return Err(err("left-hand side must be a single symbol"));
            }
            let (rest, weight) = match rest.trim_end().strip_suffix(']') {
                Some(body) => {
                    let open = body.rfind('[').ok_or_else(|| err("unbalanced `]`"))?;
                    let weight: f64 = body[open + 1..]
                        .trim()
                        .parse()
                        .map_err(|_| err("invalid weight"))?;
                    (&body[..open], weight)
                }
                None => (rest, 1.0),
            };
            let rhs = split_rhs(rest).map_err(|msg| err(&msg))?;
            counts.push((lhs.to_string(), rhs, weight));
        }
        Self::from_counts(counts, smoothing, start, language)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Rules whose left-hand side is `lhs`
    pub fn rules_for<'a>(&'a self, lhs: &str) -> impl Iterator<Item = &'a Rule> + 'a {
        self.by_lhs
            .get(lhs)
            .into_iter()
            .flatten()
            .map(move |&i| &self.rules[i])
    }

    /// Pre-terminals that produce `word`
    pub fn preterminals(&self, word: &str) -> impl Iterator<Item = &str> + '_ {
        self.lexicon.get(word).into_iter().flatten().map(String::as_str)
    }

    /// `true` when `symbol` has at least one lexical rule
    pub fn is_preterminal(&self, symbol: &str) -> bool {
        self.rules_for(symbol).any(Rule::is_lexical)
    }

    /// Left-hand-side symbols in sorted order
    pub fn nonterminals(&self) -> impl Iterator<Item = &str> + '_ {
        self.by_lhs.keys().map(String::as_str)
    }

    pub fn start_symbol(&self) -> &str {
        &self.start
    }

    pub fn smoothing(&self) -> f64 {
        self.smoothing
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Total count of the rules of `lhs`
    pub(crate) fn lhs_total(&self, lhs: &str) -> (f64, usize) {
        self.rules_for(lhs)
            .fold((0.0, 0), |(total, n), rule| (total + rule.count, n + 1))
    }
}

fn strip_comment(line: &str) -> &str {
    let mut quote = None;
    for (i, c) in line.char_indices() {
        match (quote, c) {
            (None, '#') => return &line[..i],
            (None, '"') | (None, '\'') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            _ => {}
        }
    }
    line
}

fn split_rhs(text: &str) -> std::result::Result<Vec<Symbol>, String> {
    let mut out = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some(&(i, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '"' || c == '\'' {
            chars.next();
            let mut end = None;
            for (j, d) in chars.by_ref() {
                if d == c {
                    end = Some(j);
                    break;
                }
            }
            let end = end.ok_or_else(|| "unterminated quote".to_string())?;
            out.push(Symbol::Terminal(text[i + 1..end].to_string()));
        } else {
            let mut end = text.len();
            while let Some(&(j, d)) = chars.peek() {
                if d.is_whitespace() {
                    end = j;
                    break;
                }
                chars.next();
            }
            out.push(Symbol::NonTerminal(text[i..end].to_string()));
        }
    }
    if out.is_empty() {
        return Err("empty right-hand side".to_string());
    }
    Ok(out)
}
