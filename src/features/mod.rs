//! Feature extraction
//!
//! Turns a token and its neighbourhood into a set of feature strings. Two
//! tokens with identical context always yield identical feature sets; a
//! field the token lacks (lemma, POS) simply omits the families that need it.

use std::collections::BTreeSet;

use bitflags::bitflags;

use crate::errors::{Error, Result};
use crate::token::Token;

mod gazetteer;
pub mod shape;

use self::shape::Capitalization;

bitflags! {
    /// Feature families
    #[derive(Default)]
    pub struct Families: u32 {
        /// Surface form, lowercase form, lemma
        const LEXICAL = 0x01;
        /// Capitalization class, word shape, digit/hyphen/punctuation flags
        const ORTHOGRAPHIC = 0x02;
        /// Part-of-speech tag
        const POS = 0x04;
        /// Neighbouring words and tags, sentence boundaries, previous label
        const CONTEXT = 0x08;
        /// Prefixes and suffixes
        const AFFIX = 0x10;
        /// Numbers, years, initials, acronyms, length buckets
        const PATTERN = 0x20;
        /// Closed word lists
        const GAZETTEER = 0x40;
        /// Everything except the gazetteer
        const STANDARD = Self::LEXICAL.bits
            | Self::ORTHOGRAPHIC.bits
            | Self::POS.bits
            | Self::CONTEXT.bits
            | Self::AFFIX.bits
            | Self::PATTERN.bits;
    }
}

/// Feature extraction options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    families: Families,
    max_affix_len: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            families: Families::STANDARD,
            max_affix_len: 4,
        }
    }
}

impl ExtractOptions {
    pub fn families(&self) -> Families {
        self.families
    }

    pub fn set_families(&mut self, families: Families) {
        self.families = families;
    }

    pub fn gazetteer(&self) -> bool {
        self.families.contains(Families::GAZETTEER)
    }

    pub fn set_gazetteer(&mut self, enabled: bool) {
        self.families.set(Families::GAZETTEER, enabled);
    }

    pub fn max_affix_len(&self) -> usize {
        self.max_affix_len
    }

    pub fn set_max_affix_len(&mut self, max_affix_len: usize) -> Result<()> {
        if max_affix_len > 10 {
            return Err(Error::invalid_param("feature.max_affix must be at most 10"));
        }
        self.max_affix_len = max_affix_len;
        Ok(())
    }
}

/// Neighbourhood of a token.
#[derive(Debug, Clone, Copy, Default)]
pub struct Context<'a> {
    pub prev_word: Option<&'a str>,
    pub next_word: Option<&'a str>,
    pub prev_pos: Option<&'a str>,
    pub next_pos: Option<&'a str>,
    /// Label predicted for the previous token, when decoding left to right
    pub prev_label: Option<&'a str>,
    pub next_label: Option<&'a str>,
    /// Zero-based position in the sequence
    pub position: usize,
    /// Length of the sequence
    pub length: usize,
}

impl<'a> Context<'a> {
    /// Context of position `t` derived from the neighbours in `tokens`.
    pub fn of(tokens: &'a [Token], t: usize) -> Self {
        let prev = t.checked_sub(1).and_then(|i| tokens.get(i));
        let next = tokens.get(t + 1);
        Self {
            prev_word: prev.map(|tok| tok.text.as_str()),
            next_word: next.map(|tok| tok.text.as_str()),
            prev_pos: prev.and_then(|tok| tok.pos.as_deref()),
            next_pos: next.and_then(|tok| tok.pos.as_deref()),
            prev_label: None,
            next_label: None,
            position: t,
            length: tokens.len(),
        }
    }
}

/// Extract the feature set of a single token.
pub fn extract(token: &Token, context: &Context<'_>, options: &ExtractOptions) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    let families = options.families;
    let word = token.text.as_str();

    if families.contains(Families::LEXICAL) && !word.is_empty() {
        out.insert(format!("w={}", word));
        out.insert(format!("lw={}", word.to_lowercase()));
        if let Some(lemma) = &token.lemma {
            out.insert(format!("lemma={}", lemma));
        }
    }

    if families.contains(Families::ORTHOGRAPHIC) && !word.is_empty() {
        out.insert(format!("cap={}", Capitalization::of(word).as_str()));
        out.insert(format!("shape={}", shape::word_shape(word)));
        if shape::has_digit(word) {
            out.insert("has_digit".to_string());
        }
        if shape::has_hyphen(word) {
            out.insert("has_hyphen".to_string());
        }
        if shape::has_punct(word) {
            out.insert("has_punct".to_string());
        }
    }

    if families.contains(Families::POS) {
        if let Some(pos) = &token.pos {
            out.insert(format!("pos={}", pos));
        }
    }

    if families.contains(Families::CONTEXT) {
        match context.prev_word {
            Some(w) => {
                out.insert(format!("w-1={}", w.to_lowercase()));
            }
            None if context.position == 0 => {
                out.insert("BOS".to_string());
            }
            None => {}
        }
        match context.next_word {
            Some(w) => {
                out.insert(format!("w+1={}", w.to_lowercase()));
            }
            None if context.position + 1 >= context.length => {
                out.insert("EOS".to_string());
            }
            None => {}
        }
        if let Some(pos) = context.prev_pos {
            out.insert(format!("pos-1={}", pos));
        }
        if let Some(pos) = context.next_pos {
            out.insert(format!("pos+1={}", pos));
        }
        if let Some(label) = context.prev_label {
            out.insert(format!("y-1={}", label));
        }
        if let Some(label) = context.next_label {
            out.insert(format!("y+1={}", label));
        }
    }

    if families.contains(Families::AFFIX) {
        let lower = word.to_lowercase();
        for n in 1..=options.max_affix_len {
            match shape::prefix(&lower, n) {
                Some(p) => out.insert(format!("pre{}={}", n, p)),
                None => break,
            };
        }
        for n in 1..=options.max_affix_len {
            match shape::suffix(&lower, n) {
                Some(s) => out.insert(format!("suf{}={}", n, s)),
                None => break,
            };
        }
    }

    if families.contains(Families::PATTERN) && !word.is_empty() {
        if shape::is_all_digits(word) {
            out.insert("all_digits".to_string());
        }
        if shape::is_year(word) {
            out.insert("year".to_string());
        }
        if shape::is_decimal(word) {
            out.insert("decimal".to_string());
        }
        if shape::is_initial(word) {
            out.insert("initial".to_string());
        }
        if shape::is_acronym(word) {
            out.insert("acronym".to_string());
        }
        out.insert(format!("len={}", shape::length_bucket(word)));
    }

    if families.contains(Families::GAZETTEER) {
        for name in gazetteer::lookup(word) {
            out.insert(format!("gaz={}", name));
        }
    }

    out
}

/// Extract the feature sets of a whole sequence, building each context
/// from the neighbouring tokens.
pub fn extract_sequence(tokens: &[Token], options: &ExtractOptions) -> Vec<BTreeSet<String>> {
    tokens
        .iter()
        .enumerate()
        .map(|(t, token)| extract(token, &Context::of(tokens, t), options))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tokens;

    fn has(set: &BTreeSet<String>, f: &str) -> bool {
        set.contains(f)
    }

    #[test]
    fn test_lexical_and_orthographic() {
        let opts = ExtractOptions::default();
        let tok = Token::new("Paris").with_lemma("paris");
        let fs = extract(&tok, &Context::default(), &opts);
        assert!(has(&fs, "w=Paris"));
        assert!(has(&fs, "lw=paris"));
        assert!(has(&fs, "lemma=paris"));
        assert!(has(&fs, "cap=init"));
        assert!(has(&fs, "shape=Xx"));
        assert!(has(&fs, "pre2=pa"));
        assert!(has(&fs, "suf3=ris"));
        assert!(has(&fs, "len=medium"));
        assert!(!has(&fs, "has_digit"));
    }

    #[test]
    fn test_missing_fields_omit_families() {
        let opts = ExtractOptions::default();
        let fs = extract(&Token::new("cat"), &Context::default(), &opts);
        assert!(!fs.iter().any(|f| f.starts_with("pos=")));
        assert!(!fs.iter().any(|f| f.starts_with("lemma=")));
    }

    #[test]
    fn test_sequence_context() {
        let opts = ExtractOptions::default();
        let mut seq = tokens(["The", "cat", "sleeps"]);
        seq[1].pos = Some("NN".to_string());
        let fs = extract_sequence(&seq, &opts);
        assert_eq!(fs.len(), 3);
        assert!(has(&fs[0], "BOS"));
        assert!(has(&fs[0], "w+1=cat"));
        assert!(has(&fs[0], "pos+1=NN"));
        assert!(has(&fs[1], "w-1=the"));
        assert!(has(&fs[1], "pos=NN"));
        assert!(has(&fs[2], "EOS"));
        assert!(has(&fs[2], "pos-1=NN"));
        assert!(!has(&fs[1], "BOS"));
        assert!(!has(&fs[1], "EOS"));
    }

    #[test]
    fn test_prev_label_context() {
        let opts = ExtractOptions::default();
        let ctx = Context {
            prev_label: Some("B-PER"),
            position: 1,
            length: 2,
            ..Default::default()
        };
        let fs = extract(&Token::new("Smith"), &ctx, &opts);
        assert!(has(&fs, "y-1=B-PER"));
    }

    #[test]
    fn test_gazetteer_gated_by_option() {
        let mut opts = ExtractOptions::default();
        let tok = Token::new("Monday");
        assert!(!has(&extract(&tok, &Context::default(), &opts), "gaz=weekday"));
        opts.set_gazetteer(true);
        assert!(has(&extract(&tok, &Context::default(), &opts), "gaz=weekday"));
    }

    #[test]
    fn test_patterns_and_dedup() {
        let opts = ExtractOptions::default();
        let fs = extract(&Token::new("1999"), &Context::default(), &opts);
        assert!(has(&fs, "all_digits"));
        assert!(has(&fs, "year"));
        assert!(has(&fs, "has_digit"));
        assert!(has(&fs, "cap=none"));
        // w= and lw= collapse to distinct keys, never duplicates
        let again = extract(&Token::new("1999"), &Context::default(), &opts);
        assert_eq!(fs, again);
    }

    #[test]
    fn test_affix_length_option() {
        let mut opts = ExtractOptions::default();
        opts.set_max_affix_len(2).unwrap();
        let fs = extract(&Token::new("walking"), &Context::default(), &opts);
        assert!(has(&fs, "suf2=ng"));
        assert!(!has(&fs, "suf3=ing"));
        assert!(opts.set_max_affix_len(11).is_err());
    }
}
