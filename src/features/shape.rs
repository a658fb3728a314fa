//! Orthographic helpers shared by the feature extractor.

/// Capitalization class of a word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capitalization {
    /// `Paris`
    Initial,
    /// `NASA`
    Upper,
    /// `paris`
    Lower,
    /// `iPhone`, `McDonald`
    Mixed,
    /// No cased letters at all, e.g. `1984` or `--`
    Uncased,
}

impl Capitalization {
    pub fn of(word: &str) -> Self {
        let mut upper = 0usize;
        let mut lower = 0usize;
        let mut first_upper = false;
        for (i, c) in word.chars().enumerate() {
            if c.is_uppercase() {
                upper += 1;
                if i == 0 {
                    first_upper = true;
                }
            } else if c.is_lowercase() {
                lower += 1;
            }
        }
        match (upper, lower) {
            (0, 0) => Self::Uncased,
            (0, _) => Self::Lower,
            (_, 0) => Self::Upper,
            (1, _) if first_upper => Self::Initial,
            _ => Self::Mixed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "init",
            Self::Upper => "upper",
            Self::Lower => "lower",
            Self::Mixed => "mixed",
            Self::Uncased => "none",
        }
    }
}

/// Abstract word shape: uppercase letters become `X`, lowercase `x`,
/// digits `d`, anything else is kept; runs of the same class collapse.
///
/// `Hello` → `Xx`, `AB-12` → `X-d`, `3.14` → `d.d`
pub fn word_shape(word: &str) -> String {
    let mut shape = String::with_capacity(word.len());
    let mut last = None;
    for c in word.chars() {
        let s = if c.is_uppercase() {
            'X'
        } else if c.is_lowercase() {
            'x'
        } else if c.is_numeric() {
            'd'
        } else {
            c
        };
        if last != Some(s) {
            shape.push(s);
            last = Some(s);
        }
    }
    shape
}

pub fn has_digit(word: &str) -> bool {
    word.chars().any(|c| c.is_ascii_digit())
}

pub fn has_hyphen(word: &str) -> bool {
    word.contains('-')
}

pub fn has_punct(word: &str) -> bool {
    word.chars().any(|c| c.is_ascii_punctuation())
}

pub fn is_all_digits(word: &str) -> bool {
    !word.is_empty() && word.chars().all(|c| c.is_ascii_digit())
}

/// Four digit year between 1000 and 2999
pub fn is_year(word: &str) -> bool {
    word.len() == 4 && is_all_digits(word) && matches!(word.as_bytes()[0], b'1' | b'2')
}

/// Digits, one decimal separator (`.` or `,`), digits
pub fn is_decimal(word: &str) -> bool {
    let mut parts = word.splitn(2, |c| c == '.' || c == ',');
    match (parts.next(), parts.next()) {
        (Some(int), Some(frac)) => is_all_digits(int) && is_all_digits(frac),
        _ => false,
    }
}

/// A single letter followed by a period, e.g. `J.`
pub fn is_initial(word: &str) -> bool {
    let mut chars = word.chars();
    matches!(
        (chars.next(), chars.next(), chars.next()),
        (Some(c), Some('.'), None) if c.is_alphabetic()
    )
}

/// Two or more uppercase letters, optionally dotted: `NATO`, `U.S.A.`
pub fn is_acronym(word: &str) -> bool {
    let letters: Vec<char> = word.chars().filter(|&c| c != '.').collect();
    letters.len() >= 2
        && letters.iter().all(|c| c.is_uppercase())
        && word.chars().all(|c| c == '.' || c.is_alphabetic())
}

pub fn length_bucket(word: &str) -> &'static str {
    match word.chars().count() {
        0..=3 => "short",
        4..=8 => "medium",
        _ => "long",
    }
}

/// Character prefix of `n` characters, or `None` when the word is shorter.
pub fn prefix(word: &str, n: usize) -> Option<&str> {
    match word.char_indices().nth(n) {
        Some((end, _)) => Some(&word[..end]),
        None if word.chars().count() == n => Some(word),
        None => None,
    }
}

/// Character suffix of `n` characters, or `None` when the word is shorter.
pub fn suffix(word: &str, n: usize) -> Option<&str> {
    let len = word.chars().count();
    if n == 0 || n > len {
        return None;
    }
    word.char_indices()
        .nth(len - n)
        .map(|(start, _)| &word[start..])
}
