use std::collections::HashMap;
use std::fmt;

use super::tree::Tree;

/// Labelled-bracket scores of a parser over a test set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseMetrics {
    /// Micro-averaged bracket precision
    pub precision: f64,
    /// Micro-averaged bracket recall
    pub recall: f64,
    pub f1: f64,
    /// Fraction of sentences whose predicted tree equals the gold tree
    pub exact_match: f64,
    /// Number of sentences
    pub sentences: usize,
    /// Number of sentences with a parse
    pub parsed: usize,
}

fn bracket_counts(tree: &Tree) -> HashMap<(&str, usize, usize), usize> {
    let mut counts = HashMap::new();
    for bracket in tree.brackets() {
        *counts.entry(bracket).or_insert(0) += 1;
    }
    counts
}

impl ParseMetrics {
    /// Score `(gold, predicted)` pairs. A missing prediction contributes no
    /// brackets and never matches.
    pub fn compute<'a, I>(pairs: I) -> ParseMetrics
    where
        I: IntoIterator<Item = (&'a Tree, Option<&'a Tree>)>,
    {
        let (mut matched, mut gold_total, mut pred_total) = (0usize, 0usize, 0usize);
        let (mut sentences, mut parsed, mut exact) = (0usize, 0usize, 0usize);
        for (gold, predicted) in pairs {
            sentences += 1;
            let gold_counts = bracket_counts(gold);
            gold_total += gold_counts.values().sum::<usize>();
            let predicted = match predicted {
                Some(tree) => tree,
                None => continue,
            };
            parsed += 1;
            if predicted == gold {
                exact += 1;
            }
            for (bracket, n) in bracket_counts(predicted) {
                pred_total += n;
                matched += n.min(gold_counts.get(&bracket).copied().unwrap_or(0));
            }
        }

        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
        let (precision, recall) = if gold_total == 0 && pred_total == 0 {
            (1.0, 1.0)
        } else {
            (ratio(matched, pred_total), ratio(matched, gold_total))
        };
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        ParseMetrics {
            precision,
            recall,
            f1,
            exact_match: ratio(exact, sentences),
            sentences,
            parsed,
        }
    }
}

impl fmt::Display for ParseMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Sentences parsed: {}/{}", self.parsed, self.sentences)?;
        writeln!(
            f,
            "Bracket precision: {:.4}, recall: {:.4}, F1: {:.4}",
            self.precision, self.recall, self.f1
        )?;
        write!(f, "Exact match: {:.4}", self.exact_match)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(text: &str) -> Tree {
        Tree::parse(text).unwrap()
    }

    #[test]
    fn test_identical_trees() {
        let gold = tree("(S (NP (D the) (N cat)) (VP (V sat)))");
        let m = ParseMetrics::compute(vec![(&gold, Some(&gold))]);
        assert_eq!((m.precision, m.recall, m.f1, m.exact_match), (1.0, 1.0, 1.0, 1.0));
    }

    #[test]
    fn test_disjoint_brackets() {
        let gold = tree("(S (A (x a) (y b)) (z c))");
        let pred = tree("(T (x a) (B (y b) (z c)))");
        let m = ParseMetrics::compute(vec![(&gold, Some(&pred))]);
        assert_eq!((m.precision, m.recall, m.f1, m.exact_match), (0.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn test_partial_and_missing() {
        let gold = tree("(S (NP (D the) (N cat)) (VP (V sat)))");
        let pred = tree("(S (NP (D the) (N cat)) (V sat))");
        let m = ParseMetrics::compute(vec![(&gold, Some(&pred)), (&gold, None)]);
        // gold: NP, VP, S twice over; predicted: NP, S
        assert_eq!(m.precision, 1.0);
        assert!((m.recall - 2.0 / 6.0).abs() < 1e-12);
        assert_eq!(m.sentences, 2);
        assert_eq!(m.parsed, 1);
        assert_eq!(m.exact_match, 0.0);
    }

    #[test]
    fn test_preterminal_only_trees() {
        let gold = tree("(N cat)");
        let m = ParseMetrics::compute(vec![(&gold, Some(&gold))]);
        assert_eq!(m.f1, 1.0);
    }
}
