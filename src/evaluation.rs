use std::collections::BTreeMap;
use std::fmt;

/// Label-wise performance values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelMeasure {
    /// Number of correct predictions.
    pub num_correct: usize,
    /// Number of occurrences of the label in the gold-standard data.
    pub num_observation: usize,
    /// Number of predictions.
    pub num_prediction: usize,
    pub precision: f64,
    pub recall: f64,
    /// F1 score.
    pub fmeasure: f64,
}

/// Overall performance of a sequence labeller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    labels: BTreeMap<String, LabelMeasure>,
    /// Number of correctly predicted items.
    pub item_total_correct: usize,
    /// Total number of items.
    pub item_total_num: usize,
    /// Item-level accuracy.
    pub item_accuracy: f64,
    /// Number of correctly predicted instances.
    pub inst_total_correct: usize,
    /// Total number of instances.
    pub inst_total_num: usize,
    /// Instance-level accuracy.
    pub inst_accuracy: f64,
    pub macro_precision: f64,
    pub macro_recall: f64,
    pub macro_fmeasure: f64,
}

impl Evaluation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one reference/prediction pair. Both must have the same length.
    pub fn accumulate<R: AsRef<str>, P: AsRef<str>>(&mut self, reference: &[R], prediction: &[P]) {
        let mut matched = 0;
        for (r, p) in reference.iter().zip(prediction) {
            let (r, p) = (r.as_ref(), p.as_ref());
            self.labels.entry(r.to_string()).or_default().num_observation += 1;
            self.labels.entry(p.to_string()).or_default().num_prediction += 1;
            if r == p {
                self.labels.entry(r.to_string()).or_default().num_correct += 1;
                matched += 1;
            }
            self.item_total_num += 1;
        }
        self.item_total_correct += matched;
        if matched == reference.len() {
            self.inst_total_correct += 1;
        }
        self.inst_total_num += 1;
    }

    /// Compute precision, recall, F1 and accuracies from the accumulated counts.
    pub fn finalize(&mut self) {
        let mut sum_p = 0.0;
        let mut sum_r = 0.0;
        let mut sum_f = 0.0;
        let mut num_labels = 0usize;
        for lev in self.labels.values_mut() {
            lev.precision = 0.0;
            lev.recall = 0.0;
            lev.fmeasure = 0.0;
            if lev.num_observation == 0 {
                continue;
            }
            num_labels += 1;
            if lev.num_prediction > 0 {
                lev.precision = lev.num_correct as f64 / lev.num_prediction as f64;
            }
            lev.recall = lev.num_correct as f64 / lev.num_observation as f64;
            if lev.precision + lev.recall > 0.0 {
                lev.fmeasure = lev.precision * lev.recall * 2.0 / (lev.precision + lev.recall);
            }
            sum_p += lev.precision;
            sum_r += lev.recall;
            sum_f += lev.fmeasure;
        }
        if num_labels > 0 {
            self.macro_precision = sum_p / num_labels as f64;
            self.macro_recall = sum_r / num_labels as f64;
            self.macro_fmeasure = sum_f / num_labels as f64;
        }
        if self.item_total_num > 0 {
            self.item_accuracy = self.item_total_correct as f64 / self.item_total_num as f64;
        }
        if self.inst_total_num > 0 {
            self.inst_accuracy = self.inst_total_correct as f64 / self.inst_total_num as f64;
        }
    }

    /// Per-label measures, ordered by label
    pub fn label(&self, label: &str) -> Option<&LabelMeasure> {
        self.labels.get(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = (&str, &LabelMeasure)> + '_ {
        self.labels.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Performance by label (#match, #model, #ref) (precision, recall, F1):"
        )?;
        for (label, lev) in &self.labels {
            if lev.num_observation == 0 {
                writeln!(
                    f,
                    "\t{}: ({}, {}, {}) (******, ******, ******)",
                    label, lev.num_correct, lev.num_prediction, lev.num_observation
                )?;
            } else {
                writeln!(
                    f,
                    "\t{}: ({}, {}, {}) ({:.4}, {:.4}, {:.4})",
                    label,
                    lev.num_correct,
                    lev.num_prediction,
                    lev.num_observation,
                    lev.precision,
                    lev.recall,
                    lev.fmeasure
                )?;
            }
        }
        writeln!(
            f,
            "Macro-average precision, recall, F1: ({:.4}, {:.4}, {:.4})",
            self.macro_precision, self.macro_recall, self.macro_fmeasure
        )?;
        writeln!(
            f,
            "Item accuracy: {}/{} => {:.4}",
            self.item_total_correct, self.item_total_num, self.item_accuracy
        )?;
        writeln!(
            f,
            "Sequence accuracy: {}/{} => {:.4}",
            self.inst_total_correct, self.inst_total_num, self.inst_accuracy
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluation() {
        let mut ev = Evaluation::new();
        ev.accumulate(&["DET", "NOUN"], &["DET", "NOUN"]);
        ev.accumulate(&["DET", "NOUN"], &["DET", "VERB"]);
        ev.finalize();

        assert_eq!(ev.item_total_num, 4);
        assert_eq!(ev.item_total_correct, 3);
        assert!((ev.item_accuracy - 0.75).abs() < 1e-12);
        assert!((ev.inst_accuracy - 0.5).abs() < 1e-12);

        let det = ev.label("DET").unwrap();
        assert_eq!(det.fmeasure, 1.0);
        let noun = ev.label("NOUN").unwrap();
        assert_eq!(noun.precision, 1.0);
        assert_eq!(noun.recall, 0.5);
        // VERB was predicted but never observed: excluded from macro averages
        assert_eq!(ev.label("VERB").unwrap().num_observation, 0);
        assert!((ev.macro_recall - 0.75).abs() < 1e-12);

        let report = ev.to_string();
        assert!(report.contains("Item accuracy: 3/4"));
    }
}
