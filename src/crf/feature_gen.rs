use std::collections::{BTreeMap, BTreeSet, HashMap};

use ndarray::Array2;

use super::dataset::Instance;
use crate::errors::{Error, Result};

/// Feature type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeatureType {
    /// State feature: (attribute, label) -> weight
    State = 0,
    /// Transition feature: (prev_label, label) -> weight
    Transition = 1,
}

impl FeatureType {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(Self::State),
            1 => Some(Self::Transition),
            _ => None,
        }
    }
}

/// A CRF feature descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Feature {
    /// Feature type
    pub ftype: FeatureType,
    /// Source ID (attribute ID for state, prev label ID for transition)
    pub src: u32,
    /// Target ID (label ID)
    pub dst: u32,
}

/// Feature references for fast lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureRefs {
    /// Feature IDs
    pub fids: Vec<u32>,
}

/// Options of the feature generation pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateOptions {
    /// Minimum frequency of an observed state feature
    pub min_freq: f64,
    /// Generate every (attribute, label) pair rather than the observed ones
    pub possible_states: bool,
}

/// Feature set of a model together with its weights
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureGenerator {
    /// All features
    pub features: Vec<Feature>,
    /// Feature weights, indexed by feature ID
    pub weights: Vec<f64>,
    /// Feature references by attribute ID
    pub attr_refs: Vec<FeatureRefs>,
    /// Feature references by label ID (for transitions)
    pub label_refs: Vec<FeatureRefs>,
}

impl FeatureGenerator {
    /// Feature set without any feature over `num_labels` labels
    pub fn empty(num_labels: usize) -> Self {
        Self {
            label_refs: vec![FeatureRefs::default(); num_labels],
            ..Self::default()
        }
    }

    /// Generate features from training instances.
    ///
    /// State features are the (attribute, label) pairs observed with a
    /// frequency of at least `min_freq`, or all of them with
    /// `possible_states`. Transition features cover every label pair so the
    /// transition table is total. Features already present in `seed` keep
    /// their weight and are never dropped.
    pub fn generate(
        instances: &[Instance],
        num_attrs: usize,
        num_labels: usize,
        opts: GenerateOptions,
        seed: Option<&FeatureGenerator>,
    ) -> Result<Self> {
        // Count feature occurrences
        let mut state_counts: BTreeMap<(u32, u32), f64> = BTreeMap::new();
        for inst in instances {
            for (item, &label) in inst.items.iter().zip(&inst.labels) {
                for &aid in item {
                    *state_counts.entry((aid, label)).or_insert(0.0) += 1.0;
                }
            }
        }

        let seeded: HashMap<Feature, f64> = seed
            .map(|s| {
                s.features
                    .iter()
                    .copied()
                    .zip(s.weights.iter().copied())
                    .collect()
            })
            .unwrap_or_default();

        let mut state_keys: BTreeSet<(u32, u32)> = BTreeSet::new();
        if opts.possible_states {
            let mut seen_attrs: Vec<bool> = vec![false; num_attrs];
            for &(aid, _) in state_counts.keys() {
                if let Some(seen) = seen_attrs.get_mut(aid as usize) {
                    *seen = true;
                }
            }
            for (aid, _) in seen_attrs.iter().enumerate().filter(|&(_, &seen)| seen) {
                for lid in 0..num_labels as u32 {
                    state_keys.insert((aid as u32, lid));
                }
            }
        } else {
            for (&key, &freq) in &state_counts {
                if freq >= opts.min_freq {
                    state_keys.insert(key);
                }
            }
        }
        for f in seeded.keys().filter(|f| f.ftype == FeatureType::State) {
            state_keys.insert((f.src, f.dst));
        }

        // Build feature list
        let mut fgen = Self {
            features: Vec::new(),
            weights: Vec::new(),
            attr_refs: vec![FeatureRefs::default(); num_attrs],
            label_refs: vec![FeatureRefs::default(); num_labels],
        };

        // Add state features
        for (aid, lid) in state_keys {
            if aid as usize >= num_attrs || lid as usize >= num_labels {
                return Err(Error::invalid_model("feature refers to an unknown id"));
            }
            let feature = Feature {
                ftype: FeatureType::State,
                src: aid,
                dst: lid,
            };
            let fid = fgen.push(feature, seeded.get(&feature).copied().unwrap_or(0.0))?;
            fgen.attr_refs[aid as usize].fids.push(fid);
        }

        // Add transition features
        for prev in 0..num_labels as u32 {
            for lid in 0..num_labels as u32 {
                let feature = Feature {
                    ftype: FeatureType::Transition,
                    src: prev,
                    dst: lid,
                };
                let fid = fgen.push(feature, seeded.get(&feature).copied().unwrap_or(0.0))?;
                fgen.label_refs[prev as usize].fids.push(fid);
            }
        }

        Ok(fgen)
    }

    fn push(&mut self, feature: Feature, weight: f64) -> Result<u32> {
        let fid = u32::try_from(self.features.len())
            .map_err(|_| Error::invalid_param("too many features"))?;
        self.features.push(feature);
        self.weights.push(weight);
        Ok(fid)
    }

    /// Rebuild the reference tables from a plain feature list.
    pub fn from_features(
        features: Vec<Feature>,
        weights: Vec<f64>,
        num_attrs: usize,
        num_labels: usize,
    ) -> Result<Self> {
        if features.len() != weights.len() {
            return Err(Error::invalid_model("feature and weight counts differ"));
        }
        let mut attr_refs = vec![FeatureRefs::default(); num_attrs];
        let mut label_refs = vec![FeatureRefs::default(); num_labels];
        for (fid, f) in features.iter().enumerate() {
            if f.dst as usize >= num_labels {
                return Err(Error::invalid_model("feature target out of range"));
            }
            let refs = match f.ftype {
                FeatureType::State => attr_refs.get_mut(f.src as usize),
                FeatureType::Transition => label_refs.get_mut(f.src as usize),
            };
            refs.ok_or_else(|| Error::invalid_model("feature source out of range"))?
                .fids
                .push(fid as u32);
        }
        Ok(Self {
            features,
            weights,
            attr_refs,
            label_refs,
        })
    }

    /// Get the number of features
    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    pub fn num_labels(&self) -> usize {
        self.label_refs.len()
    }

    /// Compute state scores of an item sequence under weights `w`
    pub fn state_scores(&self, items: &[Vec<u32>], w: &[f64]) -> Array2<f64> {
        let mut state = Array2::zeros((items.len(), self.num_labels()));
        for (t, item) in items.iter().enumerate() {
            for &aid in item {
                if let Some(refs) = self.attr_refs.get(aid as usize) {
                    for &fid in &refs.fids {
                        let f = &self.features[fid as usize];
                        state[[t, f.dst as usize]] += w[fid as usize];
                    }
                }
            }
        }
        state
    }

    /// Compute transition scores between two labels under weights `w`
    pub fn transition_scores(&self, w: &[f64]) -> Array2<f64> {
        let l = self.num_labels();
        let mut trans = Array2::zeros((l, l));
        for refs in &self.label_refs {
            for &fid in &refs.fids {
                let f = &self.features[fid as usize];
                trans[[f.src as usize, f.dst as usize]] = w[fid as usize];
            }
        }
        trans
    }

    /// Feature ID of the transition `prev -> label`, if any
    pub fn transition_fid(&self, prev: u32, label: u32) -> Option<u32> {
        self.label_refs.get(prev as usize).and_then(|refs| {
            refs.fids
                .iter()
                .copied()
                .find(|&fid| self.features[fid as usize].dst == label)
        })
    }

    /// Feature ID of the state feature `(attr, label)`, if any
    pub fn state_fid(&self, aid: u32, label: u32) -> Option<u32> {
        self.attr_refs.get(aid as usize).and_then(|refs| {
            refs.fids
                .iter()
                .copied()
                .find(|&fid| self.features[fid as usize].dst == label)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance() -> Instance {
        // attrs: walk = 0, shop = 1; labels: sunny = 0, rainy = 1
        let mut inst = Instance::with_capacity(3);
        inst.push(vec![0], 0);
        inst.push(vec![1], 0);
        inst.push(vec![0], 1);
        inst
    }

    #[test]
    fn test_feature_generation() {
        let fgen =
            FeatureGenerator::generate(&[instance()], 2, 2, GenerateOptions::default(), None)
                .unwrap();

        // walk/sunny, walk/rainy, shop/sunny + 4 transitions
        assert_eq!(fgen.num_features(), 7);
        assert!(fgen.state_fid(0, 0).is_some());
        assert!(fgen.state_fid(1, 1).is_none());
        // transitions are total even though rainy -> sunny was never observed
        assert!(fgen.transition_fid(1, 0).is_some());
        assert!(fgen.weights.iter().all(|&w| w == 0.0));
    }

    #[test]
    fn test_min_freq_and_possible_states() {
        let opts = GenerateOptions {
            min_freq: 2.0,
            possible_states: false,
        };
        let fgen = FeatureGenerator::generate(&[instance()], 2, 2, opts, None).unwrap();
        assert_eq!(fgen.num_features(), 4);

        let opts = GenerateOptions {
            min_freq: 0.0,
            possible_states: true,
        };
        let fgen = FeatureGenerator::generate(&[instance()], 2, 2, opts, None).unwrap();
        assert_eq!(fgen.num_features(), 8);
    }

    #[test]
    fn test_seeded_weights_survive() {
        let mut seed =
            FeatureGenerator::generate(&[instance()], 2, 2, GenerateOptions::default(), None)
                .unwrap();
        let fid = seed.state_fid(1, 0).unwrap() as usize;
        seed.weights[fid] = 0.75;

        let mut other = Instance::with_capacity(1);
        other.push(vec![0], 1);
        let fgen = FeatureGenerator::generate(
            &[other],
            2,
            2,
            GenerateOptions::default(),
            Some(&seed),
        )
        .unwrap();
        let fid = fgen.state_fid(1, 0).unwrap() as usize;
        assert_eq!(fgen.weights[fid], 0.75);
    }

    #[test]
    fn test_scores() {
        let mut fgen =
            FeatureGenerator::generate(&[instance()], 2, 2, GenerateOptions::default(), None)
                .unwrap();
        let fid = fgen.state_fid(0, 1).unwrap() as usize;
        fgen.weights[fid] = 2.0;
        let tid = fgen.transition_fid(0, 1).unwrap() as usize;
        fgen.weights[tid] = -1.0;

        let state = fgen.state_scores(&[vec![0, 1], vec![1]], &fgen.weights);
        assert_eq!(state[[0, 1]], 2.0);
        assert_eq!(state[[1, 1]], 0.0);
        let trans = fgen.transition_scores(&fgen.weights);
        assert_eq!(trans[[0, 1]], -1.0);
        assert_eq!(trans[[1, 0]], 0.0);
    }
}
