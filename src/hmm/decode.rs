//! Viterbi decoders over the trigram tables.

use ndarray::{Array2, Array3, ArrayView1};

use super::Tables;

fn argmax(row: ArrayView1<'_, f64>) -> (usize, f64) {
    let mut best = 0;
    let mut max = f64::NEG_INFINITY;
    for (i, &v) in row.iter().enumerate() {
        if i == 0 || max < v {
            max = v;
            best = i;
        }
    }
    (best, max)
}

/// Bigram-lattice Viterbi. The label two positions back is taken to be the
/// best-scoring label of that column rather than the one on the path being
/// extended.
pub(super) fn approximate(tables: &Tables, emissions: &Array2<f64>) -> (Vec<u32>, f64) {
    let n = emissions.nrows();
    let l = emissions.ncols();
    if n == 0 || l == 0 {
        return (Vec::new(), 0.0);
    }
    let start = l;

    let mut delta = Array2::<f64>::zeros((n, l));
    let mut backward_edge = Array2::<u32>::zeros((n, l));
    for j in 0..l {
        delta[[0, j]] = tables.initial[j] + emissions[[0, j]];
    }

    for t in 1..n {
        let k = if t >= 2 {
            argmax(delta.row(t - 2)).0
        } else {
            start
        };
        for j in 0..l {
            let mut max_score = f64::NEG_INFINITY;
            let mut best_prev = 0;
            for i in 0..l {
                let s = delta[[t - 1, i]] + tables.transition[[k, i, j]];
                if i == 0 || max_score < s {
                    max_score = s;
                    best_prev = i;
                }
            }
            backward_edge[[t, j]] = best_prev as u32;
            delta[[t, j]] = max_score + emissions[[t, j]];
        }
    }

    let (best, score) = argmax(delta.row(n - 1));
    let mut labels = vec![0u32; n];
    labels[n - 1] = best as u32;
    for t in (0..n - 1).rev() {
        labels[t] = backward_edge[[t + 1, labels[t + 1] as usize]];
    }
    (labels, score)
}

/// Exact trigram Viterbi over `(previous, current)` label pairs, O(n·L³).
pub(super) fn exact(tables: &Tables, emissions: &Array2<f64>) -> (Vec<u32>, f64) {
    let n = emissions.nrows();
    let l = emissions.ncols();
    if n == 0 || l == 0 {
        return (Vec::new(), 0.0);
    }
    let start = l;

    let first: Vec<f64> = (0..l)
        .map(|j| tables.initial[j] + emissions[[0, j]])
        .collect();
    if n == 1 {
        let (best, score) = argmax(ArrayView1::from(&first[..]));
        return (vec![best as u32], score);
    }

    // delta[[t, i, j]]: best score with label i at t-1 and j at t
    let mut delta = Array3::<f64>::from_elem((n, l, l), f64::NEG_INFINITY);
    let mut backward_edge = Array3::<u32>::zeros((n, l, l));
    for i in 0..l {
        for j in 0..l {
            delta[[1, i, j]] = first[i] + tables.transition[[start, i, j]] + emissions[[1, j]];
        }
    }
    for t in 2..n {
        for j in 0..l {
            for k in 0..l {
                let mut max_score = f64::NEG_INFINITY;
                let mut best_prev = 0;
                for i in 0..l {
                    let s = delta[[t - 1, i, j]] + tables.transition[[i, j, k]];
                    if i == 0 || max_score < s {
                        max_score = s;
                        best_prev = i;
                    }
                }
                delta[[t, j, k]] = max_score + emissions[[t, k]];
                backward_edge[[t, j, k]] = best_prev as u32;
            }
        }
    }

    let mut best = (0, 0);
    let mut score = f64::NEG_INFINITY;
    for i in 0..l {
        for j in 0..l {
            let s = delta[[n - 1, i, j]];
            if (i == 0 && j == 0) || score < s {
                score = s;
                best = (i, j);
            }
        }
    }
    let mut labels = vec![0u32; n];
    labels[n - 2] = best.0 as u32;
    labels[n - 1] = best.1 as u32;
    for t in (2..n).rev() {
        labels[t - 2] = backward_edge[[t, labels[t - 1] as usize, labels[t] as usize]];
    }
    (labels, score)
}

#[cfg(test)]
mod tests {
    use ndarray::{Array1, Array3};

    use super::*;

    /// Joint log probability of a labelling under the trigram model.
    fn path_score(tables: &Tables, emissions: &Array2<f64>, labels: &[u32]) -> f64 {
        let start = emissions.ncols();
        let mut score = 0.0;
        for (t, &j) in labels.iter().enumerate() {
            let j = j as usize;
            score += emissions[[t, j]];
            score += match t {
                0 => tables.initial[j],
                1 => tables.transition[[start, labels[0] as usize, j]],
                _ => tables.transition[[labels[t - 2] as usize, labels[t - 1] as usize, j]],
            };
        }
        score
    }

    fn tables(l: usize, seed: u64) -> Tables {
        let mut x = seed;
        let mut next = move || {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            -(((x >> 33) % 1000) as f64 / 250.0) - 0.01
        };
        Tables {
            initial: Array1::from_shape_fn(l, |_| next()),
            emission: Array2::zeros((0, l)),
            unseen: Array1::zeros(l),
            transition: Array3::from_shape_fn((l + 1, l + 1, l), |_| next()),
        }
    }

    #[test]
    fn test_exact_matches_brute_force() {
        let l = 3;
        for seed in 1..6u64 {
            let tables = tables(l, seed);
            for n in 0..5 {
                let emissions = Array2::from_shape_fn((n, l), |(t, j)| {
                    -(((t * 7 + j * 3 + seed as usize) % 5) as f64)
                });
                let (labels, score) = exact(&tables, &emissions);
                assert_eq!(labels.len(), n);

                let mut best = if n == 0 { 0.0 } else { f64::NEG_INFINITY };
                let total = l.pow(n as u32);
                for code in 0..total {
                    let mut c = code;
                    let path: Vec<u32> = (0..n)
                        .map(|_| {
                            let v = (c % l) as u32;
                            c /= l;
                            v
                        })
                        .collect();
                    best = best.max(path_score(&tables, &emissions, &path));
                }
                assert!((score - best).abs() < 1e-9);
                if n > 0 {
                    assert!((path_score(&tables, &emissions, &labels) - score).abs() < 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_approximate_lengths() {
        let tables = tables(2, 7);
        for n in 0..6 {
            let emissions = Array2::from_elem((n, 2), -1.0);
            let (labels, _) = approximate(&tables, &emissions);
            assert_eq!(labels.len(), n);
        }
    }
}
