use ndarray::{Array1, ArrayView1};

/// Count how many labels fall in each of `n_classes` classes.
///
/// Labels outside `[0, n_classes)` are ignored; callers validate labels first.
pub fn value_counts(labels: &[usize], n_classes: usize) -> Vec<usize> {
    let mut counts = vec![0usize; n_classes];
    for &label in labels {
        if label < n_classes {
            counts[label] += 1;
        }
    }
    counts
}

/// Index of the largest value. Exact ties resolve to the lowest index.
pub fn argmax(row: ArrayView1<f64>) -> usize {
    let mut best = 0;
    let mut best_val = f64::NEG_INFINITY;
    for (idx, &val) in row.iter().enumerate() {
        if val > best_val {
            best_val = val;
            best = idx;
        }
    }
    best
}

/// Rescale a nonnegative vector to sum to one. Returns `None` for a zero vector.
pub fn normalize(v: &Array1<f64>) -> Option<Array1<f64>> {
    let total = v.sum();
    if total <= 0.0 || !total.is_finite() {
        return None;
    }
    Some(v / total)
}

pub fn l1_distance(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
}
