// ============================================================
// Layer 5 — Classifier Trait
// ============================================================
// The seam every fitted model sits behind. Models work on class
// codes 0..k; turning codes back into label strings is the
// pipeline's job, not the classifier's.

use ndarray::{Array2, ArrayView2};

pub trait Classifier {
    /// Number of classes the model was fitted for.
    fn n_classes(&self) -> usize;

    /// Class probabilities, shape [n_samples, n_classes]; rows sum to 1.
    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Array2<f64>;

    /// Most probable class code per row.
    fn predict(&self, x: ArrayView2<'_, f64>) -> Vec<usize> {
        argmax_rows(&self.predict_proba(x))
    }
}

/// Index of the largest entry in each row; the first one wins ties.
pub fn argmax_rows(p: &Array2<f64>) -> Vec<usize> {
    p.rows()
        .into_iter()
        .map(|row| {
            let mut best = 0;
            for (k, &v) in row.iter().enumerate() {
                if v > row[best] {
                    best = k;
                }
            }
            best
        })
        .collect()
}

/// Numerically stable softmax of one row of scores, in place.
pub fn softmax_in_place(scores: &mut [f64]) {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for s in scores.iter_mut() {
        *s = (*s - max).exp();
        sum += *s;
    }
    for s in scores.iter_mut() {
        *s /= sum;
    }
}
