// ============================================================
// Layer 5 — Standard Scaler
// ============================================================
// z = (x - mean) / std, per column, with the population standard
// deviation. Columns with (near) zero spread keep a scale of 1 so
// constant features pass through centred instead of dividing by 0.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean:  Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    /// Learn per-column mean and standard deviation.
    pub fn fit(x: ArrayView2<'_, f64>) -> Self {
        let n = x.nrows().max(1) as f64;
        let mean = x.sum_axis(Axis(0)) / n;
        let centered = &x - &mean;
        let var = centered.mapv(|v| v * v).sum_axis(Axis(0)) / n;
        let scale = var.mapv(|v| {
            let s = v.sqrt();
            if s < 10.0 * f64::EPSILON { 1.0 } else { s }
        });
        Self { mean, scale }
    }

    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        (&x - &self.mean) / &self.scale
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_zero_mean_unit_variance() {
        let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]];
        let scaler = StandardScaler::fit(x.view());
        let z = scaler.transform(x.view());
        for col in z.columns() {
            let mean = col.sum() / 4.0;
            let var  = col.mapv(|v| (v - mean).powi(2)).sum() / 4.0;
            assert!(mean.abs() < 1e-12);
            assert!((var - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_constant_column_is_only_centred() {
        let x = array![[5.0, 1.0], [5.0, 2.0], [5.0, 3.0]];
        let scaler = StandardScaler::fit(x.view());
        assert_eq!(scaler.scale[0], 1.0);
        let z = scaler.transform(x.view());
        assert!(z.column(0).iter().all(|&v| v == 0.0));
    }
}
