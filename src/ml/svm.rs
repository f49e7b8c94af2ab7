// ============================================================
// Layer 5 — Support Vector Classifier
// ============================================================
// C-SVC with an RBF kernel, trained one-vs-one.
//
// For every pair of classes (a, b) a binary machine solves
//
//   min ½ αᵀQα − eᵀα   s.t.  0 ≤ α ≤ C,  yᵀα = 0
//   Q_ij = y_i y_j K(x_i, x_j),  K(u, v) = exp(−γ‖u − v‖²)
//
// with SMO: each iteration picks the maximal-violating pair using
// second-order working-set selection, solves the two-variable
// sub-problem analytically and updates the gradient. Kernel
// columns are computed on demand, so memory stays O(n).
//
// γ = 1 / (d · Var(X)) over the whole training matrix.
//
// Prediction is a majority vote over the pairwise machines.
// Probabilities come from a sigmoid (Platt) fitted on each
// machine's decision values, coupled into one distribution per
// row by the pairwise-coupling fixed point iteration.

use anyhow::{bail, Result};
use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::ml::classifier::Classifier;

const TAU: f64 = 1e-12;
const PROB_CLAMP: f64 = 1e-7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvmParams {
    pub c:         f64,
    /// None → "scale": 1 / (n_features · Var(X))
    pub gamma:     Option<f64>,
    pub tol:       f64,
    pub max_iter:  usize,
    pub probability: bool,
}

impl Default for SvmParams {
    fn default() -> Self {
        Self {
            c:           3.0,
            gamma:       None,
            tol:         1e-3,
            max_iter:    300,
            probability: true,
        }
    }
}

/// One fitted pairwise machine: class `positive` vs class `negative`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BinaryMachine {
    positive: usize,
    negative: usize,
    /// Support vectors, one per row
    support:  Array2<f64>,
    /// α_i · y_i for each support vector
    coef:     Vec<f64>,
    rho:      f64,
    /// Platt sigmoid parameters (A, B)
    sigmoid:  Option<(f64, f64)>,
}

impl BinaryMachine {
    fn decision(&self, row: ArrayView1<'_, f64>, gamma: f64) -> f64 {
        let sum: f64 = self
            .support
            .rows()
            .into_iter()
            .zip(&self.coef)
            .map(|(sv, c)| c * rbf(sv, row, gamma))
            .sum();
        sum - self.rho
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvmClassifier {
    machines:  Vec<BinaryMachine>,
    gamma:     f64,
    n_classes: usize,
}

impl SvmClassifier {
    pub fn fit(
        params:    &SvmParams,
        x:         ArrayView2<'_, f64>,
        y:         &[usize],
        n_classes: usize,
    ) -> Result<Self> {
        if x.nrows() == 0 || x.nrows() != y.len() {
            bail!("SVM needs matching, non-empty features and labels ({} rows, {} labels)", x.nrows(), y.len());
        }
        let gamma = params.gamma.unwrap_or_else(|| scale_gamma(x));

        let mut members: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
        for (i, &label) in y.iter().enumerate() {
            members[label].push(i);
        }

        let mut machines = Vec::new();
        for a in 0..n_classes {
            for b in (a + 1)..n_classes {
                if members[a].is_empty() || members[b].is_empty() {
                    continue;
                }
                let rows: Vec<usize> = members[a].iter().chain(&members[b]).copied().collect();
                let signs: Vec<f64>  = rows.iter().map(|&r| if y[r] == a { 1.0 } else { -1.0 }).collect();
                let machine = train_pair(params, x, &rows, &signs, gamma, a, b);
                machines.push(machine);
            }
        }

        tracing::debug!(
            "SVM fitted: {} pairwise machine(s), gamma={:.4}, {} support vectors",
            machines.len(),
            gamma,
            machines.iter().map(|m| m.coef.len()).sum::<usize>()
        );
        Ok(Self { machines, gamma, n_classes })
    }

    fn votes(&self, row: ArrayView1<'_, f64>) -> Vec<usize> {
        let mut votes = vec![0usize; self.n_classes];
        for m in &self.machines {
            if m.decision(row, self.gamma) > 0.0 {
                votes[m.positive] += 1;
            } else {
                votes[m.negative] += 1;
            }
        }
        votes
    }
}

impl Classifier for SvmClassifier {
    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Vec<usize> {
        x.rows()
            .into_iter()
            .map(|row| {
                let votes = self.votes(row);
                let mut best = 0;
                for (k, &v) in votes.iter().enumerate() {
                    if v > votes[best] {
                        best = k;
                    }
                }
                best
            })
            .collect()
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        let k = self.n_classes;
        let mut proba = Array2::<f64>::zeros((x.nrows(), k));
        for (i, row) in x.rows().into_iter().enumerate() {
            // r[a][b] = P(class a | a or b)
            let mut r = vec![vec![0.5; k]; k];
            for m in &self.machines {
                let f = m.decision(row, self.gamma);
                let p = match m.sigmoid {
                    Some((a, b)) => sigmoid_predict(f, a, b),
                    None         => if f > 0.0 { 1.0 } else { 0.0 },
                };
                let p = p.clamp(PROB_CLAMP, 1.0 - PROB_CLAMP);
                r[m.positive][m.negative] = p;
                r[m.negative][m.positive] = 1.0 - p;
            }
            for (c, p) in couple_pairwise(&r).into_iter().enumerate() {
                proba[[i, c]] = p;
            }
        }
        proba
    }
}

/// "scale" gamma: 1 / (n_features · variance of all entries).
fn scale_gamma(x: ArrayView2<'_, f64>) -> f64 {
    let count = x.len() as f64;
    let mean  = x.sum() / count;
    let var   = x.mapv(|v| (v - mean).powi(2)).sum() / count;
    if var > 0.0 { 1.0 / (x.ncols() as f64 * var) } else { 1.0 }
}

fn rbf(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>, gamma: f64) -> f64 {
    let dist: f64 = a.iter().zip(b.iter()).map(|(u, v)| (u - v) * (u - v)).sum();
    (-gamma * dist).exp()
}

// ─── SMO Solver ───────────────────────────────────────────────────────────────

/// Train one binary machine on `rows` with labels `signs` (±1).
fn train_pair(
    params:   &SvmParams,
    x:        ArrayView2<'_, f64>,
    rows:     &[usize],
    signs:    &[f64],
    gamma:    f64,
    positive: usize,
    negative: usize,
) -> BinaryMachine {
    let n = rows.len();
    let c = params.c;
    let kernel = |i: usize, j: usize| rbf(x.row(rows[i]), x.row(rows[j]), gamma);
    // Q column: Q[t][i] = y_t y_i K(t, i)
    let q_column = |i: usize| -> Vec<f64> {
        (0..n).map(|t| signs[t] * signs[i] * kernel(t, i)).collect()
    };

    let mut alpha = vec![0.0; n];
    let mut grad  = vec![-1.0; n];
    let is_upper  = |a: f64| a >= c;
    let is_lower  = |a: f64| a <= 0.0;

    let mut iter = 0;
    let mut converged = false;
    while iter < params.max_iter {
        // ── Working set selection (second order) ──────────────────────────────
        let mut g_max = f64::NEG_INFINITY;
        let mut i_sel = None;
        for t in 0..n {
            let eligible = if signs[t] > 0.0 { !is_upper(alpha[t]) } else { !is_lower(alpha[t]) };
            if eligible && -signs[t] * grad[t] >= g_max {
                g_max = -signs[t] * grad[t];
                i_sel = Some(t);
            }
        }
        let Some(i) = i_sel else {
            converged = true;
            break;
        };
        let q_i = q_column(i);

        let mut g_max2       = f64::NEG_INFINITY;
        let mut j_sel        = None;
        let mut obj_diff_min = f64::INFINITY;
        for t in 0..n {
            let eligible = if signs[t] > 0.0 { !is_lower(alpha[t]) } else { !is_upper(alpha[t]) };
            if !eligible {
                continue;
            }
            let y_grad    = signs[t] * grad[t];
            let grad_diff = g_max + y_grad;
            if y_grad >= g_max2 {
                g_max2 = y_grad;
            }
            if grad_diff > 0.0 {
                // K(i,i) = K(t,t) = 1 for the RBF kernel
                let quad = 2.0 - 2.0 * signs[i] * signs[t] * q_i[t];
                let quad = if quad > 0.0 { quad } else { TAU };
                let obj_diff = -(grad_diff * grad_diff) / quad;
                if obj_diff <= obj_diff_min {
                    obj_diff_min = obj_diff;
                    j_sel = Some(t);
                }
            }
        }
        let Some(j) = j_sel.filter(|_| g_max + g_max2 >= params.tol) else {
            converged = true;
            break;
        };
        let q_j = q_column(j);

        // ── Two-variable sub-problem ──────────────────────────────────────────
        let (old_i, old_j) = (alpha[i], alpha[j]);
        if signs[i] != signs[j] {
            let quad  = positive_or_tau(2.0 + 2.0 * q_i[j]);
            let delta = (-grad[i] - grad[j]) / quad;
            let diff  = alpha[i] - alpha[j];
            alpha[i] += delta;
            alpha[j] += delta;
            if diff > 0.0 {
                if alpha[j] < 0.0 { alpha[j] = 0.0; alpha[i] = diff; }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = -diff;
            }
            if diff > 0.0 {
                if alpha[i] > c { alpha[i] = c; alpha[j] = c - diff; }
            } else if alpha[j] > c {
                alpha[j] = c;
                alpha[i] = c + diff;
            }
        } else {
            let quad  = positive_or_tau(2.0 - 2.0 * q_i[j]);
            let delta = (grad[i] - grad[j]) / quad;
            let sum   = alpha[i] + alpha[j];
            alpha[i] -= delta;
            alpha[j] += delta;
            if sum > c {
                if alpha[i] > c { alpha[i] = c; alpha[j] = sum - c; }
            } else if alpha[j] < 0.0 {
                alpha[j] = 0.0;
                alpha[i] = sum;
            }
            if sum > c {
                if alpha[j] > c { alpha[j] = c; alpha[i] = sum - c; }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = sum;
            }
        }

        let (d_i, d_j) = (alpha[i] - old_i, alpha[j] - old_j);
        for t in 0..n {
            grad[t] += q_i[t] * d_i + q_j[t] * d_j;
        }
        iter += 1;
    }

    if !converged {
        tracing::warn!(
            "SVM solver for classes ({}, {}) stopped at the {}-iteration limit before converging",
            positive,
            negative,
            params.max_iter
        );
    }

    let rho = compute_rho(&alpha, &grad, signs, c);

    let support_idx: Vec<usize> = (0..n).filter(|&t| alpha[t] > 0.0).collect();
    let support = x.select(ndarray::Axis(0), &support_idx.iter().map(|&t| rows[t]).collect::<Vec<_>>());
    let coef    = support_idx.iter().map(|&t| alpha[t] * signs[t]).collect();

    let mut machine = BinaryMachine { positive, negative, support, coef, rho, sigmoid: None };
    if params.probability {
        let decisions: Vec<f64> = rows.iter().map(|&r| machine.decision(x.row(r), gamma)).collect();
        let targets: Vec<bool>  = signs.iter().map(|&s| s > 0.0).collect();
        machine.sigmoid = Some(sigmoid_train(&decisions, &targets));
    }
    machine
}

fn positive_or_tau(v: f64) -> f64 {
    if v > 0.0 { v } else { TAU }
}

/// Offset of the decision function from the final gradient: the
/// average over free vectors, or the midpoint of the feasible
/// interval when every α sits at a bound.
fn compute_rho(alpha: &[f64], grad: &[f64], signs: &[f64], c: f64) -> f64 {
    let mut upper    = f64::INFINITY;
    let mut lower    = f64::NEG_INFINITY;
    let mut free_sum = 0.0;
    let mut n_free   = 0usize;

    for t in 0..alpha.len() {
        let y_grad = signs[t] * grad[t];
        if alpha[t] >= c {
            if signs[t] < 0.0 { upper = upper.min(y_grad) } else { lower = lower.max(y_grad) }
        } else if alpha[t] <= 0.0 {
            if signs[t] > 0.0 { upper = upper.min(y_grad) } else { lower = lower.max(y_grad) }
        } else {
            n_free   += 1;
            free_sum += y_grad;
        }
    }

    if n_free > 0 {
        free_sum / n_free as f64
    } else if upper.is_finite() && lower.is_finite() {
        (upper + lower) / 2.0
    } else if upper.is_finite() {
        upper
    } else if lower.is_finite() {
        lower
    } else {
        0.0
    }
}

// ─── Probability Calibration ──────────────────────────────────────────────────

/// Fit P(y = +1 | f) = 1 / (1 + exp(A·f + B)) by Newton's method
/// with backtracking line search on regularised targets.
fn sigmoid_train(decisions: &[f64], targets: &[bool]) -> (f64, f64) {
    const MAX_ITER: usize = 100;
    const MIN_STEP: f64   = 1e-10;
    const SIGMA: f64      = 1e-12;
    const EPS: f64        = 1e-5;

    let prior1 = targets.iter().filter(|&&t| t).count() as f64;
    let prior0 = targets.len() as f64 - prior1;
    let hi     = (prior1 + 1.0) / (prior1 + 2.0);
    let lo     = 1.0 / (prior0 + 2.0);
    let t: Vec<f64> = targets.iter().map(|&p| if p { hi } else { lo }).collect();

    let objective = |a: f64, b: f64| -> f64 {
        decisions.iter().zip(&t).map(|(&f, &ti)| {
            let z = f * a + b;
            if z >= 0.0 { ti * z + (-z).exp().ln_1p() } else { (ti - 1.0) * z + z.exp().ln_1p() }
        }).sum()
    };

    let mut a    = 0.0;
    let mut b    = ((prior0 + 1.0) / (prior1 + 1.0)).ln();
    let mut fval = objective(a, b);

    for _ in 0..MAX_ITER {
        let (mut h11, mut h22, mut h21, mut g1, mut g2) = (SIGMA, SIGMA, 0.0, 0.0, 0.0);
        for (&f, &ti) in decisions.iter().zip(&t) {
            let z = f * a + b;
            let (p, q) = if z >= 0.0 {
                let e = (-z).exp();
                (e / (1.0 + e), 1.0 / (1.0 + e))
            } else {
                let e = z.exp();
                (1.0 / (1.0 + e), e / (1.0 + e))
            };
            let d2 = p * q;
            h11 += f * f * d2;
            h22 += d2;
            h21 += f * d2;
            let d1 = ti - p;
            g1 += f * d1;
            g2 += d1;
        }
        if g1.abs() < EPS && g2.abs() < EPS {
            break;
        }

        let det = h11 * h22 - h21 * h21;
        let da  = -(h22 * g1 - h21 * g2) / det;
        let db  = -(-h21 * g1 + h11 * g2) / det;
        let gd  = g1 * da + g2 * db;

        let mut step = 1.0;
        while step >= MIN_STEP {
            let (na, nb) = (a + step * da, b + step * db);
            let nf = objective(na, nb);
            if nf < fval + 1e-4 * step * gd {
                a    = na;
                b    = nb;
                fval = nf;
                break;
            }
            step /= 2.0;
        }
        if step < MIN_STEP {
            break;
        }
    }
    (a, b)
}

fn sigmoid_predict(f: f64, a: f64, b: f64) -> f64 {
    let z = f * a + b;
    if z >= 0.0 {
        let e = (-z).exp();
        e / (1.0 + e)
    } else {
        1.0 / (1.0 + z.exp())
    }
}

/// Combine pairwise probabilities r[i][j] = P(i | i or j) into one
/// class distribution (pairwise coupling, fixed-point iteration).
fn couple_pairwise(r: &[Vec<f64>]) -> Vec<f64> {
    let k = r.len();
    if k == 1 {
        return vec![1.0];
    }
    if k == 2 {
        return vec![r[0][1], r[1][0]];
    }

    let mut q = vec![vec![0.0; k]; k];
    for t in 0..k {
        for j in 0..k {
            if j != t {
                q[t][t] += r[j][t] * r[j][t];
                q[t][j]  = -r[j][t] * r[t][j];
            }
        }
    }

    let mut p  = vec![1.0 / k as f64; k];
    let mut qp = vec![0.0; k];
    let eps    = 0.005 / k as f64;
    for _ in 0..k.max(100) {
        let mut pqp = 0.0;
        for t in 0..k {
            qp[t] = (0..k).map(|j| q[t][j] * p[j]).sum();
            pqp  += p[t] * qp[t];
        }
        let max_error = (0..k).map(|t| (qp[t] - pqp).abs()).fold(0.0, f64::max);
        if max_error < eps {
            break;
        }
        for t in 0..k {
            let diff = (-qp[t] + pqp) / q[t][t];
            p[t] += diff;
            pqp = (pqp + diff * (diff * q[t][t] + 2.0 * qp[t])) / ((1.0 + diff) * (1.0 + diff));
            for j in 0..k {
                qp[j] = (qp[j] + diff * q[t][j]) / (1.0 + diff);
                p[j] /= 1.0 + diff;
            }
        }
    }
    p
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn blobs(centres: &[[f64; 4]], per_class: usize) -> (Array2<f64>, Vec<usize>) {
        let mut data = Vec::new();
        let mut y    = Vec::new();
        for (class, centre) in centres.iter().enumerate() {
            for i in 0..per_class {
                let jitter = (i as f64 / per_class as f64 - 0.5) * 0.4;
                for (d, c) in centre.iter().enumerate() {
                    data.push(c + if d % 2 == 0 { jitter } else { -jitter });
                }
                y.push(class);
            }
        }
        (Array2::from_shape_vec((y.len(), 4), data).unwrap(), y)
    }

    #[test]
    fn test_binary_blobs_are_separated() {
        let (x, y) = blobs(&[[-1.5, -1.5, 0.0, 0.0], [1.5, 1.5, 0.0, 0.0]], 15);
        let svm = SvmClassifier::fit(&SvmParams::default(), x.view(), &y, 2).unwrap();
        assert_eq!(svm.predict(x.view()), y);
    }

    #[test]
    fn test_three_classes_vote() {
        let (x, y) = blobs(&[
            [-2.0, 0.0, 0.0, 0.0],
            [2.0, 0.0, 0.0, 0.0],
            [0.0, 2.0, 2.0, 0.0],
        ], 12);
        let svm = SvmClassifier::fit(&SvmParams::default(), x.view(), &y, 3).unwrap();
        assert_eq!(svm.predict(x.view()), y);
        for row in svm.predict_proba(x.view()).rows() {
            assert!((row.sum() - 1.0).abs() < 1e-6);
            assert!(row.iter().all(|&p| (0.0..=1.0).contains(&p)));
        }
    }

    #[test]
    fn test_scale_gamma() {
        let x = ndarray::array![[1.0, -1.0], [-1.0, 1.0]];
        // variance of {1, -1, -1, 1} is 1, two features
        assert!((scale_gamma(x.view()) - 0.5).abs() < 1e-12);
        assert_eq!(scale_gamma(Array2::<f64>::ones((3, 2)).view()), 1.0);
    }

    #[test]
    fn test_pairwise_coupling_agrees_with_consistent_input() {
        // Consistent with p = (0.5, 0.3, 0.2)
        let p = [0.5, 0.3, 0.2];
        let r: Vec<Vec<f64>> = (0..3)
            .map(|i| (0..3).map(|j| if i == j { 0.0 } else { p[i] / (p[i] + p[j]) }).collect())
            .collect();
        let coupled = couple_pairwise(&r);
        for (a, b) in coupled.iter().zip(p) {
            assert!((a - b).abs() < 1e-2);
        }
    }

    #[test]
    fn test_sigmoid_orders_decisions() {
        let decisions = [-2.0, -1.5, -1.0, 1.0, 1.5, 2.0];
        let targets   = [false, false, false, true, true, true];
        let (a, b) = sigmoid_train(&decisions, &targets);
        assert!(sigmoid_predict(2.0, a, b) > 0.5);
        assert!(sigmoid_predict(-2.0, a, b) < 0.5);
    }

    #[test]
    fn test_iteration_cap_still_yields_model() {
        let (x, y) = blobs(&[[-1.0, 0.0, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0]], 40);
        let params = SvmParams { max_iter: 3, ..SvmParams::default() };
        let svm = SvmClassifier::fit(&params, x.view(), &y, 2).unwrap();
        assert_eq!(svm.predict(x.view()).len(), 80);
    }
}
