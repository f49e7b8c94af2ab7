// ============================================================
// Layer 5 — Gradient-Boosted Trees
// ============================================================
// Second-order boosting over histogram-binned features.
//
// Setup:
//   - each feature is cut into at most `max_bin` bins, at its
//     distinct values when there are few, at quantiles otherwise
//   - two classes → one logistic output, margin starts at
//     logit(positive rate); more classes → one softmax output
//     per class, margins start at 0
//
// Each round:
//   1. g, h of the log-loss at the current margins
//   2. Bernoulli row sample (subsample), per-tree column sample
//      (colsample_bytree)
//   3. per output, grow a depth-limited tree: at each node scan
//      the bin histograms for the split with the largest gain
//
//        gain = ½ [G_L²/(H_L+λ) + G_R²/(H_R+λ) − G²/(H+λ)]
//
//      leaves get weight −G/(H+λ), shrunk by the learning rate
//   4. add the new trees' output to every row's margin
//
// A split at bin b stores the raw threshold of that bin edge, so
// prediction walks the trees on unbinned values.

use anyhow::{bail, Result};
use ndarray::{Array2, ArrayView2};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::ml::classifier::{softmax_in_place, Classifier};
use crate::ml::tree::{Node, Tree};

const MIN_GAIN: f64    = 1e-6;
const MIN_HESSIAN: f64 = 1e-16;
const RATE_CLAMP: f64  = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    pub n_estimators:     usize,
    pub max_depth:        usize,
    pub learning_rate:    f64,
    pub subsample:        f64,
    pub colsample_bytree: f64,
    pub lambda:           f64,
    pub min_child_weight: f64,
    pub max_bin:          usize,
    pub seed:             u64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators:     300,
            max_depth:        6,
            learning_rate:    0.1,
            subsample:        0.8,
            colsample_bytree: 0.8,
            lambda:           1.0,
            min_child_weight: 1.0,
            max_bin:          256,
            seed:             42,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Objective {
    /// One margin; P(class 1) = σ(margin)
    Logistic,
    /// One margin per class; probabilities = softmax(margins)
    Softmax,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    objective:   Objective,
    base_margin: Vec<f64>,
    /// rounds[r][k] is the tree for output k in round r
    rounds:      Vec<Vec<Tree<f64>>>,
    n_classes:   usize,
}

impl GradientBoosting {
    pub fn fit(
        params:    &BoostingParams,
        x:         ArrayView2<'_, f64>,
        y:         &[usize],
        n_classes: usize,
    ) -> Result<Self> {
        let n = x.nrows();
        if n == 0 || n != y.len() {
            bail!("gradient boosting needs matching, non-empty features and labels ({} rows, {} labels)", n, y.len());
        }
        let n_classes = n_classes.max(1);
        let (objective, base_margin) = if n_classes == 2 {
            let rate = y.iter().filter(|&&c| c == 1).count() as f64 / n as f64;
            let rate = rate.clamp(RATE_CLAMP, 1.0 - RATE_CLAMP);
            (Objective::Logistic, vec![(rate / (1.0 - rate)).ln()])
        } else {
            (Objective::Softmax, vec![0.0; n_classes])
        };
        let outputs = base_margin.len();

        let bins    = BinnedFeatures::build(x, params.max_bin);
        let n_cols  = ((params.colsample_bytree * x.ncols() as f64).round() as usize).clamp(1, x.ncols().max(1));
        let mut rng = StdRng::seed_from_u64(params.seed);

        let mut margins = Array2::from_shape_fn((n, outputs), |(_, k)| base_margin[k]);
        let mut model = Self { objective, base_margin, rounds: Vec::with_capacity(params.n_estimators), n_classes };

        let mut grad = vec![0.0; n * outputs];
        let mut hess = vec![0.0; n * outputs];
        for _ in 0..params.n_estimators {
            model.gradients(&margins, y, &mut grad, &mut hess);

            let mut rows: Vec<usize> = (0..n).filter(|_| rng.gen_bool(params.subsample.clamp(0.0, 1.0))).collect();
            if rows.is_empty() {
                rows = (0..n).collect();
            }

            let mut round = Vec::with_capacity(outputs);
            for k in 0..outputs {
                let mut features: Vec<usize> = (0..x.ncols()).collect();
                features.shuffle(&mut rng);
                features.truncate(n_cols);

                let g: Vec<f64> = (0..n).map(|i| grad[i * outputs + k]).collect();
                let h: Vec<f64> = (0..n).map(|i| hess[i * outputs + k]).collect();
                let mut grower = HistogramGrower { params, bins: &bins, grad: &g, hess: &h, features, tree: Tree::new() };
                let root = grower.grow(&mut rows.clone(), 0);
                let mut tree = grower.tree;
                tree.set_root(root);

                for (i, row) in x.rows().into_iter().enumerate() {
                    margins[[i, k]] += *tree.leaf(row);
                }
                round.push(tree);
            }
            model.rounds.push(round);
        }

        tracing::debug!(
            "Gradient boosting fitted: {} rounds x {} output(s), {} nodes",
            model.rounds.len(),
            outputs,
            model.rounds.iter().flatten().map(Tree::node_count).sum::<usize>()
        );
        Ok(model)
    }

    /// Log-loss gradient and hessian at the current margins, laid
    /// out row-major as [row * outputs + k].
    fn gradients(&self, margins: &Array2<f64>, y: &[usize], grad: &mut [f64], hess: &mut [f64]) {
        let outputs = margins.ncols();
        for (i, row) in margins.rows().into_iter().enumerate() {
            match self.objective {
                Objective::Logistic => {
                    let p      = sigmoid(row[0]);
                    let target = if y[i] == 1 { 1.0 } else { 0.0 };
                    grad[i] = p - target;
                    hess[i] = (p * (1.0 - p)).max(MIN_HESSIAN);
                }
                Objective::Softmax => {
                    let mut p = row.to_vec();
                    softmax_in_place(&mut p);
                    for (k, pk) in p.into_iter().enumerate() {
                        let target = if y[i] == k { 1.0 } else { 0.0 };
                        grad[i * outputs + k] = pk - target;
                        hess[i * outputs + k] = (2.0 * pk * (1.0 - pk)).max(MIN_HESSIAN);
                    }
                }
            }
        }
    }
}

impl Classifier for GradientBoosting {
    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        let mut proba = Array2::<f64>::zeros((x.nrows(), self.n_classes));
        for (i, row) in x.rows().into_iter().enumerate() {
            let mut margin = self.base_margin.clone();
            for round in &self.rounds {
                for (k, tree) in round.iter().enumerate() {
                    margin[k] += *tree.leaf(row);
                }
            }
            match self.objective {
                Objective::Logistic => {
                    let p = sigmoid(margin[0]);
                    proba[[i, 0]] = 1.0 - p;
                    proba[[i, 1]] = p;
                }
                Objective::Softmax => {
                    softmax_in_place(&mut margin);
                    for (k, p) in margin.into_iter().enumerate() {
                        proba[[i, k]] = p;
                    }
                }
            }
        }
        proba
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

// ─── Binning ──────────────────────────────────────────────────────────────────

/// Per-feature bin edges and the bin index of every training value.
/// Bin b holds values in [edges[b-1], edges[b]).
struct BinnedFeatures {
    edges: Vec<Vec<f64>>,
    /// codes[feature][row]
    codes: Vec<Vec<u16>>,
}

impl BinnedFeatures {
    fn build(x: ArrayView2<'_, f64>, max_bin: usize) -> Self {
        let max_bin = max_bin.clamp(2, u16::MAX as usize);
        let mut edges = Vec::with_capacity(x.ncols());
        let mut codes = Vec::with_capacity(x.ncols());
        for column in x.columns() {
            let mut sorted: Vec<f64> = column.to_vec();
            sorted.sort_by(f64::total_cmp);
            let mut distinct = sorted.clone();
            distinct.dedup();

            let cuts: Vec<f64> = if distinct.len() <= max_bin {
                distinct.into_iter().skip(1).collect()
            } else {
                let mut cuts: Vec<f64> = (1..max_bin)
                    .map(|q| sorted[q * sorted.len() / max_bin])
                    .filter(|&v| v > sorted[0])
                    .collect();
                cuts.dedup();
                cuts
            };
            codes.push(column.iter().map(|&v| cuts.partition_point(|&c| c <= v) as u16).collect());
            edges.push(cuts);
        }
        Self { edges, codes }
    }

    fn n_bins(&self, feature: usize) -> usize {
        self.edges[feature].len() + 1
    }
}

// ─── Tree Growing ─────────────────────────────────────────────────────────────

struct Candidate {
    gain:    f64,
    feature: usize,
    /// rows with code < bin go left
    bin:     usize,
}

struct HistogramGrower<'a> {
    params:   &'a BoostingParams,
    bins:     &'a BinnedFeatures,
    grad:     &'a [f64],
    hess:     &'a [f64],
    features: Vec<usize>,
    tree:     Tree<f64>,
}

impl HistogramGrower<'_> {
    fn grow(&mut self, rows: &mut [usize], depth: usize) -> usize {
        let g: f64 = rows.iter().map(|&r| self.grad[r]).sum();
        let h: f64 = rows.iter().map(|&r| self.hess[r]).sum();

        let split = if depth < self.params.max_depth && h >= 2.0 * self.params.min_child_weight {
            self.best_split(rows, g, h)
        } else {
            None
        };
        let Some(split) = split else {
            let weight = -g / (h + self.params.lambda) * self.params.learning_rate;
            return self.tree.push(Node::Leaf(weight));
        };

        let codes = &self.bins.codes[split.feature];
        let mut cut = 0;
        for i in 0..rows.len() {
            if (codes[rows[i]] as usize) < split.bin {
                rows.swap(i, cut);
                cut += 1;
            }
        }
        let (left_rows, right_rows) = rows.split_at_mut(cut);
        let left  = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);

        let threshold = self.bins.edges[split.feature][split.bin - 1];
        self.tree.push(Node::Split { feature: split.feature, threshold, left, right })
    }

    fn best_split(&self, rows: &[usize], g: f64, h: f64) -> Option<Candidate> {
        let lambda = self.params.lambda;
        let mcw    = self.params.min_child_weight;
        let parent = g * g / (h + lambda);

        let mut best: Option<Candidate> = None;
        for &feature in &self.features {
            let n_bins = self.bins.n_bins(feature);
            if n_bins < 2 {
                continue;
            }
            let codes = &self.bins.codes[feature];
            let mut hist_g = vec![0.0; n_bins];
            let mut hist_h = vec![0.0; n_bins];
            for &r in rows {
                let b = codes[r] as usize;
                hist_g[b] += self.grad[r];
                hist_h[b] += self.hess[r];
            }

            let (mut gl, mut hl) = (0.0, 0.0);
            for bin in 1..n_bins {
                gl += hist_g[bin - 1];
                hl += hist_h[bin - 1];
                let (gr, hr) = (g - gl, h - hl);
                if hl < mcw || hr < mcw {
                    continue;
                }
                let gain = 0.5 * (gl * gl / (hl + lambda) + gr * gr / (hr + lambda) - parent);
                if gain > MIN_GAIN && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(Candidate { gain, feature, bin });
                }
            }
        }
        best
    }
}
