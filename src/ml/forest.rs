// ============================================================
// Layer 5 — Random Forest
// ============================================================
// Bagged CART classifiers.
//
// Per tree:
//   1. Draw n rows with replacement (bootstrap)
//   2. Grow depth-first; at every node try floor(sqrt(d)) randomly
//      chosen features and pick the split with the lowest
//      weighted Gini impurity
//   3. Stop at max_depth, at pure nodes, below min_samples_split
//      rows, or when no split lowers impurity
//   4. Leaves store the class frequencies of their rows
//
// Prediction averages leaf frequencies over all trees.
// One seeded RNG drives every draw, so a fixed seed reproduces
// the forest exactly.

use anyhow::{bail, Result};
use ndarray::{Array2, ArrayView2};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::ml::classifier::Classifier;
use crate::ml::tree::{Node, Tree};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators:      usize,
    pub max_depth:         usize,
    pub min_samples_split: usize,
    pub bootstrap:         bool,
    pub seed:              u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators:      300,
            max_depth:         6,
            min_samples_split: 2,
            bootstrap:         true,
            seed:              42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees:     Vec<Tree<Vec<f64>>>,
    n_classes: usize,
}

impl RandomForest {
    pub fn fit(
        params:    &ForestParams,
        x:         ArrayView2<'_, f64>,
        y:         &[usize],
        n_classes: usize,
    ) -> Result<Self> {
        let n = x.nrows();
        if n == 0 || n != y.len() {
            bail!("random forest needs matching, non-empty features and labels ({} rows, {} labels)", n, y.len());
        }
        let max_features = ((x.ncols() as f64).sqrt().floor() as usize).max(1);
        let mut rng      = StdRng::seed_from_u64(params.seed);

        let mut trees = Vec::with_capacity(params.n_estimators);
        for _ in 0..params.n_estimators {
            let mut rows: Vec<usize> = if params.bootstrap {
                (0..n).map(|_| rng.gen_range(0..n)).collect()
            } else {
                (0..n).collect()
            };
            let mut grower = CartGrower {
                x,
                y,
                n_classes,
                max_depth: params.max_depth,
                min_samples_split: params.min_samples_split.max(2),
                max_features,
                rng: &mut rng,
                tree: Tree::new(),
            };
            let root = grower.grow(&mut rows, 0);
            let mut tree = grower.tree;
            tree.set_root(root);
            trees.push(tree);
        }

        tracing::debug!(
            "Random forest grown: {} trees, max depth {}",
            trees.len(),
            trees.iter().map(Tree::depth).max().unwrap_or(0)
        );
        Ok(Self { trees, n_classes })
    }
}

impl Classifier for RandomForest {
    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        let mut proba = Array2::<f64>::zeros((x.nrows(), self.n_classes));
        for (i, row) in x.rows().into_iter().enumerate() {
            for tree in &self.trees {
                for (k, p) in tree.leaf(row).iter().enumerate() {
                    proba[[i, k]] += p;
                }
            }
        }
        proba / self.trees.len().max(1) as f64
    }
}

/// Best split found at one node.
struct Split {
    feature:   usize,
    threshold: f64,
}

/// Grows one CART tree over a bootstrap sample.
struct CartGrower<'a, 'x, 'r, R: Rng> {
    x:                 ArrayView2<'x, f64>,
    y:                 &'a [usize],
    n_classes:         usize,
    max_depth:         usize,
    min_samples_split: usize,
    max_features:      usize,
    rng:               &'r mut R,
    tree:              Tree<Vec<f64>>,
}

impl<R: Rng> CartGrower<'_, '_, '_, R> {
    fn grow(&mut self, rows: &mut [usize], depth: usize) -> usize {
        let counts = self.class_counts(rows);
        let pure   = counts.iter().filter(|&&c| c > 0).count() <= 1;

        if depth >= self.max_depth || rows.len() < self.min_samples_split || pure {
            return self.leaf(&counts, rows.len());
        }
        let Some(split) = self.best_split(rows, &counts) else {
            return self.leaf(&counts, rows.len());
        };

        let x = self.x;
        rows.sort_by(|&a, &b| x[[a, split.feature]].total_cmp(&x[[b, split.feature]]));
        let cut = rows.partition_point(|&r| x[[r, split.feature]] < split.threshold);
        let (left_rows, right_rows) = rows.split_at_mut(cut);

        let left  = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.tree.push(Node::Split { feature: split.feature, threshold: split.threshold, left, right })
    }

    fn leaf(&mut self, counts: &[usize], n: usize) -> usize {
        let proba = counts.iter().map(|&c| c as f64 / n.max(1) as f64).collect();
        self.tree.push(Node::Leaf(proba))
    }

    fn class_counts(&self, rows: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &r in rows {
            counts[self.y[r]] += 1;
        }
        counts
    }

    /// Search the sampled features for the split maximising
    /// Σ left²/n_left + Σ right²/n_right, which is equivalent to
    /// minimising the weighted Gini impurity of the children.
    fn best_split(&mut self, rows: &[usize], counts: &[usize]) -> Option<Split> {
        let n = rows.len();
        let parent_score = gini_score(counts, n);

        let mut features: Vec<usize> = (0..self.x.ncols()).collect();
        features.shuffle(&mut *self.rng);
        features.truncate(self.max_features);

        let mut best: Option<(f64, Split)> = None;
        let mut left = vec![0usize; self.n_classes];
        let mut right = vec![0usize; self.n_classes];

        for feature in features {
            let mut column: Vec<(f64, usize)> =
                rows.iter().map(|&r| (self.x[[r, feature]], self.y[r])).collect();
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            left.iter_mut().for_each(|c| *c = 0);
            for i in 0..n - 1 {
                left[column[i].1] += 1;
                let (lo, hi) = (column[i].0, column[i + 1].0);
                if lo >= hi {
                    continue;
                }
                for k in 0..self.n_classes {
                    right[k] = counts[k] - left[k];
                }
                let n_left = i + 1;
                let score  = gini_score(&left, n_left) + gini_score(&right, n - n_left);
                if score <= parent_score + 1e-12 {
                    continue;
                }
                let better = match &best {
                    Some((best_score, _)) => score > *best_score,
                    None => true,
                };
                if better {
                    let mut threshold = (lo + hi) / 2.0;
                    if threshold <= lo {
                        threshold = hi;
                    }
                    best = Some((score, Split { feature, threshold }));
                }
            }
        }
        best.map(|(_, split)| split)
    }
}

/// Σ c² / n over class counts; larger means purer.
fn gini_score(counts: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    counts.iter().map(|&c| (c * c) as f64).sum::<f64>() / n as f64
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_blobs() -> (Array2<f64>, Vec<usize>) {
        let mut rows = Vec::new();
        let mut y    = Vec::new();
        for i in 0..20 {
            let t = i as f64 * 0.05;
            rows.extend_from_slice(&[-2.0 + t, -1.0 - t, 0.5 * t, 1.0]);
            y.push(0);
            rows.extend_from_slice(&[2.0 - t, 1.0 + t, -0.5 * t, 1.0]);
            y.push(1);
        }
        (Array2::from_shape_vec((40, 4), rows).unwrap(), y)
    }

    #[test]
    fn test_separates_blobs() {
        let (x, y) = two_blobs();
        let params = ForestParams { n_estimators: 25, ..ForestParams::default() };
        let forest = RandomForest::fit(&params, x.view(), &y, 2).unwrap();
        assert_eq!(forest.trees.len(), 25);
        assert_eq!(forest.predict(x.view()), y);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let (x, y) = two_blobs();
        let params = ForestParams { n_estimators: 10, ..ForestParams::default() };
        let forest = RandomForest::fit(&params, x.view(), &y, 2).unwrap();
        for row in forest.predict_proba(x.view()).rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_fixed_seed_is_reproducible() {
        let (x, y) = two_blobs();
        let params = ForestParams { n_estimators: 10, ..ForestParams::default() };
        let a = RandomForest::fit(&params, x.view(), &y, 2).unwrap();
        let b = RandomForest::fit(&params, x.view(), &y, 2).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_depth_is_capped() {
        let x = Array2::from_shape_fn((64, 4), |(i, j)| ((i * 7 + j * 13) % 17) as f64);
        let y: Vec<usize> = (0..64).map(|i| i % 3).collect();
        let params = ForestParams { n_estimators: 5, max_depth: 2, ..ForestParams::default() };
        let forest = RandomForest::fit(&params, x.view(), &y, 3).unwrap();
        assert!(forest.trees.iter().all(|t| t.depth() <= 2));
    }

    #[test]
    fn test_fit_without_bootstrap_uses_every_row() {
        let (x, y) = two_blobs();
        let params = ForestParams { n_estimators: 3, bootstrap: false, ..ForestParams::default() };
        let forest = RandomForest::fit(&params, x.view(), &y, 2).unwrap();
        assert_eq!(forest.trees.len(), 3);
        assert_eq!(forest.predict(x.view()), y);
    }

    #[test]
    fn test_single_class_predicts_it() {
        let x = array![[0.0, 1.0, 2.0, 3.0], [1.0, 2.0, 3.0, 4.0]];
        let forest = RandomForest::fit(&ForestParams::default(), x.view(), &[0, 0], 1).unwrap();
        assert_eq!(forest.predict(x.view()), vec![0, 0]);
    }
}
