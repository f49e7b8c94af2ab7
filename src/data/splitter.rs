// ============================================================
// Layer 4 — Train/Test Splitter
// ============================================================
// Chooses how many rows to hold out and whether to stratify,
// then performs a seeded split.
//
// Test size:
//   n >= 50 → fraction 0.2 (test count = ceil(0.2 · n))
//   n <  50 → max(2, min(n / 3, n - 1)) rows
//
// Stratification (class proportions preserved in both halves)
// is used only when every class has at least 2 members, there
// are at least 2 classes, and n >= 10. Otherwise the rows are
// simply permuted and cut.
//
// The split is run twice with the same seed: once on the label
// strings and once on their integer codes. Codes follow sorted
// label order, so both runs see the same class groups in the
// same order and produce the same partition.

use std::collections::BTreeMap;

use ndarray::{Array2, Axis};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::data::dataset::PreparedDataset;

/// At or above this many samples a fixed test fraction is used.
pub const FRACTION_THRESHOLD: usize = 50;

/// Held-out fraction for large datasets.
pub const TEST_FRACTION: f64 = 0.2;

/// Below this many samples stratification is never attempted.
pub const MIN_STRATIFY_SAMPLES: usize = 10;

/// How much data to hold out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TestSize {
    Fraction(f64),
    Count(usize),
}

impl TestSize {
    /// Pick the test size for a dataset of `n` samples.
    pub fn for_samples(n: usize) -> Self {
        if n >= FRACTION_THRESHOLD {
            TestSize::Fraction(TEST_FRACTION)
        } else {
            TestSize::Count((n / 3).min(n.saturating_sub(1)).max(2))
        }
    }

    /// Absolute number of test rows out of `n`.
    pub fn test_count(&self, n: usize) -> usize {
        match *self {
            TestSize::Fraction(f) => ((f * n as f64).ceil() as usize).min(n),
            TestSize::Count(c)    => c.min(n),
        }
    }
}

impl std::fmt::Display for TestSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestSize::Fraction(v) => write!(f, "{v}"),
            TestSize::Count(c)    => write!(f, "{c}"),
        }
    }
}

/// The chosen split strategy for one dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitPlan {
    pub test_size: TestSize,
    pub stratify:  bool,
}

impl SplitPlan {
    /// Decide size and stratification from the per-class member counts.
    pub fn choose(class_counts: &[usize]) -> Self {
        let n = class_counts.iter().sum();
        Self {
            test_size: TestSize::for_samples(n),
            stratify:  should_stratify(class_counts, n),
        }
    }
}

/// Stratify only when every class can appear on both sides.
pub fn should_stratify(class_counts: &[usize], n: usize) -> bool {
    class_counts.len() >= 2
        && class_counts.iter().all(|&c| c >= 2)
        && n >= MIN_STRATIFY_SAMPLES
}

/// Row positions on each side of a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test:  Vec<usize>,
}

/// Split `0..labels.len()` according to `plan`, stratifying on
/// `labels` when the plan asks for it.
pub fn split_indices<L: Ord>(labels: &[L], plan: &SplitPlan, seed: u64) -> SplitIndices {
    let n       = labels.len();
    let n_test  = plan.test_size.test_count(n);
    let mut rng = StdRng::seed_from_u64(seed);

    if !plan.stratify {
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut rng);
        let train = order.split_off(n_test);
        return SplitIndices { train, test: order };
    }

    // Group rows by class; BTreeMap keeps the classes in sorted order.
    let mut groups: BTreeMap<&L, Vec<usize>> = BTreeMap::new();
    for (i, label) in labels.iter().enumerate() {
        groups.entry(label).or_default().push(i);
    }
    let counts: Vec<usize> = groups.values().map(Vec::len).collect();
    let per_class          = allocate_proportionally(&counts, n_test);

    let mut train = Vec::with_capacity(n - n_test);
    let mut test  = Vec::with_capacity(n_test);
    for (mut rows, take) in groups.into_values().zip(per_class) {
        rows.shuffle(&mut rng);
        let rest = rows.split_off(take);
        test.extend(rows);
        train.extend(rest);
    }
    train.shuffle(&mut rng);
    test.shuffle(&mut rng);

    SplitIndices { train, test }
}

/// Distribute `total` draws over classes proportionally to `counts`:
/// floor of each share first, then the leftovers to the largest
/// fractional remainders (earlier classes win ties).
fn allocate_proportionally(counts: &[usize], total: usize) -> Vec<usize> {
    let n: usize = counts.iter().sum();
    if n == 0 {
        return vec![0; counts.len()];
    }
    let shares: Vec<f64> = counts.iter().map(|&c| total as f64 * c as f64 / n as f64).collect();
    let mut alloc: Vec<usize> = shares.iter().map(|s| s.floor() as usize).collect();

    let mut leftover = total.saturating_sub(alloc.iter().sum());
    let mut order: Vec<usize> = (0..counts.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = shares[a] - shares[a].floor();
        let rb = shares[b] - shares[b].floor();
        rb.total_cmp(&ra).then(a.cmp(&b))
    });
    for &class in order.iter().cycle().take(counts.len() * 2) {
        if leftover == 0 {
            break;
        }
        if alloc[class] < counts[class] {
            alloc[class] += 1;
            leftover     -= 1;
        }
    }
    alloc
}

/// The materialised split: features plus both label views.
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub x_train:         Array2<f64>,
    pub x_test:          Array2<f64>,
    pub y_train:         Vec<String>,
    pub y_test:          Vec<String>,
    pub y_train_encoded: Vec<usize>,
    pub y_test_encoded:  Vec<usize>,
}

impl TrainTestSplit {
    /// Run the label split and the parallel encoded split.
    pub fn build(
        dataset: &PreparedDataset,
        encoded: &[usize],
        plan:    &SplitPlan,
        seed:    u64,
    ) -> Self {
        let by_label = split_indices(&dataset.labels, plan, seed);
        let by_code  = split_indices(encoded, plan, seed);
        debug_assert_eq!(by_label, by_code);

        let pick_labels = |rows: &[usize]| rows.iter().map(|&i| dataset.labels[i].clone()).collect();
        let pick_codes  = |rows: &[usize]| rows.iter().map(|&i| encoded[i]).collect();

        let split = Self {
            x_train:         dataset.features.select(Axis(0), &by_label.train),
            x_test:          dataset.features.select(Axis(0), &by_label.test),
            y_train:         pick_labels(&by_label.train),
            y_test:          pick_labels(&by_label.test),
            y_train_encoded: pick_codes(&by_code.train),
            y_test_encoded:  pick_codes(&by_code.test),
        };

        tracing::debug!(
            "Dataset split: {} training, {} test (stratified: {})",
            split.y_train.len(),
            split.y_test.len(),
            plan.stratify,
        );
        split
    }
}
