// ============================================================
// Layer 6 — Evaluation Metrics and Metrics Logger
// ============================================================
// Scores held-out predictions and records one CSV row per model.
//
// Metrics per model:
//   - accuracy:        fraction of exact label matches
//   - per-class report: precision, recall, F1, support
//   - macro averages:  unweighted mean over classes
//
// Output file: {models_dir}/metrics.csv, rewritten every run
//
// Example CSV output:
//   model,accuracy,macro_precision,macro_recall,macro_f1
//   RandomForest,0.812500,0.804211,0.799032,0.800873
//   SVM,0.781250,0.770401,0.768330,0.768912
//   ...

use anyhow::{Context, Result};
use std::{
    collections::BTreeMap,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

/// Fraction of positions where prediction equals truth.
/// Empty input scores 0.
pub fn accuracy_score(y_true: &[String], y_pred: &[String]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}

/// Scores for one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassScores {
    pub precision: f64,
    pub recall:    f64,
    pub f1:        f64,
    pub support:   usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub accuracy:        f64,
    /// Keyed by label, over every label seen in truth or prediction
    pub classes:         BTreeMap<String, ClassScores>,
    pub macro_precision: f64,
    pub macro_recall:    f64,
    pub macro_f1:        f64,
}

impl ClassificationReport {
    /// Build the report; undefined ratios (0/0) count as 0.
    pub fn new(y_true: &[String], y_pred: &[String]) -> Self {
        let mut labels: Vec<&String> = y_true.iter().chain(y_pred).collect();
        labels.sort_unstable();
        labels.dedup();

        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };

        let classes: BTreeMap<String, ClassScores> = labels
            .into_iter()
            .map(|label| {
                let pairs = y_true.iter().zip(y_pred);
                let tp        = pairs.clone().filter(|(t, p)| *t == label && *p == label).count();
                let predicted = y_pred.iter().filter(|p| *p == label).count();
                let support   = y_true.iter().filter(|t| *t == label).count();
                let precision = ratio(tp, predicted);
                let recall    = ratio(tp, support);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                (label.clone(), ClassScores { precision, recall, f1, support })
            })
            .collect();

        let k    = classes.len().max(1) as f64;
        let mean = |f: fn(&ClassScores) -> f64| classes.values().map(f).sum::<f64>() / k;
        let macro_precision = mean(|c| c.precision);
        let macro_recall    = mean(|c| c.recall);
        let macro_f1        = mean(|c| c.f1);

        Self {
            accuracy: accuracy_score(y_true, y_pred),
            classes,
            macro_precision,
            macro_recall,
            macro_f1,
        }
    }

    /// Multi-line text table for debug logging.
    pub fn render(&self) -> String {
        let mut out = format!("{:>16} {:>9} {:>9} {:>9} {:>8}\n", "", "precision", "recall", "f1", "support");
        for (label, c) in &self.classes {
            out.push_str(&format!(
                "{:>16} {:>9.3} {:>9.3} {:>9.3} {:>8}\n",
                label, c.precision, c.recall, c.f1, c.support
            ));
        }
        out.push_str(&format!(
            "{:>16} {:>9.3} {:>9.3} {:>9.3}\n{:>16} {:>9.3}",
            "macro avg", self.macro_precision, self.macro_recall, self.macro_f1,
            "accuracy", self.accuracy
        ));
        out
    }
}

/// Writes one metrics row per trained model.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Start a fresh metrics.csv in `dir`, replacing any previous run's.
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create metrics directory '{}'", dir.display()))?;
        let csv_path = dir.join("metrics.csv");

        let mut f = fs::File::create(&csv_path)
            .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
        writeln!(f, "model,accuracy,macro_precision,macro_recall,macro_f1")?;
        tracing::debug!("Created metrics CSV: '{}'", csv_path.display());

        Ok(Self { csv_path })
    }

    /// Append one model's scores.
    pub fn log(&self, model: &str, report: &ClassificationReport) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6}",
            model,
            report.accuracy,
            report.macro_precision,
            report.macro_recall,
            report.macro_f1,
        )?;

        tracing::debug!("Logged metrics for {}: accuracy={:.4}", model, report.accuracy);
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_accuracy_counts_exact_matches() {
        let t = strings(&["A", "B", "A", "C"]);
        let p = strings(&["A", "B", "C", "C"]);
        assert_eq!(accuracy_score(&t, &p), 0.75);
        assert_eq!(accuracy_score(&[], &[]), 0.0);
    }

    #[test]
    fn test_report_per_class_scores() {
        let t = strings(&["A", "A", "B", "B"]);
        let p = strings(&["A", "B", "B", "B"]);
        let r = ClassificationReport::new(&t, &p);

        let a = &r.classes["A"];
        assert_eq!((a.precision, a.recall, a.support), (1.0, 0.5, 2));
        let b = &r.classes["B"];
        assert!((b.precision - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(b.recall, 1.0);
        assert!((r.macro_recall - 0.75).abs() < 1e-12);
        assert_eq!(r.accuracy, 0.75);
    }

    #[test]
    fn test_label_only_in_predictions_scores_zero() {
        let t = strings(&["A", "A"]);
        let p = strings(&["A", "Z"]);
        let r = ClassificationReport::new(&t, &p);
        assert_eq!(r.classes["Z"].support, 0);
        assert_eq!(r.classes["Z"].f1, 0.0);
        assert!(r.render().contains("macro avg"));
    }

    #[test]
    fn test_logger_rewrites_file_each_run() {
        let dir = tempfile::tempdir().unwrap();
        let report = ClassificationReport::new(&strings(&["A"]), &strings(&["A"]));

        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.log("SVM", &report).unwrap();
        logger.log("XGBoost", &report).unwrap();
        let first = fs::read_to_string(&logger.csv_path).unwrap();
        assert_eq!(first.lines().count(), 3);
        assert!(first.contains("XGBoost,1.000000"));

        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.log("SVM", &report).unwrap();
        let second = fs::read_to_string(&logger.csv_path).unwrap();
        assert_eq!(second.lines().count(), 2);
    }
}
