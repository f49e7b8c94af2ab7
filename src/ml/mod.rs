// ============================================================
// Layer 5 — ML / Model Layer
// ============================================================
// Every classifier, the pipelines that wrap them and the loops
// that train and apply them. This is also the only layer that
// imports burn: the neural net trains on Burn's NdArray backend
// and is exported to plain arrays before it leaves mlp.rs.
//
// What's in this layer:
//
//   scaler.rs     — per-column standardisation
//   classifier.rs — the Classifier trait (probabilities + argmax)
//   tree.rs       — flat binary tree storage shared by the
//                   forest and the boosted trees
//   forest.rs     — random forest (bagged CART, Gini)
//   svm.rs        — RBF C-SVC (SMO, one-vs-one, Platt scaling)
//   mlp.rs        — feed-forward network (Burn, Adam)
//   boosting.rs   — histogram gradient-boosted trees
//   model.rs      — ModelKind / ModelConfig / ModelPipeline
//   trainer.rs    — fit → evaluate → persist for each config
//   inferencer.rs — apply a saved artifact to one observation
//
// Reference: Breiman (2001) Random Forests
//            Fan, Chen & Lin (2005) Working Set Selection for SVMs
//            Chen & Guestrin (2016) XGBoost

/// Standard scaler fitted inside every pipeline
pub mod scaler;

/// Common interface of the fitted classifiers
pub mod classifier;

/// Decision tree storage
pub mod tree;

/// Random forest classifier
pub mod forest;

/// Support vector classifier
pub mod svm;

/// Neural network classifier (Burn)
pub mod mlp;

/// Gradient-boosted trees classifier
pub mod boosting;

/// Model configurations and fitted pipelines
pub mod model;

/// Training loop over all configurations
pub mod trainer;

/// Inference on saved artifacts
pub mod inferencer;
