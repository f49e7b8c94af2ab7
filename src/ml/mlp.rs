// ============================================================
// Layer 5 — Feed-Forward Neural Network (Burn)
// ============================================================
// Multi-layer perceptron trained with Burn on the NdArray CPU
// backend:
//
//   x → Linear(d, 64) → ReLU → Linear(64, 32) → ReLU → Linear(32, k) → softmax
//
// Training:
//   - Glorot-uniform weights drawn from a seeded RNG, so a fixed
//     seed reproduces the network
//   - cross-entropy loss, Adam (lr 0.1, ε 1e-8)
//   - mini-batches of min(200, n) rows, reshuffled every epoch
//   - stop after 10 epochs whose mean loss fails to improve the
//     best seen by at least 1e-4, or at the epoch cap
//
// Key Burn 0.20 insight:
//   - Training runs on Autodiff<NdArray> for gradients
//   - model.valid() strips autodiff; the trained weights are then
//     copied out into plain ndarray matrices, so prediction and
//     persistence never touch Burn
//
// Reference: Kingma & Ba (2015) Adam, Glorot & Bengio (2010)

use anyhow::{anyhow, bail, Result};
use burn::{
    backend::{ndarray::NdArrayDevice, Autodiff, NdArray},
    module::{AutodiffModule, Param},
    nn::{loss::CrossEntropyLossConfig, Linear, LinearConfig},
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::TensorData,
};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::ml::classifier::{softmax_in_place, Classifier};

type TrainBackend = Autodiff<NdArray>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpParams {
    pub hidden_layers:    Vec<usize>,
    pub max_iter:         usize,
    pub learning_rate:    f64,
    pub batch_size:       usize,
    pub tol:              f64,
    pub n_iter_no_change: usize,
    pub seed:             u64,
}

impl Default for MlpParams {
    fn default() -> Self {
        Self {
            hidden_layers:    vec![64, 32],
            max_iter:         300,
            learning_rate:    0.1,
            batch_size:       200,
            tol:              1e-4,
            n_iter_no_change: 10,
            seed:             42,
        }
    }
}

// ─── Burn Network ─────────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct Network<B: Backend> {
    pub layers: Vec<Linear<B>>,
}

impl<B: Backend> Network<B> {
    /// x: [batch, d] → logits: [batch, k]
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let last = self.layers.len() - 1;
        let mut h = x;
        for (i, layer) in self.layers.iter().enumerate() {
            h = layer.forward(h);
            if i < last {
                h = burn::tensor::activation::relu(h);
            }
        }
        h
    }
}

/// Build the network with Glorot-uniform weights and biases drawn
/// from `rng`, bound √(6 / (fan_in + fan_out)).
fn init_network<B: Backend>(sizes: &[usize], rng: &mut StdRng, device: &B::Device) -> Network<B> {
    let layers = sizes
        .windows(2)
        .map(|pair| {
            let (fan_in, fan_out) = (pair[0], pair[1]);
            let bound = (6.0 / (fan_in + fan_out) as f64).sqrt();
            let mut draw = |count: usize| -> Vec<f32> {
                (0..count).map(|_| rng.gen_range(-bound..bound) as f32).collect()
            };
            let weight = draw(fan_in * fan_out);
            let bias   = draw(fan_out);

            let mut layer: Linear<B> = LinearConfig::new(fan_in, fan_out).init(device);
            layer.weight = Param::from_tensor(Tensor::from_data(TensorData::new(weight, [fan_in, fan_out]), device));
            layer.bias   = Some(Param::from_tensor(Tensor::from_data(TensorData::new(bias, [fan_out]), device)));
            layer
        })
        .collect();
    Network { layers }
}

// ─── Exported Model ───────────────────────────────────────────────────────────

/// One trained layer: y = x·W + b.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DenseLayer {
    weight: Array2<f64>,
    bias:   Array1<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpClassifier {
    layers:    Vec<DenseLayer>,
    n_classes: usize,
    epochs:    usize,
}

impl MlpClassifier {
    pub fn fit(
        params:    &MlpParams,
        x:         ArrayView2<'_, f64>,
        y:         &[usize],
        n_classes: usize,
    ) -> Result<Self> {
        let n = x.nrows();
        if n == 0 || n != y.len() {
            bail!("neural net needs matching, non-empty features and labels ({} rows, {} labels)", n, y.len());
        }

        let device = NdArrayDevice::default();
        let mut rng = StdRng::seed_from_u64(params.seed);

        let mut sizes = vec![x.ncols()];
        sizes.extend(&params.hidden_layers);
        sizes.push(n_classes.max(1));
        let mut network: Network<TrainBackend> = init_network(&sizes, &mut rng, &device);

        let mut optim = AdamConfig::new().with_epsilon(1e-8).init();
        let loss_fn   = CrossEntropyLossConfig::new().init(&device);
        let batch     = params.batch_size.clamp(1, n);

        let mut order: Vec<usize> = (0..n).collect();
        let mut best_loss = f64::INFINITY;
        let mut stale     = 0usize;
        let mut epochs    = 0usize;
        let mut converged = false;

        // ── Epoch loop ────────────────────────────────────────────────────────
        while epochs < params.max_iter {
            order.shuffle(&mut rng);
            let mut loss_sum = 0.0f64;

            for rows in order.chunks(batch) {
                let (inputs, targets) = batch_tensors::<TrainBackend>(x, y, rows, &device);
                let loss = loss_fn.forward(network.forward(inputs), targets);
                loss_sum += loss.clone().into_scalar().elem::<f64>() * rows.len() as f64;

                // Backward pass + Adam update
                let grads = GradientsParams::from_grads(loss.backward(), &network);
                network = optim.step(params.learning_rate, network, grads);
            }
            epochs += 1;

            let epoch_loss = loss_sum / n as f64;
            tracing::trace!("MLP epoch {:>3} | loss={:.5}", epochs, epoch_loss);

            if epoch_loss > best_loss - params.tol {
                stale += 1;
            } else {
                stale = 0;
            }
            if epoch_loss < best_loss {
                best_loss = epoch_loss;
            }
            if stale > params.n_iter_no_change {
                tracing::debug!("MLP converged after {} epochs (loss={:.5})", epochs, best_loss);
                converged = true;
                break;
            }
        }
        if !converged {
            tracing::warn!(
                "Neural net reached the {}-epoch limit before the loss settled",
                params.max_iter
            );
        }

        let layers = export_layers(network.valid())?;
        Ok(Self { layers, n_classes: n_classes.max(1), epochs })
    }
}

impl Classifier for MlpClassifier {
    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        let last  = self.layers.len() - 1;
        let mut h = x.to_owned();
        for (i, layer) in self.layers.iter().enumerate() {
            h = h.dot(&layer.weight) + &layer.bias;
            if i < last {
                h.mapv_inplace(|v| v.max(0.0));
            }
        }
        for mut row in h.axis_iter_mut(Axis(0)) {
            if let Some(scores) = row.as_slice_mut() {
                softmax_in_place(scores);
            }
        }
        h
    }
}

/// Gather `rows` into an input tensor [b, d] and a target tensor [b].
fn batch_tensors<B: Backend>(
    x:      ArrayView2<'_, f64>,
    y:      &[usize],
    rows:   &[usize],
    device: &B::Device,
) -> (Tensor<B, 2>, Tensor<B, 1, Int>) {
    let d = x.ncols();
    let features: Vec<f32> = rows
        .iter()
        .flat_map(|&r| x.row(r).iter().map(|&v| v as f32).collect::<Vec<_>>())
        .collect();
    let targets: Vec<i64> = rows.iter().map(|&r| y[r] as i64).collect();
    (
        Tensor::from_data(TensorData::new(features, [rows.len(), d]), device),
        Tensor::from_data(TensorData::new(targets, [rows.len()]), device),
    )
}

/// Copy trained Burn parameters into plain matrices.
fn export_layers<B: Backend>(network: Network<B>) -> Result<Vec<DenseLayer>> {
    network
        .layers
        .into_iter()
        .map(|layer| {
            let [fan_in, fan_out] = layer.weight.val().dims();
            let weight = layer.weight.val().into_data().to_vec::<f32>()
                .map_err(|e| anyhow!("Cannot read trained weights: {e:?}"))?;
            let bias = match &layer.bias {
                Some(bias) => bias.val().into_data().to_vec::<f32>()
                    .map_err(|e| anyhow!("Cannot read trained bias: {e:?}"))?,
                None => vec![0.0; fan_out],
            };
            Ok(DenseLayer {
                weight: Array2::from_shape_vec((fan_in, fan_out), weight.into_iter().map(f64::from).collect())?,
                bias:   Array1::from_iter(bias.into_iter().map(f64::from)),
            })
        })
        .collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn quadrants(per_class: usize) -> (Array2<f64>, Vec<usize>) {
        let mut data = Vec::new();
        let mut y    = Vec::new();
        for i in 0..per_class {
            let t = i as f64 / per_class as f64;
            data.extend_from_slice(&[-1.0 - t, -1.0 + 0.5 * t, 0.1 * t, -0.2]);
            y.push(0);
            data.extend_from_slice(&[1.0 + t, 1.0 - 0.5 * t, -0.1 * t, 0.2]);
            y.push(1);
        }
        (Array2::from_shape_vec((y.len(), 4), data).unwrap(), y)
    }

    fn small_params() -> MlpParams {
        MlpParams { hidden_layers: vec![8], max_iter: 60, learning_rate: 0.05, ..MlpParams::default() }
    }

    #[test]
    fn test_learns_separable_classes() {
        let (x, y) = quadrants(20);
        let mlp = MlpClassifier::fit(&small_params(), x.view(), &y, 2).unwrap();
        assert_eq!(mlp.predict(x.view()), y);
        assert!(mlp.epochs >= 1 && mlp.epochs <= 60);
    }

    #[test]
    fn test_probabilities_are_distributions() {
        let (x, y) = quadrants(10);
        let mlp = MlpClassifier::fit(&small_params(), x.view(), &y, 3).unwrap();
        let proba = mlp.predict_proba(x.view());
        assert_eq!(proba.dim(), (20, 3));
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_fixed_seed_is_reproducible() {
        let (x, y) = quadrants(10);
        let a = MlpClassifier::fit(&small_params(), x.view(), &y, 2).unwrap();
        let b = MlpClassifier::fit(&small_params(), x.view(), &y, 2).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_layer_shapes_follow_config() {
        let (x, y) = quadrants(5);
        let params = MlpParams { max_iter: 2, ..MlpParams::default() };
        let mlp = MlpClassifier::fit(&params, x.view(), &y, 2).unwrap();
        let shapes: Vec<_> = mlp.layers.iter().map(|l| l.weight.dim()).collect();
        assert_eq!(shapes, vec![(4, 64), (64, 32), (32, 2)]);
    }
}
