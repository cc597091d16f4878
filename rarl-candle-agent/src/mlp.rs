//! Multilayer perceptron.
mod base;
mod config;
mod gaussian;
use crate::Activation;
use anyhow::Result;
pub use base::Mlp;
use candle_core::{Module, Tensor};
use candle_nn::Linear;
pub use config::MlpConfig;
pub use gaussian::{GaussianMlp, GaussianMlpConfig};

fn mlp_forward(
    xs: Tensor,
    layers: &[Linear],
    hidden_act: &Activation,
    final_act: &Activation,
) -> Result<Tensor> {
    let n_layers = layers.len();
    let mut xs = xs;

    for layer in layers.iter().take(n_layers - 1) {
        xs = hidden_act.forward(&layer.forward(&xs)?)?;
    }

    let xs = layers[n_layers - 1].forward(&xs)?;
    final_act.forward(&xs)
}
