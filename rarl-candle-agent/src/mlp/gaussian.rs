use super::{Mlp, MlpConfig};
use crate::model::SubModel1;
use anyhow::Result;
use candle_core::Tensor;
use candle_nn::{init::Init, VarBuilder};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`GaussianMlp`].
pub struct GaussianMlpConfig {
    /// Network of the mean.
    pub mlp: MlpConfig,

    /// Initial standard deviation.
    pub init_std: f64,
}

/// A module with two heads.
///
/// The one is an MLP giving the mean of a diagonal Gaussian distribution, while
/// the other is a parameter vector of log standard deviations, independent of
/// the input.
pub struct GaussianMlp {
    mean: Mlp,
    log_std: Tensor,
}

impl SubModel1 for GaussianMlp {
    type Config = GaussianMlpConfig;
    type Input = Tensor;

    /// Mean and log standard deviation, both of shape `(batch_size, out_dim)`.
    type Output = (Tensor, Tensor);

    fn forward(&self, xs: &Self::Input) -> Result<Self::Output> {
        let batch_size = xs.dims()[0];
        let mean = self.mean.forward(xs)?;
        let log_std = self.log_std.repeat((batch_size, 1))?;
        Ok((mean, log_std))
    }

    fn build(vs: VarBuilder, config: Self::Config) -> Result<Self> {
        let log_std = vs.get_with_hints(
            (1, config.mlp.out_dim),
            "log_std",
            Init::Const(config.init_std.ln()),
        )?;
        let mean = Mlp::build(vs, config.mlp)?;

        Ok(Self { mean, log_std })
    }
}
