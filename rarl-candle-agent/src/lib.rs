//! Trust region policy optimization agents implemented with [candle](https://crates.io/crates/candle-core).
//!
//! [`Trpo`] is an agent of one player of robust adversarial RL. It bundles a
//! [`GaussianMlpPolicy`], a [`LinearFeatureBaseline`] and the state of its
//! trust region optimizer, so that the protagonist and the adversary never
//! share any of them.
mod baseline;
pub mod mlp;
pub mod model;
mod policy;
pub mod trpo;
pub mod util;
use anyhow::Result;
pub use baseline::LinearFeatureBaseline;
use candle_core::Tensor;
pub use policy::{GaussianMlpPolicy, GaussianMlpPolicyConfig};
use serde::{Deserialize, Serialize};
pub use trpo::{Trpo, TrpoConfig};

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    Cpu,

    /// The main GPU device.
    Cuda(usize),
}

impl Default for Device {
    fn default() -> Self {
        Self::Cpu
    }
}

impl TryFrom<Device> for candle_core::Device {
    type Error = candle_core::Error;

    fn try_from(device: Device) -> Result<Self, Self::Error> {
        match device {
            Device::Cpu => Ok(candle_core::Device::Cpu),
            Device::Cuda(n) => candle_core::Device::new_cuda(n),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Copy)]
/// Activation functions.
pub enum Activation {
    /// No activation.
    None,

    /// Hyperbolic tangent.
    Tanh,

    /// Rectified linear unit.
    ReLU,
}

impl Activation {
    /// Applies the activation function.
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        match self {
            Self::None => Ok(xs.clone()),
            Self::Tanh => Ok(xs.tanh()?),
            Self::ReLU => Ok(xs.relu()?),
        }
    }
}
