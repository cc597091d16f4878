//! Configuration of TRPO agent.
use crate::{Device, GaussianMlpPolicyConfig};
use anyhow::Result;
use rarl_core::error::RarlError;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Trpo`](super::Trpo).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct TrpoConfig {
    /// Discount factor of returns.
    pub discount: f64,

    /// Lambda of generalized advantage estimation.
    pub gae_lambda: f64,

    /// Upper bound of the mean KL divergence of an update.
    pub step_size: f64,

    /// The number of conjugate gradient iterations.
    pub cg_iters: usize,

    /// Damping added to the Fisher-vector product.
    pub cg_damping: f64,

    /// Conjugate gradient stops when the squared residual falls below this value.
    pub residual_tol: f64,

    /// Shrink factor of the step in the line search.
    pub backtrack_ratio: f64,

    /// The number of steps tried in the line search.
    pub max_backtracks: usize,

    /// If `true`, advantages are normalized per batch.
    pub center_adv: bool,

    /// Scale of the finite difference in the Fisher-vector product.
    pub fd_eps: f64,

    /// Units of the hidden layers of the policy.
    pub hidden_sizes: Vec<usize>,

    /// Initial standard deviation of the policy.
    pub init_std: f64,

    /// Seed of the policy.
    pub seed: u64,

    /// Device.
    pub device: Device,
}

impl Default for TrpoConfig {
    fn default() -> Self {
        Self {
            discount: 0.99,
            gae_lambda: 1.0,
            step_size: 0.01,
            cg_iters: 10,
            cg_damping: 1e-5,
            residual_tol: 1e-10,
            backtrack_ratio: 0.8,
            max_backtracks: 15,
            center_adv: true,
            fd_eps: 1e-5,
            hidden_sizes: vec![32, 32],
            init_std: 1.0,
            seed: 0,
            device: Device::Cpu,
        }
    }
}

impl TrpoConfig {
    /// Sets the discount factor.
    pub fn discount(mut self, v: f64) -> Self {
        self.discount = v;
        self
    }

    /// Sets lambda of generalized advantage estimation.
    pub fn gae_lambda(mut self, v: f64) -> Self {
        self.gae_lambda = v;
        self
    }

    /// Sets the trust region size.
    pub fn step_size(mut self, v: f64) -> Self {
        self.step_size = v;
        self
    }

    /// Sets the number of conjugate gradient iterations.
    pub fn cg_iters(mut self, v: usize) -> Self {
        self.cg_iters = v;
        self
    }

    /// Sets the maximum number of backtracks.
    pub fn max_backtracks(mut self, v: usize) -> Self {
        self.max_backtracks = v;
        self
    }

    /// Sets whether advantages are normalized.
    pub fn center_adv(mut self, v: bool) -> Self {
        self.center_adv = v;
        self
    }

    /// Sets the units of the hidden layers.
    pub fn hidden_sizes(mut self, v: Vec<usize>) -> Self {
        self.hidden_sizes = v;
        self
    }

    /// Sets the initial standard deviation.
    pub fn init_std(mut self, v: f64) -> Self {
        self.init_std = v;
        self
    }

    /// Sets the seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Sets the device.
    pub fn device(mut self, v: Device) -> Self {
        self.device = v;
        self
    }

    /// Configuration of the policy with the given dimensions.
    pub fn policy_config(&self, obs_dim: usize, act_dim: usize) -> GaussianMlpPolicyConfig {
        GaussianMlpPolicyConfig::default()
            .dims(obs_dim, act_dim)
            .hidden_sizes(self.hidden_sizes.clone())
            .init_std(self.init_std)
            .seed(self.seed)
            .device(self.device)
    }

    /// Checks the values.
    pub fn check(&self) -> Result<()> {
        let err = |msg: &str| Err(RarlError::InvalidConfig(msg.into()).into());
        if !(0.0..=1.0).contains(&self.discount) {
            return err("discount must be in [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.gae_lambda) {
            return err("gae_lambda must be in [0, 1]");
        }
        if self.step_size <= 0.0 {
            return err("step_size must be positive");
        }
        if self.backtrack_ratio <= 0.0 || self.backtrack_ratio >= 1.0 {
            return err("backtrack_ratio must be in (0, 1)");
        }
        if self.cg_iters == 0 || self.max_backtracks == 0 {
            return err("cg_iters and max_backtracks must be positive");
        }
        if self.fd_eps <= 0.0 {
            return err("fd_eps must be positive");
        }
        Ok(())
    }

    /// Constructs [`TrpoConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`TrpoConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
