//! Gaussian policy with an MLP mean.
use crate::{
    mlp::{GaussianMlp, GaussianMlpConfig, MlpConfig},
    model::SubModel1,
    util::{copy_vars, flat_params, glorot_init, set_flat_params, standard_normal},
    Activation, Device,
};
use anyhow::Result;
use candle_core::{DType, Tensor};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use rand::{rngs::StdRng, SeedableRng};
use rarl_core::{error::RarlError, Policy};
use serde::{Deserialize, Serialize};
use std::{
    f64::consts::PI,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`GaussianMlpPolicy`].
pub struct GaussianMlpPolicyConfig {
    /// Dimension of observations.
    pub obs_dim: usize,

    /// Dimension of actions.
    pub act_dim: usize,

    /// Units of the hidden layers.
    pub hidden_sizes: Vec<usize>,

    /// Initial standard deviation of actions.
    pub init_std: f64,

    /// Seed of the initial parameters and of action sampling.
    pub seed: u64,

    /// Device.
    pub device: Device,
}

impl Default for GaussianMlpPolicyConfig {
    fn default() -> Self {
        Self {
            obs_dim: 1,
            act_dim: 1,
            hidden_sizes: vec![32, 32],
            init_std: 1.0,
            seed: 0,
            device: Device::Cpu,
        }
    }
}

impl GaussianMlpPolicyConfig {
    /// Sets the dimensions of observations and actions.
    pub fn dims(mut self, obs_dim: usize, act_dim: usize) -> Self {
        self.obs_dim = obs_dim;
        self.act_dim = act_dim;
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

    /// Constructs [`GaussianMlpPolicyConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`GaussianMlpPolicyConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Diagonal Gaussian policy whose mean is an MLP of the observation and whose
/// log standard deviation is a free parameter vector.
///
/// Parameters are kept in double precision, since the trust region update
/// differentiates the KL divergence by finite differences.
pub struct GaussianMlpPolicy {
    config: GaussianMlpPolicyConfig,
    device: candle_core::Device,
    varmap: VarMap,
    model: GaussianMlp,
    rng: StdRng,
    deterministic: bool,
}

impl GaussianMlpPolicy {
    /// Constructs [`GaussianMlpPolicy`].
    ///
    /// Weights are drawn from a Glorot uniform distribution seeded with
    /// `config.seed`, biases are zero and standard deviations are `config.init_std`.
    pub fn build(config: GaussianMlpPolicyConfig) -> Result<Self> {
        if config.init_std <= 0.0 {
            return Err(RarlError::InvalidConfig("init_std must be positive".into()).into());
        }
        let device: candle_core::Device = config.device.try_into()?;
        let varmap = VarMap::new();
        let model = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F64, &device);
            let mlp = MlpConfig::new(
                config.obs_dim,
                config.hidden_sizes.clone(),
                config.act_dim,
                Activation::None,
            );
            GaussianMlp::build(
                vb,
                GaussianMlpConfig {
                    mlp,
                    init_std: config.init_std,
                },
            )?
        };
        glorot_init(&varmap, &mut StdRng::seed_from_u64(config.seed))?;
        let rng = StdRng::seed_from_u64(config.seed.wrapping_add(1));

        Ok(Self {
            config,
            device,
            varmap,
            model,
            rng,
            deterministic: false,
        })
    }

    /// Configuration of the policy.
    pub fn config(&self) -> &GaussianMlpPolicyConfig {
        &self.config
    }

    /// Device of the parameters.
    pub fn device(&self) -> &candle_core::Device {
        &self.device
    }

    /// Variables of the policy.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Stacks rows into a tensor of shape `(rows.len(), dim)`.
    pub fn batch_tensor(&self, rows: &[Vec<f32>], dim: usize) -> Result<Tensor> {
        if let Some(row) = rows.iter().find(|r| r.len() != dim) {
            return Err(RarlError::DimensionMismatch {
                what: "batch row".into(),
                expected: dim,
                actual: row.len(),
            }
            .into());
        }
        let data: Vec<f64> = rows.iter().flatten().map(|v| *v as f64).collect();
        Ok(Tensor::from_vec(data, (rows.len(), dim), &self.device)?)
    }

    /// Mean and log standard deviation given a batch of observations.
    pub fn dist(&self, obs: &Tensor) -> Result<(Tensor, Tensor)> {
        self.model.forward(obs)
    }

    /// Log likelihoods of a batch of actions, of shape `(batch_size,)`.
    pub fn log_likelihood(&self, obs: &Tensor, act: &Tensor) -> Result<Tensor> {
        let (mean, log_std) = self.dist(obs)?;
        gaussian_log_likelihood(&mean, &log_std, act)
    }

    /// Mean KL divergence from the given distributions to the distributions of the policy.
    pub fn mean_kl(&self, obs: &Tensor, old_mean: &Tensor, old_log_std: &Tensor) -> Result<Tensor> {
        let (mean, log_std) = self.dist(obs)?;
        Ok(gaussian_kl(old_mean, old_log_std, &mean, &log_std)?.mean_all()?)
    }

    /// Entropy of the action distribution, which does not depend on observations.
    pub fn entropy(&self) -> Result<f64> {
        let obs = Tensor::zeros((1, self.config.obs_dim), DType::F64, &self.device)?;
        let (_, log_std) = self.dist(&obs)?;
        let log_std = log_std.flatten_all()?.to_vec1::<f64>()?;
        Ok(log_std
            .iter()
            .map(|ls| ls + 0.5 * (2.0 * PI * std::f64::consts::E).ln())
            .sum())
    }

    /// Flat vector of parameters in double precision.
    pub fn flat_params(&self) -> Result<Vec<f64>> {
        flat_params(&self.varmap)
    }

    /// Overwrites parameters with a flat vector in double precision.
    pub fn set_flat_params(&self, params: &[f64]) -> Result<()> {
        set_flat_params(&self.varmap, params)
    }

    /// Save the parameters in a safetensors file.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        self.varmap.save(&path)?;
        info!("Save policy to {:?}", path.as_ref());
        Ok(())
    }

    /// Load the parameters from a safetensors file.
    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        self.varmap.load(&path)?;
        info!("Load policy from {:?}", path.as_ref());
        Ok(())
    }

    /// Deep copy, including the state of the random number generator.
    pub fn try_clone(&self) -> Result<Self> {
        let mut policy = Self::build(self.config.clone())?;
        copy_vars(&policy.varmap, &self.varmap)?;
        policy.rng = self.rng.clone();
        policy.deterministic = self.deterministic;
        Ok(policy)
    }

    fn mean_and_std(&self, obs: &[f32]) -> Result<(Vec<f64>, Vec<f64>)> {
        let obs = self.batch_tensor(&[obs.to_vec()], self.config.obs_dim)?;
        let (mean, log_std) = self.dist(&obs)?;
        let mean = mean.flatten_all()?.to_vec1::<f64>()?;
        let std = log_std.exp()?.flatten_all()?.to_vec1::<f64>()?;
        Ok((mean, std))
    }
}

/// Log likelihoods of `x` under diagonal Gaussians, summed over the last dimension.
pub fn gaussian_log_likelihood(mean: &Tensor, log_std: &Tensor, x: &Tensor) -> Result<Tensor> {
    let d = mean.dims()[1] as f64;
    let z = x.sub(mean)?.div(&log_std.exp()?)?;
    let ll = z
        .sqr()?
        .sum(1)?
        .affine(-0.5, -0.5 * d * (2.0 * PI).ln())?
        .sub(&log_std.sum(1)?)?;
    Ok(ll)
}

/// KL divergences `KL(old || new)` of diagonal Gaussians, of shape `(batch_size,)`.
pub fn gaussian_kl(
    old_mean: &Tensor,
    old_log_std: &Tensor,
    new_mean: &Tensor,
    new_log_std: &Tensor,
) -> Result<Tensor> {
    let numerator = old_log_std
        .affine(2.0, 0.0)?
        .exp()?
        .add(&old_mean.sub(new_mean)?.sqr()?)?;
    let denominator = new_log_std.affine(2.0, 0.0)?.exp()?.affine(2.0, 0.0)?;
    let kl = numerator
        .div(&denominator)?
        .add(&new_log_std.sub(old_log_std)?)?
        .affine(1.0, -0.5)?
        .sum(1)?;
    Ok(kl)
}

impl Policy for GaussianMlpPolicy {
    fn act(&mut self, obs: &[f32]) -> Result<Vec<f32>> {
        let (mean, std) = self.mean_and_std(obs)?;
        if self.deterministic {
            return Ok(mean.iter().map(|m| *m as f32).collect());
        }
        Ok(mean
            .iter()
            .zip(std.iter())
            .map(|(m, s)| (m + s * standard_normal(&mut self.rng)) as f32)
            .collect())
    }

    fn log_prob(&self, obs: &[f32], act: &[f32]) -> Result<f32> {
        let obs = self.batch_tensor(&[obs.to_vec()], self.config.obs_dim)?;
        let act = self.batch_tensor(&[act.to_vec()], self.config.act_dim)?;
        let ll = self.log_likelihood(&obs, &act)?.flatten_all()?.to_vec1::<f64>()?;
        Ok(ll[0] as f32)
    }

    fn action_dim(&self) -> usize {
        self.config.act_dim
    }

    fn snapshot(&self) -> Result<Box<dyn Policy>> {
        Ok(Box::new(self.try_clone()?))
    }

    fn get_params(&self) -> Result<Vec<f32>> {
        Ok(self.flat_params()?.iter().map(|p| *p as f32).collect())
    }

    fn set_params(&mut self, params: &[f32]) -> Result<()> {
        let params: Vec<f64> = params.iter().map(|p| *p as f64).collect();
        self.set_flat_params(&params)
    }

    fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    fn set_deterministic(&mut self, deterministic: bool) {
        self.deterministic = deterministic;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempdir::TempDir;

    fn policy(seed: u64) -> Result<GaussianMlpPolicy> {
        GaussianMlpPolicy::build(
            GaussianMlpPolicyConfig::default()
                .dims(3, 2)
                .hidden_sizes(vec![8, 8])
                .seed(seed),
        )
    }

    #[test]
    fn test_build_is_seeded() -> Result<()> {
        assert_eq!(policy(1)?.flat_params()?, policy(1)?.flat_params()?);
        assert_ne!(policy(1)?.flat_params()?, policy(2)?.flat_params()?);
        Ok(())
    }

    #[test]
    fn test_log_prob_of_standard_gaussian() -> Result<()> {
        let mut pi = policy(0)?;
        pi.set_deterministic(true);
        let obs = [0.1, -0.2, 0.3];
        let mean = pi.act(&obs)?;

        // init_std = 1, so the density at the mean is (2 pi)^(-d/2)
        let expected = -(2.0 * PI).ln() as f32;
        assert!((pi.log_prob(&obs, &mean)? - expected).abs() < 1e-5);
        Ok(())
    }

    #[test]
    fn test_kl_of_identical_distributions_is_zero() -> Result<()> {
        let pi = policy(0)?;
        let obs = pi.batch_tensor(&[vec![0.0, 1.0, 2.0], vec![1.0, 1.0, 1.0]], 3)?;
        let (mean, log_std) = pi.dist(&obs)?;
        let kl = pi.mean_kl(&obs, &mean, &log_std)?.to_scalar::<f64>()?;
        assert!(kl.abs() < 1e-12);

        let shifted = mean.affine(1.0, 1.0)?;
        let kl = pi.mean_kl(&obs, &shifted, &log_std)?.to_scalar::<f64>()?;
        // 0.5 * |dmu|^2 / sigma^2 summed over two dims
        assert!((kl - 1.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_snapshot_is_independent() -> Result<()> {
        let mut pi = policy(0)?;
        let mut snapshot = pi.snapshot()?;
        let obs = [0.5, 0.5, 0.5];
        assert_eq!(pi.act(&obs)?, snapshot.act(&obs)?);

        let params: Vec<f32> = vec![0.0; pi.get_params()?.len()];
        snapshot.set_params(&params)?;
        assert_ne!(pi.get_params()?, snapshot.get_params()?);
        Ok(())
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let dir = TempDir::new("gaussian_mlp_policy")?;
        let path = dir.path().join("policy.safetensors");
        let pi1 = policy(1)?;
        pi1.save(&path)?;

        let mut pi2 = policy(2)?;
        pi2.load(&path)?;
        assert_eq!(pi1.flat_params()?, pi2.flat_params()?);
        Ok(())
    }

    #[test]
    fn test_entropy() -> Result<()> {
        let pi = policy(0)?;
        let expected = (2.0 * PI * std::f64::consts::E).ln();
        assert!((pi.entropy()? - expected).abs() < 1e-9);
        Ok(())
    }
}
