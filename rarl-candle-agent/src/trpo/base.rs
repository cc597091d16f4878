use super::{process_samples, ConjugateGradientOptimizer, TrpoConfig};
use crate::{GaussianMlpPolicy, LinearFeatureBaseline};
use anyhow::Result;
use candle_core::Tensor;
use log::{debug, trace};
use rarl_core::{
    error::RarlError,
    record::{Record, RecordValue},
    Agent, Policy, Role, Trajectory,
};
use std::{fs, path::Path};

/// Trust region policy optimization (TRPO) agent of one player.
///
/// The agent owns its policy, its baseline and its optimizer, and only accepts
/// trajectories collected for its role.
pub struct Trpo {
    role: Role,
    config: TrpoConfig,
    policy: GaussianMlpPolicy,
    baseline: LinearFeatureBaseline,
    optimizer: ConjugateGradientOptimizer,
    n_opts: usize,
}

impl Trpo {
    /// Constructs [`Trpo`] agent.
    pub fn build(role: Role, obs_dim: usize, act_dim: usize, config: TrpoConfig) -> Result<Self> {
        config.check()?;
        let policy = GaussianMlpPolicy::build(config.policy_config(obs_dim, act_dim))?;
        let optimizer = ConjugateGradientOptimizer::new(&config);

        Ok(Self {
            role,
            config,
            policy,
            baseline: LinearFeatureBaseline::new(),
            optimizer,
            n_opts: 0,
        })
    }

    /// Configuration of the agent.
    pub fn config(&self) -> &TrpoConfig {
        &self.config
    }

    /// The policy.
    pub fn policy(&self) -> &GaussianMlpPolicy {
        &self.policy
    }

    /// The baseline.
    pub fn baseline(&self) -> &LinearFeatureBaseline {
        &self.baseline
    }

    /// The number of optimization steps performed.
    pub fn n_opts(&self) -> usize {
        self.n_opts
    }

    fn opt_(&mut self, paths: &[Trajectory]) -> Result<Record> {
        if let Some(path) = paths.iter().find(|p| p.role != self.role) {
            return Err(RarlError::InvalidConfig(format!(
                "{} agent got a trajectory of the {}",
                self.role, path.role
            ))
            .into());
        }

        let samples = process_samples(paths, &mut self.baseline, &self.config)?;
        let obs_dim = self.policy.config().obs_dim;
        let act_dim = self.policy.config().act_dim;
        let n = samples.advantages.len();
        trace!("{} update on {} steps", self.role, n);

        let policy = &self.policy;
        let obs = policy.batch_tensor(&samples.observations, obs_dim)?;
        let act = policy.batch_tensor(&samples.actions, act_dim)?;
        let adv = Tensor::from_vec(samples.advantages, (n,), policy.device())?;
        let old_logp = policy.log_likelihood(&obs, &act)?.detach();
        let (old_mean, old_log_std) = {
            let (mean, log_std) = policy.dist(&obs)?;
            (mean.detach(), log_std.detach())
        };

        // Surrogate loss -E[pi(a|s) / pi_old(a|s) * A]
        let loss_fn = || -> Result<Tensor> {
            let logp = policy.log_likelihood(&obs, &act)?;
            let ratio = logp.sub(&old_logp)?.exp()?;
            Ok(ratio.mul(&adv)?.mean_all()?.neg()?)
        };
        let kl_fn = || -> Result<Tensor> { policy.mean_kl(&obs, &old_mean, &old_log_std) };

        let result = self.optimizer.optimize(policy.varmap(), loss_fn, kl_fn)?;
        self.n_opts += 1;
        debug!(
            "{} update {}: mean_return {}, loss {} -> {}, kl {}",
            self.role,
            self.n_opts,
            samples.mean_return,
            result.loss_before,
            result.loss_after,
            result.mean_kl
        );

        Ok(Record::from_slice(&[
            ("mean_return", RecordValue::Scalar(samples.mean_return)),
            ("loss_before", RecordValue::Scalar(result.loss_before as f32)),
            ("loss_after", RecordValue::Scalar(result.loss_after as f32)),
            ("mean_kl", RecordValue::Scalar(result.mean_kl as f32)),
            ("n_backtracks", RecordValue::Scalar(result.n_backtracks as f32)),
            (
                "accepted",
                RecordValue::Scalar(if result.accepted { 1.0 } else { 0.0 }),
            ),
            ("entropy", RecordValue::Scalar(self.policy.entropy()? as f32)),
            (
                "explained_variance",
                RecordValue::Scalar(samples.explained_variance as f32),
            ),
        ]))
    }
}

impl Policy for Trpo {
    fn act(&mut self, obs: &[f32]) -> Result<Vec<f32>> {
        self.policy.act(obs)
    }

    fn log_prob(&self, obs: &[f32], act: &[f32]) -> Result<f32> {
        self.policy.log_prob(obs, act)
    }

    fn action_dim(&self) -> usize {
        self.policy.action_dim()
    }

    fn snapshot(&self) -> Result<Box<dyn Policy>> {
        self.policy.snapshot()
    }

    fn get_params(&self) -> Result<Vec<f32>> {
        self.policy.get_params()
    }

    fn set_params(&mut self, params: &[f32]) -> Result<()> {
        self.policy.set_params(params)
    }

    fn reseed(&mut self, seed: u64) {
        self.policy.reseed(seed)
    }

    fn set_deterministic(&mut self, deterministic: bool) {
        self.policy.set_deterministic(deterministic)
    }
}

impl Agent for Trpo {
    fn role(&self) -> Role {
        self.role
    }

    fn observation_dim(&self) -> usize {
        self.policy.config().obs_dim
    }

    fn opt_with_record(&mut self, paths: &[Trajectory]) -> Result<Record> {
        self.opt_(paths)
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        self.policy.save(path.join("policy.safetensors"))
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        self.policy.load(path.join("policy.safetensors"))
    }
}
