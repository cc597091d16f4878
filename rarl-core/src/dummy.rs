//! Deterministic stub environment and agent used in tests.
use crate::{
    error::RarlError,
    record::Record,
    Agent, BoxSpace, Composition, Env, EnvSpec, Policy, Role, Step, Trajectory,
};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration of [`LinearStubEnv`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearStubEnvConfig {
    /// Initial state. Its length is the dimension of the environment.
    pub init_state: Vec<f32>,

    /// Bound of the protagonist's action.
    pub pro_bound: f32,

    /// Bound of the adversary's action.
    pub adv_bound: f32,

    /// How the players' actions are merged.
    pub composition: Composition,

    /// Episodes are truncated after this number of steps.
    pub max_steps: usize,

    /// Episodes terminate when `|s|` exceeds this value in any dimension.
    pub terminate_bound: Option<f32>,

    /// If set, [`Env::step`] fails at this step of an episode.
    pub fail_at_step: Option<usize>,
}

impl Default for LinearStubEnvConfig {
    fn default() -> Self {
        Self {
            init_state: vec![0.0],
            pro_bound: 1.0,
            adv_bound: 1.0,
            composition: Composition::Sum,
            max_steps: 1000,
            terminate_bound: None,
            fail_at_step: None,
        }
    }
}

impl LinearStubEnvConfig {
    /// Sets the initial state.
    pub fn init_state(mut self, v: Vec<f32>) -> Self {
        self.init_state = v;
        self
    }

    /// Sets the bounds of the players' actions.
    pub fn bounds(mut self, pro_bound: f32, adv_bound: f32) -> Self {
        self.pro_bound = pro_bound;
        self.adv_bound = adv_bound;
        self
    }

    /// Sets the composition rule.
    pub fn composition(mut self, v: Composition) -> Self {
        self.composition = v;
        self
    }

    /// Sets the maximum number of steps of an episode.
    pub fn max_steps(mut self, v: usize) -> Self {
        self.max_steps = v;
        self
    }

    /// Sets the termination bound.
    pub fn terminate_bound(mut self, v: Option<f32>) -> Self {
        self.terminate_bound = v;
        self
    }

    /// Sets the step at which the environment fails.
    pub fn fail_at_step(mut self, v: Option<usize>) -> Self {
        self.fail_at_step = v;
        self
    }
}

/// Environment with state `s' = s + a` and reward `-|s'|`.
///
/// With [`Composition::Sum`], `a` is the sum of the players' actions, clipped
/// to `pro_bound + adv_bound`. With [`Composition::Concat`], the environment receives
/// `[a_pro, a_adv]` and adds both halves to the state. The initial state is
/// fixed, so episodes only depend on the actions.
pub struct LinearStubEnv {
    config: LinearStubEnvConfig,
    state: Vec<f32>,
    t: usize,
}

impl LinearStubEnv {
    fn dim(&self) -> usize {
        self.config.init_state.len()
    }

    fn displacement(&self, a: &[f32]) -> Result<Vec<f32>> {
        let dim = self.dim();
        let pro_space = BoxSpace::symmetric(dim, self.config.pro_bound);
        let adv_space = BoxSpace::symmetric(dim, self.config.adv_bound);

        match self.config.composition {
            Composition::Sum => {
                let bound = self.config.pro_bound.abs() + self.config.adv_bound.abs();
                Ok(BoxSpace::symmetric(dim, bound).clip(a))
            }
            Composition::Concat => {
                let pro = pro_space.clip(&a[..dim]);
                let adv = adv_space.clip(&a[dim..]);
                Ok(pro.iter().zip(adv.iter()).map(|(p, q)| p + q).collect())
            }
        }
    }
}

impl Env for LinearStubEnv {
    type Config = LinearStubEnvConfig;

    fn build(config: &Self::Config, _seed: i64) -> Result<Self> {
        if config.init_state.is_empty() {
            return Err(RarlError::InvalidConfig("empty initial state".into()).into());
        }
        Ok(Self {
            config: config.clone(),
            state: config.init_state.clone(),
            t: 0,
        })
    }

    fn spec(&self) -> EnvSpec {
        let dim = self.dim();
        let action_dim = match self.config.composition {
            Composition::Sum => dim,
            Composition::Concat => 2 * dim,
        };
        EnvSpec {
            observation_space: BoxSpace::unbounded(dim),
            pro_action_space: BoxSpace::symmetric(dim, self.config.pro_bound),
            adv_action_space: BoxSpace::symmetric(dim, self.config.adv_bound),
            action_dim,
            composition: self.config.composition,
        }
    }

    fn step(&mut self, a: &[f32]) -> Result<(Step, Record)> {
        if Some(self.t) == self.config.fail_at_step {
            bail!("LinearStubEnv failed at step {}", self.t);
        }
        let action_dim = self.spec().action_dim;
        if a.len() != action_dim {
            return Err(RarlError::DimensionMismatch {
                what: "action of LinearStubEnv".into(),
                expected: action_dim,
                actual: a.len(),
            }
            .into());
        }

        let d = self.displacement(a)?;
        self.state.iter_mut().zip(d.iter()).for_each(|(s, d)| *s += d);
        self.t += 1;

        let reward = -self.state.iter().map(|s| s.abs()).sum::<f32>();
        let is_terminated = match self.config.terminate_bound {
            Some(b) => self.state.iter().any(|s| s.abs() > b),
            None => false,
        };
        let is_truncated = self.t >= self.config.max_steps;

        Ok((
            Step::new(self.state.clone(), reward, is_terminated, is_truncated),
            Record::empty(),
        ))
    }

    fn reset(&mut self) -> Result<Vec<f32>> {
        self.state = self.config.init_state.clone();
        self.t = 0;
        Ok(self.state.clone())
    }

    fn reset_with_index(&mut self, _ix: usize) -> Result<Vec<f32>> {
        self.reset()
    }
}

/// Agent emitting a constant action, whose single parameter counts its updates.
#[derive(Debug, Clone)]
pub struct CountingAgent {
    role: Role,
    obs_dim: usize,
    act: Vec<f32>,
    count: f32,
}

impl CountingAgent {
    /// Constructs an agent emitting `0.1` in every dimension of its action.
    pub fn new(role: Role, act_dim: usize) -> Self {
        Self {
            role,
            obs_dim: 1,
            act: vec![0.1; act_dim],
            count: 0.0,
        }
    }

    /// Sets the emitted action.
    pub fn act_value(mut self, v: Vec<f32>) -> Self {
        self.act = v;
        self
    }

    /// Sets the observation dimension.
    pub fn obs_dim(mut self, v: usize) -> Self {
        self.obs_dim = v;
        self
    }

    /// The number of updates so far.
    pub fn n_updates(&self) -> usize {
        self.count as usize
    }
}

impl Policy for CountingAgent {
    fn act(&mut self, _obs: &[f32]) -> Result<Vec<f32>> {
        Ok(self.act.clone())
    }

    fn log_prob(&self, _obs: &[f32], _act: &[f32]) -> Result<f32> {
        Ok(0.0)
    }

    fn action_dim(&self) -> usize {
        self.act.len()
    }

    fn snapshot(&self) -> Result<Box<dyn Policy>> {
        Ok(Box::new(self.clone()))
    }

    fn get_params(&self) -> Result<Vec<f32>> {
        Ok(vec![self.count])
    }

    fn set_params(&mut self, params: &[f32]) -> Result<()> {
        match params {
            [count] => {
                self.count = *count;
                Ok(())
            }
            _ => bail!("CountingAgent has a single parameter"),
        }
    }
}

impl Agent for CountingAgent {
    fn role(&self) -> Role {
        self.role
    }

    fn observation_dim(&self) -> usize {
        self.obs_dim
    }

    fn opt_with_record(&mut self, paths: &[Trajectory]) -> Result<Record> {
        if paths.is_empty() {
            return Err(RarlError::EmptyBatch.into());
        }
        if paths.iter().any(|p| p.role != self.role) {
            bail!("{} received trajectories of the {}", self.role, self.role.opponent());
        }
        self.count += 1.0;
        let mean = paths.iter().map(|p| p.undiscounted_return()).sum::<f32>()
            / paths.len() as f32;
        Ok(Record::from_scalar("mean_return", mean))
    }

    fn save_params(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    fn load_params(&mut self, _path: &Path) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_concat_composition() -> Result<()> {
        let config = LinearStubEnvConfig::default()
            .composition(Composition::Concat)
            .bounds(0.1, 1.0);
        let mut env = LinearStubEnv::build(&config, 0)?;
        assert_eq!(env.spec().action_dim, 2);
        env.spec().check_composition()?;

        env.reset()?;
        let (step, _) = env.step(&[5.0, -0.5])?;
        assert!((step.obs[0] - (-0.4)).abs() < 1e-6);
        assert!((step.reward - (-0.4)).abs() < 1e-6);
        assert!(env.step(&[0.0]).is_err());
        Ok(())
    }

    #[test]
    fn test_sum_is_clipped_to_joint_bound() -> Result<()> {
        let config = LinearStubEnvConfig::default().bounds(0.5, 1.0);
        let mut env = LinearStubEnv::build(&config, 0)?;
        env.reset()?;
        let (step, _) = env.step(&[1.2])?;
        assert!((step.obs[0] - 1.2).abs() < 1e-6);
        let (step, _) = env.step(&[-5.0])?;
        assert!((step.obs[0] - (-0.3)).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_termination_and_truncation() -> Result<()> {
        let config = LinearStubEnvConfig::default()
            .max_steps(3)
            .terminate_bound(Some(1.5));
        let mut env = LinearStubEnv::build(&config, 0)?;
        env.reset()?;
        assert!(!env.step(&[1.0])?.0.is_done());
        let (step, _) = env.step(&[1.0])?;
        assert!(step.is_terminated);

        env.reset()?;
        env.step(&[0.0])?;
        env.step(&[0.0])?;
        let (step, _) = env.step(&[0.0])?;
        assert!(step.is_truncated && !step.is_terminated);
        Ok(())
    }
}
