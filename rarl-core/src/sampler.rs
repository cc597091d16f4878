//! Rollouts of the two players in an environment.
//!
//! [`collect`] is the sampling routine shared by every sampler. It resets the
//! environment, steps it with the composed action of the protagonist and the
//! adversary until the episode ends or the path length is reached, and repeats
//! until enough timesteps have been gathered.
//!
//! A [`SamplerPool`] owns the environments. [`SerialSampler`] runs rollouts in
//! the calling thread, while the actor pool of `rarl-async-sampler` distributes
//! them across threads.
use crate::{error::RarlError, Composition, Env, Policy, Role, Trajectory};
use anyhow::Result;
use log::trace;

/// A request for a batch of trajectories.
///
/// The policies are snapshots. Samplers may mutate them, e.g. their random number
/// generators, but the policies being trained are never touched.
pub struct RolloutRequest {
    /// The player whose update consumes the trajectories.
    pub role: Role,

    /// Snapshot of the protagonist.
    pub protagonist: Box<dyn Policy>,

    /// Snapshot of the adversary.
    pub adversary: Box<dyn Policy>,

    /// Minimum number of timesteps in the batch.
    pub batch_size: usize,

    /// Maximum number of steps in a trajectory.
    pub max_path_length: usize,

    /// Seed of the random number generators of the policy snapshots.
    pub seed: u64,
}

/// Pool of environments producing trajectories.
///
/// The lifecycle is `initialize` once, any number of `sample_paths`, then `shutdown`.
/// After shutdown, [`SamplerPool::sample_paths`] fails with [`RarlError::SamplerShutDown`].
pub trait SamplerPool {
    /// Starts the pool with the given number of workers.
    fn initialize(&mut self, n_workers: usize) -> Result<()>;

    /// Collects trajectories until at least `request.batch_size` timesteps are gathered.
    ///
    /// Blocks until every worker has returned its share. A failure of any worker
    /// fails the whole request.
    fn sample_paths(&mut self, request: RolloutRequest) -> Result<Vec<Trajectory>>;

    /// Stops the workers and releases their resources.
    fn shutdown(&mut self) -> Result<()>;

    /// Returns `true` if the pool accepts requests.
    fn is_active(&self) -> bool;
}

/// Runs one episode of at most `max_path_length` steps.
pub fn rollout<E: Env>(
    env: &mut E,
    protagonist: &mut dyn Policy,
    adversary: &mut dyn Policy,
    role: Role,
    composition: Composition,
    max_path_length: usize,
) -> Result<Trajectory> {
    let mut path = Trajectory::new(role);
    let mut obs = env.reset()?;

    for _ in 0..max_path_length {
        let pro_act = protagonist.act(&obs)?;
        let adv_act = adversary.act(&obs)?;
        let act = composition.compose(&pro_act, &adv_act);
        let (step, _) = env.step(&act)?;
        let is_terminated = step.is_terminated;
        let is_done = step.is_done();

        path.push(obs, pro_act, adv_act, step.reward);
        obs = step.obs;

        if is_done {
            path.is_terminated = is_terminated;
            break;
        }
    }

    trace!(
        "Rollout for {}: {} steps, return {}",
        role,
        path.len(),
        path.env_return()
    );

    Ok(path)
}

/// Collects whole trajectories until at least `batch_size` timesteps are gathered.
pub fn collect<E: Env>(
    env: &mut E,
    protagonist: &mut dyn Policy,
    adversary: &mut dyn Policy,
    role: Role,
    batch_size: usize,
    max_path_length: usize,
) -> Result<Vec<Trajectory>> {
    if max_path_length == 0 {
        return Err(RarlError::InvalidConfig("max_path_length must be positive".into()).into());
    }
    let spec = env.spec();
    spec.check_composition()?;

    let mut paths = vec![];
    let mut n_steps = 0;
    while n_steps < batch_size {
        let path = rollout(
            env,
            protagonist,
            adversary,
            role,
            spec.composition,
            max_path_length,
        )?;
        // An environment ending an episode before its first step would stall the loop.
        if path.is_empty() {
            return Err(RarlError::EmptyBatch.into());
        }
        n_steps += path.len();
        paths.push(path);
    }

    Ok(paths)
}

enum SerialState<E> {
    Idle,
    Active(E),
    ShutDown,
}

/// Sampler running rollouts in the calling thread with a single environment.
pub struct SerialSampler<E: Env> {
    env_config: E::Config,
    env_seed: i64,
    state: SerialState<E>,
}

impl<E: Env> SerialSampler<E> {
    /// Constructs a sampler. The environment is built on [`SamplerPool::initialize`].
    pub fn new(env_config: E::Config, env_seed: i64) -> Self {
        Self {
            env_config,
            env_seed,
            state: SerialState::Idle,
        }
    }
}

impl<E: Env> SamplerPool for SerialSampler<E> {
    fn initialize(&mut self, _n_workers: usize) -> Result<()> {
        match self.state {
            SerialState::ShutDown => Err(RarlError::SamplerShutDown.into()),
            SerialState::Active(_) => Ok(()),
            SerialState::Idle => {
                self.state = SerialState::Active(E::build(&self.env_config, self.env_seed)?);
                Ok(())
            }
        }
    }

    fn sample_paths(&mut self, request: RolloutRequest) -> Result<Vec<Trajectory>> {
        let env = match &mut self.state {
            SerialState::Active(env) => env,
            SerialState::Idle => return Err(RarlError::SamplerNotInitialized.into()),
            SerialState::ShutDown => return Err(RarlError::SamplerShutDown.into()),
        };

        let RolloutRequest {
            role,
            mut protagonist,
            mut adversary,
            batch_size,
            max_path_length,
            seed,
        } = request;
        protagonist.reseed(seed);
        adversary.reseed(seed.wrapping_add(1));

        collect(
            env,
            protagonist.as_mut(),
            adversary.as_mut(),
            role,
            batch_size,
            max_path_length,
        )
    }

    fn shutdown(&mut self) -> Result<()> {
        self.state = SerialState::ShutDown;
        Ok(())
    }

    fn is_active(&self) -> bool {
        matches!(self.state, SerialState::Active(_))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        dummy::{LinearStubEnv, LinearStubEnvConfig},
        ConstantPolicy,
    };

    fn request(role: Role, batch_size: usize) -> RolloutRequest {
        RolloutRequest {
            role,
            protagonist: Box::new(ConstantPolicy::new(vec![0.5])),
            adversary: Box::new(ConstantPolicy::new(vec![-0.25])),
            batch_size,
            max_path_length: 4,
            seed: 0,
        }
    }

    #[test]
    fn test_collect_gathers_whole_paths() -> Result<()> {
        let mut sampler = SerialSampler::<LinearStubEnv>::new(LinearStubEnvConfig::default(), 0);
        sampler.initialize(1)?;
        let paths = sampler.sample_paths(request(Role::Protagonist, 10))?;

        // Paths are never cut to fit the batch size
        assert_eq!(paths.len(), 3);
        assert!(paths.iter().all(|p| p.len() == 4));
        assert_eq!(paths[0].pro_actions[0], vec![0.5]);
        assert_eq!(paths[0].adv_actions[0], vec![-0.25]);
        Ok(())
    }

    #[test]
    fn test_rejects_requests_after_shutdown() -> Result<()> {
        let mut sampler = SerialSampler::<LinearStubEnv>::new(LinearStubEnvConfig::default(), 0);
        assert!(sampler.sample_paths(request(Role::Adversary, 1)).is_err());
        sampler.initialize(1)?;
        assert!(sampler.is_active());
        sampler.shutdown()?;
        assert!(!sampler.is_active());

        let err = sampler
            .sample_paths(request(Role::Adversary, 1))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RarlError>(),
            Some(RarlError::SamplerShutDown)
        ));
        Ok(())
    }

    #[test]
    fn test_environment_errors_propagate() -> Result<()> {
        let config = LinearStubEnvConfig::default().fail_at_step(Some(2));
        let mut sampler = SerialSampler::<LinearStubEnv>::new(config, 0);
        sampler.initialize(1)?;
        assert!(sampler.sample_paths(request(Role::Protagonist, 10)).is_err());
        Ok(())
    }
}
