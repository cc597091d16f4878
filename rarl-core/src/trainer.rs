//! Alternating training of the protagonist and the adversary.
mod config;
mod run;
use crate::{
    error::RarlError,
    record::{RecordValue, Recorder},
    Agent, ConstantPolicy, EnvSpec, Evaluator, Policy, Role, RolloutRequest, SamplerPool,
};
use anyhow::Result;
pub use config::{ProTrainingAdversary, TrainerConfig};
use log::{info, warn};
pub use run::TrainingRun;

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Manages the alternating training loop of robust adversarial RL.
///
/// # Training loop
///
/// 0. Given a protagonist and an adversary implementing [`Agent`], a sampler pool
///    implementing [`SamplerPool`], an [`Evaluator`] and a [`Recorder`].
/// 1. Check that the dimensions of both agents fit the environment and that the
///    actions compose into the environment's action. Nothing has been started yet,
///    so a failure here leaves no resources behind.
/// 2. Initialize the sampler pool with `n_workers` workers.
/// 3. Evaluate the protagonist under the zero, random and learnt adversaries.
/// 4. For each of the `n_itr` global iterations:
///     1. Phase P: `n_pro_itr` times, sample trajectories with snapshots of the
///        protagonist and the frozen adversary, then update the protagonist.
///     2. Phase A: `n_adv_itr` times, sample trajectories with snapshots of the
///        frozen protagonist and the adversary, then update the adversary on the
///        negated rewards of the environment.
///     3. Evaluate the protagonist under the three adversaries.
/// 5. Shut the sampler pool down, whether the loop succeeded or not.
///
/// Sampling always completes before an update starts, and the trajectories of a
/// phase only reach the agent of that phase.
///
/// ```mermaid
/// graph LR
///     T[Trainer]-->|RolloutRequest|S[SamplerPool]
///     S -->|Trajectory|T
///     T -->|"Trajectory (phase P)"|P[Protagonist]
///     T -->|"Trajectory (phase A)"|A[Adversary]
///     P -->|snapshot|E[Evaluator]
///     A -->|snapshot|E
/// ```
pub struct Trainer {
    config: TrainerConfig,

    /// Descriptor of the environment the agents play in.
    spec: EnvSpec,

    /// The number of workers of the sampler pool.
    n_workers: usize,

    /// Base seed of rollout requests.
    seed: u64,

    /// The number of rollout requests issued so far.
    n_requests: u64,
}

impl Trainer {
    /// Constructs a trainer.
    pub fn build(config: TrainerConfig, spec: EnvSpec) -> Self {
        Self {
            config,
            spec,
            n_workers: 1,
            seed: 0,
            n_requests: 0,
        }
    }

    /// Sets the number of workers of the sampler pool.
    pub fn n_workers(mut self, v: usize) -> Self {
        self.n_workers = v;
        self
    }

    /// Sets the base seed of rollout requests.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Configuration of the trainer.
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Checks the agents against the environment.
    pub fn check<P: Agent, A: Agent>(&self, protagonist: &P, adversary: &A) -> Result<()> {
        self.config.check()?;
        if self.n_workers == 0 {
            return Err(RarlError::InvalidConfig("n_workers must be positive".into()).into());
        }
        self.spec.check_composition()?;
        for (agent, role) in [
            (protagonist as &dyn Agent, Role::Protagonist),
            (adversary as &dyn Agent, Role::Adversary),
        ] {
            if agent.role() != role {
                return Err(RarlError::InvalidConfig(format!(
                    "the {} is given an agent of the {}",
                    role,
                    agent.role()
                ))
                .into());
            }
            let space = match role {
                Role::Protagonist => &self.spec.pro_action_space,
                Role::Adversary => &self.spec.adv_action_space,
            };
            self.spec.check_player(
                agent.observation_dim(),
                agent.action_dim(),
                space,
                &role.to_string(),
            )?;
        }
        Ok(())
    }

    /// Train the protagonist and the adversary.
    ///
    /// The sampler pool is initialized here and always shut down before returning.
    pub fn train<P, A, S, V>(
        &mut self,
        protagonist: &mut P,
        adversary: &mut A,
        sampler: &mut S,
        evaluator: &mut V,
        recorder: &mut dyn Recorder,
    ) -> Result<TrainingRun>
    where
        P: Agent,
        A: Agent,
        S: SamplerPool,
        V: Evaluator,
    {
        self.check(protagonist, adversary)?;
        sampler.initialize(self.n_workers)?;

        let result = self.train_loop(protagonist, adversary, sampler, evaluator, recorder);
        let shutdown = sampler.shutdown();
        if let Err(e) = &shutdown {
            warn!("Failed to shut down the sampler pool: {}", e);
        }

        let run = result?;
        shutdown?;
        Ok(run)
    }

    fn train_loop<P, A, S, V>(
        &mut self,
        protagonist: &mut P,
        adversary: &mut A,
        sampler: &mut S,
        evaluator: &mut V,
        recorder: &mut dyn Recorder,
    ) -> Result<TrainingRun>
    where
        P: Agent,
        A: Agent,
        S: SamplerPool,
        V: Evaluator,
    {
        let mut run = TrainingRun::default();
        Self::evaluate(0, protagonist, adversary, evaluator, recorder, &mut run)?;

        for global_itr in 1..=self.config.n_itr {
            info!("Global iteration {}/{}", global_itr, self.config.n_itr);

            for sub_itr in 0..self.config.n_pro_itr {
                let opponent: Box<dyn Policy> = match self.config.pro_training_adversary {
                    ProTrainingAdversary::Learnt => adversary.snapshot()?,
                    ProTrainingAdversary::Zero => {
                        Box::new(ConstantPolicy::zeros(adversary.action_dim()))
                    }
                };
                let mean_return = self.update(
                    global_itr,
                    sub_itr,
                    protagonist,
                    opponent,
                    sampler,
                    recorder,
                )?;
                run.pro_rews.push(mean_return);
                run.all_rews.push(mean_return);
            }

            for sub_itr in 0..self.config.n_adv_itr {
                let opponent = protagonist.snapshot()?;
                let mean_return =
                    self.update(global_itr, sub_itr, adversary, opponent, sampler, recorder)?;
                run.adv_rews.push(mean_return);
                run.all_rews.push(mean_return);
            }

            Self::evaluate(global_itr, protagonist, adversary, evaluator, recorder, &mut run)?;
        }

        Ok(run)
    }

    /// Samples trajectories with the learner and its frozen opponent, then updates the learner.
    ///
    /// Returns the mean return of the batch in the learner's reward stream.
    fn update<S: SamplerPool>(
        &mut self,
        global_itr: usize,
        sub_itr: usize,
        learner: &mut dyn Agent,
        opponent: Box<dyn Policy>,
        sampler: &mut S,
        recorder: &mut dyn Recorder,
    ) -> Result<f32> {
        let role = learner.role();
        let (protagonist, adversary) = match role {
            Role::Protagonist => (learner.snapshot()?, opponent),
            Role::Adversary => (opponent, learner.snapshot()?),
        };
        let request = RolloutRequest {
            role,
            protagonist,
            adversary,
            batch_size: self.config.batch_size,
            max_path_length: self.config.max_path_length,
            seed: self.next_seed(),
        };

        let paths = sampler.sample_paths(request)?;
        if paths.is_empty() {
            return Err(RarlError::EmptyBatch.into());
        }
        let n_steps: usize = paths.iter().map(|p| p.len()).sum();

        let mut record = learner.opt_with_record(&paths)?;
        let mean_return = record.get_scalar("mean_return")?;
        info!(
            "itr {} {} {}: mean return {:.3} ({} paths, {} steps)",
            global_itr,
            role,
            sub_itr,
            mean_return,
            paths.len(),
            n_steps
        );

        record.insert("global_itr", RecordValue::Scalar(global_itr as f32));
        record.insert("phase", RecordValue::String(role.to_string()));
        record.insert("sub_itr", RecordValue::Scalar(sub_itr as f32));
        record.insert("n_paths", RecordValue::Scalar(paths.len() as f32));
        record.insert("n_steps", RecordValue::Scalar(n_steps as f32));
        recorder.write(record);

        Ok(mean_return)
    }

    fn evaluate<P: Agent, A: Agent, V: Evaluator>(
        global_itr: usize,
        protagonist: &P,
        adversary: &A,
        evaluator: &mut V,
        recorder: &mut dyn Recorder,
        run: &mut TrainingRun,
    ) -> Result<()> {
        let rewards = evaluator.evaluate_all(protagonist, adversary)?;
        info!(
            "itr {} evaluation: zero {:.3}, random {:.3}, learnt {:.3}",
            global_itr, rewards.constant, rewards.random, rewards.learnt
        );
        run.push_eval(&rewards);

        let mut record = rewards.to_record();
        record.insert("global_itr", RecordValue::Scalar(global_itr as f32));
        recorder.write(record);
        Ok(())
    }

    fn next_seed(&mut self) -> u64 {
        let seed = self
            .seed
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(self.n_requests);
        self.n_requests += 1;
        seed
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        dummy::{CountingAgent, LinearStubEnv, LinearStubEnvConfig},
        record::BufferedRecorder,
        DefaultEvaluator, Env, SerialSampler, Trajectory,
    };

    /// Serial sampler logging the parameters of the snapshots it receives.
    struct CountingPool {
        inner: SerialSampler<LinearStubEnv>,
        log: Vec<(Role, f32, f32)>,
        n_initialized: usize,
        n_rejected: usize,
    }

    impl CountingPool {
        fn new(config: LinearStubEnvConfig) -> Self {
            Self {
                inner: SerialSampler::new(config, 0),
                log: vec![],
                n_initialized: 0,
                n_rejected: 0,
            }
        }
    }

    impl SamplerPool for CountingPool {
        fn initialize(&mut self, n_workers: usize) -> Result<()> {
            self.n_initialized += 1;
            self.inner.initialize(n_workers)
        }

        fn sample_paths(&mut self, request: RolloutRequest) -> Result<Vec<Trajectory>> {
            let pro = request.protagonist.get_params()?[0];
            let adv = request.adversary.get_params()?.first().copied().unwrap_or(-1.0);
            let role = request.role;
            match self.inner.sample_paths(request) {
                Ok(paths) => {
                    self.log.push((role, pro, adv));
                    Ok(paths)
                }
                Err(e) => {
                    self.n_rejected += 1;
                    Err(e)
                }
            }
        }

        fn shutdown(&mut self) -> Result<()> {
            self.inner.shutdown()
        }

        fn is_active(&self) -> bool {
            self.inner.is_active()
        }
    }

    fn setup(
        env_config: &LinearStubEnvConfig,
        config: TrainerConfig,
    ) -> Result<(Trainer, DefaultEvaluator<LinearStubEnv>)> {
        let spec = LinearStubEnv::build(env_config, 0)?.spec();
        let evaluator = DefaultEvaluator::new(env_config, 0, 1, config.max_path_length, 0)?;
        Ok((Trainer::build(config, spec), evaluator))
    }

    fn config() -> TrainerConfig {
        TrainerConfig::default()
            .n_itr(2)
            .n_pro_itr(2)
            .n_adv_itr(1)
            .batch_size(8)
            .max_path_length(4)
    }

    #[test_log::test]
    fn test_phase_alternation() -> Result<()> {
        let env_config = LinearStubEnvConfig::default();
        let (mut trainer, mut evaluator) = setup(&env_config, config())?;
        let mut pro = CountingAgent::new(Role::Protagonist, 1);
        let mut adv = CountingAgent::new(Role::Adversary, 1);
        let mut pool = CountingPool::new(env_config);
        let mut recorder = BufferedRecorder::new();

        let run = trainer.train(&mut pro, &mut adv, &mut pool, &mut evaluator, &mut recorder)?;

        // Each player's parameters only change in its own phase
        use Role::*;
        assert_eq!(
            pool.log,
            vec![
                (Protagonist, 0.0, 0.0),
                (Protagonist, 1.0, 0.0),
                (Adversary, 2.0, 0.0),
                (Protagonist, 2.0, 1.0),
                (Protagonist, 3.0, 1.0),
                (Adversary, 4.0, 1.0),
            ]
        );
        assert_eq!(run.n_checkpoints(), 3);
        assert_eq!(run.pro_rews.len(), 4);
        assert_eq!(run.adv_rews.len(), 2);
        assert_eq!(run.all_rews.len(), 6);
        assert_eq!(recorder.scalars("adv_test_rew").len(), 3);
        assert_eq!(recorder.scalars("mean_return").len(), 6);
        assert_eq!(pool.n_initialized, 1);
        assert!(!pool.is_active());
        Ok(())
    }

    #[test]
    fn test_adversary_trains_on_negated_rewards() -> Result<()> {
        let env_config = LinearStubEnvConfig::default();
        let (mut trainer, mut evaluator) = setup(&env_config, config().n_itr(1).n_pro_itr(0))?;
        let mut pro = CountingAgent::new(Role::Protagonist, 1);
        let mut adv = CountingAgent::new(Role::Adversary, 1);
        let mut pool = CountingPool::new(env_config);
        let mut recorder = BufferedRecorder::new();

        let run = trainer.train(&mut pro, &mut adv, &mut pool, &mut evaluator, &mut recorder)?;

        // Both players push by 0.1, rewards of the environment are negative
        assert_eq!(run.adv_rews.len(), 1);
        assert!(run.adv_rews[0] > 0.0);
        Ok(())
    }

    #[test]
    fn test_zero_adversary_in_protagonist_phase() -> Result<()> {
        let env_config = LinearStubEnvConfig::default();
        let config = config()
            .n_itr(1)
            .n_pro_itr(1)
            .n_adv_itr(0)
            .pro_training_adversary(ProTrainingAdversary::Zero);
        let (mut trainer, mut evaluator) = setup(&env_config, config)?;
        let mut pro = CountingAgent::new(Role::Protagonist, 1);
        let mut adv = CountingAgent::new(Role::Adversary, 1);
        let mut pool = CountingPool::new(env_config);
        let mut recorder = BufferedRecorder::new();

        trainer.train(&mut pro, &mut adv, &mut pool, &mut evaluator, &mut recorder)?;

        // The zero adversary has no parameters
        assert_eq!(pool.log, vec![(Role::Protagonist, 0.0, -1.0)]);
        Ok(())
    }

    #[test]
    fn test_mismatched_dims_fail_before_pool_starts() -> Result<()> {
        let env_config = LinearStubEnvConfig::default();
        let (mut trainer, mut evaluator) = setup(&env_config, config())?;
        let mut pro = CountingAgent::new(Role::Protagonist, 1);
        let mut adv = CountingAgent::new(Role::Adversary, 2);
        let mut pool = CountingPool::new(env_config);
        let mut recorder = BufferedRecorder::new();

        let result = trainer.train(&mut pro, &mut adv, &mut pool, &mut evaluator, &mut recorder);
        assert!(result.is_err());
        assert_eq!(pool.n_initialized, 0);

        // Swapped roles are rejected as well
        let adv = CountingAgent::new(Role::Protagonist, 1);
        assert!(trainer.check(&pro, &adv).is_err());
        Ok(())
    }

    #[test]
    fn test_zero_workers_fail_before_pool_starts() -> Result<()> {
        let env_config = LinearStubEnvConfig::default();
        let (trainer, mut evaluator) = setup(&env_config, config())?;
        let mut trainer = trainer.n_workers(0);
        let mut pro = CountingAgent::new(Role::Protagonist, 1);
        let mut adv = CountingAgent::new(Role::Adversary, 1);
        let mut pool = CountingPool::new(env_config);

        let result = trainer.train(
            &mut pro,
            &mut adv,
            &mut pool,
            &mut evaluator,
            &mut BufferedRecorder::new(),
        );
        let err = result.err();
        assert!(matches!(
            err.as_ref().and_then(|e| e.downcast_ref::<RarlError>()),
            Some(RarlError::InvalidConfig(_))
        ));
        assert_eq!(pool.n_initialized, 0);
        assert_eq!(pro.n_updates(), 0);
        Ok(())
    }

    #[test]
    fn test_pool_rejects_requests_after_training() -> Result<()> {
        let env_config = LinearStubEnvConfig::default();
        let (mut trainer, mut evaluator) = setup(&env_config, config())?;
        let mut pro = CountingAgent::new(Role::Protagonist, 1);
        let mut adv = CountingAgent::new(Role::Adversary, 1);
        let mut pool = CountingPool::new(env_config);
        let mut recorder = BufferedRecorder::new();

        trainer.train(&mut pro, &mut adv, &mut pool, &mut evaluator, &mut recorder)?;
        let n_served = pool.log.len();

        let request = RolloutRequest {
            role: Role::Protagonist,
            protagonist: pro.snapshot()?,
            adversary: adv.snapshot()?,
            batch_size: 1,
            max_path_length: 1,
            seed: 0,
        };
        assert!(pool.sample_paths(request).is_err());
        assert_eq!(pool.n_rejected, 1);
        assert_eq!(pool.log.len(), n_served);
        Ok(())
    }

    #[test]
    fn test_sampling_failure_aborts_and_shuts_down() -> Result<()> {
        let env_config = LinearStubEnvConfig::default().fail_at_step(Some(2));
        let spec = LinearStubEnv::build(&env_config, 0)?.spec();
        // Evaluation runs on a healthy environment, sampling on a failing one
        let mut evaluator = DefaultEvaluator::<LinearStubEnv>::new(
            &LinearStubEnvConfig::default(),
            0,
            1,
            4,
            0,
        )?;
        let mut trainer = Trainer::build(config(), spec);
        let mut pro = CountingAgent::new(Role::Protagonist, 1);
        let mut adv = CountingAgent::new(Role::Adversary, 1);
        let mut pool = CountingPool::new(env_config);
        let mut recorder = BufferedRecorder::new();

        let result = trainer.train(&mut pro, &mut adv, &mut pool, &mut evaluator, &mut recorder);
        assert!(result.is_err());
        assert_eq!(pro.n_updates(), 0);
        assert!(!pool.is_active());
        Ok(())
    }
}
