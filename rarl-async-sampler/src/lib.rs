//! Thread pool of rollout actors.
//!
//! [`ActorManager`] implements [`SamplerPool`](rarl_core::SamplerPool). It owns
//! one [`Actor`] per worker thread, and every actor owns its environment.
//!
//! # Messages
//! * From [`ActorManager`] to [`Actor`]
//!   - [`ActorMessage::Rollout`] with snapshots of both policies
//!   - [`ActorMessage::Stop`]
//! * From [`Actor`] to [`ActorManager`]
//!   - [`ActorReply::Paths`] or [`ActorReply::Failed`], one per job
mod actor;
mod actor_manager;
mod messages;
pub use actor::{actor_stats_fmt, Actor, ActorStat};
pub use actor_manager::{ActorManager, ActorManagerConfig};
pub use messages::{ActorMessage, ActorReply, RolloutJob};

#[cfg(test)]
mod test {
    use super::{ActorManager, ActorManagerConfig};
    use anyhow::Result;
    use rarl_core::{
        dummy::{LinearStubEnv, LinearStubEnvConfig},
        error::RarlError,
        BoxSpace, ConstantPolicy, Policy, RandomPolicy, Role, RolloutRequest, SamplerPool,
        SerialSampler,
    };
    use test_log::test;

    type Pool = ActorManager<LinearStubEnv>;

    fn request(batch_size: usize, seed: u64) -> RolloutRequest {
        RolloutRequest {
            role: Role::Protagonist,
            protagonist: Box::new(RandomPolicy::new(BoxSpace::symmetric(1, 1.0), 0)),
            adversary: Box::new(RandomPolicy::new(BoxSpace::symmetric(1, 0.5), 0)),
            batch_size,
            max_path_length: 4,
            seed,
        }
    }

    fn downcast(e: &anyhow::Error) -> Option<&RarlError> {
        e.downcast_ref::<RarlError>()
    }

    #[test]
    fn test_batch_is_split_across_actors() -> Result<()> {
        let mut pool = Pool::build(&ActorManagerConfig::default(), &LinearStubEnvConfig::default());
        pool.initialize(3)?;
        assert_eq!(pool.n_actors(), 3);

        // Shares of 4, 3 and 3 timesteps, each filled by one path of 4 steps
        let paths = pool.sample_paths(request(10, 0))?;
        assert_eq!(paths.len(), 3);
        assert!(paths.iter().all(|p| p.len() == 4 && p.role == Role::Protagonist));
        pool.shutdown()?;
        Ok(())
    }

    #[test]
    fn test_requests_are_reproducible() -> Result<()> {
        let config = ActorManagerConfig::default();
        let env_config = LinearStubEnvConfig::default();
        let mut pool1 = Pool::build(&config, &env_config);
        let mut pool2 = Pool::build(&config, &env_config);
        pool1.initialize(2)?;
        pool2.initialize(2)?;

        let paths1 = pool1.sample_paths(request(16, 7))?;
        assert_eq!(paths1, pool2.sample_paths(request(16, 7))?);
        assert_ne!(paths1, pool1.sample_paths(request(16, 8))?);
        Ok(())
    }

    #[test]
    fn test_n_actors_overrides_n_workers() -> Result<()> {
        let config = ActorManagerConfig::default().n_actors(2);
        let mut pool = Pool::build(&config, &LinearStubEnvConfig::default());
        pool.initialize(5)?;
        assert_eq!(pool.n_actors(), 2);
        Ok(())
    }

    #[test]
    fn test_rejects_requests_after_shutdown() -> Result<()> {
        let mut pool = Pool::build(&ActorManagerConfig::default(), &LinearStubEnvConfig::default());
        let err = pool.sample_paths(request(1, 0)).unwrap_err();
        assert!(matches!(downcast(&err), Some(RarlError::SamplerNotInitialized)));

        pool.initialize(2)?;
        assert!(pool.is_active());
        pool.shutdown()?;
        assert!(!pool.is_active());

        let err = pool.sample_paths(request(1, 0)).unwrap_err();
        assert!(matches!(downcast(&err), Some(RarlError::SamplerShutDown)));
        assert!(pool.initialize(2).is_err());
        Ok(())
    }

    #[test]
    fn test_environment_failure_fails_the_request() -> Result<()> {
        let env_config = LinearStubEnvConfig::default().fail_at_step(Some(1));
        let mut pool = Pool::build(&ActorManagerConfig::default(), &env_config);
        pool.initialize(2)?;

        let err = pool.sample_paths(request(8, 0)).unwrap_err();
        assert!(matches!(downcast(&err), Some(RarlError::WorkerFailed { .. })));

        // Actors survive a failed job
        let err = pool.sample_paths(request(8, 0)).unwrap_err();
        assert!(matches!(downcast(&err), Some(RarlError::WorkerFailed { .. })));
        pool.shutdown()?;
        Ok(())
    }

    struct PanickingPolicy;

    impl Policy for PanickingPolicy {
        fn act(&mut self, _obs: &[f32]) -> Result<Vec<f32>> {
            panic!("policy panicked");
        }

        fn log_prob(&self, _obs: &[f32], _act: &[f32]) -> Result<f32> {
            Ok(0.0)
        }

        fn action_dim(&self) -> usize {
            1
        }

        fn snapshot(&self) -> Result<Box<dyn Policy>> {
            Ok(Box::new(PanickingPolicy))
        }
    }

    #[test]
    fn test_crashed_actor_is_detected() -> Result<()> {
        let mut pool = Pool::build(&ActorManagerConfig::default(), &LinearStubEnvConfig::default());
        pool.initialize(1)?;

        let mut req = request(4, 0);
        req.protagonist = Box::new(PanickingPolicy);
        let err = pool.sample_paths(req).unwrap_err();
        assert!(matches!(downcast(&err), Some(RarlError::WorkerCrashed(0))));

        let err = pool.shutdown().unwrap_err();
        assert!(matches!(downcast(&err), Some(RarlError::WorkerCrashed(0))));
        Ok(())
    }

    #[test]
    fn test_matches_serial_sampler_with_one_actor() -> Result<()> {
        let env_config = LinearStubEnvConfig::default();
        let mut pool = Pool::build(&ActorManagerConfig::default(), &env_config);
        let mut serial = SerialSampler::<LinearStubEnv>::new(env_config, 0);
        pool.initialize(1)?;
        serial.initialize(1)?;

        let constant = |v: f32| -> Box<dyn Policy> { Box::new(ConstantPolicy::new(vec![v])) };
        let req = |seed| RolloutRequest {
            role: Role::Adversary,
            protagonist: constant(0.5),
            adversary: constant(-0.25),
            batch_size: 6,
            max_path_length: 4,
            seed,
        };
        assert_eq!(pool.sample_paths(req(0))?, serial.sample_paths(req(0))?);
        Ok(())
    }
}
