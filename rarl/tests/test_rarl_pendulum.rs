use anyhow::Result;
use rarl::build_trpo;
use rarl_async_sampler::{ActorManager, ActorManagerConfig};
use rarl_candle_agent::TrpoConfig;
use rarl_core::{
    record::NullRecorder, AdversaryVariant, ConstantPolicy, DefaultEvaluator, Evaluator,
    Experiment, ExperimentConfig, ProTrainingAdversary, Role, TrainerConfig, SERIES_KEYS,
};
use rarl_pendulum_env::{InvertedPendulumAdv, InvertedPendulumAdvConfig};

#[test]
fn test_constant_push_shortens_episodes() -> Result<()> {
    let config = InvertedPendulumAdvConfig::default().init_noise(0.0);
    let mut evaluator = DefaultEvaluator::<InvertedPendulumAdv>::new(&config, 0, 2, 100, 0)?;
    let pro = ConstantPolicy::zeros(1);

    let zero = evaluator.evaluate(&pro, &AdversaryVariant::Zero(ConstantPolicy::zeros(2)))?;
    let push = AdversaryVariant::Learnt(Box::new(ConstantPolicy::new(vec![1.0, 0.0])));
    let learnt = evaluator.evaluate(&pro, &push)?;

    assert_eq!(zero, 100.0);
    assert!(learnt < zero);
    Ok(())
}

#[test_log::test]
fn test_experiment_on_pendulum() -> Result<()> {
    let env_config = InvertedPendulumAdvConfig::default().max_steps(50);
    let trainer = TrainerConfig::default()
        .n_itr(2)
        .batch_size(200)
        .max_path_length(50)
        .pro_training_adversary(ProTrainingAdversary::Zero);
    let config = ExperimentConfig::default()
        .n_workers(2)
        .seed(7)
        .trainer(trainer);
    let trpo_config = TrpoConfig::default().hidden_sizes(vec![16]);
    let experiment = Experiment::<InvertedPendulumAdv>::build(config, env_config.clone());
    let mut summary = experiment.summary()?;

    experiment.run(
        |spec, seed| build_trpo(Role::Protagonist, spec, &trpo_config, seed),
        |spec, seed| build_trpo(Role::Adversary, spec, &trpo_config, seed),
        |seed| {
            let config = ActorManagerConfig::default().seed(seed as i64);
            Ok(ActorManager::<InvertedPendulumAdv>::build(&config, &env_config))
        },
        &mut summary,
        &mut NullRecorder::new(),
    )?;

    assert_eq!(summary.n_runs(), 1);
    assert_eq!(summary.n_checkpoints(), 3);
    for key in SERIES_KEYS {
        let mean = summary.mean(key).unwrap_or_default();
        assert!(mean.iter().all(|v| v.is_finite() && (0.0..=50.0).contains(v)));
    }

    // The adversary is trained on the negated rewards of the environment
    let run = &summary.runs()[0];
    assert!(run.adv_rews.iter().all(|r| *r < 0.0));
    assert!(run.pro_rews.iter().all(|r| *r > 0.0));
    Ok(())
}

#[test_log::test]
fn test_learnt_adversary_harms_protagonist() -> Result<()> {
    let env_config = InvertedPendulumAdvConfig::default().max_steps(200);
    let trainer = TrainerConfig::default()
        .n_itr(6)
        .n_adv_itr(1)
        .batch_size(1000)
        .max_path_length(200)
        .pro_training_adversary(ProTrainingAdversary::Zero);
    let config = ExperimentConfig::default()
        .n_exps(2)
        .n_workers(2)
        .seed(7)
        .trainer(trainer);
    let trpo_config = TrpoConfig::default().hidden_sizes(vec![16]);
    let experiment = Experiment::<InvertedPendulumAdv>::build(config, env_config.clone());
    let mut summary = experiment.summary()?;

    experiment.run(
        |spec, seed| build_trpo(Role::Protagonist, spec, &trpo_config, seed),
        |spec, seed| build_trpo(Role::Adversary, spec, &trpo_config, seed),
        |seed| {
            let config = ActorManagerConfig::default().seed(seed as i64);
            Ok(ActorManager::<InvertedPendulumAdv>::build(&config, &env_config))
        },
        &mut summary,
        &mut NullRecorder::new(),
    )?;

    // After adversary updates the learnt adversary pushes the pole over sooner
    // than the zero adversary does
    for run in summary.runs() {
        assert_eq!(run.adv_rews.len(), 6);
        let constant = run.const_test_rew.last().copied().unwrap_or_default();
        let learnt = run.adv_test_rew.last().copied().unwrap_or_default();
        assert!(learnt < constant, "learnt {} vs zero {}", learnt, constant);
    }
    Ok(())
}
