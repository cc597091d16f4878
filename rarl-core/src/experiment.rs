//! Repetitions of training runs.
use crate::{
    record::Recorder, Agent, DefaultEvaluator, Env, EnvSpec, ExperimentSummary, SamplerPool,
    Trainer, TrainerConfig, TrainingRun,
};
use anyhow::Result;
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Experiment`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct ExperimentConfig {
    /// The number of independent training runs.
    pub n_exps: usize,

    /// Base seed. Run `i` is seeded with `seed + i`.
    pub seed: u64,

    /// The number of workers of the sampler pool.
    pub n_workers: usize,

    /// Directory where evaluation series are persisted after every run.
    pub summary_dir: Option<String>,

    /// Configuration of the trainer of each run.
    pub trainer: TrainerConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            n_exps: 1,
            seed: 0,
            n_workers: 1,
            summary_dir: None,
            trainer: TrainerConfig::default(),
        }
    }
}

impl ExperimentConfig {
    /// Sets the number of runs.
    pub fn n_exps(mut self, v: usize) -> Self {
        self.n_exps = v;
        self
    }

    /// Sets the base seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Sets the number of workers.
    pub fn n_workers(mut self, v: usize) -> Self {
        self.n_workers = v;
        self
    }

    /// Sets the directory of the summary.
    pub fn summary_dir(mut self, v: impl Into<String>) -> Self {
        self.summary_dir = Some(v.into());
        self
    }

    /// Sets the configuration of the trainer.
    pub fn trainer(mut self, v: TrainerConfig) -> Self {
        self.trainer = v;
        self
    }

    /// Constructs [`ExperimentConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`ExperimentConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Runs `n_exps` independent training runs and collects their evaluation series.
///
/// Every run gets fresh agents, a fresh sampler pool and a fresh evaluator,
/// all built from the seed of the run. A run that fails aborts the experiment,
/// while the runs completed before it stay in the [`ExperimentSummary`].
pub struct Experiment<E: Env> {
    config: ExperimentConfig,
    env_config: E::Config,
}

impl<E: Env> Experiment<E> {
    /// Constructs an experiment.
    pub fn build(config: ExperimentConfig, env_config: E::Config) -> Self {
        Self { config, env_config }
    }

    /// Configuration of the experiment.
    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// An empty summary, persisted in `summary_dir` if set.
    pub fn summary(&self) -> Result<ExperimentSummary> {
        match &self.config.summary_dir {
            Some(dir) => ExperimentSummary::with_dir(dir),
            None => Ok(ExperimentSummary::new()),
        }
    }

    /// Runs the experiment.
    ///
    /// `build_pro` and `build_adv` construct the agents of a run from the descriptor
    /// of the environment and the seed of the run, `build_sampler` constructs its
    /// sampler pool.
    pub fn run<P, A, S, FP, FA, FS>(
        &self,
        mut build_pro: FP,
        mut build_adv: FA,
        mut build_sampler: FS,
        summary: &mut ExperimentSummary,
        recorder: &mut dyn Recorder,
    ) -> Result<()>
    where
        P: Agent,
        A: Agent,
        S: SamplerPool,
        FP: FnMut(&EnvSpec, u64) -> Result<P>,
        FA: FnMut(&EnvSpec, u64) -> Result<A>,
        FS: FnMut(u64) -> Result<S>,
    {
        for ix in 0..self.config.n_exps {
            let seed = self.config.seed.wrapping_add(ix as u64);
            info!("Experiment {}/{} (seed {})", ix + 1, self.config.n_exps, seed);

            let result = self.run_once(
                ix,
                seed,
                &mut build_pro,
                &mut build_adv,
                &mut build_sampler,
                recorder,
            );

            match result {
                Ok(run) => summary.push(run)?,
                Err(e) => {
                    error!(
                        "Experiment {} failed, {} completed runs are kept: {}",
                        ix + 1,
                        summary.n_runs(),
                        e
                    );
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    fn run_once<P, A, S, FP, FA, FS>(
        &self,
        ix: usize,
        seed: u64,
        build_pro: &mut FP,
        build_adv: &mut FA,
        build_sampler: &mut FS,
        recorder: &mut dyn Recorder,
    ) -> Result<TrainingRun>
    where
        P: Agent,
        A: Agent,
        S: SamplerPool,
        FP: FnMut(&EnvSpec, u64) -> Result<P>,
        FA: FnMut(&EnvSpec, u64) -> Result<A>,
        FS: FnMut(u64) -> Result<S>,
    {
        let spec = E::build(&self.env_config, seed as i64)?.spec();
        let mut pro = build_pro(&spec, seed)?;
        let mut adv = build_adv(&spec, seed)?;
        let mut sampler = build_sampler(seed)?;

        let trainer_config = &self.config.trainer;
        let mut evaluator = DefaultEvaluator::<E>::new(
            &self.env_config,
            seed as i64,
            trainer_config.n_eval_episodes,
            trainer_config.max_path_length,
            trainer_config.eval_seed.wrapping_add(ix as u64),
        )?;
        let mut trainer = Trainer::build(trainer_config.clone(), spec)
            .n_workers(self.config.n_workers)
            .seed(seed);
        trainer.train(&mut pro, &mut adv, &mut sampler, &mut evaluator, recorder)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        dummy::{CountingAgent, LinearStubEnv, LinearStubEnvConfig},
        record::NullRecorder,
        Role, SerialSampler,
    };
    use tempdir::TempDir;

    fn trainer_config() -> TrainerConfig {
        TrainerConfig::default()
            .n_itr(2)
            .batch_size(4)
            .max_path_length(4)
    }

    #[test]
    fn test_serde_experiment_config() -> Result<()> {
        let config = ExperimentConfig::default()
            .n_exps(3)
            .summary_dir("some/dir")
            .trainer(trainer_config());
        let dir = TempDir::new("experiment_config")?;
        let path = dir.path().join("experiment.yaml");
        config.save(&path)?;
        assert_eq!(config, ExperimentConfig::load(&path)?);
        Ok(())
    }

    #[test]
    fn test_runs_are_summarized() -> Result<()> {
        let env_config = LinearStubEnvConfig::default();
        let config = ExperimentConfig::default().n_exps(3).trainer(trainer_config());
        let experiment = Experiment::<LinearStubEnv>::build(config, env_config.clone());
        let mut summary = experiment.summary()?;

        experiment.run(
            |_, _| Ok(CountingAgent::new(Role::Protagonist, 1)),
            |_, _| Ok(CountingAgent::new(Role::Adversary, 1)),
            |seed| Ok(SerialSampler::<LinearStubEnv>::new(env_config.clone(), seed as i64)),
            &mut summary,
            &mut NullRecorder::new(),
        )?;

        assert_eq!(summary.n_runs(), 3);
        assert_eq!(summary.n_checkpoints(), 3);
        assert_eq!(summary.std("adv_test_rew"), Some(vec![0.0; 3]));
        Ok(())
    }

    #[test]
    fn test_completed_runs_survive_a_failure() -> Result<()> {
        let env_config = LinearStubEnvConfig::default();
        let dir = TempDir::new("experiment")?;
        let config = ExperimentConfig::default()
            .n_exps(3)
            .summary_dir(dir.path().to_string_lossy())
            .trainer(trainer_config());
        let experiment = Experiment::<LinearStubEnv>::build(config, env_config.clone());
        let mut summary = experiment.summary()?;

        // The sampler of the second run fails
        let result = experiment.run(
            |_, _| Ok(CountingAgent::new(Role::Protagonist, 1)),
            |_, _| Ok(CountingAgent::new(Role::Adversary, 1)),
            |seed| {
                let config = match seed {
                    1 => env_config.clone().fail_at_step(Some(0)),
                    _ => env_config.clone(),
                };
                Ok(SerialSampler::<LinearStubEnv>::new(config, seed as i64))
            },
            &mut summary,
            &mut NullRecorder::new(),
        );

        assert!(result.is_err());
        assert_eq!(summary.n_runs(), 1);
        let series = std::fs::read_to_string(dir.path().join("adv_test_rew.csv"))?;
        assert_eq!(series.lines().count(), 1);
        Ok(())
    }
}
