//! Configuration of [`Trainer`](super::Trainer).
use crate::error::RarlError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// The adversary the protagonist plays against while it is trained.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
pub enum ProTrainingAdversary {
    /// The learnt adversary, i.e., robust adversarial training.
    Learnt,

    /// The always-zero adversary. The adversary is still trained against the
    /// protagonist, but never disturbs the protagonist's training.
    Zero,
}

/// Configuration of [`Trainer`](super::Trainer).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct TrainerConfig {
    /// The number of global iterations.
    pub n_itr: usize,

    /// The number of protagonist updates per global iteration.
    pub n_pro_itr: usize,

    /// The number of adversary updates per global iteration.
    pub n_adv_itr: usize,

    /// Minimum number of timesteps per update.
    pub batch_size: usize,

    /// Maximum number of steps in a trajectory, also used in evaluation.
    pub max_path_length: usize,

    /// The number of episodes per evaluation of each adversary.
    pub n_eval_episodes: usize,

    /// The adversary of the protagonist's training phase.
    pub pro_training_adversary: ProTrainingAdversary,

    /// Seed of the evaluator.
    pub eval_seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            n_itr: 500,
            n_pro_itr: 1,
            n_adv_itr: 1,
            batch_size: 4000,
            max_path_length: 1000,
            n_eval_episodes: 1,
            pro_training_adversary: ProTrainingAdversary::Learnt,
            eval_seed: 0,
        }
    }
}

impl TrainerConfig {
    /// Sets the number of global iterations.
    pub fn n_itr(mut self, v: usize) -> Self {
        self.n_itr = v;
        self
    }

    /// Sets the number of protagonist updates per global iteration.
    pub fn n_pro_itr(mut self, v: usize) -> Self {
        self.n_pro_itr = v;
        self
    }

    /// Sets the number of adversary updates per global iteration.
    pub fn n_adv_itr(mut self, v: usize) -> Self {
        self.n_adv_itr = v;
        self
    }

    /// Sets the batch size in timesteps.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Sets the maximum path length.
    pub fn max_path_length(mut self, v: usize) -> Self {
        self.max_path_length = v;
        self
    }

    /// Sets the number of evaluation episodes.
    pub fn n_eval_episodes(mut self, v: usize) -> Self {
        self.n_eval_episodes = v;
        self
    }

    /// Sets the adversary of the protagonist's training phase.
    pub fn pro_training_adversary(mut self, v: ProTrainingAdversary) -> Self {
        self.pro_training_adversary = v;
        self
    }

    /// Sets the seed of the evaluator.
    pub fn eval_seed(mut self, v: u64) -> Self {
        self.eval_seed = v;
        self
    }

    /// Checks the values that would make the training loop stall.
    pub fn check(&self) -> Result<(), RarlError> {
        if self.batch_size == 0 {
            return Err(RarlError::InvalidConfig("batch_size must be positive".into()));
        }
        if self.max_path_length == 0 {
            return Err(RarlError::InvalidConfig(
                "max_path_length must be positive".into(),
            ));
        }
        if self.n_eval_episodes == 0 {
            return Err(RarlError::InvalidConfig(
                "n_eval_episodes must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Constructs [`TrainerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`TrainerConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_trainer_config() -> Result<()> {
        let config = TrainerConfig::default()
            .n_itr(10)
            .n_pro_itr(2)
            .batch_size(100)
            .pro_training_adversary(ProTrainingAdversary::Zero);

        let dir = TempDir::new("trainer_config")?;
        let path = dir.path().join("trainer_config.yaml");
        config.save(&path)?;
        let config_ = TrainerConfig::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }

    #[test]
    fn test_check() {
        assert!(TrainerConfig::default().check().is_ok());
        assert!(TrainerConfig::default().batch_size(0).check().is_err());
        assert!(TrainerConfig::default().max_path_length(0).check().is_err());
    }
}
