//! Series produced by a training run.
use crate::EvalRewards;

/// Reward logs of one training run.
///
/// The evaluation series have one entry before training and one after every
/// global iteration, i.e., `n_itr + 1` entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingRun {
    /// Returns under the zero adversary.
    pub const_test_rew: Vec<f32>,

    /// Returns under the uniform-random adversary.
    pub rand_test_rew: Vec<f32>,

    /// Returns under the learnt adversary.
    pub adv_test_rew: Vec<f32>,

    /// Mean training returns of the protagonist, one per protagonist update.
    pub pro_rews: Vec<f32>,

    /// Mean training returns of the adversary in its own reward stream,
    /// one per adversary update.
    pub adv_rews: Vec<f32>,

    /// Mean training returns of both players in the order of the updates.
    pub all_rews: Vec<f32>,
}

impl TrainingRun {
    /// Appends the results of an evaluation checkpoint.
    pub fn push_eval(&mut self, rewards: &EvalRewards) {
        self.const_test_rew.push(rewards.constant);
        self.rand_test_rew.push(rewards.random);
        self.adv_test_rew.push(rewards.learnt);
    }

    /// The number of evaluation checkpoints.
    pub fn n_checkpoints(&self) -> usize {
        self.const_test_rew.len()
    }

    /// Evaluation series by name, `const_test_rew`, `rand_test_rew` or `adv_test_rew`.
    pub fn series(&self, key: &str) -> Option<&[f32]> {
        match key {
            "const_test_rew" => Some(&self.const_test_rew),
            "rand_test_rew" => Some(&self.rand_test_rew),
            "adv_test_rew" => Some(&self.adv_test_rew),
            _ => None,
        }
    }
}
