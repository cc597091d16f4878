//! Policy.
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which player a policy, a trajectory or an update belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// The player performing the task.
    Protagonist,

    /// The player disturbing the protagonist.
    Adversary,
}

impl Role {
    /// Converts a reward of the environment into the reward of this player.
    ///
    /// The adversary minimizes the protagonist's return, so its reward is negated.
    #[inline]
    pub fn player_reward(&self, env_reward: f32) -> f32 {
        match self {
            Self::Protagonist => env_reward,
            Self::Adversary => -env_reward,
        }
    }

    /// The other player.
    pub fn opponent(&self) -> Self {
        match self {
            Self::Protagonist => Self::Adversary,
            Self::Adversary => Self::Protagonist,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protagonist => write!(f, "protagonist"),
            Self::Adversary => write!(f, "adversary"),
        }
    }
}

/// A policy on an environment.
///
/// Policy is a stochastic mapping from an observation to an action.
/// Policies are sent to rollout workers as snapshots, hence `Send`.
pub trait Policy: Send {
    /// Samples an action given an observation.
    fn act(&mut self, obs: &[f32]) -> Result<Vec<f32>>;

    /// Log probability (density) of an action given an observation.
    fn log_prob(&self, obs: &[f32], act: &[f32]) -> Result<f32>;

    /// Dimension of the actions emitted by the policy.
    fn action_dim(&self) -> usize;

    /// Returns a deep copy of the policy.
    ///
    /// Mutating the snapshot never affects the original.
    fn snapshot(&self) -> Result<Box<dyn Policy>>;

    /// Returns the trainable parameters as a flat vector.
    ///
    /// Policies without trainable parameters return an empty vector.
    fn get_params(&self) -> Result<Vec<f32>> {
        Ok(vec![])
    }

    /// Overwrites the trainable parameters with a flat vector.
    fn set_params(&mut self, params: &[f32]) -> Result<()> {
        if !params.is_empty() {
            bail!("Policy has no trainable parameters");
        }
        Ok(())
    }

    /// Resets the random number generator used for sampling actions.
    fn reseed(&mut self, _seed: u64) {}

    /// If `true`, the policy returns the mode of its distribution instead of samples.
    fn set_deterministic(&mut self, _deterministic: bool) {}
}

impl Policy for Box<dyn Policy> {
    fn act(&mut self, obs: &[f32]) -> Result<Vec<f32>> {
        self.as_mut().act(obs)
    }

    fn log_prob(&self, obs: &[f32], act: &[f32]) -> Result<f32> {
        self.as_ref().log_prob(obs, act)
    }

    fn action_dim(&self) -> usize {
        self.as_ref().action_dim()
    }

    fn snapshot(&self) -> Result<Box<dyn Policy>> {
        self.as_ref().snapshot()
    }

    fn get_params(&self) -> Result<Vec<f32>> {
        self.as_ref().get_params()
    }

    fn set_params(&mut self, params: &[f32]) -> Result<()> {
        self.as_mut().set_params(params)
    }

    fn reseed(&mut self, seed: u64) {
        self.as_mut().reseed(seed)
    }

    fn set_deterministic(&mut self, deterministic: bool) {
        self.as_mut().set_deterministic(deterministic)
    }
}
