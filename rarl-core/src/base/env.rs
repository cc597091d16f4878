//! Environment.
use super::{BoxSpace, Composition, Step};
use crate::{error::RarlError, record::Record};
use anyhow::Result;

/// Descriptor of the spaces of an environment.
///
/// Policies are sized from it and the action dimensions of both players are
/// checked against it before any training starts.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvSpec {
    /// Observation space, shared by both players.
    pub observation_space: BoxSpace,

    /// Action space of the protagonist.
    pub pro_action_space: BoxSpace,

    /// Action space of the adversary.
    pub adv_action_space: BoxSpace,

    /// Dimension of the action accepted by [`Env::step`].
    pub action_dim: usize,

    /// Rule merging the two players' actions.
    pub composition: Composition,
}

impl EnvSpec {
    /// Checks that the players' action spaces compose into the environment's action.
    pub fn check_composition(&self) -> Result<(), RarlError> {
        self.composition.check(
            self.pro_action_space.dim(),
            self.adv_action_space.dim(),
            self.action_dim,
        )
    }

    /// Checks that a policy of the given dimensions fits the space of a player.
    pub fn check_player(
        &self,
        obs_dim: usize,
        act_dim: usize,
        act_space: &BoxSpace,
        name: &str,
    ) -> Result<(), RarlError> {
        if obs_dim != self.observation_space.dim() {
            return Err(RarlError::DimensionMismatch {
                what: format!("observation of {}", name),
                expected: self.observation_space.dim(),
                actual: obs_dim,
            });
        }
        if act_dim != act_space.dim() {
            return Err(RarlError::DimensionMismatch {
                what: format!("action of {}", name),
                expected: act_space.dim(),
                actual: act_dim,
            });
        }
        Ok(())
    }
}

/// Represents an environment played by a protagonist and an adversary.
///
/// The environment itself sees a single action per step, built from both
/// players' actions with [`EnvSpec::composition`].
pub trait Env {
    /// Configurations.
    type Config: Clone;

    /// Builds an environment with a given random seed.
    fn build(config: &Self::Config, seed: i64) -> Result<Self>
    where
        Self: Sized;

    /// Returns the descriptor of the observation and action spaces.
    fn spec(&self) -> EnvSpec;

    /// Performes an environment step with the composed action.
    ///
    /// The returned [`Record`] carries environment specific information.
    fn step(&mut self, a: &[f32]) -> Result<(Step, Record)>;

    /// Resets the environment and returns the initial observation.
    fn reset(&mut self) -> Result<Vec<f32>>;

    /// Resets the environment with a given index.
    ///
    /// The index is used in an arbitrary way. For example, it can be used as a random seed,
    /// which is useful when evaluating a trained agent. Actually, this method is called
    /// by [`DefaultEvaluator`](crate::DefaultEvaluator).
    fn reset_with_index(&mut self, ix: usize) -> Result<Vec<f32>>;
}
