//! Trajectories collected by samplers.
use crate::Role;

/// One episode played by the protagonist and the adversary.
///
/// `observations[t]` is the observation the players acted on at step `t`,
/// `rewards[t]` the reward the environment returned for that step. The rewards
/// are stored as emitted by the environment. The reward stream of the player
/// a trajectory was collected for is given by [`Trajectory::player_rewards`].
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    /// The player whose update consumes this trajectory.
    pub role: Role,

    /// Observations.
    pub observations: Vec<Vec<f32>>,

    /// Actions of the protagonist.
    pub pro_actions: Vec<Vec<f32>>,

    /// Actions of the adversary.
    pub adv_actions: Vec<Vec<f32>>,

    /// Rewards of the environment.
    pub rewards: Vec<f32>,

    /// `true` if the episode ended by termination, `false` if by truncation
    /// or by reaching the maximum path length.
    pub is_terminated: bool,
}

impl Trajectory {
    /// An empty trajectory for the given player.
    pub fn new(role: Role) -> Self {
        Self {
            role,
            observations: vec![],
            pro_actions: vec![],
            adv_actions: vec![],
            rewards: vec![],
            is_terminated: false,
        }
    }

    /// Appends a step.
    pub fn push(&mut self, obs: Vec<f32>, pro_act: Vec<f32>, adv_act: Vec<f32>, reward: f32) {
        self.observations.push(obs);
        self.pro_actions.push(pro_act);
        self.adv_actions.push(adv_act);
        self.rewards.push(reward);
    }

    /// The number of steps.
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    /// Returns `true` if the trajectory has no steps.
    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    /// Actions of the player this trajectory was collected for.
    pub fn actions(&self) -> &[Vec<f32>] {
        match self.role {
            Role::Protagonist => &self.pro_actions,
            Role::Adversary => &self.adv_actions,
        }
    }

    /// Rewards in the reward stream of the player this trajectory was collected for.
    ///
    /// For the adversary, these are the negated rewards of the environment.
    pub fn player_rewards(&self) -> Vec<f32> {
        self.rewards
            .iter()
            .map(|r| self.role.player_reward(*r))
            .collect()
    }

    /// Undiscounted return of the environment, i.e., of the protagonist.
    pub fn env_return(&self) -> f32 {
        self.rewards.iter().sum()
    }

    /// Undiscounted return in the reward stream of the player.
    pub fn undiscounted_return(&self) -> f32 {
        self.role.player_reward(self.env_return())
    }
}

/// Discounted cumulative sums `y[t] = x[t] + discount * y[t + 1]`.
pub fn discount_cumsum(x: &[f32], discount: f32) -> Vec<f32> {
    let mut y = vec![0f32; x.len()];
    let mut acc = 0f32;
    for t in (0..x.len()).rev() {
        acc = x[t] + discount * acc;
        y[t] = acc;
    }
    y
}
