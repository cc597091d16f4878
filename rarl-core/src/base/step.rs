//! Environment step.

/// Represents the observation and reward tuple `(o_t+1, r_t)` emitted
/// by an environment at every interaction step.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Observation.
    pub obs: Vec<f32>,

    /// Reward of the environment, i.e., the protagonist's reward.
    pub reward: f32,

    /// Flag denoting if episode is terminated.
    pub is_terminated: bool,

    /// Flag denoting if episode is truncated.
    pub is_truncated: bool,
}

impl Step {
    /// Constructs a [`Step`] object.
    pub fn new(obs: Vec<f32>, reward: f32, is_terminated: bool, is_truncated: bool) -> Self {
        Step {
            obs,
            reward,
            is_terminated,
            is_truncated,
        }
    }

    #[inline]
    /// Terminated or truncated.
    pub fn is_done(&self) -> bool {
        self.is_terminated || self.is_truncated
    }
}
