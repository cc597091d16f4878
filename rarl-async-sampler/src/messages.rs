use crate::ActorStat;
use rarl_core::{Policy, Role, Trajectory};

/// A share of a rollout request assigned to one [`Actor`](crate::Actor).
pub struct RolloutJob {
    /// The player whose update consumes the trajectories.
    pub role: Role,

    /// Snapshot of the protagonist, owned by the actor.
    pub protagonist: Box<dyn Policy>,

    /// Snapshot of the adversary, owned by the actor.
    pub adversary: Box<dyn Policy>,

    /// Minimum number of timesteps the actor collects.
    pub batch_size: usize,

    /// Maximum number of steps in a trajectory.
    pub max_path_length: usize,
}

/// Messages that actors receive.
pub enum ActorMessage {
    /// Collect trajectories.
    Rollout(RolloutJob),

    /// Leave the message loop.
    Stop,
}

/// Messages that the [`ActorManager`](crate::ActorManager) receives from actors.
pub enum ActorReply {
    /// Trajectories collected for a [`RolloutJob`].
    Paths(Vec<Trajectory>, ActorStat),

    /// The job failed. The actor keeps serving subsequent jobs.
    Failed(String),
}
