//! Agent.
use super::{Policy, Role};
use crate::{record::Record, Trajectory};
use anyhow::Result;
use std::path::Path;

/// Represents a trainable policy of one player.
///
/// An agent owns everything its updates need, such as a baseline and the
/// state of its optimizer, so the protagonist and the adversary never share
/// any of it.
pub trait Agent: Policy {
    /// The player this agent plays.
    fn role(&self) -> Role;

    /// Dimension of the observations the agent expects.
    fn observation_dim(&self) -> usize;

    /// Performs an optimization step on a batch of trajectories.
    ///
    /// Trajectories must have been sampled for this agent's role.
    fn opt(&mut self, paths: &[Trajectory]) -> Result<()> {
        self.opt_with_record(paths).map(|_| ())
    }

    /// Performs an optimization step and returns some information.
    ///
    /// The returned record contains `mean_return`, the average undiscounted
    /// return of the batch in the agent's own reward stream.
    fn opt_with_record(&mut self, paths: &[Trajectory]) -> Result<Record>;

    /// Save the parameters of the agent in the given directory.
    fn save_params(&self, path: &Path) -> Result<()>;

    /// Load the parameters of the agent from the given directory.
    fn load_params(&mut self, path: &Path) -> Result<()>;
}
