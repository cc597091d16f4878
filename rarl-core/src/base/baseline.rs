//! Baseline.
use crate::Trajectory;

/// Value estimator subtracted from returns to reduce the variance of policy gradients.
///
/// Fitting never fails. Implementations fall back to a cruder estimate, such as
/// the batch mean return, when their regression problem is degenerate.
pub trait Baseline {
    /// Refits the estimator on a batch of trajectories.
    ///
    /// `returns[i]` holds the discounted returns of `paths[i]` in the reward stream
    /// of the player owning the baseline.
    fn fit(&mut self, paths: &[Trajectory], returns: &[Vec<f32>]);

    /// Predicts the return of every step of a trajectory.
    fn predict(&self, path: &Trajectory) -> Vec<f32>;
}
