//! Returns and advantages of a batch of trajectories.
use super::TrpoConfig;
use anyhow::Result;
use log::trace;
use rarl_core::{discount_cumsum, error::RarlError, Baseline, Trajectory};

/// A batch of trajectories flattened into steps.
#[derive(Debug, Clone)]
pub struct SamplesData {
    /// Observations.
    pub observations: Vec<Vec<f32>>,

    /// Actions of the player being trained.
    pub actions: Vec<Vec<f32>>,

    /// Advantages of the actions.
    pub advantages: Vec<f64>,

    /// Average undiscounted return of the batch in the player's reward stream.
    pub mean_return: f32,

    /// Explained variance of the returns by the baseline.
    pub explained_variance: f64,
}

fn mean_and_std(xs: &[f64]) -> (f64, f64) {
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// `1 - Var(y - y_pred) / Var(y)`, or 0 if `y` is constant.
pub fn explained_variance(y_pred: &[f64], y: &[f64]) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    let (_, std_y) = mean_and_std(y);
    if std_y < 1e-8 {
        return 0.0;
    }
    let diff: Vec<f64> = y.iter().zip(y_pred.iter()).map(|(a, b)| a - b).collect();
    let (_, std_diff) = mean_and_std(&diff);
    1.0 - (std_diff * std_diff) / (std_y * std_y)
}

/// Fits the baseline on the batch and computes advantages.
///
/// Rewards are taken in the reward stream of the player each trajectory was
/// collected for. Advantages are estimated by GAE, bootstrapping with zero at
/// the end of every path, and normalized if `config.center_adv` is set.
pub fn process_samples<B: Baseline>(
    paths: &[Trajectory],
    baseline: &mut B,
    config: &TrpoConfig,
) -> Result<SamplesData> {
    let n_steps: usize = paths.iter().map(|p| p.len()).sum();
    if n_steps == 0 {
        return Err(RarlError::EmptyBatch.into());
    }

    let rewards: Vec<Vec<f32>> = paths.iter().map(|p| p.player_rewards()).collect();
    let returns: Vec<Vec<f32>> = rewards
        .iter()
        .map(|r| discount_cumsum(r, config.discount as f32))
        .collect();
    baseline.fit(paths, &returns);

    let mut advantages = Vec::with_capacity(n_steps);
    let mut all_returns = Vec::with_capacity(n_steps);
    let mut all_baselines = Vec::with_capacity(n_steps);
    let gamma = config.discount as f32;
    for ((path, r), ret) in paths.iter().zip(rewards.iter()).zip(returns.iter()) {
        let b = baseline.predict(path);
        let deltas: Vec<f32> = (0..path.len())
            .map(|t| {
                let next = b.get(t + 1).copied().unwrap_or(0.0);
                r[t] + gamma * next - b[t]
            })
            .collect();
        let adv = discount_cumsum(&deltas, gamma * config.gae_lambda as f32);
        trace!("Path of length {}, return {}", path.len(), path.undiscounted_return());

        advantages.extend(adv.iter().map(|a| *a as f64));
        all_returns.extend(ret.iter().map(|v| *v as f64));
        all_baselines.extend(b.iter().map(|v| *v as f64));
    }

    if config.center_adv {
        let (mean, std) = mean_and_std(&advantages);
        advantages
            .iter_mut()
            .for_each(|a| *a = (*a - mean) / (std + 1e-8));
    }

    let mean_return =
        paths.iter().map(|p| p.undiscounted_return()).sum::<f32>() / paths.len() as f32;

    Ok(SamplesData {
        observations: paths
            .iter()
            .flat_map(|p| p.observations.iter().cloned())
            .collect(),
        actions: paths.iter().flat_map(|p| p.actions().iter().cloned()).collect(),
        advantages,
        mean_return,
        explained_variance: explained_variance(&all_baselines, &all_returns),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use rarl_core::Role;

    struct ZeroBaseline;

    impl Baseline for ZeroBaseline {
        fn fit(&mut self, _paths: &[Trajectory], _returns: &[Vec<f32>]) {}

        fn predict(&self, path: &Trajectory) -> Vec<f32> {
            vec![0.0; path.len()]
        }
    }

    struct ConstBaseline(f32);

    impl Baseline for ConstBaseline {
        fn fit(&mut self, _paths: &[Trajectory], _returns: &[Vec<f32>]) {}

        fn predict(&self, path: &Trajectory) -> Vec<f32> {
            vec![self.0; path.len()]
        }
    }

    fn path(role: Role, rewards: &[f32]) -> Trajectory {
        let mut p = Trajectory::new(role);
        for r in rewards {
            p.push(vec![0.0], vec![1.0], vec![-1.0], *r);
        }
        p
    }

    #[test]
    fn test_advantages_are_returns_minus_baseline() -> Result<()> {
        let config = TrpoConfig::default().discount(0.5).center_adv(false);
        let paths = [path(Role::Protagonist, &[1.0, 1.0, 1.0])];
        let samples = process_samples(&paths, &mut ConstBaseline(1.0), &config)?;
        assert_eq!(samples.advantages, vec![0.75, 0.5, 0.0]);
        assert_eq!(samples.mean_return, 3.0);
        assert_eq!(samples.actions, vec![vec![1.0]; 3]);
        Ok(())
    }

    #[test]
    fn test_adversary_uses_negated_rewards() -> Result<()> {
        let config = TrpoConfig::default().discount(1.0).center_adv(false);
        let paths = [path(Role::Adversary, &[-1.0, -2.0])];
        let samples = process_samples(&paths, &mut ZeroBaseline, &config)?;
        assert_eq!(samples.advantages, vec![3.0, 2.0]);
        assert_eq!(samples.mean_return, 3.0);
        assert_eq!(samples.actions, vec![vec![-1.0]; 2]);
        Ok(())
    }

    #[test]
    fn test_centered_advantages() -> Result<()> {
        let config = TrpoConfig::default();
        let paths = [
            path(Role::Protagonist, &[1.0, 0.0, 2.0]),
            path(Role::Protagonist, &[0.5]),
        ];
        let samples = process_samples(&paths, &mut ZeroBaseline, &config)?;
        let (mean, std) = mean_and_std(&samples.advantages);
        assert!(mean.abs() < 1e-6);
        assert!((std - 1.0).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_empty_batch_is_rejected() {
        let config = TrpoConfig::default();
        assert!(process_samples(&[], &mut ZeroBaseline, &config).is_err());
    }

    #[test]
    fn test_explained_variance() {
        assert_eq!(explained_variance(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]), 1.0);
        assert_eq!(explained_variance(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert!(explained_variance(&[2.0, 2.0, 2.0], &[1.0, 2.0, 3.0]).abs() < 1e-12);
    }
}
