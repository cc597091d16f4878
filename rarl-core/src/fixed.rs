//! Policies without trainable parameters, used as adversaries in evaluation.
use crate::{BoxSpace, Policy};
use anyhow::Result;
use rand::{rngs::StdRng, SeedableRng};

/// Emits the same action for every observation.
#[derive(Debug, Clone)]
pub struct ConstantPolicy {
    value: Vec<f32>,
}

impl ConstantPolicy {
    /// Constructs a policy emitting `value`.
    pub fn new(value: Vec<f32>) -> Self {
        Self { value }
    }

    /// The always-zero policy of the given action dimension.
    pub fn zeros(dim: usize) -> Self {
        Self::new(vec![0f32; dim])
    }
}

impl Policy for ConstantPolicy {
    fn act(&mut self, _obs: &[f32]) -> Result<Vec<f32>> {
        Ok(self.value.clone())
    }

    /// A point mass: zero at the constant action, `-inf` elsewhere.
    fn log_prob(&self, _obs: &[f32], act: &[f32]) -> Result<f32> {
        match act == self.value.as_slice() {
            true => Ok(0.0),
            false => Ok(f32::NEG_INFINITY),
        }
    }

    fn action_dim(&self) -> usize {
        self.value.len()
    }

    fn snapshot(&self) -> Result<Box<dyn Policy>> {
        Ok(Box::new(self.clone()))
    }
}

/// Samples actions i.i.d. and uniformly from a box.
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    space: BoxSpace,
    rng: StdRng,
}

impl RandomPolicy {
    /// Constructs a policy sampling from `space`.
    pub fn new(space: BoxSpace, seed: u64) -> Self {
        Self {
            space,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Policy for RandomPolicy {
    fn act(&mut self, _obs: &[f32]) -> Result<Vec<f32>> {
        Ok(self.space.sample(&mut self.rng))
    }

    fn log_prob(&self, _obs: &[f32], act: &[f32]) -> Result<f32> {
        match self.space.clip(act).as_slice() == act {
            true => Ok(self.space.uniform_log_density()),
            false => Ok(f32::NEG_INFINITY),
        }
    }

    fn action_dim(&self) -> usize {
        self.space.dim()
    }

    fn snapshot(&self) -> Result<Box<dyn Policy>> {
        Ok(Box::new(self.clone()))
    }

    fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_constant_policy() -> Result<()> {
        let mut pi = ConstantPolicy::zeros(2);
        assert_eq!(pi.act(&[1.0])?, vec![0.0, 0.0]);
        assert!(pi.get_params()?.is_empty());
        assert!(pi.set_params(&[1.0]).is_err());
        Ok(())
    }

    #[test]
    fn test_random_policy_is_reproducible() -> Result<()> {
        let space = BoxSpace::symmetric(3, 2.0);
        let mut pi1 = RandomPolicy::new(space.clone(), 7);
        let mut pi2 = pi1.snapshot()?;

        for _ in 0..10 {
            let a1 = pi1.act(&[])?;
            assert_eq!(a1, pi2.act(&[])?);
            assert!(a1.iter().all(|a| (-2.0..=2.0).contains(a)));
            assert!(pi1.log_prob(&[], &a1)?.is_finite());
        }

        pi1.reseed(1);
        pi2.reseed(1);
        assert_eq!(pi1.act(&[])?, pi2.act(&[])?);
        Ok(())
    }
}
