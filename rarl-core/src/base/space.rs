//! Spaces of observations and actions, and the composition of the two players' actions.
use crate::error::RarlError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A box in `R^n` given by element-wise lower and upper bounds.
///
/// Bounds may be infinite for observation spaces. Action spaces are expected
/// to be bounded, since [`BoxSpace::sample`] draws uniformly from the box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxSpace {
    low: Vec<f32>,
    high: Vec<f32>,
}

impl BoxSpace {
    /// Constructs a box from its bounds.
    pub fn new(low: Vec<f32>, high: Vec<f32>) -> Result<Self, RarlError> {
        if low.len() != high.len() {
            return Err(RarlError::DimensionMismatch {
                what: "bounds of box space".to_string(),
                expected: low.len(),
                actual: high.len(),
            });
        }
        if low.iter().zip(high.iter()).any(|(l, h)| l > h) {
            return Err(RarlError::InvalidConfig(
                "lower bound of box space exceeds upper bound".to_string(),
            ));
        }
        Ok(Self { low, high })
    }

    /// A box `[-bound, bound]^dim`.
    pub fn symmetric(dim: usize, bound: f32) -> Self {
        let bound = bound.abs();
        Self {
            low: vec![-bound; dim],
            high: vec![bound; dim],
        }
    }

    /// An unbounded box of the given dimension.
    pub fn unbounded(dim: usize) -> Self {
        Self::symmetric(dim, f32::INFINITY)
    }

    /// Dimension of the box.
    pub fn dim(&self) -> usize {
        self.low.len()
    }

    /// Lower bounds.
    pub fn low(&self) -> &[f32] {
        &self.low
    }

    /// Upper bounds.
    pub fn high(&self) -> &[f32] {
        &self.high
    }

    /// Clips a point into the box.
    pub fn clip(&self, x: &[f32]) -> Vec<f32> {
        x.iter()
            .zip(self.low.iter().zip(self.high.iter()))
            .map(|(v, (l, h))| v.clamp(*l, *h))
            .collect()
    }

    /// Samples a point uniformly from the box.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f32> {
        self.low
            .iter()
            .zip(self.high.iter())
            .map(|(l, h)| match l < h {
                true => rng.gen_range(*l..*h),
                false => *l,
            })
            .collect()
    }

    /// Log density of the uniform distribution over the box.
    pub fn uniform_log_density(&self) -> f32 {
        -self
            .low
            .iter()
            .zip(self.high.iter())
            .map(|(l, h)| (h - l).ln())
            .sum::<f32>()
    }
}

/// How the protagonist's and the adversary's actions are merged into the
/// single action accepted by an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Composition {
    /// Element-wise sum. Both players act in the environment's action space.
    Sum,

    /// Concatenation `[protagonist, adversary]`.
    Concat,
}

impl fmt::Display for Composition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sum => write!(f, "sum"),
            Self::Concat => write!(f, "concat"),
        }
    }
}

impl Composition {
    /// Checks that actions of the given dimensions compose into `env_dim`.
    pub fn check(&self, pro_dim: usize, adv_dim: usize, env_dim: usize) -> Result<(), RarlError> {
        let ok = match self {
            Self::Sum => pro_dim == adv_dim && pro_dim == env_dim,
            Self::Concat => pro_dim + adv_dim == env_dim,
        };

        match ok {
            true => Ok(()),
            false => Err(RarlError::CompositionMismatch {
                composition: self.to_string(),
                pro_dim,
                adv_dim,
                env_dim,
            }),
        }
    }

    /// Merges the actions of the two players.
    pub fn compose(&self, pro: &[f32], adv: &[f32]) -> Vec<f32> {
        match self {
            Self::Sum => pro.iter().zip(adv.iter()).map(|(p, a)| p + a).collect(),
            Self::Concat => pro.iter().chain(adv.iter()).copied().collect(),
        }
    }
}
