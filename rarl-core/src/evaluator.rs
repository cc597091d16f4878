//! Evaluate the protagonist under fixed adversaries.
use crate::{
    record::{Record, RecordValue},
    ConstantPolicy, Policy, RandomPolicy,
};
use anyhow::Result;
mod default_evaluator;
pub use default_evaluator::DefaultEvaluator;

/// The adversaries a protagonist is evaluated against.
pub enum AdversaryVariant {
    /// The always-zero adversary.
    Zero(ConstantPolicy),

    /// The uniform-random adversary.
    Random(RandomPolicy),

    /// A snapshot of the learnt adversary.
    Learnt(Box<dyn Policy>),
}

impl AdversaryVariant {
    /// Short name of the variant.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Zero(_) => "zero",
            Self::Random(_) => "random",
            Self::Learnt(_) => "learnt",
        }
    }

    /// Key of the evaluation series of the variant.
    pub fn series_key(&self) -> &'static str {
        match self {
            Self::Zero(_) => "const_test_rew",
            Self::Random(_) => "rand_test_rew",
            Self::Learnt(_) => "adv_test_rew",
        }
    }

    fn policy(&self) -> &dyn Policy {
        match self {
            Self::Zero(p) => p as &dyn Policy,
            Self::Random(p) => p as &dyn Policy,
            Self::Learnt(p) => p.as_ref(),
        }
    }
}

impl Policy for AdversaryVariant {
    fn act(&mut self, obs: &[f32]) -> Result<Vec<f32>> {
        match self {
            Self::Zero(p) => p.act(obs),
            Self::Random(p) => p.act(obs),
            Self::Learnt(p) => p.act(obs),
        }
    }

    fn log_prob(&self, obs: &[f32], act: &[f32]) -> Result<f32> {
        self.policy().log_prob(obs, act)
    }

    fn action_dim(&self) -> usize {
        self.policy().action_dim()
    }

    fn snapshot(&self) -> Result<Box<dyn Policy>> {
        self.policy().snapshot()
    }

    fn get_params(&self) -> Result<Vec<f32>> {
        self.policy().get_params()
    }

    fn set_params(&mut self, params: &[f32]) -> Result<()> {
        match self {
            Self::Zero(p) => p.set_params(params),
            Self::Random(p) => p.set_params(params),
            Self::Learnt(p) => p.set_params(params),
        }
    }

    fn reseed(&mut self, seed: u64) {
        match self {
            Self::Zero(p) => p.reseed(seed),
            Self::Random(p) => p.reseed(seed),
            Self::Learnt(p) => p.reseed(seed),
        }
    }

    fn set_deterministic(&mut self, deterministic: bool) {
        match self {
            Self::Zero(p) => p.set_deterministic(deterministic),
            Self::Random(p) => p.set_deterministic(deterministic),
            Self::Learnt(p) => p.set_deterministic(deterministic),
        }
    }
}

/// Mean returns of the protagonist under the three adversaries at one checkpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalRewards {
    /// Under the zero adversary.
    pub constant: f32,

    /// Under the uniform-random adversary.
    pub random: f32,

    /// Under the learnt adversary.
    pub learnt: f32,
}

impl EvalRewards {
    /// Converts into a record keyed by the names of the evaluation series.
    pub fn to_record(&self) -> Record {
        Record::from_slice(&[
            ("const_test_rew", RecordValue::Scalar(self.constant)),
            ("rand_test_rew", RecordValue::Scalar(self.random)),
            ("adv_test_rew", RecordValue::Scalar(self.learnt)),
        ])
    }
}

/// Evaluates a protagonist against an adversary.
///
/// Implementations never mutate the given policies. They run on snapshots.
pub trait Evaluator {
    /// Mean undiscounted return of the environment over the evaluation episodes.
    fn evaluate(&mut self, protagonist: &dyn Policy, adversary: &AdversaryVariant)
        -> Result<f32>;

    /// Builds the zero, random and learnt adversaries.
    fn adversary_variants(&self, learnt: &dyn Policy) -> Result<[AdversaryVariant; 3]>;

    /// Evaluates the protagonist against the three adversaries.
    fn evaluate_all(
        &mut self,
        protagonist: &dyn Policy,
        learnt: &dyn Policy,
    ) -> Result<EvalRewards> {
        let [zero, random, learnt] = self.adversary_variants(learnt)?;
        Ok(EvalRewards {
            constant: self.evaluate(protagonist, &zero)?,
            random: self.evaluate(protagonist, &random)?,
            learnt: self.evaluate(protagonist, &learnt)?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{dummy::CountingAgent, BoxSpace, Role};

    #[test]
    fn test_learnt_variant_forwards_params() -> Result<()> {
        let agent = CountingAgent::new(Role::Adversary, 1);
        let mut learnt = AdversaryVariant::Learnt(Box::new(agent));
        learnt.set_params(&[3.0])?;
        assert_eq!(learnt.get_params()?, vec![3.0]);

        let space = BoxSpace::symmetric(1, 1.0);
        let mut random = AdversaryVariant::Random(RandomPolicy::new(space, 0));
        assert!(random.set_params(&[]).is_ok());
        assert!(random.set_params(&[1.0]).is_err());
        Ok(())
    }
}
