//! Default implementation of the [`Evaluator`] trait.
//!
//! The evaluator runs a fixed number of episodes per adversary and averages
//! the undiscounted returns of the environment.
use super::{AdversaryVariant, Evaluator};
use crate::{ConstantPolicy, Env, Policy, RandomPolicy};
use anyhow::Result;
use log::debug;

/// Runs `n_episodes` episodes of at most `path_length` steps per evaluation.
///
/// Both players act on snapshots. Learnt policies emit their deterministic
/// actions, and the random adversary is reseeded from `seed` and the episode
/// index, so that two evaluations of the same policies on a deterministic
/// environment give identical results.
///
/// ```ignore
/// let mut evaluator = DefaultEvaluator::<LinearStubEnv>::new(&config, 0, 1, 20, 42)?;
/// let rewards = evaluator.evaluate_all(&protagonist, &adversary)?;
/// println!("under the learnt adversary: {}", rewards.learnt);
/// ```
pub struct DefaultEvaluator<E: Env> {
    /// The number of episodes to run during evaluation.
    n_episodes: usize,

    /// The maximum number of steps of an episode.
    path_length: usize,

    /// Seed of the policies acting in the evaluation episodes.
    seed: u64,

    /// The environment instance used for evaluation.
    env: E,
}

impl<E: Env> DefaultEvaluator<E> {
    /// Constructs a new [`DefaultEvaluator`].
    pub fn new(
        config: &E::Config,
        env_seed: i64,
        n_episodes: usize,
        path_length: usize,
        seed: u64,
    ) -> Result<Self> {
        Ok(Self {
            n_episodes: n_episodes.max(1),
            path_length,
            seed,
            env: E::build(config, env_seed)?,
        })
    }

    fn episode_seed(&self, ix: usize) -> u64 {
        self.seed.wrapping_mul(1_000_003).wrapping_add(ix as u64)
    }
}

impl<E: Env> Evaluator for DefaultEvaluator<E> {
    fn evaluate(
        &mut self,
        protagonist: &dyn Policy,
        adversary: &AdversaryVariant,
    ) -> Result<f32> {
        let composition = self.env.spec().composition;
        let mut r_total = 0f32;

        for ix in 0..self.n_episodes {
            let seed = self.episode_seed(ix);
            let mut pro = protagonist.snapshot()?;
            let mut adv = adversary.snapshot()?;
            pro.set_deterministic(true);
            adv.set_deterministic(true);
            pro.reseed(seed);
            adv.reseed(seed);

            let mut obs = self.env.reset_with_index(ix)?;
            for _ in 0..self.path_length {
                let act = composition.compose(&pro.act(&obs)?, &adv.act(&obs)?);
                let (step, _) = self.env.step(&act)?;
                r_total += step.reward;
                if step.is_done() {
                    break;
                }
                obs = step.obs;
            }
        }

        let mean = r_total / self.n_episodes as f32;
        debug!("Evaluation against the {} adversary: {}", adversary.name(), mean);
        Ok(mean)
    }

    fn adversary_variants(&self, learnt: &dyn Policy) -> Result<[AdversaryVariant; 3]> {
        let space = self.env.spec().adv_action_space;
        Ok([
            AdversaryVariant::Zero(ConstantPolicy::zeros(space.dim())),
            AdversaryVariant::Random(RandomPolicy::new(space, self.seed)),
            AdversaryVariant::Learnt(learnt.snapshot()?),
        ])
    }
}
