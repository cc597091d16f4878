#![warn(missing_docs)]
//! Core components of robust adversarial reinforcement learning.
//!
//! A protagonist and an adversary play in the same environment. The
//! [`Trainer`] alternates between updating the protagonist with the adversary
//! frozen and updating the adversary, whose reward is the negated reward of the
//! environment, with the protagonist frozen. After every global iteration the
//! protagonist is evaluated under the zero, random and learnt adversaries.
//!
//! This crate is free of any deep learning backend. Agents are provided by
//! other crates through the [`Agent`] trait.
pub mod dummy;
pub mod error;
pub mod record;

mod base;
pub use base::{Agent, Baseline, BoxSpace, Composition, Env, EnvSpec, Policy, Role, Step};

mod trajectory;
pub use trajectory::{discount_cumsum, Trajectory};

mod sampler;
pub use sampler::{collect, rollout, RolloutRequest, SamplerPool, SerialSampler};

mod fixed;
pub use fixed::{ConstantPolicy, RandomPolicy};

mod evaluator;
pub use evaluator::{AdversaryVariant, DefaultEvaluator, EvalRewards, Evaluator};

mod trainer;
pub use trainer::{ProTrainingAdversary, Trainer, TrainerConfig, TrainingRun};

mod experiment;
pub use experiment::{Experiment, ExperimentConfig};

mod summary;
pub use summary::{ExperimentSummary, SERIES_KEYS};
