//! Robust adversarial reinforcement learning in Rust.
//!
//! A protagonist learns a control task while an adversary learns to disturb it.
//! The two players are trained in turns with trust region policy optimization,
//! and the protagonist is evaluated under the zero, random and learnt adversaries.
//!
//! This crate collects the following crates:
//!
//! * [rarl-core](rarl_core) provides the traits of environments, policies and
//!   agents, the alternating trainer, the evaluator and the experiment loop.
//!   It does not depend on any deep learning backend.
//! * [rarl-candle-agent](rarl_candle_agent) includes the TRPO agent with a
//!   Gaussian MLP policy and a linear feature baseline, based on
//!   [candle](https://crates.io/crates/candle-core).
//! * [rarl-async-sampler](rarl_async_sampler) runs rollouts in a pool of threads.
//! * [rarl-pendulum-env](rarl_pendulum_env) is an inverted pendulum disturbed by
//!   an adversarial force.
//!
//! See `examples/rarl_pendulum.rs` for a complete experiment.
use anyhow::Result;
use log::debug;
pub use rarl_async_sampler;
pub use rarl_candle_agent;
use rarl_candle_agent::{Trpo, TrpoConfig};
pub use rarl_core;
use rarl_core::{EnvSpec, Role};
pub use rarl_pendulum_env;

/// Builds a [`Trpo`] agent of the given role fitting the environment.
///
/// The policy is seeded with `seed`, offset for the adversary so that the two
/// players never start from the same parameters.
pub fn build_trpo(role: Role, spec: &EnvSpec, config: &TrpoConfig, seed: u64) -> Result<Trpo> {
    let (act_dim, seed) = match role {
        Role::Protagonist => (spec.pro_action_space.dim(), seed),
        Role::Adversary => (spec.adv_action_space.dim(), seed.wrapping_add(1 << 32)),
    };
    let obs_dim = spec.observation_space.dim();
    debug!("Build {} with obs_dim {}, act_dim {}", role, obs_dim, act_dim);
    Trpo::build(role, obs_dim, act_dim, config.clone().seed(seed))
}
