//! Inverted pendulum on a cart, disturbed by an adversary.
//!
//! The protagonist pushes the cart, while the adversary applies a 2-D force at
//! the tip of the pole. Both actions are concatenated into the action of the
//! environment, `[cart force, tip force x, tip force y]`.
//!
//! ```no_run
//! use anyhow::Result;
//! use rarl_core::{Env as _, ConstantPolicy, Role, collect};
//! use rarl_pendulum_env::{InvertedPendulumAdv, InvertedPendulumAdvConfig};
//!
//! fn main() -> Result<()> {
//!     let config = InvertedPendulumAdvConfig::default().adv_bound(0.5);
//!     let mut env = InvertedPendulumAdv::build(&config, 42)?;
//!     let mut pro = ConstantPolicy::zeros(1);
//!     let mut adv = ConstantPolicy::new(vec![0.5, 0.0]);
//!     let paths = collect(&mut env, &mut pro, &mut adv, Role::Protagonist, 1000, 1000)?;
//!     println!("{} paths", paths.len());
//!     Ok(())
//! }
//! ```
mod env;
pub use env::{InvertedPendulumAdv, InvertedPendulumAdvConfig};
