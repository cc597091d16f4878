//! Core functionalities.
mod agent;
mod baseline;
mod env;
mod policy;
mod space;
mod step;
pub use agent::Agent;
pub use baseline::Baseline;
pub use env::{Env, EnvSpec};
pub use policy::{Policy, Role};
pub use space::{BoxSpace, Composition};
pub use step::Step;
