//! Runs rollouts of the two players in its own environment.
mod base;
mod stat;
pub use base::Actor;
pub use stat::{actor_stats_fmt, ActorStat};
