//! Trust region policy optimization (TRPO) agent.
mod base;
mod config;
mod optimizer;
mod samples;
pub use base::Trpo;
pub use config::TrpoConfig;
pub use optimizer::{conjugate_gradient, ConjugateGradientOptimizer, OptimizeResult};
pub use samples::{explained_variance, process_samples, SamplesData};
