//! Errors in the library.
use thiserror::Error;

/// Errors raised by the core crate.
#[derive(Debug, Error)]
pub enum RarlError {
    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),

    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// The action dimensions of the two players do not fit the action composition
    /// rule of the environment.
    #[error(
        "Action composition {composition} cannot merge protagonist dim {pro_dim} and \
         adversary dim {adv_dim} into environment dim {env_dim}"
    )]
    CompositionMismatch {
        /// Name of the composition rule.
        composition: String,
        /// Action dimension of the protagonist.
        pro_dim: usize,
        /// Action dimension of the adversary.
        adv_dim: usize,
        /// Action dimension accepted by the environment.
        env_dim: usize,
    },

    /// A dimension of an agent does not match the environment.
    #[error("Dimension mismatch of {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// What is compared.
        what: String,
        /// Expected dimension.
        expected: usize,
        /// Actual dimension.
        actual: usize,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The sampler was shut down and does not accept rollout requests.
    #[error("Sampler has been shut down")]
    SamplerShutDown,

    /// The sampler has not been initialized.
    #[error("Sampler is not initialized")]
    SamplerNotInitialized,

    /// A rollout worker crashed or disconnected.
    #[error("Rollout worker {0} crashed")]
    WorkerCrashed(usize),

    /// A rollout worker reported an error.
    #[error("Rollout worker {id} failed: {message}")]
    WorkerFailed {
        /// Worker id.
        id: usize,
        /// Error message.
        message: String,
    },

    /// A lock shared between threads was poisoned.
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    /// A batch of trajectories is empty.
    #[error("Empty batch of trajectories")]
    EmptyBatch,
}
