//! Records of training diagnostics.
//!
//! A [`Record`] is a set of key-value pairs produced by an optimization step,
//! a training phase or an evaluation. Records are passed to a [`Recorder`],
//! which decides where they go.
//!
//! ```rust
//! use rarl_core::record::{Record, RecordValue};
//!
//! let mut record = Record::from_scalar("mean_return", -12.5);
//! record.insert("phase", RecordValue::String("protagonist".to_string()));
//! assert_eq!(record.get_scalar("mean_return").unwrap(), -12.5);
//! ```
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::Recorder;
