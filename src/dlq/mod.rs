//! Dead Letter Queue for error records.
//!
//! When `error_handling.dlq_path` is set, parse failures, row failures,
//! malformed envelopes and failed input files are written as NDJSON for
//! later inspection and reprocessing.

mod queue;
mod tracker;

pub use queue::DeadLetterQueue;
pub use tracker::FailureTracker;
