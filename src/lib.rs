//! gharchive-parquet: flattens GitHub Archive event streams into typed
//! Parquet tables.
//!
//! Each hourly `.json.gz` dump is decompressed, split into lines and
//! decoded. Every event is classified by its `type`, flattened by the
//! extractor bound to that kind and routed to one of eight schema
//! partitions (`Creates.parquet/`, `PushEvents.parquet/`, ...). A run
//! overwrites every partition it commits.
//!
//! # Example
//!
//! ```ignore
//! use gharchive_parquet::{Config, run_pipeline, error::PipelineError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), PipelineError> {
//!     let config = Config::from_file("config.yaml")?;
//!     let summary = run_pipeline(config).await?;
//!     println!("Emitted {} rows", summary.collector.total_rows());
//!     Ok(())
//! }
//! ```

pub mod collector;
pub mod config;
pub mod dlq;
pub mod error;
pub mod event;
pub mod extract;
pub mod metrics;
pub mod pipeline;
pub mod router;
pub mod schema;
pub mod sink;
pub mod source;
pub mod storage;
pub mod transform;

// Re-export main types
pub use config::Config;
pub use extract::SchemaName;
pub use pipeline::{CommitOutcome, Pipeline, RunSummary, run_pipeline};
pub use storage::{StorageProvider, StorageProviderRef};
