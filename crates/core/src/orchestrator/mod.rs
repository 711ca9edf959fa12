//! Benchmark orchestrator.
//!
//! Walks the filelist strictly in order, one identifier at a time:
//! - **Skip**: identifiers with an output directory are left alone
//! - **Steps**: transcode, inspect, then optionally reconstruct and score
//! - **Pause**: a fixed delay between identifiers lets the machine settle

mod runner;
mod types;

pub use runner::BenchOrchestrator;
pub use types::{ItemOutcome, ItemResult, OrchestratorError, RunSummary};
