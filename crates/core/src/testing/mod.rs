//! Testing utilities and mock implementations.
//!
//! This module provides a mock `ProcessInvoker` and an in-memory
//! `RunStore`, allowing the orchestrator to be tested without the ADDER
//! binaries or a real output directory.
//!
//! # Example
//!
//! ```rust,ignore
//! use adder_bench_core::testing::{fixtures, MemoryRunStore, MockInvoker};
//!
//! let invoker = Arc::new(MockInvoker::new());
//! let store = Arc::new(MemoryRunStore::new());
//!
//! // Configure mock responses
//! invoker.set_stdout(Step::Inspect, "events: 1024\n").await;
//!
//! let orchestrator = BenchOrchestrator::new(
//!     fixtures::test_config(),
//!     fixtures::run_paths(dir.path()),
//!     invoker.clone(),
//!     store.clone(),
//! );
//! ```

mod memory_store;
mod mock_invoker;

pub use memory_store::MemoryRunStore;
pub use mock_invoker::MockInvoker;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::Path;

    use crate::config::{Config, RunPaths};
    use crate::filelist::Filelist;

    /// Default configuration without the inter-item delay.
    pub fn test_config() -> Config {
        let mut config = Config::default();
        config.runner.delay_ms = 0;
        config
    }

    /// Run paths laid out under `root`.
    pub fn run_paths(root: &Path) -> RunPaths {
        RunPaths::new(
            root.join("dataset"),
            root.join("filelist.txt"),
            root.join("out"),
            root.join("scratch"),
        )
    }

    /// Filelist from identifiers.
    pub fn filelist(identifiers: &[&str]) -> Filelist {
        identifiers.iter().map(|s| s.to_string()).collect()
    }

    /// Writes a filelist file, one identifier per line.
    pub fn write_filelist(path: &Path, identifiers: &[&str]) -> std::io::Result<()> {
        let mut contents = identifiers.join("\n");
        contents.push('\n');
        std::fs::write(path, contents)
    }
}
