//! Invoker module for running the external ADDER tools.
//!
//! This module provides the `ProcessInvoker` trait and a `tokio::process`
//! implementation. The orchestrator only ever talks to the trait, so tests
//! can substitute [`MockInvoker`](crate::testing::MockInvoker) and run
//! without the transcoder binaries.
//!
//! # Example
//!
//! ```ignore
//! use adder_bench_core::invoker::{Invocation, ProcessInvoker, Step, TokioProcessInvoker};
//!
//! let invoker = TokioProcessInvoker::from_timeout_secs(600);
//! let inv = Invocation::new(Step::Inspect, "cargo")
//!     .args(["run", "--release", "--bin", "adderinfo", "--"])
//!     .args(["-i", "/mnt/ramdisk/events.adder", "-d"]);
//!
//! let outcome = invoker.invoke(&inv).await?;
//! println!("exit {:?} after {} ms", outcome.exit_code, outcome.duration_ms);
//! ```

mod error;
mod process;
mod traits;
mod types;

pub use error::InvokerError;
pub use process::TokioProcessInvoker;
pub use traits::ProcessInvoker;
pub use types::{Invocation, InvocationOutcome, Step};
