//! Run state: which identifiers are done, and what each run left behind.
//!
//! The orchestrator queries a [`RunStore`] instead of checking directories
//! itself, so the skip policy can be exercised against
//! [`MemoryRunStore`](crate::testing::MemoryRunStore) in tests.

mod directory;
mod error;
mod traits;
mod types;

pub use directory::DirectoryRunStore;
pub use error::RunStoreError;
pub use traits::RunStore;
pub use types::{ItemStatus, RecordStatus, RunRecord, StepRecord, StepStatus};
