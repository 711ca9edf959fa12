use async_trait::async_trait;

use super::error::RunStoreError;
use super::types::{ItemStatus, RunRecord};

/// Per-identifier run state.
///
/// Answers "has this identifier been processed?" and holds everything a run
/// leaves behind for it: the log, the quality report and the run record.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Current status of an identifier.
    async fn status(&self, identifier: &str) -> Result<ItemStatus, RunStoreError>;

    /// Marks the identifier as started. Idempotent.
    async fn begin(&self, identifier: &str) -> Result<(), RunStoreError>;

    /// Appends command output to the identifier's log.
    async fn append_log(&self, identifier: &str, contents: &[u8]) -> Result<(), RunStoreError>;

    /// Stores the quality metric report, replacing any previous one.
    async fn write_quality_report(
        &self,
        identifier: &str,
        contents: &[u8],
    ) -> Result<(), RunStoreError>;

    /// Persists the final record of an identifier.
    async fn finish(&self, record: &RunRecord) -> Result<(), RunStoreError>;

    /// Loads the record written by [`finish`](Self::finish), if any.
    async fn load_record(&self, identifier: &str) -> Result<Option<RunRecord>, RunStoreError>;
}
