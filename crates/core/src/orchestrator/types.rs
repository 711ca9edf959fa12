//! Types for the benchmark orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::run_state::{ItemStatus, RunRecord};

/// Errors that end a run.
///
/// Failed invocations are not errors here: they are recorded per step and
/// handled by the configured failure policy.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Run store error.
    #[error("run store error: {0}")]
    Store(#[from] crate::run_state::RunStoreError),

    /// Filesystem error outside the run store.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// How an identifier ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemResult {
    /// Every step succeeded.
    Succeeded,
    /// At least one step failed.
    Failed,
    /// Already processed, nothing was invoked.
    Skipped,
}

impl ItemResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemResult::Succeeded => "succeeded",
            ItemResult::Failed => "failed",
            ItemResult::Skipped => "skipped",
        }
    }
}

/// Outcome of one identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub identifier: String,
    pub result: ItemResult,
    /// Status found before the identifier was handled.
    pub previous_status: ItemStatus,
    /// Record written for the identifier; `None` when skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<RunRecord>,
}

impl ItemOutcome {
    pub fn skipped(identifier: impl Into<String>, previous_status: ItemStatus) -> Self {
        Self {
            identifier: identifier.into(),
            result: ItemResult::Skipped,
            previous_status,
            record: None,
        }
    }

    pub fn from_record(previous_status: ItemStatus, record: RunRecord) -> Self {
        Self {
            identifier: record.identifier.clone(),
            result: if record.succeeded() {
                ItemResult::Succeeded
            } else {
                ItemResult::Failed
            },
            previous_status,
            record: Some(record),
        }
    }
}

/// Summary of a whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub config_hash: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Identifiers in the filelist, duplicates included.
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// The run stopped early under the `abort` policy.
    pub aborted: bool,
    /// The run stopped early on request.
    pub stopped: bool,
    pub items: Vec<ItemOutcome>,
}

impl RunSummary {
    pub fn new(
        run_id: impl Into<String>,
        config_hash: impl Into<String>,
        started_at: DateTime<Utc>,
        total: usize,
        items: Vec<ItemOutcome>,
    ) -> Self {
        let count = |result: ItemResult| items.iter().filter(|i| i.result == result).count();
        Self {
            run_id: run_id.into(),
            config_hash: config_hash.into(),
            started_at,
            finished_at: Utc::now(),
            total,
            succeeded: count(ItemResult::Succeeded),
            failed: count(ItemResult::Failed),
            skipped: count(ItemResult::Skipped),
            aborted: false,
            stopped: false,
            items,
        }
    }

    /// Identifiers never reached because the run ended early.
    pub fn not_reached(&self) -> usize {
        self.total - self.items.len()
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::Step;
    use crate::run_state::StepRecord;

    #[test]
    fn test_summary_counts() {
        let failed = RunRecord::new(
            "b",
            "run",
            "hash",
            Utc::now(),
            vec![StepRecord::failed(Step::Transcode, "boom", 1)],
        );
        let items = vec![
            ItemOutcome::skipped("a", ItemStatus::Completed),
            ItemOutcome::from_record(ItemStatus::NotProcessed, failed),
        ];
        let summary = RunSummary::new("run", "hash", Utc::now(), 3, items);

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.not_reached(), 1);
        assert!(summary.has_failures());
    }

    #[test]
    fn test_item_outcome_serialization() {
        let outcome = ItemOutcome::skipped("a", ItemStatus::Incomplete);
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"result\":\"skipped\""));
        assert!(json.contains("\"previous_status\":\"incomplete\""));
        assert!(!json.contains("record"));
    }
}
