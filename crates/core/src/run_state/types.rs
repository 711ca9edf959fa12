//! Run record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::invoker::{InvocationOutcome, Step};

/// Whether an identifier still needs work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// No output directory exists.
    NotProcessed,
    /// Output directory exists with a successful run record.
    Completed,
    /// Output directory exists, but the record is missing or failed.
    Incomplete,
}

impl ItemStatus {
    /// Whether the output directory exists at all.
    pub fn is_processed(&self) -> bool {
        !matches!(self, ItemStatus::NotProcessed)
    }
}

/// How a single step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
    /// Not run because an earlier step failed under `skip_item`/`abort`.
    Skipped,
}

/// Outcome of one step, as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: Step,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
    /// Why the step failed, if it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepRecord {
    /// Record for a process that ran to completion.
    pub fn from_outcome(outcome: &InvocationOutcome) -> Self {
        let success = outcome.success();
        Self {
            step: outcome.step,
            status: if success {
                StepStatus::Succeeded
            } else {
                StepStatus::Failed
            },
            exit_code: outcome.exit_code,
            duration_ms: outcome.duration_ms,
            error: if success {
                None
            } else {
                Some(match outcome.exit_code {
                    Some(code) => format!("exited with code {}", code),
                    None => "terminated by signal".to_string(),
                })
            },
        }
    }

    /// Record for an invocation that never produced an outcome.
    pub fn failed(step: Step, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            step,
            status: StepStatus::Failed,
            exit_code: None,
            duration_ms,
            error: Some(error.into()),
        }
    }

    pub fn skipped(step: Step) -> Self {
        Self {
            step,
            status: StepStatus::Skipped,
            exit_code: None,
            duration_ms: 0,
            error: None,
        }
    }
}

/// Final status of an identifier's run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Succeeded,
    Failed,
}

/// Persisted summary of one identifier's run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub identifier: String,
    /// Run that produced this record.
    pub run_id: String,
    /// Fingerprint of the configuration used.
    pub config_hash: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub steps: Vec<StepRecord>,
    pub status: RecordStatus,
}

impl RunRecord {
    /// Builds a record, deriving the status from the steps.
    pub fn new(
        identifier: impl Into<String>,
        run_id: impl Into<String>,
        config_hash: impl Into<String>,
        started_at: DateTime<Utc>,
        steps: Vec<StepRecord>,
    ) -> Self {
        let status = if steps.iter().all(|s| s.status == StepStatus::Succeeded) {
            RecordStatus::Succeeded
        } else {
            RecordStatus::Failed
        };
        Self {
            identifier: identifier.into(),
            run_id: run_id.into(),
            config_hash: config_hash.into(),
            started_at,
            finished_at: Utc::now(),
            steps,
            status,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == RecordStatus::Succeeded
    }

    /// First step that failed.
    pub fn first_failure(&self) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.status == StepStatus::Failed)
    }
}
