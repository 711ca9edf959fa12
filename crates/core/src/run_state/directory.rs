//! Directory-backed run store.
//!
//! Layout under the output root:
//!
//! ```text
//! <output_root>/<identifier>/
//!     <identifier>.txt   appended command output
//!     run.json           run record
//!     quality.json       quality report (when enabled)
//! ```

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::warn;

use super::error::RunStoreError;
use super::traits::RunStore;
use super::types::{ItemStatus, RunRecord};

const RECORD_FILE_NAME: &str = "run.json";
const DEFAULT_REPORT_FILE_NAME: &str = "quality.json";

/// Run store keeping one directory per identifier.
#[derive(Debug, Clone)]
pub struct DirectoryRunStore {
    output_root: PathBuf,
    report_file_name: String,
}

impl DirectoryRunStore {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            report_file_name: DEFAULT_REPORT_FILE_NAME.to_string(),
        }
    }

    /// Sets the file name of the quality report.
    pub fn with_report_file_name(mut self, name: impl Into<String>) -> Self {
        self.report_file_name = name.into();
        self
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn item_dir(&self, identifier: &str) -> PathBuf {
        self.output_root.join(identifier)
    }

    pub fn log_path(&self, identifier: &str) -> PathBuf {
        self.item_dir(identifier)
            .join(format!("{}.txt", identifier))
    }

    pub fn record_path(&self, identifier: &str) -> PathBuf {
        self.item_dir(identifier).join(RECORD_FILE_NAME)
    }

    pub fn report_path(&self, identifier: &str) -> PathBuf {
        self.item_dir(identifier).join(&self.report_file_name)
    }

    /// Writes through a temp file so a crash never leaves a torn file behind.
    async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), RunStoreError> {
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, contents)
            .await
            .map_err(|e| RunStoreError::io(&tmp, e))?;
        fs::rename(&tmp, path)
            .await
            .map_err(|e| RunStoreError::io(path, e))
    }
}

#[async_trait]
impl RunStore for DirectoryRunStore {
    async fn status(&self, identifier: &str) -> Result<ItemStatus, RunStoreError> {
        let dir = self.item_dir(identifier);
        match fs::metadata(&dir).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ItemStatus::NotProcessed)
            }
            Err(e) => return Err(RunStoreError::io(dir, e)),
        }

        match self.load_record(identifier).await {
            Ok(Some(record)) if record.succeeded() => Ok(ItemStatus::Completed),
            Ok(_) => Ok(ItemStatus::Incomplete),
            Err(RunStoreError::Serialization(e)) => {
                warn!(identifier, "Unreadable run record: {}", e);
                Ok(ItemStatus::Incomplete)
            }
            Err(e) => Err(e),
        }
    }

    async fn begin(&self, identifier: &str) -> Result<(), RunStoreError> {
        let dir = self.item_dir(identifier);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| RunStoreError::io(&dir, e))?;

        // A retried identifier must not look completed while it runs
        let record = self.record_path(identifier);
        match fs::remove_file(&record).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RunStoreError::io(record, e)),
        }
    }

    async fn append_log(&self, identifier: &str, contents: &[u8]) -> Result<(), RunStoreError> {
        let path = self.log_path(identifier);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| RunStoreError::io(&path, e))?;
        file.write_all(contents)
            .await
            .map_err(|e| RunStoreError::io(&path, e))?;
        file.flush().await.map_err(|e| RunStoreError::io(&path, e))
    }

    async fn write_quality_report(
        &self,
        identifier: &str,
        contents: &[u8],
    ) -> Result<(), RunStoreError> {
        Self::write_atomic(&self.report_path(identifier), contents).await
    }

    async fn finish(&self, record: &RunRecord) -> Result<(), RunStoreError> {
        let json = serde_json::to_vec_pretty(record)?;
        Self::write_atomic(&self.record_path(&record.identifier), &json).await
    }

    async fn load_record(&self, identifier: &str) -> Result<Option<RunRecord>, RunStoreError> {
        let path = self.record_path(identifier);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(RunStoreError::io(path, e)),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}
