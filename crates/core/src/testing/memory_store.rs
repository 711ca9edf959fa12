//! In-memory run store for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::run_state::{ItemStatus, RunRecord, RunStore, RunStoreError};

#[derive(Debug, Clone, Default)]
struct MemoryItem {
    log: Vec<u8>,
    report: Option<Vec<u8>>,
    record: Option<RunRecord>,
}

/// Run store keeping everything in memory.
///
/// Lets the skip policy be tested without touching the filesystem. An
/// identifier that has been begun (or marked processed) behaves like an
/// existing output directory.
#[derive(Debug, Clone, Default)]
pub struct MemoryRunStore {
    items: Arc<RwLock<HashMap<String, MemoryItem>>>,
    /// Identifiers in the order they were begun.
    begun: Arc<RwLock<Vec<String>>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend a previous run left a directory for `identifier`.
    pub async fn mark_processed(&self, identifier: &str) {
        self.items
            .write()
            .await
            .entry(identifier.to_string())
            .or_default();
    }

    /// Log contents of an identifier, if it was begun.
    pub async fn log(&self, identifier: &str) -> Option<String> {
        self.items
            .read()
            .await
            .get(identifier)
            .map(|item| String::from_utf8_lossy(&item.log).into_owned())
    }

    pub async fn quality_report(&self, identifier: &str) -> Option<String> {
        self.items
            .read()
            .await
            .get(identifier)
            .and_then(|item| item.report.as_ref())
            .map(|r| String::from_utf8_lossy(r).into_owned())
    }

    pub async fn record(&self, identifier: &str) -> Option<RunRecord> {
        self.items
            .read()
            .await
            .get(identifier)
            .and_then(|item| item.record.clone())
    }

    /// Identifiers begun so far, in order, duplicates included.
    pub async fn begun(&self) -> Vec<String> {
        self.begun.read().await.clone()
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn status(&self, identifier: &str) -> Result<ItemStatus, RunStoreError> {
        Ok(match self.items.read().await.get(identifier) {
            None => ItemStatus::NotProcessed,
            Some(MemoryItem {
                record: Some(record),
                ..
            }) if record.succeeded() => ItemStatus::Completed,
            Some(_) => ItemStatus::Incomplete,
        })
    }

    async fn begin(&self, identifier: &str) -> Result<(), RunStoreError> {
        let mut items = self.items.write().await;
        let item = items.entry(identifier.to_string()).or_default();
        item.record = None;
        self.begun.write().await.push(identifier.to_string());
        Ok(())
    }

    async fn append_log(&self, identifier: &str, contents: &[u8]) -> Result<(), RunStoreError> {
        self.items
            .write()
            .await
            .entry(identifier.to_string())
            .or_default()
            .log
            .extend_from_slice(contents);
        Ok(())
    }

    async fn write_quality_report(
        &self,
        identifier: &str,
        contents: &[u8],
    ) -> Result<(), RunStoreError> {
        self.items
            .write()
            .await
            .entry(identifier.to_string())
            .or_default()
            .report = Some(contents.to_vec());
        Ok(())
    }

    async fn finish(&self, record: &RunRecord) -> Result<(), RunStoreError> {
        self.items
            .write()
            .await
            .entry(record.identifier.clone())
            .or_default()
            .record = Some(record.clone());
        Ok(())
    }

    async fn load_record(&self, identifier: &str) -> Result<Option<RunRecord>, RunStoreError> {
        Ok(self.record(identifier).await)
    }
}
