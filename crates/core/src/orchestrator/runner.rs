//! Benchmark orchestrator implementation.
//!
//! Strictly sequential: one identifier runs all its steps before the next
//! one starts, and no two invocations ever overlap.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::commands::CommandPlanner;
use crate::config::{Config, FailurePolicy, RunPaths};
use crate::filelist::Filelist;
use crate::invoker::{Invocation, InvokerError, ProcessInvoker, Step};
use crate::metrics;
use crate::run_state::{ItemStatus, RunRecord, RunStore, StepRecord, StepStatus};

use super::types::{ItemOutcome, ItemResult, OrchestratorError, RunSummary};

/// Drives every identifier of a filelist through the pipeline steps.
pub struct BenchOrchestrator<I, S>
where
    I: ProcessInvoker + 'static,
    S: RunStore + 'static,
{
    config: Config,
    paths: RunPaths,
    planner: CommandPlanner,
    invoker: Arc<I>,
    store: Arc<S>,
    run_id: String,
    config_hash: String,

    // Runtime state
    stopping: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl<I, S> BenchOrchestrator<I, S>
where
    I: ProcessInvoker + 'static,
    S: RunStore + 'static,
{
    /// Create a new orchestrator.
    pub fn new(config: Config, paths: RunPaths, invoker: Arc<I>, store: Arc<S>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let planner = CommandPlanner::new(&config, &paths);
        let config_hash = config.fingerprint();

        Self {
            config,
            paths,
            planner,
            invoker,
            store,
            run_id: uuid::Uuid::new_v4().to_string(),
            config_hash,
            stopping: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn planner(&self) -> &CommandPlanner {
        &self.planner
    }

    /// Ask the run to end before the next identifier.
    ///
    /// The identifier in flight finishes its steps; a pending delay is cut
    /// short.
    pub fn stop(&self) {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Stop requested");
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Steps for one identifier, in execution order.
    pub fn plan(&self, identifier: &str) -> Vec<Invocation> {
        let mut steps = vec![
            self.planner.transcode(identifier),
            self.planner.inspect(),
        ];
        if self.config.quality.enabled {
            if let Some(reconstruct) = self.planner.reconstruct(identifier) {
                steps.push(reconstruct);
            }
            steps.push(self.planner.quality(identifier));
        }
        steps
    }

    /// Checks that every configured program can be started.
    pub async fn validate_tools(&self) -> Result<(), InvokerError> {
        // Placeholder identifier, only the programs matter here
        for invocation in self.plan("_") {
            self.invoker.validate(&invocation).await?;
        }
        Ok(())
    }

    /// Whether `identifier` would be processed by the next run.
    pub async fn is_pending(&self, identifier: &str) -> Result<bool, OrchestratorError> {
        let status = self.store.status(identifier).await?;
        Ok(!self.skips(status))
    }

    fn skips(&self, status: ItemStatus) -> bool {
        match status {
            ItemStatus::NotProcessed => false,
            ItemStatus::Completed => true,
            ItemStatus::Incomplete => !self.config.runner.retry_incomplete,
        }
    }

    /// Process every identifier of the filelist.
    pub async fn run(&self, filelist: &Filelist) -> Result<RunSummary, OrchestratorError> {
        let started_at = Utc::now();
        info!(
            run_id = %self.run_id,
            config_hash = %self.config_hash,
            items = filelist.len(),
            invoker = self.invoker.name(),
            "Starting benchmark run"
        );

        self.prepare_scratch().await?;

        let mut items = Vec::with_capacity(filelist.len());
        let mut aborted = false;

        for (idx, identifier) in filelist.iter().enumerate() {
            if self.is_stopping() {
                info!("Run stopped before {}", identifier);
                break;
            }

            let outcome = self.process_item(identifier).await?;
            let result = outcome.result;
            items.push(outcome);

            if result == ItemResult::Failed
                && self.config.runner.on_failure == FailurePolicy::Abort
            {
                warn!(identifier, "Aborting run after failed identifier");
                aborted = true;
                break;
            }

            if result != ItemResult::Skipped && idx + 1 < filelist.len() {
                self.pause().await;
            }
        }

        let mut summary = RunSummary::new(
            self.run_id.clone(),
            self.config_hash.clone(),
            started_at,
            filelist.len(),
            items,
        );
        summary.aborted = aborted;
        summary.stopped = self.is_stopping() && summary.not_reached() > 0;

        info!(
            run_id = %self.run_id,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            not_reached = summary.not_reached(),
            "Benchmark run finished"
        );
        Ok(summary)
    }

    /// Process a single identifier, unless it was already processed.
    pub async fn process_item(&self, identifier: &str) -> Result<ItemOutcome, OrchestratorError> {
        let status = self.store.status(identifier).await?;
        if self.skips(status) {
            info!(identifier, ?status, "Already processed, skipping");
            metrics::ITEMS_TOTAL
                .with_label_values(&[ItemResult::Skipped.as_str()])
                .inc();
            return Ok(ItemOutcome::skipped(identifier, status));
        }
        if status == ItemStatus::Incomplete {
            info!(identifier, "Retrying incomplete identifier");
        } else {
            info!(identifier, "Processing");
        }

        let started_at = Utc::now();
        let start = Instant::now();
        self.store.begin(identifier).await?;
        // Leftovers of the previous identifier must not reach this one's steps
        self.clear_scratch().await;

        let mut steps = Vec::new();
        let mut halted = false;
        for invocation in self.plan(identifier) {
            if halted {
                steps.push(StepRecord::skipped(invocation.step));
                continue;
            }

            let record = self.run_step(identifier, &invocation).await?;
            if record.status == StepStatus::Failed
                && self.config.runner.on_failure != FailurePolicy::Continue
            {
                halted = true;
            }
            steps.push(record);
        }

        if self.config.runner.cleanup_artifacts {
            self.clear_scratch().await;
        }

        let record = RunRecord::new(
            identifier,
            self.run_id.clone(),
            self.config_hash.clone(),
            started_at,
            steps,
        );
        self.store.finish(&record).await?;

        let outcome = ItemOutcome::from_record(status, record);
        let result = outcome.result.as_str();
        metrics::ITEMS_TOTAL.with_label_values(&[result]).inc();
        metrics::ITEM_DURATION
            .with_label_values(&[result])
            .observe(start.elapsed().as_secs_f64());

        info!(
            identifier,
            result,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Finished"
        );
        Ok(outcome)
    }

    /// Run one invocation and persist its output.
    async fn run_step(
        &self,
        identifier: &str,
        invocation: &Invocation,
    ) -> Result<StepRecord, OrchestratorError> {
        let step = invocation.step;
        debug!(identifier, %step, "{}", invocation.command_line());
        let start = Instant::now();

        let outcome = match self.invoker.invoke(invocation).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let reason = match &e {
                    InvokerError::ProgramNotFound { .. } => "not_found",
                    InvokerError::Timeout { .. } => "timeout",
                    InvokerError::Io(_) => "io",
                };
                warn!(
                    identifier,
                    %step,
                    retryable = e.is_retryable(),
                    "Step could not run: {}",
                    e
                );
                if let InvokerError::Timeout { stdout, .. } = &e {
                    if step != Step::Quality {
                        self.store.append_log(identifier, stdout.as_bytes()).await?;
                    }
                }
                metrics::STEP_FAILURES
                    .with_label_values(&[step.as_str(), reason])
                    .inc();
                return Ok(StepRecord::failed(
                    step,
                    e.to_string(),
                    start.elapsed().as_millis() as u64,
                ));
            }
        };

        metrics::STEP_DURATION
            .with_label_values(&[step.as_str()])
            .observe(outcome.duration_ms as f64 / 1000.0);

        if step == Step::Quality {
            if !outcome.stdout.is_empty() {
                self.store
                    .write_quality_report(identifier, outcome.stdout.as_bytes())
                    .await?;
            }
        } else {
            self.store
                .append_log(identifier, outcome.stdout.as_bytes())
                .await?;
        }

        if !outcome.stderr.is_empty() {
            debug!(identifier, %step, stderr = %outcome.stderr.trim_end(), "Step stderr");
        }

        if !outcome.success() {
            warn!(
                identifier,
                %step,
                exit_code = ?outcome.exit_code,
                "Step failed"
            );
            metrics::STEP_FAILURES
                .with_label_values(&[step.as_str(), "exit_code"])
                .inc();
        }

        Ok(StepRecord::from_outcome(&outcome))
    }

    async fn prepare_scratch(&self) -> Result<(), OrchestratorError> {
        let dir = &self.paths.scratch_dir;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| OrchestratorError::Io {
                path: dir.clone(),
                source,
            })
    }

    /// Removes intermediate files from the scratch directory.
    async fn clear_scratch(&self) {
        let mut paths = vec![self.planner.artifact_path()];
        if self.config.quality.enabled {
            paths.push(self.planner.reconstructed_path());
        }
        for path in paths {
            remove_if_exists(&path).await;
        }
    }

    /// Waits the configured delay, returning early on stop.
    async fn pause(&self) {
        let delay = Duration::from_millis(self.config.runner.delay_ms);
        if delay.is_zero() {
            return;
        }

        // Subscribe before checking the flag so a stop in between is not lost
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        if self.is_stopping() {
            return;
        }

        debug!("Pausing {} ms before next identifier", delay.as_millis());
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown_rx.recv() => {
                debug!("Pause interrupted by stop request");
            }
        }
    }
}

async fn remove_if_exists(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryRunStore, MockInvoker};

    fn orchestrator(
        config: Config,
    ) -> (
        tempfile::TempDir,
        Arc<MockInvoker>,
        Arc<MemoryRunStore>,
        BenchOrchestrator<MockInvoker, MemoryRunStore>,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let paths = RunPaths::new(
            dir.path().join("dataset"),
            dir.path().join("filelist.txt"),
            dir.path().join("out"),
            dir.path().join("scratch"),
        );
        let invoker = Arc::new(MockInvoker::new());
        let store = Arc::new(MemoryRunStore::new());
        let orch = BenchOrchestrator::new(config, paths, invoker.clone(), store.clone());
        (dir, invoker, store, orch)
    }

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.runner.delay_ms = 0;
        config
    }

    #[test]
    fn test_plan_default_steps() {
        let (_dir, _invoker, _store, orch) = orchestrator(fast_config());
        let steps: Vec<_> = orch.plan("a").iter().map(|i| i.step).collect();
        assert_eq!(steps, vec![Step::Transcode, Step::Inspect]);
    }

    #[test]
    fn test_plan_with_quality() {
        let mut config = fast_config();
        config.quality.enabled = true;
        let (_dir, _invoker, _store, orch) = orchestrator(config);
        let steps: Vec<_> = orch.plan("a").iter().map(|i| i.step).collect();
        assert_eq!(
            steps,
            vec![Step::Transcode, Step::Inspect, Step::Reconstruct, Step::Quality]
        );
    }

    #[tokio::test]
    async fn test_process_item_logs_in_order() {
        let (_dir, invoker, store, orch) = orchestrator(fast_config());
        invoker.set_stdout(Step::Transcode, "transcoded 1200 events\n").await;
        invoker.set_stdout(Step::Inspect, "dimensions: 346x260\n").await;

        let outcome = orch.process_item("dynamic_6dof").await.unwrap();

        assert_eq!(outcome.result, ItemResult::Succeeded);
        assert_eq!(
            store.log("dynamic_6dof").await.unwrap(),
            "transcoded 1200 events\ndimensions: 346x260\n"
        );
        assert!(store.record("dynamic_6dof").await.unwrap().succeeded());
    }

    #[tokio::test]
    async fn test_process_item_skips_processed() {
        let (_dir, invoker, store, orch) = orchestrator(fast_config());
        store.mark_processed("dynamic_6dof").await;

        let outcome = orch.process_item("dynamic_6dof").await.unwrap();

        assert_eq!(outcome.result, ItemResult::Skipped);
        assert_eq!(outcome.previous_status, ItemStatus::Incomplete);
        assert_eq!(invoker.invocation_count().await, 0);
    }

    #[tokio::test]
    async fn test_is_pending() {
        let (_dir, _invoker, store, orch) = orchestrator(fast_config());
        assert!(orch.is_pending("a").await.unwrap());

        store.mark_processed("a").await;
        assert!(!orch.is_pending("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_retry_incomplete() {
        let mut config = fast_config();
        config.runner.retry_incomplete = true;
        let (_dir, invoker, store, orch) = orchestrator(config);
        store.mark_processed("dynamic_6dof").await;

        let outcome = orch.process_item("dynamic_6dof").await.unwrap();

        assert_eq!(outcome.result, ItemResult::Succeeded);
        assert_eq!(outcome.previous_status, ItemStatus::Incomplete);
        assert_eq!(invoker.invocation_count().await, 2);

        // Completed identifiers stay skipped even with retries enabled
        let again = orch.process_item("dynamic_6dof").await.unwrap();
        assert_eq!(again.result, ItemResult::Skipped);
        assert_eq!(again.previous_status, ItemStatus::Completed);
    }

    #[tokio::test]
    async fn test_continue_policy_runs_inspector_after_failure() {
        let (_dir, invoker, _store, orch) = orchestrator(fast_config());
        invoker.fail_step(Step::Transcode, 1).await;

        let outcome = orch.process_item("a").await.unwrap();

        assert_eq!(outcome.result, ItemResult::Failed);
        assert_eq!(
            invoker.recorded_steps().await,
            vec![Step::Transcode, Step::Inspect]
        );
        let record = outcome.record.unwrap();
        assert_eq!(record.steps[0].status, StepStatus::Failed);
        assert_eq!(record.steps[1].status, StepStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_skip_item_policy_skips_remaining_steps() {
        let mut config = fast_config();
        config.runner.on_failure = FailurePolicy::SkipItem;
        let (_dir, invoker, _store, orch) = orchestrator(config);
        invoker.fail_step(Step::Transcode, 1).await;

        let outcome = orch.process_item("a").await.unwrap();

        assert_eq!(invoker.recorded_steps().await, vec![Step::Transcode]);
        let record = outcome.record.unwrap();
        assert_eq!(record.steps[1].step, Step::Inspect);
        assert_eq!(record.steps[1].status, StepStatus::Skipped);
    }

    #[tokio::test]
    async fn test_spawn_error_is_recorded_not_returned() {
        let (_dir, invoker, _store, orch) = orchestrator(fast_config());
        invoker.set_missing_program(Step::Transcode).await;

        let outcome = orch.process_item("a").await.unwrap();

        let record = outcome.record.unwrap();
        assert_eq!(record.steps[0].status, StepStatus::Failed);
        assert!(record.steps[0]
            .error
            .as_deref()
            .unwrap()
            .contains("program not found"));
    }

    #[tokio::test]
    async fn test_quality_report_written() {
        let mut config = fast_config();
        config.quality.enabled = true;
        let (_dir, invoker, store, orch) = orchestrator(config);
        invoker.set_stdout(Step::Quality, r#"{"VMAF score": 93.1}"#).await;
        invoker.set_stdout(Step::Reconstruct, "wrote video\n").await;

        orch.process_item("a").await.unwrap();

        assert_eq!(
            store.quality_report("a").await.unwrap(),
            r#"{"VMAF score": 93.1}"#
        );
        // Quality output does not go to the log
        assert!(!store.log("a").await.unwrap().contains("VMAF"));
    }

    #[tokio::test]
    async fn test_timeout_keeps_partial_output_in_log() {
        let (_dir, invoker, store, orch) = orchestrator(fast_config());
        invoker
            .set_timeout_with_output(Step::Transcode, "frame 1 encoded\n")
            .await;
        invoker.set_stdout(Step::Inspect, "stats\n").await;

        let outcome = orch.process_item("slow").await.unwrap();

        assert_eq!(outcome.result, ItemResult::Failed);
        assert_eq!(
            store.log("slow").await.unwrap(),
            "frame 1 encoded\nstats\n"
        );
        let record = outcome.record.unwrap();
        assert!(record.steps[0]
            .error
            .as_deref()
            .unwrap()
            .contains("timed out"));
    }

    #[tokio::test]
    async fn test_step_duration_recorded() {
        let (_dir, invoker, _store, orch) = orchestrator(fast_config());
        invoker.set_delay(Duration::from_millis(20)).await;

        let outcome = orch.process_item("a").await.unwrap();

        let record = outcome.record.unwrap();
        assert!(record.steps.iter().all(|s| s.duration_ms == 20));
    }

    #[tokio::test]
    async fn test_stale_artifact_removed_before_steps() {
        let (_dir, invoker, _store, orch) = orchestrator(fast_config());
        let artifact = orch.planner().artifact_path();
        std::fs::create_dir_all(artifact.parent().unwrap()).unwrap();
        std::fs::write(&artifact, b"ADDER-from-previous").unwrap();
        invoker.fail_step(Step::Transcode, 1).await;

        orch.process_item("broken").await.unwrap();

        assert!(!artifact.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_between_processed_items() {
        let (_dir, _invoker, _store, orch) = orchestrator(Config::default());
        let start = tokio::time::Instant::now();

        orch.run(&Filelist::parse("a\nb\n").unwrap()).await.unwrap();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(5000));
        assert!(elapsed < Duration::from_millis(10_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_delay_after_last_item() {
        let (_dir, _invoker, _store, orch) = orchestrator(Config::default());
        let start = tokio::time::Instant::now();

        orch.run(&Filelist::parse("a\n").unwrap()).await.unwrap();

        assert!(start.elapsed() < Duration::from_millis(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_delay_after_skipped_item() {
        let (_dir, invoker, store, orch) = orchestrator(Config::default());
        store.mark_processed("done").await;
        let start = tokio::time::Instant::now();

        let summary = orch
            .run(&Filelist::parse("done\nb\n").unwrap())
            .await
            .unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(invoker.invocation_count().await, 2);
        assert!(start.elapsed() < Duration::from_millis(5000));
    }

    #[tokio::test]
    async fn test_cleanup_removes_artifact() {
        let mut config = fast_config();
        config.runner.cleanup_artifacts = true;
        let (_dir, _invoker, _store, orch) = orchestrator(config);
        let artifact = orch.planner().artifact_path();
        std::fs::create_dir_all(artifact.parent().unwrap()).unwrap();
        std::fs::write(&artifact, b"ADDER").unwrap();

        orch.process_item("a").await.unwrap();

        assert!(!artifact.exists());
    }

    #[tokio::test]
    async fn test_stop_before_run_processes_nothing() {
        let (_dir, invoker, _store, orch) = orchestrator(fast_config());
        let filelist = Filelist::parse("a\nb\n").unwrap();

        orch.stop();
        let summary = orch.run(&filelist).await.unwrap();

        assert!(summary.stopped);
        assert_eq!(summary.not_reached(), 2);
        assert_eq!(invoker.invocation_count().await, 0);
    }

    #[tokio::test]
    async fn test_stop_interrupts_pause() {
        let mut config = fast_config();
        config.runner.delay_ms = 60_000;
        let (_dir, _invoker, _store, orch) = orchestrator(config);
        let orch = Arc::new(orch);
        let filelist = Filelist::parse("a\nb\n").unwrap();

        let runner = {
            let orch = Arc::clone(&orch);
            tokio::spawn(async move { orch.run(&filelist).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        orch.stop();

        let summary = tokio::time::timeout(Duration::from_secs(5), runner)
            .await
            .expect("pause was not interrupted")
            .unwrap()
            .unwrap();
        assert_eq!(summary.items.len(), 1);
        assert!(summary.stopped);
    }

    #[tokio::test]
    async fn test_validate_tools() {
        let (_dir, invoker, _store, orch) = orchestrator(fast_config());
        assert!(orch.validate_tools().await.is_ok());

        invoker.set_missing_program(Step::Inspect).await;
        assert!(matches!(
            orch.validate_tools().await,
            Err(InvokerError::ProgramNotFound { .. })
        ));
    }
}
