//! Mock invoker for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::invoker::{Invocation, InvocationOutcome, InvokerError, ProcessInvoker, Step};

/// Scripted behavior of a step.
#[derive(Debug, Clone)]
enum Behavior {
    Exit { code: i32, stdout: String },
    MissingProgram,
    Timeout { stdout: String },
}

impl Default for Behavior {
    fn default() -> Self {
        Behavior::Exit {
            code: 0,
            stdout: String::new(),
        }
    }
}

/// Mock implementation of the ProcessInvoker trait.
///
/// Provides controllable behavior for testing:
/// - Record every invocation for assertions
/// - Script stdout and exit codes per step
/// - Fail a step only for identifiers matching a needle
/// - Simulate missing programs and timeouts
/// - Simulate slow invocations
///
/// # Example
///
/// ```rust,ignore
/// use adder_bench_core::testing::MockInvoker;
///
/// let invoker = MockInvoker::new();
/// invoker.set_stdout(Step::Inspect, "events: 1024\n").await;
/// invoker.fail_step(Step::Transcode, 1).await;
///
/// // ... run the orchestrator ...
///
/// assert_eq!(invoker.recorded_steps().await, vec![Step::Transcode, Step::Inspect]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockInvoker {
    /// Recorded invocations.
    invocations: Arc<RwLock<Vec<Invocation>>>,
    /// Behavior per step, defaulting to a silent success.
    behaviors: Arc<RwLock<HashMap<Step, Behavior>>>,
    /// Step failures restricted to invocations with an argument containing the needle.
    targeted_failures: Arc<RwLock<Vec<(Step, String, i32)>>>,
    /// Simulated duration of every invocation.
    delay_ms: Arc<RwLock<u64>>,
}

impl MockInvoker {
    /// Create a new mock invoker where every step succeeds silently.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded invocations.
    pub async fn recorded_invocations(&self) -> Vec<Invocation> {
        self.invocations.read().await.clone()
    }

    /// Get the steps of all recorded invocations, in order.
    pub async fn recorded_steps(&self) -> Vec<Step> {
        self.invocations.read().await.iter().map(|i| i.step).collect()
    }

    /// Get the number of invocations performed.
    pub async fn invocation_count(&self) -> usize {
        self.invocations.read().await.len()
    }

    /// Clear recorded invocations.
    pub async fn clear_recorded(&self) {
        self.invocations.write().await.clear();
    }

    /// Make `step` succeed with the given stdout.
    pub async fn set_stdout(&self, step: Step, stdout: impl Into<String>) {
        self.behaviors.write().await.insert(
            step,
            Behavior::Exit {
                code: 0,
                stdout: stdout.into(),
            },
        );
    }

    /// Make `step` exit with `code` for every identifier.
    pub async fn fail_step(&self, step: Step, code: i32) {
        self.behaviors.write().await.insert(
            step,
            Behavior::Exit {
                code,
                stdout: String::new(),
            },
        );
    }

    /// Make `step` exit with `code` when any argument contains `needle`.
    ///
    /// Identifiers appear in the transcoder arguments, so this fails a
    /// single identifier.
    pub async fn fail_step_for(&self, step: Step, needle: impl Into<String>, code: i32) {
        self.targeted_failures
            .write()
            .await
            .push((step, needle.into(), code));
    }

    /// Make `step` fail to spawn, as if the program did not exist.
    pub async fn set_missing_program(&self, step: Step) {
        self.behaviors
            .write()
            .await
            .insert(step, Behavior::MissingProgram);
    }

    /// Make `step` time out.
    pub async fn set_timeout(&self, step: Step) {
        self.set_timeout_with_output(step, "").await;
    }

    /// Make `step` time out after writing `stdout`.
    pub async fn set_timeout_with_output(&self, step: Step, stdout: impl Into<String>) {
        self.behaviors.write().await.insert(
            step,
            Behavior::Timeout {
                stdout: stdout.into(),
            },
        );
    }

    /// Set the simulated invocation duration.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay_ms.write().await = delay.as_millis() as u64;
    }

    async fn behavior_for(&self, invocation: &Invocation) -> Behavior {
        let targeted = self.targeted_failures.read().await;
        for (step, needle, code) in targeted.iter() {
            if *step == invocation.step && invocation.args.iter().any(|a| a.contains(needle)) {
                return Behavior::Exit {
                    code: *code,
                    stdout: String::new(),
                };
            }
        }
        self.behaviors
            .read()
            .await
            .get(&invocation.step)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ProcessInvoker for MockInvoker {
    fn name(&self) -> &str {
        "mock"
    }

    async fn invoke(&self, invocation: &Invocation) -> Result<InvocationOutcome, InvokerError> {
        self.invocations.write().await.push(invocation.clone());

        let delay_ms = *self.delay_ms.read().await;
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        match self.behavior_for(invocation).await {
            Behavior::Exit { code, stdout } => Ok(InvocationOutcome {
                step: invocation.step,
                exit_code: Some(code),
                stdout,
                stderr: String::new(),
                duration_ms: delay_ms,
            }),
            Behavior::MissingProgram => Err(InvokerError::ProgramNotFound {
                program: invocation.program.clone(),
            }),
            Behavior::Timeout { stdout } => Err(InvokerError::Timeout {
                timeout_ms: delay_ms,
                stdout,
            }),
        }
    }

    async fn validate(&self, invocation: &Invocation) -> Result<(), InvokerError> {
        match self.behaviors.read().await.get(&invocation.step) {
            Some(Behavior::MissingProgram) => Err(InvokerError::ProgramNotFound {
                program: invocation.program.clone(),
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_success() {
        let invoker = MockInvoker::new();
        let outcome = invoker
            .invoke(&Invocation::new(Step::Inspect, "adderinfo"))
            .await
            .unwrap();
        assert!(outcome.success());
        assert_eq!(invoker.invocation_count().await, 1);
    }

    #[tokio::test]
    async fn test_targeted_failure() {
        let invoker = MockInvoker::new();
        invoker.fail_step_for(Step::Transcode, "broken", 2).await;

        let ok = invoker
            .invoke(&Invocation::new(Step::Transcode, "t").arg("good_item"))
            .await
            .unwrap();
        let failed = invoker
            .invoke(&Invocation::new(Step::Transcode, "t").arg("broken_item"))
            .await
            .unwrap();

        assert!(ok.success());
        assert_eq!(failed.exit_code, Some(2));
    }

    #[tokio::test]
    async fn test_timeout_and_missing() {
        let invoker = MockInvoker::new();
        invoker.set_timeout(Step::Quality).await;
        invoker.set_missing_program(Step::Reconstruct).await;

        assert!(matches!(
            invoker.invoke(&Invocation::new(Step::Quality, "docker")).await,
            Err(InvokerError::Timeout { .. })
        ));
        assert!(matches!(
            invoker
                .invoke(&Invocation::new(Step::Reconstruct, "adder_to_dvs"))
                .await,
            Err(InvokerError::ProgramNotFound { .. })
        ));
        assert_eq!(
            invoker.recorded_steps().await,
            vec![Step::Quality, Step::Reconstruct]
        );
    }
}
