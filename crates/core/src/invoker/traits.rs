//! Trait definitions for the invoker module.

use async_trait::async_trait;

use super::error::InvokerError;
use super::types::{Invocation, InvocationOutcome};

/// Runs external commands on behalf of the orchestrator.
#[async_trait]
pub trait ProcessInvoker: Send + Sync {
    /// Returns the name of this invoker implementation.
    fn name(&self) -> &str;

    /// Runs the invocation to completion and captures its output.
    ///
    /// A non-zero exit is reported in the outcome, not as an error.
    async fn invoke(&self, invocation: &Invocation) -> Result<InvocationOutcome, InvokerError>;

    /// Checks that the invocation's program can be started.
    async fn validate(&self, invocation: &Invocation) -> Result<(), InvokerError>;
}
