//! Invoker backed by `tokio::process`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use super::error::InvokerError;
use super::traits::ProcessInvoker;
use super::types::{Invocation, InvocationOutcome};

/// Spawns real processes, capturing stdout and stderr.
#[derive(Debug, Clone, Default)]
pub struct TokioProcessInvoker {
    timeout: Option<Duration>,
}

impl TokioProcessInvoker {
    /// Creates an invoker without a timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Kills any invocation running longer than `limit`.
    pub fn with_timeout(limit: Duration) -> Self {
        Self {
            timeout: Some(limit),
        }
    }

    /// Builds an invoker from a timeout in seconds, where 0 means none.
    pub fn from_timeout_secs(secs: u64) -> Self {
        if secs == 0 {
            Self::new()
        } else {
            Self::with_timeout(Duration::from_secs(secs))
        }
    }

    fn spawn_error(program: &Path, e: std::io::Error) -> InvokerError {
        if e.kind() == std::io::ErrorKind::NotFound {
            InvokerError::ProgramNotFound {
                program: program.to_path_buf(),
            }
        } else {
            InvokerError::Io(e)
        }
    }
}

/// How long to keep reading a killed process's pipes.
///
/// Grandchildren may still hold the pipe open after the process itself died.
const KILL_GRACE: Duration = Duration::from_millis(200);

/// Collects one output pipe in the background.
struct OutputReader {
    buffer: Arc<Mutex<Vec<u8>>>,
    handle: JoinHandle<()>,
}

impl OutputReader {
    fn spawn<R>(pipe: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buffer);
        let handle = tokio::spawn(async move {
            let Some(mut pipe) = pipe else { return };
            let mut chunk = [0u8; 8192];
            loop {
                match pipe.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => sink.lock().await.extend_from_slice(&chunk[..n]),
                    Err(e) => {
                        debug!("Stopped reading process output: {}", e);
                        break;
                    }
                }
            }
        });
        Self { buffer, handle }
    }

    /// Waits for the pipe to close, or at most `grace`, and returns what was read.
    async fn finish(mut self, grace: Option<Duration>) -> String {
        match grace {
            Some(grace) => {
                if timeout(grace, &mut self.handle).await.is_err() {
                    self.handle.abort();
                }
            }
            None => {
                let _ = (&mut self.handle).await;
            }
        }
        let bytes = std::mem::take(&mut *self.buffer.lock().await);
        let text = String::from_utf8_lossy(&bytes).into_owned();
        text
    }
}

/// Looks `program` up the way the OS would when spawning it.
fn resolve_program(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 || program.is_absolute() {
        return program.is_file().then(|| program.to_path_buf());
    }
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

#[async_trait]
impl ProcessInvoker for TokioProcessInvoker {
    fn name(&self) -> &str {
        "process"
    }

    async fn invoke(&self, invocation: &Invocation) -> Result<InvocationOutcome, InvokerError> {
        let start = Instant::now();
        debug!(step = %invocation.step, "Running: {}", invocation.command_line());

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &invocation.working_dir {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .map_err(|e| Self::spawn_error(&invocation.program, e))?;

        // Drain both pipes while the process runs so output written before
        // a timeout is still available afterwards
        let stdout = OutputReader::spawn(child.stdout.take());
        let stderr = OutputReader::spawn(child.stderr.take());

        let status = match self.timeout {
            Some(limit) => match timeout(limit, child.wait()).await {
                Ok(status) => status?,
                Err(_) => {
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill timed out process: {}", e);
                    }
                    let stdout = stdout.finish(Some(KILL_GRACE)).await;
                    stderr.finish(Some(KILL_GRACE)).await;
                    return Err(InvokerError::Timeout {
                        timeout_ms: limit.as_millis() as u64,
                        stdout,
                    });
                }
            },
            None => child.wait().await?,
        };

        Ok(InvocationOutcome {
            step: invocation.step,
            exit_code: status.code(),
            stdout: stdout.finish(None).await,
            stderr: stderr.finish(None).await,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn validate(&self, invocation: &Invocation) -> Result<(), InvokerError> {
        match resolve_program(&invocation.program) {
            Some(_) => Ok(()),
            None => Err(InvokerError::ProgramNotFound {
                program: invocation.program.clone(),
            }),
        }
    }
}
