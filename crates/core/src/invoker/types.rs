//! Types for the invoker module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A step of the per-identifier pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Encode the dataset item into an ADDER event stream.
    Transcode,
    /// Print statistics about the event stream.
    Inspect,
    /// Reconstruct a video from the event stream.
    Reconstruct,
    /// Score the reconstructed video against the reference.
    Quality,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Transcode => "transcode",
            Step::Inspect => "inspect",
            Step::Reconstruct => "reconstruct",
            Step::Quality => "quality",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully assembled external command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    /// Pipeline step this command implements.
    pub step: Step,
    /// Program to execute.
    pub program: PathBuf,
    /// Arguments, passed verbatim (no shell).
    pub args: Vec<String>,
    /// Working directory, inherited when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

impl Invocation {
    pub fn new(step: Step, program: impl Into<PathBuf>) -> Self {
        Self {
            step,
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Renders the command as a single shell-like line, quoting where needed.
    ///
    /// Only meant for logs; the process is never run through a shell.
    pub fn command_line(&self) -> String {
        let mut parts = vec![shell_quote(&self.program.to_string_lossy())];
        parts.extend(self.args.iter().map(|a| shell_quote(a)));
        parts.join(" ")
    }
}

fn shell_quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%{}".contains(c));
    if plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

/// Result of a process that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationOutcome {
    pub step: Step,
    /// Exit code, `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Wall clock time of the invocation.
    pub duration_ms: u64,
}

impl InvocationOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let inv = Invocation::new(Step::Inspect, "cargo")
            .args(["run", "--bin", "adderinfo", "--"])
            .arg("-i")
            .arg("/mnt/ramdisk/events.adder")
            .working_dir("/src/adder-codec-rs");

        assert_eq!(inv.args.len(), 6);
        assert_eq!(inv.working_dir, Some(PathBuf::from("/src/adder-codec-rs")));
    }

    #[test]
    fn test_command_line_quotes_whitespace() {
        let inv = Invocation::new(Step::Transcode, "cargo")
            .arg("--edi-args")
            .arg("start_c = 0.3\nmode = \"edi\"");

        assert_eq!(
            inv.command_line(),
            "cargo --edi-args 'start_c = 0.3\nmode = \"edi\"'"
        );
    }

    #[test]
    fn test_command_line_escapes_single_quote() {
        let inv = Invocation::new(Step::Inspect, "echo").arg("it's");
        assert_eq!(inv.command_line(), r"echo 'it'\''s'");
    }

    #[test]
    fn test_outcome_success() {
        let mut outcome = InvocationOutcome {
            step: Step::Transcode,
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 5,
        };
        assert!(outcome.success());

        outcome.exit_code = Some(101);
        assert!(!outcome.success());

        outcome.exit_code = None;
        assert!(!outcome.success());
    }

    #[test]
    fn test_step_serialization() {
        assert_eq!(serde_json::to_string(&Step::Reconstruct).unwrap(), "\"reconstruct\"");
        assert_eq!(Step::Quality.to_string(), "quality");
    }
}
