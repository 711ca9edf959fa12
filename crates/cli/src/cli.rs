//! Command line arguments.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use adder_bench_core::{Config, FailurePolicy};

#[derive(Parser, Debug)]
#[command(
    name = "adder-bench",
    version,
    about = "Transcode a dataset with davis_to_adder and collect adderinfo reports"
)]
pub struct Cli {
    /// Directory holding the source event files
    pub dataset: PathBuf,

    /// File with one identifier per line
    pub filelist: PathBuf,

    /// Per-identifier results go here
    pub output_root: PathBuf,

    /// Scratch directory for the intermediate event stream (ideally RAM-backed)
    pub scratch_dir: PathBuf,

    /// TOML configuration file
    #[arg(short, long, env = "ADDER_BENCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Pause between identifiers, in milliseconds
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// What to do when a step fails
    #[arg(long, value_enum)]
    pub on_failure: Option<OnFailure>,

    /// Reprocess identifiers whose previous run did not complete
    #[arg(long)]
    pub retry_incomplete: bool,

    /// Delete scratch files after each identifier
    #[arg(long)]
    pub cleanup: bool,

    /// Print the commands that would run, without running them
    #[arg(long)]
    pub dry_run: bool,

    /// Write the run summary as JSON
    #[arg(long)]
    pub summary_json: Option<PathBuf>,

    /// Write metrics in the Prometheus text format
    #[arg(long)]
    pub metrics_out: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OnFailure {
    Continue,
    SkipItem,
    Abort,
}

impl From<OnFailure> for FailurePolicy {
    fn from(value: OnFailure) -> Self {
        match value {
            OnFailure::Continue => FailurePolicy::Continue,
            OnFailure::SkipItem => FailurePolicy::SkipItem,
            OnFailure::Abort => FailurePolicy::Abort,
        }
    }
}

impl Cli {
    /// Flags given on the command line win over the configuration file.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(delay_ms) = self.delay_ms {
            config.runner.delay_ms = delay_ms;
        }
        if let Some(policy) = self.on_failure {
            config.runner.on_failure = policy.into();
        }
        if self.retry_incomplete {
            config.runner.retry_incomplete = true;
        }
        if self.cleanup {
            config.runner.cleanup_artifacts = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Cli {
        let mut args = vec!["adder-bench", "/data", "list.txt", "/out", "/mnt/ramdisk"];
        args.extend_from_slice(extra);
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_positional_arguments() {
        let cli = parse(&[]);
        assert_eq!(cli.dataset, PathBuf::from("/data"));
        assert_eq!(cli.filelist, PathBuf::from("list.txt"));
        assert_eq!(cli.output_root, PathBuf::from("/out"));
        assert_eq!(cli.scratch_dir, PathBuf::from("/mnt/ramdisk"));
        assert!(!cli.dry_run);
    }

    #[test]
    fn test_missing_positional_is_rejected() {
        assert!(Cli::try_parse_from(["adder-bench", "/data", "list.txt"]).is_err());
    }

    #[test]
    fn test_on_failure_values() {
        assert_eq!(
            parse(&["--on-failure", "skip-item"]).on_failure,
            Some(OnFailure::SkipItem)
        );
        assert!(Cli::try_parse_from([
            "adder-bench",
            "/data",
            "list.txt",
            "/out",
            "/tmp",
            "--on-failure",
            "retry",
        ])
        .is_err());
    }

    #[test]
    fn test_overrides_apply_to_config() {
        let cli = parse(&["--delay-ms", "0", "--on-failure", "abort", "--cleanup"]);
        let mut config = Config::default();

        cli.apply_overrides(&mut config);

        assert_eq!(config.runner.delay_ms, 0);
        assert_eq!(config.runner.on_failure, FailurePolicy::Abort);
        assert!(config.runner.cleanup_artifacts);
        assert!(!config.runner.retry_incomplete);
    }

    #[test]
    fn test_no_flags_keep_config() {
        let mut config = Config::default();
        config.runner.delay_ms = 250;
        config.runner.retry_incomplete = true;

        parse(&[]).apply_overrides(&mut config);

        assert_eq!(config.runner.delay_ms, 250);
        assert!(config.runner.retry_incomplete);
    }
}
