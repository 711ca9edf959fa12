use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub transcoder: TranscoderConfig,
    #[serde(default)]
    pub inspector: InspectorConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
}

impl Config {
    /// Short hash of the serialized configuration.
    ///
    /// Stored in every run record so results produced under different
    /// parameters can be told apart.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        let digest = format!("{:x}", Sha256::digest(json.as_bytes()));
        digest[..16].to_string()
    }
}

/// The four locations a run operates on, given on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPaths {
    /// Root directory of the dataset the identifiers refer to.
    pub dataset_root: PathBuf,
    /// Text file listing one identifier per line.
    pub filelist: PathBuf,
    /// Root under which one directory per identifier is created.
    pub output_root: PathBuf,
    /// Fast scratch storage for intermediate artifacts.
    pub scratch_dir: PathBuf,
}

impl RunPaths {
    pub fn new(
        dataset_root: impl Into<PathBuf>,
        filelist: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            dataset_root: dataset_root.into(),
            filelist: filelist.into(),
            output_root: output_root.into(),
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Directory holding the log and run record of one identifier.
    pub fn item_dir(&self, identifier: &str) -> PathBuf {
        self.output_root.join(identifier)
    }

    pub fn scratch_file(&self, name: &str) -> PathBuf {
        self.scratch_dir.join(name)
    }

    pub fn dataset_root(&self) -> &Path {
        &self.dataset_root
    }
}

/// Transcoder (`davis_to_adder`) invocation settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscoderConfig {
    /// Program to execute.
    #[serde(default = "default_cargo")]
    pub program: PathBuf,
    /// Arguments placed before the transcoder parameters.
    #[serde(default = "default_transcoder_args")]
    pub program_args: Vec<String>,
    /// Name of the event stream written to the scratch directory.
    #[serde(default = "default_artifact_file_name")]
    pub artifact_file_name: String,
    /// Fixed parameters applied to every identifier.
    #[serde(default)]
    pub params: TranscodeParams,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            program: default_cargo(),
            program_args: default_transcoder_args(),
            artifact_file_name: default_artifact_file_name(),
            params: TranscodeParams::default(),
        }
    }
}

fn default_cargo() -> PathBuf {
    PathBuf::from("cargo")
}

fn cargo_run_args(bin: &str) -> Vec<String> {
    ["run", "--release", "--bin", bin, "--"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_transcoder_args() -> Vec<String> {
    cargo_run_args("davis_to_adder")
}

fn default_artifact_file_name() -> String {
    "events.adder".to_string()
}

/// Parameters passed to the transcoder.
///
/// The EDI reconstruction fields are rendered as an embedded TOML block,
/// the ADDER fields as named flags.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TranscodeParams {
    /// EDI reconstruction mode.
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Appended to the identifier to form the input events file names.
    #[serde(default = "default_events_suffix")]
    pub events_file_suffix: String,
    /// Initial contrast value for the deblurring model.
    #[serde(default = "default_start_c")]
    pub start_c: f64,
    /// Optimize the contrast value online.
    #[serde(default = "default_true")]
    pub optimize_c: bool,
    /// Optimize the EDI latency controller.
    #[serde(default)]
    pub optimize_controller: bool,
    /// Simulate packet arrival latency.
    #[serde(default = "default_true")]
    pub simulate_packet_latency: bool,
    /// Target latency in milliseconds when simulating packet latency.
    #[serde(default = "default_target_latency")]
    pub target_latency: f64,
    /// Reconstructed frame rate.
    #[serde(default = "default_output_fps")]
    pub output_fps: f64,
    #[serde(default)]
    pub show_display: bool,
    #[serde(default)]
    pub show_blurred_display: bool,
    #[serde(default = "default_true")]
    pub deblur_only: bool,
    #[serde(default)]
    pub events_only: bool,
    /// Positive ADDER contrast threshold.
    #[serde(default)]
    pub c_thresh_pos: u8,
    /// Negative ADDER contrast threshold.
    #[serde(default)]
    pub c_thresh_neg: u8,
    /// Multiplier applied to the reference interval to get `delta_t_max`.
    #[serde(default = "default_delta_t_max_multiplier")]
    pub delta_t_max_multiplier: f64,
    /// Source format selector.
    #[serde(default = "default_transcode_from")]
    pub transcode_from: String,
    #[serde(default)]
    pub optimize_adder_controller: bool,
    #[serde(default)]
    pub write_out: bool,
}

impl Default for TranscodeParams {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            events_file_suffix: default_events_suffix(),
            start_c: default_start_c(),
            optimize_c: true,
            optimize_controller: false,
            simulate_packet_latency: true,
            target_latency: default_target_latency(),
            output_fps: default_output_fps(),
            show_display: false,
            show_blurred_display: false,
            deblur_only: true,
            events_only: false,
            c_thresh_pos: 0,
            c_thresh_neg: 0,
            delta_t_max_multiplier: default_delta_t_max_multiplier(),
            transcode_from: default_transcode_from(),
            optimize_adder_controller: false,
            write_out: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_mode() -> String {
    "edi".to_string()
}

fn default_events_suffix() -> String {
    ".aedat4".to_string()
}

fn default_start_c() -> f64 {
    0.3
}

fn default_target_latency() -> f64 {
    1000.0
}

fn default_output_fps() -> f64 {
    500.0
}

fn default_delta_t_max_multiplier() -> f64 {
    4.0
}

fn default_transcode_from() -> String {
    "raw-davis".to_string()
}

/// Inspector (`adderinfo`) invocation settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InspectorConfig {
    #[serde(default = "default_cargo")]
    pub program: PathBuf,
    #[serde(default = "default_inspector_args")]
    pub program_args: Vec<String>,
    /// Ask for detailed statistics.
    #[serde(default = "default_true")]
    pub detailed: bool,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            program: default_cargo(),
            program_args: default_inspector_args(),
            detailed: true,
        }
    }
}

fn default_inspector_args() -> Vec<String> {
    cargo_run_args("adderinfo")
}

/// Perceptual quality measurement, disabled unless `enabled = true`.
///
/// Arguments are templates; `{identifier}`, `{artifact}`, `{scratch_dir}`,
/// `{dataset_root}`, `{item_dir}`, `{reconstructed}` and
/// `{reconstructed_name}` are substituted per identifier.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QualityConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Program that turns the artifact back into a video.
    #[serde(default = "default_cargo")]
    pub reconstruct_program: PathBuf,
    /// Reconstruction arguments; empty skips the reconstruction step.
    #[serde(default = "default_reconstruct_args")]
    pub reconstruct_args: Vec<String>,
    #[serde(default = "default_reconstructed_file_name")]
    pub reconstructed_file_name: String,
    /// Quality metric program.
    #[serde(default = "default_docker")]
    pub program: PathBuf,
    #[serde(default = "default_quality_args")]
    pub args: Vec<String>,
    /// File under the identifier directory receiving the metric's stdout.
    #[serde(default = "default_report_file_name")]
    pub report_file_name: String,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            reconstruct_program: default_cargo(),
            reconstruct_args: default_reconstruct_args(),
            reconstructed_file_name: default_reconstructed_file_name(),
            program: default_docker(),
            args: default_quality_args(),
            report_file_name: default_report_file_name(),
        }
    }
}

fn default_reconstruct_args() -> Vec<String> {
    let mut args = cargo_run_args("adder_to_dvs");
    args.extend(
        [
            "--input-filename",
            "{artifact}",
            "--output-video-filename",
            "{reconstructed}",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args
}

fn default_reconstructed_file_name() -> String {
    "reconstructed.mp4".to_string()
}

fn default_docker() -> PathBuf {
    PathBuf::from("docker")
}

fn default_quality_args() -> Vec<String> {
    [
        "run",
        "--rm",
        "-v",
        "{dataset_root}:/reference:ro",
        "-v",
        "{scratch_dir}:/distorted",
        "gfdavila/easyvmaf",
        "-r",
        "/reference/{identifier}.mp4",
        "-d",
        "/distorted/{reconstructed_name}",
        "-json",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_report_file_name() -> String {
    "quality.json".to_string()
}

/// What to do when an invocation fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the failure and keep running the remaining steps.
    #[default]
    Continue,
    /// Skip the remaining steps of the identifier, then move on.
    SkipItem,
    /// Stop the whole run after the failing identifier.
    Abort,
}

/// Run loop settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunnerConfig {
    /// Pause after each processed identifier (milliseconds).
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default)]
    pub on_failure: FailurePolicy,
    /// Per-invocation timeout in seconds (0 = none).
    #[serde(default)]
    pub step_timeout_secs: u64,
    /// Reprocess identifiers whose directory exists without a completed record.
    #[serde(default)]
    pub retry_incomplete: bool,
    /// Delete scratch artifacts after each identifier.
    #[serde(default)]
    pub cleanup_artifacts: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            on_failure: FailurePolicy::default(),
            step_timeout_secs: 0,
            retry_incomplete: false,
            cleanup_artifacts: false,
        }
    }
}

fn default_delay_ms() -> u64 {
    5000 // 5 seconds
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.transcoder.program, PathBuf::from("cargo"));
        assert_eq!(config.transcoder.artifact_file_name, "events.adder");
        assert_eq!(config.transcoder.params.c_thresh_pos, 0);
        assert_eq!(config.transcoder.params.c_thresh_neg, 0);
        assert!(config.transcoder.params.optimize_c);
        assert!(config.transcoder.params.simulate_packet_latency);
        assert!(config.inspector.detailed);
        assert!(!config.quality.enabled);
        assert_eq!(config.runner.delay_ms, 5000);
        assert_eq!(config.runner.on_failure, FailurePolicy::Continue);
        assert!(!config.runner.cleanup_artifacts);
    }

    #[test]
    fn test_deserialize_partial_params() {
        let toml = r#"
[transcoder.params]
output_fps = 250.0
c_thresh_pos = 3

[runner]
delay_ms = 0
on_failure = "skip_item"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.transcoder.params.output_fps, 250.0);
        assert_eq!(config.transcoder.params.c_thresh_pos, 3);
        assert_eq!(config.transcoder.params.c_thresh_neg, 0);
        assert_eq!(config.transcoder.params.transcode_from, "raw-davis");
        assert_eq!(config.runner.delay_ms, 0);
        assert_eq!(config.runner.on_failure, FailurePolicy::SkipItem);
    }

    #[test]
    fn test_unknown_failure_policy_fails() {
        let toml = r#"
[runner]
on_failure = "retry_forever"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_default_program_args_target_binaries() {
        let config = Config::default();
        assert!(config
            .transcoder
            .program_args
            .contains(&"davis_to_adder".to_string()));
        assert!(config
            .inspector
            .program_args
            .contains(&"adderinfo".to_string()));
        assert!(config
            .quality
            .reconstruct_args
            .contains(&"adder_to_dvs".to_string()));
    }

    #[test]
    fn test_fingerprint_tracks_parameters() {
        let config = Config::default();
        let mut changed = Config::default();
        changed.transcoder.params.start_c = 0.5;

        assert_eq!(config.fingerprint(), Config::default().fingerprint());
        assert_ne!(config.fingerprint(), changed.fingerprint());
        assert_eq!(config.fingerprint().len(), 16);
    }

    #[test]
    fn test_run_paths_item_dir() {
        let paths = RunPaths::new("/data", "/data/list.txt", "/out", "/mnt/ramdisk");
        assert_eq!(paths.item_dir("dynamic_6dof"), PathBuf::from("/out/dynamic_6dof"));
        assert_eq!(
            paths.scratch_file("events.adder"),
            PathBuf::from("/mnt/ramdisk/events.adder")
        );
    }
}
