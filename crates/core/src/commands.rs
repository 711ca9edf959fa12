//! Assembly of the external command lines.
//!
//! Every identifier gets the same parameters; only the input event file
//! names and the template placeholders vary.

use serde::Serialize;
use std::path::PathBuf;

use crate::config::{Config, RunPaths};
use crate::invoker::{Invocation, Step};

/// EDI parameters embedded in the transcoder command line as a TOML block.
#[derive(Debug, Serialize)]
struct EdiArgs<'a> {
    base_path: String,
    events_filename_0: String,
    events_filename_1: String,
    mode: &'a str,
    start_c: f64,
    optimize_c: bool,
    optimize_controller: bool,
    show_display: bool,
    show_blurred_display: bool,
    output_fps: f64,
    deblur_only: bool,
    events_only: bool,
    target_latency: f64,
    simulate_packet_latency: bool,
}

/// Builds the invocations of each pipeline step.
#[derive(Debug, Clone)]
pub struct CommandPlanner {
    config: Config,
    paths: RunPaths,
}

impl CommandPlanner {
    pub fn new(config: &Config, paths: &RunPaths) -> Self {
        Self {
            config: config.clone(),
            paths: paths.clone(),
        }
    }

    /// Event stream written by the transcoder and read by the inspector.
    pub fn artifact_path(&self) -> PathBuf {
        self.paths
            .scratch_file(&self.config.transcoder.artifact_file_name)
    }

    /// Video produced by the reconstruction step.
    pub fn reconstructed_path(&self) -> PathBuf {
        self.paths
            .scratch_file(&self.config.quality.reconstructed_file_name)
    }

    pub fn item_dir(&self, identifier: &str) -> PathBuf {
        self.paths.item_dir(identifier)
    }

    /// Renders the EDI sub-configuration for one identifier.
    pub fn edi_block(&self, identifier: &str) -> String {
        let params = &self.config.transcoder.params;
        let events_filename = format!("{}{}", identifier, params.events_file_suffix);
        let args = EdiArgs {
            base_path: self.paths.dataset_root().to_string_lossy().into_owned(),
            events_filename_0: events_filename.clone(),
            events_filename_1: events_filename,
            mode: &params.mode,
            start_c: params.start_c,
            optimize_c: params.optimize_c,
            optimize_controller: params.optimize_controller,
            show_display: params.show_display,
            show_blurred_display: params.show_blurred_display,
            output_fps: params.output_fps,
            deblur_only: params.deblur_only,
            events_only: params.events_only,
            target_latency: params.target_latency,
            simulate_packet_latency: params.simulate_packet_latency,
        };
        // Plain scalars only, serialization cannot fail
        toml::to_string(&args).unwrap_or_default()
    }

    /// Transcoder invocation for `identifier`.
    pub fn transcode(&self, identifier: &str) -> Invocation {
        let transcoder = &self.config.transcoder;
        let params = &transcoder.params;

        let mut inv = Invocation::new(Step::Transcode, transcoder.program.clone())
            .args(transcoder.program_args.iter().cloned())
            .arg("--edi-args")
            .arg(self.edi_block(identifier))
            .arg("--output-events-filename")
            .arg(self.artifact_path().to_string_lossy())
            .arg("--adder-c-thresh-pos")
            .arg(params.c_thresh_pos.to_string())
            .arg("--adder-c-thresh-neg")
            .arg(params.c_thresh_neg.to_string())
            .arg("--delta-t-max-multiplier")
            .arg(params.delta_t_max_multiplier.to_string())
            .arg("--transcode-from")
            .arg(params.transcode_from.clone());

        if params.optimize_adder_controller {
            inv = inv.arg("--optimize-adder-controller");
        }
        if params.write_out {
            inv = inv.arg("--write-out");
        }
        if params.show_display {
            inv = inv.arg("--show-display");
        }
        inv
    }

    /// Inspector invocation against the artifact.
    pub fn inspect(&self) -> Invocation {
        let inspector = &self.config.inspector;
        let mut inv = Invocation::new(Step::Inspect, inspector.program.clone())
            .args(inspector.program_args.iter().cloned())
            .arg("-i")
            .arg(self.artifact_path().to_string_lossy());
        if inspector.detailed {
            inv = inv.arg("-d");
        }
        inv
    }

    /// Reconstruction invocation, `None` when no arguments are configured.
    pub fn reconstruct(&self, identifier: &str) -> Option<Invocation> {
        let quality = &self.config.quality;
        if quality.reconstruct_args.is_empty() {
            return None;
        }
        Some(
            Invocation::new(Step::Reconstruct, quality.reconstruct_program.clone()).args(
                quality
                    .reconstruct_args
                    .iter()
                    .map(|a| self.expand(a, identifier)),
            ),
        )
    }

    /// Quality metric invocation.
    pub fn quality(&self, identifier: &str) -> Invocation {
        let quality = &self.config.quality;
        Invocation::new(Step::Quality, quality.program.clone())
            .args(quality.args.iter().map(|a| self.expand(a, identifier)))
    }

    /// Substitutes the template placeholders of an argument.
    fn expand(&self, template: &str, identifier: &str) -> String {
        let vars: [(&str, String); 7] = [
            ("{identifier}", identifier.to_string()),
            ("{artifact}", self.artifact_path().to_string_lossy().into_owned()),
            (
                "{scratch_dir}",
                self.paths.scratch_dir.to_string_lossy().into_owned(),
            ),
            (
                "{dataset_root}",
                self.paths.dataset_root().to_string_lossy().into_owned(),
            ),
            (
                "{item_dir}",
                self.item_dir(identifier).to_string_lossy().into_owned(),
            ),
            (
                "{reconstructed}",
                self.reconstructed_path().to_string_lossy().into_owned(),
            ),
            (
                "{reconstructed_name}",
                self.config.quality.reconstructed_file_name.clone(),
            ),
        ];

        vars.iter()
            .fold(template.to_string(), |acc, (key, value)| acc.replace(key, value))
    }
}
