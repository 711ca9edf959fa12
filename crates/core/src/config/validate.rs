use super::{types::Config, ConfigError};

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(msg.into())
}

fn check_file_name(field: &str, name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(invalid(format!("{} cannot be empty", field)));
    }
    if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
        return Err(invalid(format!(
            "{} must be a plain file name, got {:?}",
            field, name
        )));
    }
    Ok(())
}

/// Validate configuration
/// Currently validates:
/// - Program paths are not empty
/// - Scratch and report file names are plain file names
/// - Frame rate is positive and the delta_t multiplier is not negative
/// - An enabled quality step has arguments
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.transcoder.program.as_os_str().is_empty() {
        return Err(invalid("transcoder.program cannot be empty"));
    }
    if config.inspector.program.as_os_str().is_empty() {
        return Err(invalid("inspector.program cannot be empty"));
    }
    check_file_name(
        "transcoder.artifact_file_name",
        &config.transcoder.artifact_file_name,
    )?;

    let params = &config.transcoder.params;
    if params.output_fps.is_nan() || params.output_fps <= 0.0 {
        return Err(invalid("transcoder.params.output_fps must be positive"));
    }
    if params.delta_t_max_multiplier.is_nan() || params.delta_t_max_multiplier < 0.0 {
        return Err(invalid(
            "transcoder.params.delta_t_max_multiplier cannot be negative",
        ));
    }
    if params.transcode_from.is_empty() {
        return Err(invalid("transcoder.params.transcode_from cannot be empty"));
    }

    if config.quality.enabled {
        if config.quality.program.as_os_str().is_empty() {
            return Err(invalid("quality.program cannot be empty"));
        }
        if config.quality.args.is_empty() {
            return Err(invalid("quality.args cannot be empty when quality is enabled"));
        }
        check_file_name("quality.report_file_name", &config.quality.report_file_name)?;
        check_file_name(
            "quality.reconstructed_file_name",
            &config.quality.reconstructed_file_name,
        )?;
    }

    Ok(())
}
