use super::{types::EngineConfig, ConfigError};

const FFMPEG_LOG_LEVELS: &[&str] = &[
    "quiet", "panic", "fatal", "error", "warning", "info", "verbose", "debug", "trace",
];

/// Validate configuration
/// Currently validates:
/// - at least one normalization slot
/// - nonzero encode timeout
/// - ffmpeg log level is one ffmpeg accepts
pub fn validate_config(config: &EngineConfig) -> Result<(), ConfigError> {
    if config.max_parallel_normalizations == 0 {
        return Err(ConfigError::ValidationError(
            "max_parallel_normalizations cannot be 0".to_string(),
        ));
    }

    if config.encode_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "encode_timeout_secs cannot be 0".to_string(),
        ));
    }

    if !FFMPEG_LOG_LEVELS.contains(&config.ffmpeg_log_level.as_str()) {
        return Err(ConfigError::ValidationError(format!(
            "unknown ffmpeg_log_level: {}",
            config.ffmpeg_log_level
        )));
    }

    Ok(())
}
