//! Configuration validation
//!
//! Checks that configuration values are within usable ranges before they reach
//! the streamer. Bias ranges are owned by the device and checked there.

use crate::{ConfigError, ConfigResult, DvsConfig};

/// Validation errors that can occur during config validation
#[derive(Debug, Clone)]
pub enum ConfigValidationError {
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// All problems are collected and reported together.
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` with details if validation fails
pub fn validate_config(config: &DvsConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_streaming(config, &mut errors);
    validate_parameter_sync(config, &mut errors);
    validate_device(config, &mut errors);
    validate_publisher(config, &mut errors);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

/// Slowest streaming rate the streamer accepts
pub const MIN_STREAMING_RATE_HZ: f64 = 1.0 / 3600.0;

fn validate_streaming(config: &DvsConfig, errors: &mut Vec<ConfigValidationError>) {
    let rate = config.streaming.rate_hz;
    if !rate.is_finite() || rate <= 0.0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "streaming.rate_hz".to_string(),
            reason: format!("must be a positive number, got {}", rate),
        });
    } else if rate < MIN_STREAMING_RATE_HZ {
        errors.push(ConfigValidationError::InvalidValue {
            field: "streaming.rate_hz".to_string(),
            reason: format!(
                "must be at least {} (one flush per hour), got {}",
                MIN_STREAMING_RATE_HZ, rate
            ),
        });
    }
    if config.streaming.poll_divisor == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "streaming.poll_divisor".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    if config.streaming.max_poll_sleep_ms == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "streaming.max_poll_sleep_ms".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
}

fn validate_parameter_sync(config: &DvsConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.parameter_sync.tick_ms == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "parameter_sync.tick_ms".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
}

fn validate_device(config: &DvsConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.device.kind.is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "device.kind".to_string(),
        });
    }
    let rate = config.device.event_rate_hz;
    if !rate.is_finite() || rate < 0.0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "device.event_rate_hz".to_string(),
            reason: format!("must be zero or positive, got {}", rate),
        });
    }
    if config.device.width == 0 || config.device.height == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "device.width/height".to_string(),
            reason: "sensor resolution must be non-zero".to_string(),
        });
    }
}

fn validate_publisher(config: &DvsConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.publisher.topic.is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "publisher.topic".to_string(),
        });
    }
    if config.publisher.channel_capacity == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "publisher.channel_capacity".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
}
