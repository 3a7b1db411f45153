use std::path::Path;

use thiserror::Error;

mod schema;

pub use schema::{DefaultsConfig, LoggingConfig, TrmConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),

    #[error("config validation error: {message}")]
    Validation { message: String },
}

/// Load and validate a `TrmConfig` from a TOML file path.
///
/// Returns the default config if the file does not exist.
pub fn load_config(path: &Path) -> Result<TrmConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(TrmConfig::default());
    }

    let data = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_config(&data)
}

/// Parse and validate a `TrmConfig` from a TOML string.
pub fn parse_config(data: &str) -> Result<TrmConfig, ConfigError> {
    let config: TrmConfig = toml::from_str(data)?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &TrmConfig) -> Result<(), ConfigError> {
    let w = &config.defaults.weights;
    if w.data_quality < 0.0 || w.test < 0.0 || w.lint < 0.0 || w.perf < 0.0 {
        return Err(ConfigError::Validation {
            message: "weights must be non-negative".to_string(),
        });
    }
    if w.data_quality + w.test + w.lint + w.perf <= 0.0 {
        return Err(ConfigError::Validation {
            message: "defaults.weights must not all be zero".to_string(),
        });
    }

    let halt = &config.defaults.halt;
    if halt.max_steps < 1 {
        return Err(ConfigError::Validation {
            message: "defaults.halt.max_steps must be >= 1".to_string(),
        });
    }
    if halt.min_steps < 1 {
        return Err(ConfigError::Validation {
            message: "defaults.halt.min_steps must be >= 1".to_string(),
        });
    }
    if !(0.0..=1.0).contains(&halt.pass_threshold) {
        return Err(ConfigError::Validation {
            message: "defaults.halt.pass_threshold must be in 0..=1".to_string(),
        });
    }
    if halt.patience_no_improve < 1 {
        return Err(ConfigError::Validation {
            message: "defaults.halt.patience_no_improve must be >= 1".to_string(),
        });
    }

    if config.defaults.timeout_sec == 0 {
        return Err(ConfigError::Validation {
            message: "defaults.timeout_sec must be > 0".to_string(),
        });
    }

    if !(0.0..=1.0).contains(&config.defaults.ema_alpha) {
        return Err(ConfigError::Validation {
            message: "defaults.ema_alpha must be in 0..=1".to_string(),
        });
    }

    Ok(())
}
