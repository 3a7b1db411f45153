use serde::{Deserialize, Serialize};

use crate::scoring::{HaltConfig, WeightsConfig};

/// Top-level configuration loaded from `trm.toml`.
///
/// This is process-wide defaults, not the per-session configuration
/// carried in a `start` request — a `start` call's own fields always
/// override these on a field-by-field basis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TrmConfig {
    pub defaults: DefaultsConfig,
    pub logging: LoggingConfig,
}

/// Default weights, halt policy, timeout, and EMA smoothing applied to
/// any `start` request that doesn't specify its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DefaultsConfig {
    pub timeout_sec: u64,
    pub ema_alpha: f64,
    pub weights: WeightsConfig,
    pub halt: HaltConfig,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            timeout_sec: 120,
            ema_alpha: 0.9,
            weights: WeightsConfig::default(),
            halt: HaltConfig::default(),
        }
    }
}

/// Process-wide logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
