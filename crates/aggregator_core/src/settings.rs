use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

pub const BATCH_SIZE_RANGE: RangeInclusive<u32> = 1..=20;
pub const BASE_DELAY_MS_RANGE: RangeInclusive<u64> = 500..=10_000;
pub const MAX_RETRIES_RANGE: RangeInclusive<u32> = 1..=10;

/// User-tunable parameters. Serialized as one flat JSON object; missing
/// keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub batch_size: u32,
    pub base_delay_ms: u64,
    pub max_retries: u32,
    pub logging_enabled: bool,
    #[serde(rename = "compactUI")]
    pub compact_ui: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            batch_size: 5,
            base_delay_ms: 2000,
            max_retries: 3,
            logging_enabled: true,
            compact_ui: false,
        }
    }
}

impl Settings {
    /// Pull every numeric field back into its allowed range.
    pub fn clamped(mut self) -> Self {
        self.batch_size = self
            .batch_size
            .clamp(*BATCH_SIZE_RANGE.start(), *BATCH_SIZE_RANGE.end());
        self.base_delay_ms = self
            .base_delay_ms
            .clamp(*BASE_DELAY_MS_RANGE.start(), *BASE_DELAY_MS_RANGE.end());
        self.max_retries = self
            .max_retries
            .clamp(*MAX_RETRIES_RANGE.start(), *MAX_RETRIES_RANGE.end());
        self
    }

    /// Validate and apply a single change.
    pub fn apply(&mut self, setting: Setting) -> Result<(), SettingsError> {
        match setting {
            Setting::BatchSize(v) => {
                check_range(
                    "batchSize",
                    v as u64,
                    *BATCH_SIZE_RANGE.start() as u64,
                    *BATCH_SIZE_RANGE.end() as u64,
                )?;
                self.batch_size = v;
            }
            Setting::BaseDelayMs(v) => {
                check_range(
                    "baseDelayMs",
                    v,
                    *BASE_DELAY_MS_RANGE.start(),
                    *BASE_DELAY_MS_RANGE.end(),
                )?;
                self.base_delay_ms = v;
            }
            Setting::MaxRetries(v) => {
                check_range(
                    "maxRetries",
                    v as u64,
                    *MAX_RETRIES_RANGE.start() as u64,
                    *MAX_RETRIES_RANGE.end() as u64,
                )?;
                self.max_retries = v;
            }
            Setting::LoggingEnabled(v) => self.logging_enabled = v,
            Setting::CompactUi(v) => self.compact_ui = v,
        }
        Ok(())
    }
}

fn check_range(key: &'static str, value: u64, min: u64, max: u64) -> Result<(), SettingsError> {
    if value < min || value > max {
        return Err(SettingsError::OutOfRange {
            key,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// A typed assignment to one settings key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    BatchSize(u32),
    BaseDelayMs(u64),
    MaxRetries(u32),
    LoggingEnabled(bool),
    CompactUi(bool),
}

impl Setting {
    /// Parse a `key value` pair as typed on a command line.
    pub fn parse(key: &str, value: &str) -> Result<Self, SettingsError> {
        let invalid = || SettingsError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key {
            "batchSize" | "batch-size" => value.parse().map(Setting::BatchSize).map_err(|_| invalid()),
            "baseDelayMs" | "base-delay-ms" => {
                value.parse().map(Setting::BaseDelayMs).map_err(|_| invalid())
            }
            "maxRetries" | "max-retries" => {
                value.parse().map(Setting::MaxRetries).map_err(|_| invalid())
            }
            "loggingEnabled" | "logging-enabled" => {
                parse_bool(value).map(Setting::LoggingEnabled).ok_or_else(invalid)
            }
            "compactUI" | "compact-ui" => parse_bool(value).map(Setting::CompactUi).ok_or_else(invalid),
            _ => Err(SettingsError::UnknownKey(key.to_string())),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Some(true),
        "false" | "off" | "no" | "0" => Some(false),
        _ => None,
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("{key} must be between {min} and {max} (got {value})")]
    OutOfRange {
        key: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
    #[error("unknown setting {0:?}")]
    UnknownKey(String),
}
