use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::types::ServiceUnitId;

/// Runtime settings of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub log_level: String,
    /// Rescale the billing shares of active tenants to one before allocating
    pub normalize_shares: bool,
    pub lock_timeout_ms: u64,
    /// Upper bound of a single calculation, `None` for no deadline
    pub calculation_deadline_ms: Option<u64>,
    pub worker_threads: usize,
    pub default_service_unit: ServiceUnitId,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            normalize_shares: false,
            lock_timeout_ms: 5_000,
            calculation_deadline_ms: None,
            worker_threads: 4,
            default_service_unit: ServiceUnitId(1),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a boolean, got {value:?}")]
    InvalidBool { key: &'static str, value: String },
    #[error("{key} must be a non-negative integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },
    #[error("LEASE_WORKER_THREADS must be at least 1")]
    NoWorkers,
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key,
            value: value.to_string(),
        }),
    }
}

fn parse_number(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidNumber {
            key,
            value: value.to_string(),
        })
}

impl EngineConfig {
    /// Read `LEASE_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; missing keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let log_level = lookup("LEASE_LOG_LEVEL").unwrap_or(defaults.log_level);
        let normalize_shares = match lookup("LEASE_NORMALIZE_SHARES") {
            Some(value) => parse_bool("LEASE_NORMALIZE_SHARES", &value)?,
            None => defaults.normalize_shares,
        };
        let lock_timeout_ms = match lookup("LEASE_LOCK_TIMEOUT_MS") {
            Some(value) => parse_number("LEASE_LOCK_TIMEOUT_MS", &value)?,
            None => defaults.lock_timeout_ms,
        };
        let calculation_deadline_ms = match lookup("LEASE_CALCULATION_DEADLINE_MS") {
            Some(value) if value.trim().is_empty() => None,
            Some(value) => Some(parse_number("LEASE_CALCULATION_DEADLINE_MS", &value)?),
            None => defaults.calculation_deadline_ms,
        };
        let worker_threads = match lookup("LEASE_WORKER_THREADS") {
            Some(value) => parse_number("LEASE_WORKER_THREADS", &value)? as usize,
            None => defaults.worker_threads,
        };
        if worker_threads == 0 {
            return Err(ConfigError::NoWorkers);
        }
        let default_service_unit = match lookup("LEASE_DEFAULT_SERVICE_UNIT") {
            Some(value) => ServiceUnitId(parse_number("LEASE_DEFAULT_SERVICE_UNIT", &value)?),
            None => defaults.default_service_unit,
        };

        Ok(Self {
            log_level,
            normalize_shares,
            lock_timeout_ms,
            calculation_deadline_ms,
            worker_threads,
            default_service_unit,
        })
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn calculation_deadline(&self) -> Option<Duration> {
        self.calculation_deadline_ms.map(Duration::from_millis)
    }
}
