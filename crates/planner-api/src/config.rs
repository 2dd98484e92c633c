use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use planner_core::SyncLimits;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database_path: PathBuf,
    pub db_busy_timeout: Duration,
    pub request_timeout: Duration,
    pub limits: SyncLimits,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "PLANNER_API_BIND_ADDR", "127.0.0.1:8080");
        let database_path =
            PathBuf::from(value_or_default(&lookup, "PLANNER_DATABASE_PATH", "planner.db"));

        let db_busy_timeout_ms =
            bounded_u64(&lookup, "PLANNER_DB_BUSY_TIMEOUT_MS", 5_000, 100, 60_000)?;
        let request_timeout_secs =
            bounded_u64(&lookup, "PLANNER_REQUEST_TIMEOUT_SECS", 30, 1, 300)?;

        let max_pull_batch = bounded_usize(&lookup, "PULL_BATCH_MAX", 1_000, 1, 10_000)?;
        let default_pull_batch = bounded_usize(
            &lookup,
            "PULL_BATCH_DEFAULT",
            100_usize.min(max_pull_batch),
            1,
            max_pull_batch,
        )?;
        let max_push_batch = bounded_usize(&lookup, "PUSH_BATCH_MAX", 200, 1, 5_000)?;

        Ok(Self {
            bind_addr,
            database_path,
            db_busy_timeout: Duration::from_millis(db_busy_timeout_ms),
            request_timeout: Duration::from_secs(request_timeout_secs),
            limits: SyncLimits {
                default_pull_batch,
                max_pull_batch,
                max_push_batch,
            },
        })
    }
}

fn bounded_u64(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
    min: u64,
    max: u64,
) -> Result<u64, ConfigError> {
    let value = optional_trimmed(lookup, name)
        .map(|raw| {
            raw.parse::<u64>().map_err(|_| {
                ConfigError::Invalid(format!("{name} must be an integer in [{min}, {max}]"))
            })
        })
        .transpose()?
        .unwrap_or(default);
    if !(min..=max).contains(&value) {
        return Err(ConfigError::Invalid(format!("{name} must be in [{min}, {max}]")));
    }
    Ok(value)
}

fn bounded_usize(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: usize,
    min: usize,
    max: usize,
) -> Result<usize, ConfigError> {
    let value = bounded_u64(lookup, name, default as u64, min as u64, max as u64)?;
    usize::try_from(value)
        .map_err(|_| ConfigError::Invalid(format!("{name} does not fit this platform")))
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
