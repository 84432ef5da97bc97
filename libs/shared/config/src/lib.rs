use std::env;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

const DEFAULT_MAX_RANGE_DAYS: i64 = 366;
const DEFAULT_EXCEPTION_HORIZON_DAYS: i64 = 366;
const DEFAULT_LOG_FILTER: &str = "info";
const MAX_DAYS: i64 = 3650;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Longest date range a single generation/expansion/resolution call may cover.
    pub max_range_days: i64,
    /// How far ahead recurring exceptions are expanded when checking same-type overlap.
    pub exception_horizon_days: i64,
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_range_days: DEFAULT_MAX_RANGE_DAYS,
            exception_horizon_days: DEFAULT_EXCEPTION_HORIZON_DAYS,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl AppConfig {
    /// Loads `.env` (if any) and then reads the process environment.
    pub fn load() -> Self {
        dotenv::dotenv().ok();
        Self::from_env()
    }

    /// Reads the environment, falling back to defaults on anything missing or invalid.
    pub fn from_env() -> Self {
        match Self::try_from_env() {
            Ok(config) => config,
            Err(e) => {
                warn!("Invalid scheduling configuration ({:#}), using defaults", e);
                Self::default()
            }
        }
    }

    pub fn try_from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. Missing keys use defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_range_days = parse_days(&lookup, "SCHEDULING_MAX_RANGE_DAYS", DEFAULT_MAX_RANGE_DAYS)?;
        let exception_horizon_days = parse_days(
            &lookup,
            "SCHEDULING_EXCEPTION_HORIZON_DAYS",
            DEFAULT_EXCEPTION_HORIZON_DAYS,
        )?;

        let log_filter = lookup("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(Self {
            max_range_days,
            exception_horizon_days,
            log_filter,
        })
    }
}

fn parse_days<F>(lookup: &F, key: &str, default: i64) -> Result<i64>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => {
            let days: i64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{} must be an integer, got {:?}", key, raw))?;
            if days <= 0 || days > MAX_DAYS {
                anyhow::bail!("{} must be between 1 and {}, got {}", key, MAX_DAYS, days);
            }
            Ok(days)
        }
        None => {
            warn!("{} not set, using default {}", key, default);
            Ok(default)
        }
    }
}
