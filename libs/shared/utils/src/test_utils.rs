use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use shared_config::AppConfig;

/// Routes tracing output through the test harness. Safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .try_init();
}

pub struct TestConfig {
    pub max_range_days: i64,
    pub exception_horizon_days: i64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            max_range_days: 366,
            exception_horizon_days: 90,
        }
    }
}

impl TestConfig {
    pub fn with_max_range(days: i64) -> Self {
        Self {
            max_range_days: days,
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            max_range_days: self.max_range_days,
            exception_horizon_days: self.exception_horizon_days,
            log_filter: "debug".to_string(),
        }
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
}

pub fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).expect("valid test time")
}

/// UTC instant on `day` at `h:m`.
pub fn at(day: NaiveDate, h: u32, m: u32) -> DateTime<Utc> {
    day.and_time(time(h, m)).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Weekday};

    #[test]
    fn test_config_creation() {
        let config = TestConfig::with_max_range(14).to_app_config();
        assert_eq!(config.max_range_days, 14);
        assert_eq!(config.exception_horizon_days, 90);
    }

    #[test]
    fn test_time_helpers() {
        let monday = date(2025, 3, 3);
        assert_eq!(monday.weekday(), Weekday::Mon);
        assert_eq!(at(monday, 9, 30).to_rfc3339(), "2025-03-03T09:30:00+00:00");
    }
}
