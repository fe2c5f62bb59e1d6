use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub targets: TargetsConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub delays: DelaysConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub errors: ErrorsConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TargetsConfig {
    /// CSV directory of targets (one row per school).
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    #[serde(default = "default_max_targets_per_day")]
    pub max_targets_per_day: usize,
    /// Scraping is suppressed before this date unless forced.
    #[serde(default = "default_season_start")]
    pub season_start: NaiveDate,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            max_targets_per_day: default_max_targets_per_day(),
            season_start: default_season_start(),
        }
    }
}

fn default_max_targets_per_day() -> usize {
    50
}
fn default_season_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()
}

/// Randomized delay windows in seconds, `[min, max]` per class.
#[derive(Debug, Deserialize, Clone)]
pub struct DelaysConfig {
    #[serde(default = "default_between_requests")]
    pub between_requests: [f64; 2],
    #[serde(default = "default_between_pages")]
    pub between_pages_same_target: [f64; 2],
    #[serde(default = "default_between_targets")]
    pub between_targets: [f64; 2],
}

impl Default for DelaysConfig {
    fn default() -> Self {
        Self {
            between_requests: default_between_requests(),
            between_pages_same_target: default_between_pages(),
            between_targets: default_between_targets(),
        }
    }
}

fn default_between_requests() -> [f64; 2] {
    [5.0, 10.0]
}
fn default_between_pages() -> [f64; 2] {
    [8.0, 15.0]
}
fn default_between_targets() -> [f64; 2] {
    [20.0, 40.0]
}

#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    #[serde(default = "default_max_requests_per_hour")]
    pub max_requests_per_hour: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_requests_per_hour: default_max_requests_per_hour(),
        }
    }
}

fn default_max_requests_per_hour() -> u32 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct ErrorsConfig {
    /// Timeout retry backoff: `retry_delay_base * attempt`, capped below.
    #[serde(default = "default_retry_delay_base")]
    pub retry_delay_base: f64,
    #[serde(default = "default_retry_delay_max")]
    pub retry_delay_max: f64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_consecutive_failures_limit")]
    pub consecutive_failures_limit: u32,
    /// Seconds to sleep when the circuit breaker trips.
    #[serde(default = "default_circuit_breaker_cooldown")]
    pub circuit_breaker_cooldown: f64,
    #[serde(default = "default_stop_signals")]
    pub stop_signals: Vec<u16>,
}

impl Default for ErrorsConfig {
    fn default() -> Self {
        Self {
            retry_delay_base: default_retry_delay_base(),
            retry_delay_max: default_retry_delay_max(),
            max_retries: default_max_retries(),
            consecutive_failures_limit: default_consecutive_failures_limit(),
            circuit_breaker_cooldown: default_circuit_breaker_cooldown(),
            stop_signals: default_stop_signals(),
        }
    }
}

fn default_retry_delay_base() -> f64 {
    60.0
}
fn default_retry_delay_max() -> f64 {
    300.0
}
fn default_max_retries() -> u32 {
    3
}
fn default_consecutive_failures_limit() -> u32 {
    5
}
fn default_circuit_breaker_cooldown() -> f64 {
    1800.0
}
fn default_stop_signals() -> Vec<u16> {
    vec![429, 403, 503]
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrowserConfig {
    #[serde(default = "default_page_load_timeout_ms")]
    pub page_load_timeout_ms: u64,
    /// Cap on browser-rendered targets in a single run.
    #[serde(default = "default_max_targets_per_run")]
    pub max_targets_per_run: usize,
    #[serde(default = "default_subprocess_timeout_secs")]
    pub subprocess_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            page_load_timeout_ms: default_page_load_timeout_ms(),
            max_targets_per_run: default_max_targets_per_run(),
            subprocess_timeout_secs: default_subprocess_timeout_secs(),
        }
    }
}

fn default_page_load_timeout_ms() -> u64 {
    30_000
}
fn default_max_targets_per_run() -> usize {
    50
}
fn default_subprocess_timeout_secs() -> u64 {
    120
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    for (name, window) in [
        ("delays.between_requests", config.delays.between_requests),
        (
            "delays.between_pages_same_target",
            config.delays.between_pages_same_target,
        ),
        ("delays.between_targets", config.delays.between_targets),
    ] {
        if window[0] < 0.0 || window[1] < window[0] {
            anyhow::bail!("{name} must be a [min, max] window with 0 <= min <= max");
        }
    }

    if config.limits.max_requests_per_hour == 0 {
        anyhow::bail!("limits.max_requests_per_hour must be > 0");
    }

    if config.errors.consecutive_failures_limit == 0 {
        anyhow::bail!("errors.consecutive_failures_limit must be > 0");
    }

    if config.errors.retry_delay_max < config.errors.retry_delay_base {
        anyhow::bail!("errors.retry_delay_max must be >= errors.retry_delay_base");
    }

    if config.schedule.max_targets_per_day == 0 {
        anyhow::bail!("schedule.max_targets_per_day must be > 0");
    }

    if config.browser.max_targets_per_run == 0 {
        anyhow::bail!("browser.max_targets_per_run must be > 0");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, toml_str).unwrap();
        load_config(&path)
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let config = parse(
            r#"
            [store]
            path = "dugout.db"
            [targets]
            path = "targets.csv"
            "#,
        )
        .unwrap();
        assert_eq!(config.limits.max_requests_per_hour, 300);
        assert_eq!(config.errors.consecutive_failures_limit, 5);
        assert_eq!(config.errors.stop_signals, vec![429, 403, 503]);
        assert_eq!(config.delays.between_requests, [5.0, 10.0]);
        assert_eq!(config.browser.max_targets_per_run, 50);
        assert_eq!(config.browser.subprocess_timeout_secs, 120);
    }

    #[test]
    fn inverted_delay_window_is_rejected() {
        let err = parse(
            r#"
            [store]
            path = "dugout.db"
            [targets]
            path = "targets.csv"
            [delays]
            between_requests = [10.0, 5.0]
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("between_requests"));
    }

    #[test]
    fn zero_hourly_cap_is_rejected() {
        let err = parse(
            r#"
            [store]
            path = "dugout.db"
            [targets]
            path = "targets.csv"
            [limits]
            max_requests_per_hour = 0
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("max_requests_per_hour"));
    }
}
