use crate::bls::client::DEFAULT_BLS_URL;
use crate::cpi::remote::RetryPolicy;
use anyhow::{Result, anyhow};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

include!(concat!(env!("OUT_DIR"), "/cpi_env_allowlist.rs"));

pub const DEFAULT_SERIES_ID: &str = "CUUR0000SA0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CpiSeriesConfig {
    pub series_id: String,
    pub lookback_years: u32,
    pub overwrite_existing: bool,
}

impl Default for CpiSeriesConfig {
    fn default() -> Self {
        Self {
            series_id: DEFAULT_SERIES_ID.to_string(),
            lookback_years: 3,
            overwrite_existing: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CpiRemoteConfig {
    pub url: String,
    pub registration_key: Option<String>,
    pub timeout_secs: u64,
    pub chunk_years: u32,
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for CpiRemoteConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_BLS_URL.to_string(),
            registration_key: None,
            timeout_secs: 20,
            chunk_years: 20,
            max_attempts: 3,
            backoff_ms: 1500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CpiDailyConfig {
    pub timezone: String,
}

impl Default for CpiDailyConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CpiConfig {
    pub series: CpiSeriesConfig,
    pub remote: CpiRemoteConfig,
    pub daily: CpiDailyConfig,
}

impl CpiConfig {
    pub fn timezone(&self) -> Result<Tz> {
        let raw = self.daily.timezone.trim();
        raw.parse::<Tz>()
            .map_err(|err| anyhow!("invalid daily timezone `{raw}`: {err}"))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            chunk_years: self.remote.chunk_years,
            max_attempts: self.remote.max_attempts,
            backoff: Duration::from_millis(self.remote.backoff_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialCpiConfig {
    series: Option<CpiSeriesConfig>,
    remote: Option<CpiRemoteConfig>,
    daily: Option<CpiDailyConfig>,
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_u32(var: &str, fallback: u32) -> u32 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u32>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => {
            let trimmed = v.trim();
            match trimmed {
                "1" | "true" | "TRUE" | "yes" | "on" => true,
                "0" | "false" | "FALSE" | "no" | "off" => false,
                _ => fallback,
            }
        }
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn env_non_empty_first(vars: &[&str]) -> Option<String> {
    vars.iter().find_map(|var| match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    })
}

fn validate(cfg: &CpiConfig) -> Result<()> {
    if cfg.series.series_id.trim().is_empty() {
        return Err(anyhow!("invalid series id: cannot be empty"));
    }
    if cfg.remote.url.trim().is_empty() {
        return Err(anyhow!("invalid remote url: cannot be empty"));
    }
    if cfg.remote.timeout_secs == 0 {
        return Err(anyhow!("invalid remote timeout: must be >= 1 second"));
    }
    if cfg.remote.chunk_years == 0 {
        return Err(anyhow!("invalid remote chunk size: must be >= 1 year"));
    }
    if cfg.remote.max_attempts == 0 {
        return Err(anyhow!("invalid remote max attempts: must be >= 1"));
    }
    cfg.timezone()?;
    Ok(())
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var("CPI_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    let home = dirs::home_dir()?;
    Some(home.join(".debase").join("cpi.toml"))
}

fn merge_partial(base: &mut CpiConfig, parsed: PartialCpiConfig) {
    if let Some(series) = parsed.series {
        base.series = series;
    }
    if let Some(remote) = parsed.remote {
        base.remote = remote;
    }
    if let Some(daily) = parsed.daily {
        base.daily = daily;
    }
}

fn merge_file_config(base: &mut CpiConfig) -> Result<()> {
    let Some(path) = resolve_config_path() else {
        return Ok(());
    };
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)?;
    let parsed: PartialCpiConfig = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse cpi config {}: {err}", path.display()))?;
    merge_partial(base, parsed);
    Ok(())
}

pub fn load_config() -> Result<CpiConfig> {
    let mut cfg = CpiConfig::default();
    merge_file_config(&mut cfg)?;

    cfg.series.series_id = env_or_string("CPI_SERIES_ID", &cfg.series.series_id);
    cfg.series.lookback_years = env_or_u32("CPI_LOOKBACK_YEARS", cfg.series.lookback_years);
    cfg.series.overwrite_existing =
        env_or_bool("CPI_OVERWRITE_EXISTING", cfg.series.overwrite_existing);
    cfg.remote.url = env_or_string("CPI_BLS_URL", &cfg.remote.url);
    if let Some(key) = env_non_empty_first(&["CPI_BLS_REGISTRATION_KEY", "BLS_API_KEY"]) {
        cfg.remote.registration_key = Some(key);
    }
    cfg.remote.timeout_secs = env_or_u64("CPI_REQUEST_TIMEOUT_SECS", cfg.remote.timeout_secs);
    cfg.remote.chunk_years = env_or_u32("CPI_CHUNK_YEARS", cfg.remote.chunk_years);
    cfg.remote.max_attempts = env_or_u32("CPI_MAX_ATTEMPTS", cfg.remote.max_attempts);
    cfg.remote.backoff_ms = env_or_u64("CPI_RETRY_BACKOFF_MS", cfg.remote.backoff_ms);
    cfg.daily.timezone = env_or_string("CPI_TIMEZONE", &cfg.daily.timezone);

    validate(&cfg)?;
    Ok(cfg)
}

/// `CPI_*` variables set in the environment that nothing in this binary reads.
pub fn unknown_env_keys() -> Vec<String> {
    let mut out: Vec<String> = env::vars_os()
        .filter_map(|(key, _)| key.into_string().ok())
        .filter(|key| key.starts_with("CPI_"))
        .filter(|key| !GENERATED_CPI_ENV_ALLOWLIST.contains(&key.as_str()))
        .collect();
    out.sort();
    out
}
