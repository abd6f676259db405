//! Loads the optional TOML config file and normalizes it into `AppConfig`.
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use tokio::fs;
use tracing::debug;

use crate::domain::model::{AppConfig, CleanerConfig, PathsConfig, ScrapeConfig};
use crate::domain::pipeline::parse_field_list;

pub const BATCH_EXTRACT_RANGE: (usize, usize) = (1, 100);
pub const BATCH_UPDATE_RANGE: (usize, usize) = (1, 1000);
pub const TIMEOUT_RANGE: (f64, f64) = (0.1, 100.0);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, Default)]
struct RawConfigFile {
    #[serde(default)]
    paths: RawPaths,
    #[serde(default)]
    scrape: RawScrape,
    #[serde(default)]
    cleaner: RawCleaner,
    #[serde(default)]
    logging: RawLogging,
}

#[derive(Debug, Deserialize)]
struct RawPaths {
    #[serde(default = "default_channels_path")]
    channels: String,
    #[serde(default = "default_urls_path")]
    urls: String,
    #[serde(default = "default_configs_raw_path")]
    configs_raw: String,
    #[serde(default = "default_configs_clean_path")]
    configs_clean: String,
}

impl Default for RawPaths {
    fn default() -> Self {
        Self {
            channels: default_channels_path(),
            urls: default_urls_path(),
            configs_raw: default_configs_raw_path(),
            configs_clean: default_configs_clean_path(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawScrape {
    #[serde(default = "default_batch_extract")]
    batch_extract: usize,
    #[serde(default = "default_batch_update")]
    batch_update: usize,
    #[serde(default = "default_timeout_seconds")]
    timeout_seconds: f64,
    #[serde(default)]
    sequential: bool,
    #[serde(default = "default_user_agent")]
    user_agent: String,
}

impl Default for RawScrape {
    fn default() -> Self {
        Self {
            batch_extract: default_batch_extract(),
            batch_update: default_batch_update(),
            timeout_seconds: default_timeout_seconds(),
            sequential: false,
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawCleaner {
    #[serde(default = "default_true")]
    normalize: bool,
    #[serde(default)]
    duplicate: Option<RawFieldList>,
    #[serde(default)]
    filter: Option<String>,
    #[serde(default)]
    sort: Option<RawFieldList>,
    #[serde(default)]
    reverse: bool,
}

impl Default for RawCleaner {
    fn default() -> Self {
        Self {
            normalize: true,
            duplicate: None,
            filter: None,
            sort: None,
            reverse: false,
        }
    }
}

/// Field lists accept either `"a, b c"` or `["a", "b"]`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawFieldList {
    Text(String),
    List(Vec<String>),
}

#[derive(Debug, Deserialize, Default)]
struct RawLogging {
    level: Option<String>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `config_path` if it exists; a missing file yields the built-in defaults
    /// with paths resolved against the file's directory.
    pub async fn load(config_path: &Path) -> Result<AppConfig, ConfigError> {
        let raw_cfg: RawConfigFile = match fs::read_to_string(config_path).await {
            Ok(content) => toml::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %config_path.display(), "Config file not found, using defaults");
                RawConfigFile::default()
            }
            Err(e) => return Err(e.into()),
        };

        let base_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(AppConfig {
            paths: PathsConfig {
                channels: resolve_path(&base_dir, &raw_cfg.paths.channels),
                urls: resolve_path(&base_dir, &raw_cfg.paths.urls),
                configs_raw: resolve_path(&base_dir, &raw_cfg.paths.configs_raw),
                configs_clean: resolve_path(&base_dir, &raw_cfg.paths.configs_clean),
            },
            scrape: parse_scrape(raw_cfg.scrape)?,
            cleaner: parse_cleaner(raw_cfg.cleaner)?,
            log_level: normalize_log_level(raw_cfg.logging.level.as_deref().unwrap_or("info"))?,
        })
    }
}

fn parse_scrape(raw: RawScrape) -> Result<ScrapeConfig, ConfigError> {
    let user_agent = raw.user_agent.trim().to_string();
    if user_agent.is_empty() {
        return Err(ConfigError::Invalid("scrape.user_agent cannot be empty".into()));
    }
    Ok(ScrapeConfig {
        batch_extract: validate_batch_extract(raw.batch_extract)?,
        batch_update: validate_batch_update(raw.batch_update)?,
        timeout: validate_timeout(raw.timeout_seconds)?,
        sequential: raw.sequential,
        user_agent,
    })
}

fn parse_cleaner(raw: RawCleaner) -> Result<CleanerConfig, ConfigError> {
    let filter = raw
        .filter
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty());
    Ok(CleanerConfig {
        normalize: raw.normalize,
        duplicate: field_list("cleaner.duplicate", raw.duplicate)?,
        filter,
        sort: field_list("cleaner.sort", raw.sort)?,
        reverse: raw.reverse,
    })
}

fn field_list(key: &str, raw: Option<RawFieldList>) -> Result<Vec<String>, ConfigError> {
    let text = match raw {
        None => return Ok(Vec::new()),
        Some(RawFieldList::Text(s)) => s,
        Some(RawFieldList::List(items)) => items.join(","),
    };
    validate_field_list(key, &text)
}

/// Validates a comma/whitespace separated field list such as `protocol, host port`.
pub fn validate_field_list(key: &str, text: &str) -> Result<Vec<String>, ConfigError> {
    parse_field_list(text).map_err(|e| ConfigError::Invalid(format!("{key}: {e}")))
}

pub fn validate_batch_extract(n: usize) -> Result<usize, ConfigError> {
    check_range("batch_extract", n, BATCH_EXTRACT_RANGE)
}

pub fn validate_batch_update(n: usize) -> Result<usize, ConfigError> {
    check_range("batch_update", n, BATCH_UPDATE_RANGE)
}

pub fn validate_timeout(seconds: f64) -> Result<Duration, ConfigError> {
    let (min, max) = TIMEOUT_RANGE;
    if !seconds.is_finite() || seconds < min || seconds > max {
        return Err(ConfigError::Invalid(format!(
            "timeout must be between {min} and {max} seconds, got {seconds}"
        )));
    }
    Ok(Duration::from_secs_f64(seconds))
}

fn check_range(key: &str, n: usize, (min, max): (usize, usize)) -> Result<usize, ConfigError> {
    if n < min || n > max {
        return Err(ConfigError::Invalid(format!(
            "{key} must be between {min} and {max}, got {n}"
        )));
    }
    Ok(n)
}

pub fn normalize_log_level(level: &str) -> Result<String, ConfigError> {
    let l = level.trim().to_ascii_lowercase();
    match l.as_str() {
        "error" | "warn" | "info" | "debug" | "trace" | "off" => Ok(l),
        _ => Err(ConfigError::Invalid(format!(
            "invalid logging.level '{level}', expected error|warn|info|debug|trace|off"
        ))),
    }
}

fn resolve_path(base_dir: &Path, p: &str) -> PathBuf {
    let path = Path::new(p);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn default_channels_path() -> String {
    "channels.json".to_string()
}

fn default_urls_path() -> String {
    "urls.txt".to_string()
}

fn default_configs_raw_path() -> String {
    "configs-raw.txt".to_string()
}

fn default_configs_clean_path() -> String {
    "configs-clean.txt".to_string()
}

fn default_batch_extract() -> usize {
    20
}

fn default_batch_update() -> usize {
    100
}

fn default_timeout_seconds() -> f64 {
    30.0
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string()
}
