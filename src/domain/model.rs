use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct PathsConfig {
    pub channels: PathBuf,
    pub urls: PathBuf,
    pub configs_raw: PathBuf,
    pub configs_clean: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub batch_extract: usize,
    pub batch_update: usize,
    pub timeout: Duration,
    pub sequential: bool,
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanerConfig {
    pub normalize: bool,
    pub duplicate: Vec<String>,
    pub filter: Option<String>,
    pub sort: Vec<String>,
    pub reverse: bool,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            normalize: true,
            duplicate: Vec::new(),
            filter: None,
            sort: Vec::new(),
            reverse: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub scrape: ScrapeConfig,
    pub cleaner: CleanerConfig,
    pub log_level: String,
}

impl ScrapeConfig {
    /// Width used by the update pass; sequential mode collapses it to one.
    pub fn update_width(&self) -> usize {
        if self.sequential {
            1
        } else {
            self.batch_update
        }
    }

    pub fn extract_width(&self) -> usize {
        if self.sequential {
            1
        } else {
            self.batch_extract
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Timeout,
    ConnectionFailure,
    Http4xx(u16),
    Http5xx(u16),
    Unexpected,
}

#[derive(Debug, Clone, Default)]
pub struct FetchResult {
    pub status: Option<u16>,
    pub body: Option<String>,
    pub error: Option<ErrorKind>,
    pub latency_ms: u64,
}

impl FetchResult {
    /// Page text when the fetch succeeded with a 2xx status and a non-empty body.
    pub fn text(&self) -> Option<&str> {
        if self.error.is_some() {
            return None;
        }
        match self.status {
            Some(s) if (200..300).contains(&s) => {}
            _ => return None,
        }
        self.body.as_deref().filter(|b| !b.trim().is_empty())
    }
}
