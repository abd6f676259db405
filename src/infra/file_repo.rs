//! Plain-file repository: JSON channel state, a text URL list and line-per-config files.
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::Serialize;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::domain::channel::{channel_url, ChannelRecord};
use crate::domain::model::PathsConfig;
use crate::domain::proxy::patterns::channel_names;
use crate::domain::roster::{normalize_channel_names, ChannelMap};
use crate::ports::repo::Repo;

pub struct FileRepo {
    paths: PathsConfig,
}

impl FileRepo {
    pub fn new(paths: PathsConfig) -> Self {
        Self { paths }
    }
}

/// `{stem}-backup-{timestamp}{suffix}` next to the original file.
pub fn backup_path(path: &Path, timestamp: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    path.with_file_name(format!("{stem}-backup-{timestamp}{suffix}"))
}

/// Serializes with a four-space indent; map keys come out in sorted order.
fn to_json_pretty<T: Serialize>(value: &T) -> Result<Vec<u8>, String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser).map_err(|e| e.to_string())?;
    buf.push(b'\n');
    Ok(buf)
}

async fn ensure_parent(path: &Path) -> Result<(), String> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            fs::create_dir_all(dir).await.map_err(|e| e.to_string())
        }
        _ => Ok(()),
    }
}

/// Writes to a sibling temp file, then renames it over `path`.
async fn write_atomic(path: &Path, content: &[u8]) -> Result<(), String> {
    ensure_parent(path).await?;
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);
    fs::write(&tmp, content).await.map_err(|e| e.to_string())?;
    fs::rename(&tmp, path).await.map_err(|e| e.to_string())
}

async fn read_optional(path: &Path) -> Result<Option<String>, String> {
    match fs::read_to_string(path).await {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(format!("{}: {e}", path.display())),
    }
}

fn join_lines(lines: &[String]) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}

#[async_trait::async_trait]
impl Repo for FileRepo {
    async fn load_channels(&self) -> Result<ChannelMap, String> {
        let path = &self.paths.channels;
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "Channel state not found, starting empty");
                return Ok(ChannelMap::new());
            }
            Err(e) => return Err(format!("{}: {e}", path.display())),
        };
        // Invalid UTF-8 counts as corrupt.
        match serde_json::from_slice::<BTreeMap<String, ChannelRecord>>(&bytes) {
            Ok(raw) => {
                let channels = normalize_channel_names(raw);
                info!(path = %path.display(), count = channels.len(), "Loaded channel state");
                Ok(channels)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Channel state is corrupt, starting empty");
                Ok(ChannelMap::new())
            }
        }
    }

    async fn save_channels(&self, channels: &ChannelMap) -> Result<(), String> {
        let path = &self.paths.channels;
        let content = to_json_pretty(channels)?;
        write_atomic(path, &content).await?;
        info!(path = %path.display(), count = channels.len(), "Saved channel state");
        Ok(())
    }

    async fn load_channel_names(&self) -> Result<Vec<String>, String> {
        let path = &self.paths.urls;
        let content = read_optional(path)
            .await?
            .ok_or_else(|| format!("channel list not found at {}", path.display()))?;
        let names = channel_names(&content);
        info!(path = %path.display(), count = names.len(), "Loaded channel names");
        Ok(names)
    }

    async fn save_channel_urls(&self, names: &[String]) -> Result<(), String> {
        let path = &self.paths.urls;
        let mut sorted: Vec<&String> = names.iter().collect();
        sorted.sort();
        sorted.dedup();
        let lines: Vec<String> = sorted
            .into_iter()
            .map(|n| channel_url(n))
            .collect();
        write_atomic(path, join_lines(&lines).as_bytes()).await?;
        info!(path = %path.display(), count = lines.len(), "Saved channel URLs");
        Ok(())
    }

    async fn backup(&self) -> Result<Vec<PathBuf>, String> {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S_%6f").to_string();
        let mut moved = Vec::new();
        for path in [&self.paths.channels, &self.paths.urls] {
            if !fs::try_exists(path).await.unwrap_or(false) {
                debug!(path = %path.display(), "Nothing to back up");
                continue;
            }
            let target = backup_path(path, &timestamp);
            fs::rename(path, &target)
                .await
                .map_err(|e| format!("backup {}: {e}", path.display()))?;
            info!(from = %path.display(), to = %target.display(), "Backed up file");
            moved.push(target);
        }
        Ok(moved)
    }

    async fn append_raw_configs(&self, lines: &[String]) -> Result<(), String> {
        if lines.is_empty() {
            return Ok(());
        }
        let path = &self.paths.configs_raw;
        ensure_parent(path).await?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| e.to_string())?;
        file.write_all(join_lines(lines).as_bytes())
            .await
            .map_err(|e| e.to_string())?;
        file.flush().await.map_err(|e| e.to_string())?;
        debug!(path = %path.display(), count = lines.len(), "Appended raw configs");
        Ok(())
    }

    async fn load_raw_lines(&self) -> Result<Vec<String>, String> {
        let path = &self.paths.configs_raw;
        let content = read_optional(path)
            .await?
            .ok_or_else(|| format!("raw config file not found at {}", path.display()))?;
        let lines: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        info!(path = %path.display(), count = lines.len(), "Loaded raw configs");
        Ok(lines)
    }

    async fn save_clean_configs(&self, lines: &[String]) -> Result<(), String> {
        let path = &self.paths.configs_clean;
        write_atomic(path, join_lines(lines).as_bytes()).await?;
        info!(path = %path.display(), count = lines.len(), "Saved clean configs");
        Ok(())
    }
}
