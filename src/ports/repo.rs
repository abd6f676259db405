//! Persistence port for channel state, the channel URL list and config files.
use std::path::PathBuf;

use crate::domain::roster::ChannelMap;

#[async_trait::async_trait]
pub trait Repo: Send + Sync {
    /// Channel state keyed by lower-cased name. Missing or corrupt state loads as empty.
    async fn load_channels(&self) -> Result<ChannelMap, String>;
    async fn save_channels(&self, channels: &ChannelMap) -> Result<(), String>;

    /// Channel names referenced by the URL list, lower-cased, in file order.
    async fn load_channel_names(&self) -> Result<Vec<String>, String>;
    /// Rewrites the URL list with one channel link per name, sorted.
    async fn save_channel_urls(&self, names: &[String]) -> Result<(), String>;

    /// Moves the state file and URL list aside under timestamped names.
    async fn backup(&self) -> Result<Vec<PathBuf>, String>;

    async fn append_raw_configs(&self, lines: &[String]) -> Result<(), String>;
    async fn load_raw_lines(&self) -> Result<Vec<String>, String>;
    async fn save_clean_configs(&self, lines: &[String]) -> Result<(), String>;
}
