//! HTTP abstraction returning a lightweight GET result.
use crate::domain::model::FetchResult;

#[async_trait::async_trait]
pub trait Http: Send + Sync {
    async fn get(&self, url: &str) -> FetchResult;
}
