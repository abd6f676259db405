//! Walks a channel's unread posts page by page and appends every config URL found.
use futures::future;
use tracing::{debug, info};

use crate::domain::channel::{
    channel_url_after, get_normalized_current_id, ChannelRecord, DEFAULT_CURRENT_ID,
    POST_PAGE_STEP,
};
use crate::domain::proxy::extract_matches;
use crate::ports::{http::Http, page::PageExtractor, repo::Repo};

/// Config URLs found on the page starting after post `id`. Fetch failures yield none.
pub async fn fetch_page_configs<H, P>(http: &H, page: &P, name: &str, id: i64) -> (i64, Vec<String>)
where
    H: Http + ?Sized,
    P: PageExtractor + ?Sized,
{
    let url = channel_url_after(name, id);
    let result = http.get(&url).await;
    let Some(html) = result.text() else {
        debug!(
            channel = %name,
            current_id = id,
            status = ?result.status,
            error = ?result.error,
            "Empty or failed page fetch"
        );
        return (id, Vec::new());
    };

    let configs: Vec<String> = page
        .message_texts(html)
        .iter()
        .flat_map(|text| extract_matches(text))
        .map(|m| m.group("url").to_string())
        .filter(|u| !u.is_empty())
        .collect();
    (id, configs)
}

/// Page start ids from the channel's cursor up to (not including) `last_id`.
pub fn page_ids(record: &ChannelRecord) -> Vec<i64> {
    let start = get_normalized_current_id(record);
    (start..record.last_id)
        .step_by(POST_PAGE_STEP as usize)
        .collect()
}

/// Scans one channel in groups of `width` concurrent page fetches. Results of
/// a group are applied in page order; the cursor and count advance with each
/// page and every non-empty page is appended before the next one is applied.
/// Returns the number of configs found.
pub async fn extract_channel<R, H, P>(
    repo: &R,
    http: &H,
    page: &P,
    name: &str,
    record: &mut ChannelRecord,
    width: usize,
) -> Result<usize, String>
where
    R: Repo + ?Sized,
    H: Http + ?Sized,
    P: PageExtractor + ?Sized,
{
    let ids = page_ids(record);
    info!(channel = %name, pages = ids.len(), "Extracting configs");

    let mut found = 0usize;
    for group in ids.chunks(width.max(1)) {
        let results =
            future::join_all(group.iter().map(|&id| fetch_page_configs(http, page, name, id)))
                .await;

        for (id, configs) in results {
            record.current_id = id;
            if configs.is_empty() {
                continue;
            }
            found += configs.len();
            record.count += configs.len() as i64;
            repo.append_raw_configs(&configs).await?;
        }
    }

    record.current_id = record.last_id.max(DEFAULT_CURRENT_ID);
    info!(channel = %name, count = found, "Configs found");
    Ok(found)
}
