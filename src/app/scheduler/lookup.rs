//! First/last post lookups against a channel's preview page.
use tracing::debug;

use crate::domain::channel::{
    channel_url, channel_url_after, FIRST_POST_SENTINEL, LAST_POST_SENTINEL,
};
use crate::ports::{http::Http, page::PageExtractor};

#[derive(Debug, Clone, Copy)]
enum PostIndex {
    First,
    Last,
}

async fn extract_post_id<H, P>(http: &H, page: &P, url: &str, index: PostIndex, default: i64) -> i64
where
    H: Http + ?Sized,
    P: PageExtractor + ?Sized,
{
    let result = http.get(url).await;
    let Some(html) = result.text() else {
        debug!(url, status = ?result.status, error = ?result.error, "Failed to fetch post ids");
        return default;
    };

    let refs = page.post_refs(html);
    let picked = match index {
        PostIndex::First => refs.first(),
        PostIndex::Last => refs.last(),
    };
    let Some(post_ref) = picked else {
        debug!(url, "No posts found on page");
        return default;
    };

    match post_ref.rsplit('/').next().map(str::trim).map(str::parse::<i64>) {
        Some(Ok(id)) => id,
        _ => {
            debug!(url, post = %post_ref, "Unparseable post reference");
            default
        }
    }
}

/// Id of the newest post, or `LAST_POST_SENTINEL` when the page yields none.
pub async fn get_last_post_id<H, P>(http: &H, page: &P, name: &str) -> i64
where
    H: Http + ?Sized,
    P: PageExtractor + ?Sized,
{
    extract_post_id(http, page, &channel_url(name), PostIndex::Last, LAST_POST_SENTINEL).await
}

/// Id of the oldest reachable post, or `FIRST_POST_SENTINEL`.
pub async fn get_first_post_id<H, P>(http: &H, page: &P, name: &str) -> i64
where
    H: Http + ?Sized,
    P: PageExtractor + ?Sized,
{
    extract_post_id(
        http,
        page,
        &channel_url_after(name, FIRST_POST_SENTINEL),
        PostIndex::First,
        FIRST_POST_SENTINEL,
    )
    .await
}
