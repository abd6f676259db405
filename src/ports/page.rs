//! Extracts post ids and message texts from a channel page.
pub trait PageExtractor: Send + Sync {
    /// `data-post` values (`channel/123`) of the messages on the page, in page order.
    fn post_refs(&self, html: &str) -> Vec<String>;

    /// Text of every message body on the page.
    fn message_texts(&self, html: &str) -> Vec<String>;

    /// Numeric post ids, taken from the last path segment of each `data-post`.
    fn post_ids(&self, html: &str) -> Vec<i64> {
        self.post_refs(html)
            .iter()
            .filter_map(|r| r.rsplit('/').next()?.trim().parse().ok())
            .collect()
    }
}
