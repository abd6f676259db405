//! `scraper`-backed page extractor for public channel preview pages.
use scraper::{Html, Selector};
use tracing::warn;

use crate::ports::page::PageExtractor;

const POST_SELECTOR: &str =
    r#"div[class="tgme_widget_message text_not_supported_wrap js-widget_message"]"#;
const TEXT_SELECTOR: &str = r#"div[class="tgme_widget_message_text js-message_text"]"#;

pub struct HtmlPageExtractor {
    posts: Option<Selector>,
    texts: Option<Selector>,
}

impl HtmlPageExtractor {
    pub fn new() -> Self {
        Self {
            posts: parse_selector(POST_SELECTOR),
            texts: parse_selector(TEXT_SELECTOR),
        }
    }
}

impl Default for HtmlPageExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_selector(s: &str) -> Option<Selector> {
    match Selector::parse(s) {
        Ok(sel) => Some(sel),
        Err(e) => {
            warn!(selector = s, error = ?e, "Invalid selector");
            None
        }
    }
}

impl PageExtractor for HtmlPageExtractor {
    fn post_refs(&self, html: &str) -> Vec<String> {
        let Some(sel) = &self.posts else {
            return Vec::new();
        };
        let document = Html::parse_document(html);
        document
            .select(sel)
            .filter_map(|el| el.value().attr("data-post"))
            .map(str::to_string)
            .collect()
    }

    fn message_texts(&self, html: &str) -> Vec<String> {
        let Some(sel) = &self.texts else {
            return Vec::new();
        };
        let document = Html::parse_document(html);
        // Each text node separately: links and line breaks split a message.
        document
            .select(sel)
            .flat_map(|el| el.text())
            .map(str::to_string)
            .collect()
    }
}
