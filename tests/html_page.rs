use v2scrape::infra::html_page::HtmlPageExtractor;
use v2scrape::ports::page::PageExtractor;

const PAGE: &str = r#"<html><body>
<div class="tgme_widget_message text_not_supported_wrap js-widget_message" data-post="news/41">
  <div class="tgme_widget_message_text js-message_text">first <b>vless://u@a.com:443</b><br/>second line</div>
</div>
<div class="tgme_widget_message js-widget_message" data-post="news/99">
  <div class="tgme_widget_message_text">not a channel post body</div>
</div>
<div class="tgme_widget_message text_not_supported_wrap js-widget_message" data-post="news/42">
  <div class="tgme_widget_message_text js-message_text">trojan://p@b.com:443</div>
</div>
<div class="tgme_widget_message text_not_supported_wrap js-widget_message" data-post="news/abc"></div>
</body></html>"#;

#[test]
fn post_refs_use_exact_message_class() {
    let page = HtmlPageExtractor::new();
    assert_eq!(page.post_refs(PAGE), vec!["news/41", "news/42", "news/abc"]);
    assert_eq!(page.post_ids(PAGE), vec![41, 42]);
}

#[test]
fn message_texts_split_on_markup() {
    let page = HtmlPageExtractor::new();
    assert_eq!(
        page.message_texts(PAGE),
        vec!["first ", "vless://u@a.com:443", "second line", "trojan://p@b.com:443"]
    );
}

#[test]
fn empty_document_has_no_posts() {
    let page = HtmlPageExtractor::default();
    assert!(page.post_refs("").is_empty());
    assert!(page.message_texts("<p>hello</p>").is_empty());
}
