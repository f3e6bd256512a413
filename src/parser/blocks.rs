use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

static BLOCK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, h4, h5, h6, li, p, span, div").unwrap());
static BODY_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").unwrap());

/// Cheap noise band for element text, in characters.
const MIN_BLOCK_CHARS: usize = 3;
const MAX_BLOCK_CHARS: usize = 180;

/// Whitespace-collapsed text of every heading/list/paragraph/span/div element,
/// in document order, kept only when its length falls in the noise band.
///
/// Nested elements each contribute their own block, so a `li > span` pair
/// yields two overlapping texts.
pub fn text_blocks(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    doc.select(&BLOCK_SELECTOR)
        .map(collapsed_text)
        .filter(|t| {
            let n = t.chars().count();
            (MIN_BLOCK_CHARS..=MAX_BLOCK_CHARS).contains(&n)
        })
        .collect()
}

/// Visible-ish text of the `<body>` (whole document when there is no body).
pub fn body_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    match doc.select(&BODY_SELECTOR).next() {
        Some(body) => collapsed_text(body),
        None => doc.root_element().text().collect::<Vec<_>>().join(" "),
    }
}

fn collapsed_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
