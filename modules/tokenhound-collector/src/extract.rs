//! Column-wise extraction of listing rows from a rendered page.
//!
//! The listing renders each field as its own run of elements, so every
//! column is collected independently and then zipped by index. A column
//! whose length disagrees with the name column means the table changed
//! under us; that is reported as an error rather than zipped into
//! misaligned rows. Row links are read from the anchor enclosing each
//! name cell, never by position.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use tokenhound_common::{ListingRow, TokenhoundError};

/// Present once the listing table has rendered at least one row.
pub const TABLE_READY_SELECTOR: &str = ".ds-dex-table-row-base-token-name";

/// Body text that marks an anti-bot interstitial instead of the listing.
pub const CHALLENGE_MARKERS: [&str; 3] = ["Access denied", "Cloudflare", "Just a moment"];

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

static NAME: LazyLock<Selector> = LazyLock::new(|| selector(TABLE_READY_SELECTOR));
static SYMBOL: LazyLock<Selector> =
    LazyLock::new(|| selector(".ds-dex-table-row-base-token-symbol"));
static QUOTE_SYMBOL: LazyLock<Selector> =
    LazyLock::new(|| selector(".ds-dex-table-row-quote-token-symbol"));
static PRICE: LazyLock<Selector> = LazyLock::new(|| selector(".ds-dex-table-row-col-price"));
static VOLUME: LazyLock<Selector> = LazyLock::new(|| selector(".ds-dex-table-row-col-volume"));
static MCAP: LazyLock<Selector> = LazyLock::new(|| selector(".ds-dex-table-row-col-market-cap"));
static LIQUIDITY: LazyLock<Selector> =
    LazyLock::new(|| selector(".ds-dex-table-row-col-liquidity"));
static TXNS: LazyLock<Selector> = LazyLock::new(|| selector(".ds-dex-table-row-col-txns"));
static AGE: LazyLock<Selector> = LazyLock::new(|| selector(".ds-dex-table-row-col-pair-age"));
static CHANGE_5M: LazyLock<Selector> =
    LazyLock::new(|| selector(".ds-dex-table-row-col-price-change-m5"));
static CHANGE_1H: LazyLock<Selector> =
    LazyLock::new(|| selector(".ds-dex-table-row-col-price-change-h1"));
static CHANGE_6H: LazyLock<Selector> =
    LazyLock::new(|| selector(".ds-dex-table-row-col-price-change-h6"));
static CHANGE_24H: LazyLock<Selector> =
    LazyLock::new(|| selector(".ds-dex-table-row-col-price-change-h24"));

/// Which challenge marker, if any, appears in the page's visible text.
/// Matching ignores ASCII case.
pub fn challenge_marker(body_text: &str) -> Option<&'static str> {
    let text = body_text.to_ascii_lowercase();
    CHALLENGE_MARKERS
        .iter()
        .copied()
        .find(|marker| text.contains(&marker.to_ascii_lowercase()))
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn column(document: &Html, selector: &Selector) -> Vec<String> {
    document.select(selector).map(text_of).collect()
}

/// Price cells nest sub-elements for subscript zeros; all whitespace goes.
fn price_column(document: &Html) -> Vec<String> {
    document
        .select(&PRICE)
        .map(|cell| cell.text().flat_map(|t| t.chars()).filter(|c| !c.is_whitespace()).collect())
        .collect()
}

/// Parse every listing row out of `html`. Relative row links are made
/// absolute against `origin`.
pub fn extract_rows(html: &str, origin: &str) -> Result<Vec<ListingRow>, TokenhoundError> {
    let document = Html::parse_document(html);

    let (names, links): (Vec<String>, Vec<Option<String>>) = document
        .select(&NAME)
        .map(|cell| (text_of(cell), row_link(cell, origin)))
        .unzip();
    let expected = names.len();

    let take = |label: &str, values: Vec<String>| -> Result<Vec<String>, TokenhoundError> {
        if values.len() != expected {
            return Err(TokenhoundError::Extraction(format!(
                "column {label} has {} cells, expected {expected}",
                values.len()
            )));
        }
        Ok(values)
    };

    let symbols = take("symbol", column(&document, &SYMBOL))?;
    let quote_symbols = take("symbol1", column(&document, &QUOTE_SYMBOL))?;
    let prices = take("price", price_column(&document))?;
    let volumes = take("volume", column(&document, &VOLUME))?;
    let mcaps = take("mcap", column(&document, &MCAP))?;
    let liquidities = take("liquidity", column(&document, &LIQUIDITY))?;
    let txns = take("transactions", column(&document, &TXNS))?;
    let ages = take("age", column(&document, &AGE))?;
    let change_5m = take("change-5m", column(&document, &CHANGE_5M))?;
    let change_1h = take("change-1h", column(&document, &CHANGE_1H))?;
    let change_6h = take("change-6h", column(&document, &CHANGE_6H))?;
    let change_24h = take("change-24h", column(&document, &CHANGE_24H))?;

    let rows = names
        .into_iter()
        .enumerate()
        .map(|(i, name)| ListingRow {
            name,
            symbol: symbols[i].clone(),
            symbol1: quote_symbols[i].clone(),
            price: prices[i].clone(),
            volume: volumes[i].clone(),
            liquidity: liquidities[i].clone(),
            mcap: mcaps[i].clone(),
            transactions: txns[i].clone(),
            age: ages[i].clone(),
            change_5m: change_5m[i].clone(),
            change_1h: change_1h[i].clone(),
            change_6h: change_6h[i].clone(),
            change_24h: change_24h[i].clone(),
            href: links[i].clone(),
        })
        .collect();

    Ok(rows)
}

/// `href` of the nearest anchor enclosing `cell`, made absolute.
fn row_link(cell: ElementRef<'_>, origin: &str) -> Option<String> {
    cell.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|element| element.value().name() == "a")
        .and_then(|anchor| anchor.value().attr("href"))
        .filter(|href| !href.is_empty())
        .map(|href| absolutize(origin, href))
}

fn absolutize(origin: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        format!("{}{}", origin.trim_end_matches('/'), href)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{listing_page_html as page_html, listing_row_html as row_html};

    const ORIGIN: &str = "https://dexscreener.com";

    #[test]
    fn extracts_rows_in_document_order() {
        let html = page_html(&[
            row_html("Doge Aptos", "DOGA", "/aptos/0xabc"),
            row_html("Pepe Move", "PEPEM", "/aptos/0xdef"),
        ]);

        let rows = extract_rows(&html, ORIGIN).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "Doge Aptos");
        assert_eq!(rows[0].symbol, "DOGA");
        assert_eq!(rows[0].symbol1, "APT");
        assert_eq!(rows[0].volume, "$12K");
        assert_eq!(rows[0].change_24h, "1,234%");
        assert_eq!(rows[0].href.as_deref(), Some("https://dexscreener.com/aptos/0xabc"));
        assert_eq!(rows[1].symbol, "PEPEM");
    }

    #[test]
    fn price_cells_lose_all_whitespace() {
        let html = page_html(&[row_html("Doge Aptos", "DOGA", "/aptos/0xabc")]);
        let rows = extract_rows(&html, ORIGIN).unwrap();
        assert_eq!(rows[0].price, "$0.041234");
    }

    #[test]
    fn missing_link_yields_none() {
        let html = page_html(&[row_html("Doge Aptos", "DOGA", "")]);
        let rows = extract_rows(&html, ORIGIN).unwrap();
        assert_eq!(rows[0].href, None);
    }

    #[test]
    fn short_column_is_an_error() {
        let mut html = page_html(&[
            row_html("Doge Aptos", "DOGA", "/aptos/0xabc"),
            row_html("Pepe Move", "PEPEM", "/aptos/0xdef"),
        ]);
        html = html.replacen(
            r#"<div class="ds-dex-table-row-col-volume">$12K</div>"#,
            "",
            1,
        );

        let err = extract_rows(&html, ORIGIN).unwrap_err();
        assert!(matches!(err, TokenhoundError::Extraction(ref m) if m.contains("volume")), "{err}");
    }

    #[test]
    fn empty_table_yields_no_rows() {
        let rows = extract_rows("<html><body></body></html>", ORIGIN).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn detects_challenge_pages() {
        assert_eq!(
            challenge_marker("Just a moment...\nChecking your browser"),
            Some("Just a moment")
        );
        assert_eq!(challenge_marker("Aptos pairs by age"), None);
    }

    #[test]
    fn challenge_markers_ignore_case() {
        assert_eq!(challenge_marker("ACCESS DENIED\nRay ID: 8f"), Some("Access denied"));
        assert_eq!(challenge_marker("Protected by CLOUDFLARE"), Some("Cloudflare"));
    }

    #[test]
    fn links_follow_their_own_row() {
        let html = page_html(&[
            row_html("Doge Aptos", "DOGA", "/aptos/0xabc"),
            row_html("Pepe Move", "PEPEM", "/aptos/0xdef"),
        ])
        .replacen(
            "ds-dex-table-row ds-dex-table-row-new",
            "ds-dex-table-row",
            1,
        );

        let rows = extract_rows(&html, ORIGIN).unwrap();
        assert_eq!(rows[0].href.as_deref(), Some("https://dexscreener.com/aptos/0xabc"));
        assert_eq!(rows[1].href.as_deref(), Some("https://dexscreener.com/aptos/0xdef"));
    }

    #[test]
    fn row_outside_an_anchor_has_no_link() {
        let html = page_html(&[
            row_html("Doge Aptos", "DOGA", "/aptos/0xabc")
                .replacen("<a ", "<div ", 1)
                .replacen("</a>", "</div>", 1),
            row_html("Pepe Move", "PEPEM", "/aptos/0xdef"),
        ]);

        let rows = extract_rows(&html, ORIGIN).unwrap();
        assert_eq!(rows[0].href, None);
        assert_eq!(rows[1].href.as_deref(), Some("https://dexscreener.com/aptos/0xdef"));
    }
}
