use std::future::Future;

use log::warn;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use crate::config::SiteConfig;

/// One row of the chapter listing, keyed exactly as `links_caps.json`
/// stores it. Rows appear newest-first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRef {
    #[serde(rename = "num-capitulo")]
    pub number: String,
    #[serde(rename = "cap-titulo")]
    pub title: String,
    #[serde(rename = "scan-nome")]
    pub scan_group: String,
    /// Empty when the listing row carried no anchor or the manifest predates
    /// the field.
    #[serde(rename = "link-capitulo", default)]
    pub link: String,
}

/// Everything the listing endpoint returned: the concatenated raw fragments
/// for archival and the parsed rows in fetch order.
#[derive(Debug, Default)]
pub struct ChapterListing {
    pub html: String,
    pub chapters: Vec<ChapterRef>,
}

pub fn pages_needed(last_chapter_hint: u32, page_size: usize) -> usize {
    last_chapter_hint as usize / page_size + 1
}

pub async fn fetch_listing(
    client: &Client,
    config: &SiteConfig,
    manga_id: &str,
    token: &str,
    last_chapter_hint: u32,
) -> ChapterListing {
    let pages = pages_needed(last_chapter_hint, config.page_size);
    let limit = config.page_size.to_string();
    collect_listing(config.page_size, pages, |offset| {
        let client = client.clone();
        let endpoint = config.manga_chapters_endpoint();
        let manga_id = manga_id.to_string();
        let token = token.to_string();
        let limit = limit.clone();
        async move {
            let offset = offset.to_string();
            client
                .post(&endpoint)
                .header("X-Requested-With", "XMLHttpRequest")
                .form(&[
                    ("manga_id", manga_id.as_str()),
                    ("token", token.as_str()),
                    ("offset", offset.as_str()),
                    ("order", "desc"),
                    ("limit", limit.as_str()),
                ])
                .send()
                .await?
                .error_for_status()?
                .text()
                .await
        }
    })
    .await
}

/// Pages through the listing until a page comes back with fewer blocks than
/// `page_size` or a request fails. Accumulated results are kept either way.
/// A final page that is exactly full cannot be told apart from a middle one,
/// so one extra (empty) request goes out in that case.
async fn collect_listing<F, Fut, E>(page_size: usize, pages: usize, mut fetch_page: F) -> ChapterListing
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = std::result::Result<String, E>>,
    E: std::fmt::Display,
{
    let mut listing = ChapterListing::default();
    for page in 0..pages {
        let offset = page * page_size;
        let fragment = match fetch_page(offset).await {
            Ok(fragment) => fragment,
            Err(e) => {
                warn!("chapter listing request failed at offset {offset}: {e}");
                break;
            }
        };
        let (chapters, blocks) = parse_listing_fragment(&fragment);
        listing.html.push_str(&fragment);
        listing.chapters.extend(chapters);
        if blocks < page_size {
            break;
        }
    }
    listing
}

/// Returns the parsed rows plus the raw `capitulo-item` block count. The
/// pagination stop rule counts blocks, not successfully parsed rows.
pub fn parse_listing_fragment(fragment: &str) -> (Vec<ChapterRef>, usize) {
    let item_selector = Selector::parse("div.capitulo-item").unwrap();
    let number_selector = Selector::parse("span.num-capitulo").unwrap();
    let title_selector = Selector::parse("span.cap-titulo").unwrap();
    let scan_selector = Selector::parse("span.scan-nome").unwrap();
    let anchor_selector = Selector::parse("a").unwrap();

    let html = Html::parse_fragment(fragment);
    let mut chapters = Vec::new();
    let mut blocks = 0;
    for item in html.select(&item_selector) {
        blocks += 1;
        let number_span = match item.select(&number_selector).next() {
            Some(span) => span,
            None => continue,
        };
        let number = number_span
            .value()
            .attr("data-chapter")
            .unwrap_or("")
            .to_string();
        let link = number_span
            .select(&anchor_selector)
            .next()
            .and_then(|anchor| anchor.value().attr("href"))
            .unwrap_or("")
            .to_string();
        chapters.push(ChapterRef {
            number,
            title: text_of(item, &title_selector),
            scan_group: text_of(item, &scan_selector),
            link,
        });
    }
    (chapters, blocks)
}

fn text_of(item: ElementRef, selector: &Selector) -> String {
    item.select(selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn chapter_block(number: usize) -> String {
        format!(
            r#"<div class="capitulo-item">
                <span class="num-capitulo" data-chapter="{number}">
                    <a href="/obras/demo/capitulo-{number}/">Cap. {number}</a>
                </span>
                <span class="cap-titulo">Title {number}</span>
                <span class="scan-nome">Demo Scan</span>
            </div>"#
        )
    }

    fn listing_page(count: usize, offset: usize) -> String {
        (0..count).map(|i| chapter_block(offset + i)).collect()
    }

    #[test]
    fn parses_fields_from_fragment() {
        let (chapters, blocks) = parse_listing_fragment(&chapter_block(12));
        assert_eq!(blocks, 1);
        assert_eq!(
            chapters,
            vec![ChapterRef {
                number: String::from("12"),
                title: String::from("Title 12"),
                scan_group: String::from("Demo Scan"),
                link: String::from("/obras/demo/capitulo-12/"),
            }]
        );
    }

    #[test]
    fn blocks_without_number_span_count_but_do_not_parse() {
        let fragment = format!(
            r#"{}<div class="capitulo-item"><span class="cap-titulo">x</span></div>"#,
            chapter_block(3)
        );
        let (chapters, blocks) = parse_listing_fragment(&fragment);
        assert_eq!(blocks, 2);
        assert_eq!(chapters.len(), 1);
    }

    #[test]
    fn pages_needed_matches_listing_math() {
        assert_eq!(pages_needed(0, 90), 1);
        assert_eq!(pages_needed(89, 90), 1);
        assert_eq!(pages_needed(90, 90), 2);
        assert_eq!(pages_needed(250, 90), 3);
    }

    #[tokio::test]
    async fn stops_after_a_short_page() {
        let sizes = [90usize, 90, 47];
        let calls = Cell::new(0usize);
        let listing = collect_listing(90, 10, |offset| {
            calls.set(calls.get() + 1);
            let body = listing_page(sizes[offset / 90], offset);
            async move { Ok::<_, std::io::Error>(body) }
        })
        .await;
        assert_eq!(calls.get(), 3);
        assert_eq!(listing.chapters.len(), 227);
    }

    #[tokio::test]
    async fn issues_one_extra_request_when_the_last_page_is_full() {
        let calls = Cell::new(0usize);
        let listing = collect_listing(90, 3, |offset| {
            calls.set(calls.get() + 1);
            let result = match offset / 90 {
                0 | 1 => Ok(listing_page(90, offset)),
                _ => Err("no more pages"),
            };
            async move { result }
        })
        .await;
        // a full final page is indistinguishable from a middle one
        assert_eq!(calls.get(), 3);
        assert_eq!(listing.chapters.len(), 180);
    }

    #[tokio::test]
    async fn an_empty_trailing_page_stops_the_loop() {
        let calls = Cell::new(0usize);
        let listing = collect_listing(90, 5, |offset| {
            calls.set(calls.get() + 1);
            let body = if offset == 0 {
                listing_page(90, 0)
            } else {
                String::new()
            };
            async move { Ok::<_, std::io::Error>(body) }
        })
        .await;
        assert_eq!(calls.get(), 2);
        assert_eq!(listing.chapters.len(), 90);
    }

    #[tokio::test]
    async fn request_failure_keeps_partial_results() {
        let calls = Cell::new(0usize);
        let listing = collect_listing(90, 4, |offset| {
            calls.set(calls.get() + 1);
            let result = if offset == 0 {
                Ok(listing_page(90, 0))
            } else {
                Err("connection reset")
            };
            async move { result }
        })
        .await;
        assert_eq!(calls.get(), 2);
        assert_eq!(listing.chapters.len(), 90);
        assert!(listing.html.contains("capitulo-item"));
    }
}
