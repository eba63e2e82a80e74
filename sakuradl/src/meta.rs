use regex::Regex;
use reqwest::{Client, IntoUrl};

type Result<T> = std::result::Result<T, MetaError>;

#[derive(Debug, thiserror::Error)]
pub enum MetaError {
    #[error(transparent)]
    RequestError(#[from] reqwest::Error),
    #[error("cannot find <meta {0}> tag in page")]
    TagNotFound(&'static str),
}

/// Identifier/token pair embedded in every reader and series page. All API
/// calls require both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMeta {
    pub id: String,
    pub token: String,
}

pub async fn fetch_chapter_meta(client: &Client, url: impl IntoUrl) -> Result<PageMeta> {
    let html = fetch_page(client, url).await?;
    extract_meta(&html, "chapter-id")
}

pub async fn fetch_manga_meta(client: &Client, url: impl IntoUrl) -> Result<PageMeta> {
    let html = fetch_page(client, url).await?;
    extract_meta(&html, "manga-id")
}

async fn fetch_page(client: &Client, url: impl IntoUrl) -> Result<String> {
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.text().await?)
}

fn extract_meta(html: &str, id_tag: &'static str) -> Result<PageMeta> {
    let id = extract_tag(html, id_tag).ok_or(MetaError::TagNotFound(id_tag))?;
    let token = extract_tag(html, "token").ok_or(MetaError::TagNotFound("token"))?;
    Ok(PageMeta { id, token })
}

fn extract_tag(html: &str, tag: &str) -> Option<String> {
    let pattern = Regex::new(&format!(r#"<meta\s+{tag}="([^"]+)">"#)).unwrap();
    pattern.captures(html).map(|captures| captures[1].to_string())
}
