use log::error;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::config::SiteConfig;

type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    RequestError(#[from] reqwest::Error),
    #[error("cannot deserialize {endpoint} response")]
    DeserializeError {
        endpoint: &'static str,
        source: serde_json::Error,
    },
}

/// Chapter metadata. Only the title and number are interpreted; the raw
/// payload is kept so `capitulo_info.json` stays a byte-faithful passthrough.
#[derive(Debug)]
pub struct ChapterInfo {
    pub manga_title: String,
    pub chapter_number: String,
    pub raw: Value,
}

/// Ordered page-image paths for one chapter, plus the raw payload for
/// `capitulo_pages.json`.
#[derive(Debug)]
pub struct ChapterPages {
    pub image_urls: Vec<String>,
    pub raw: Value,
}

#[derive(Debug)]
pub struct MangaInfo {
    pub title: String,
    pub last_chapter: u32,
    pub raw: Value,
}

pub async fn chapter_info(
    client: &Client,
    config: &SiteConfig,
    chapter_id: &str,
    token: &str,
) -> Result<ChapterInfo> {
    let raw = post_form(
        client,
        &config.chapter_info_endpoint(),
        &[("chapter_id", chapter_id), ("token", token)],
        "capitulos_info",
    )
    .await?;
    parse_chapter_info(raw)
}

pub async fn chapter_pages(
    client: &Client,
    config: &SiteConfig,
    chapter_id: &str,
    token: &str,
) -> Result<ChapterPages> {
    let raw = post_form(
        client,
        &config.chapter_pages_endpoint(),
        &[("chapter_id", chapter_id), ("token", token)],
        "capitulos_read",
    )
    .await?;
    parse_chapter_pages(raw)
}

pub async fn manga_info(
    client: &Client,
    config: &SiteConfig,
    manga_id: &str,
    token: &str,
) -> Result<MangaInfo> {
    let raw = post_form(
        client,
        &config.manga_info_endpoint(),
        &[
            ("manga_id", manga_id),
            ("token", token),
            ("dataType", "json"),
        ],
        "manga_info",
    )
    .await?;
    parse_manga_info(raw)
}

fn parse_chapter_info(raw: Value) -> Result<ChapterInfo> {
    #[derive(Debug, Deserialize)]
    struct Body {
        manga: Manga,
        capitulo: Capitulo,
    }

    #[derive(Debug, Deserialize)]
    struct Manga {
        titulo: String,
    }

    #[derive(Debug, Deserialize)]
    struct Capitulo {
        #[serde(deserialize_with = "number_or_string")]
        numero: String,
    }

    let body: Body = typed_view("capitulos_info", &raw)?;
    Ok(ChapterInfo {
        manga_title: body.manga.titulo,
        chapter_number: body.capitulo.numero,
        raw,
    })
}

fn parse_chapter_pages(raw: Value) -> Result<ChapterPages> {
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Body {
        image_urls: Vec<String>,
    }

    let body: Body = typed_view("capitulos_read", &raw)?;
    Ok(ChapterPages {
        image_urls: body.image_urls,
        raw,
    })
}

fn parse_manga_info(raw: Value) -> Result<MangaInfo> {
    #[derive(Debug, Deserialize)]
    struct Body {
        titulo: String,
        #[serde(default, deserialize_with = "chapter_count")]
        ultimo_capitulo: Option<u32>,
    }

    let body: Body = typed_view("manga_info", &raw)?;
    Ok(MangaInfo {
        title: body.titulo,
        last_chapter: body.ultimo_capitulo.unwrap_or(1),
        raw,
    })
}

async fn post_form(
    client: &Client,
    url: &str,
    form: &[(&str, &str)],
    endpoint: &'static str,
) -> Result<Value> {
    let response = client
        .post(url)
        .header("X-Requested-With", "XMLHttpRequest")
        .form(form)
        .send()
        .await?
        .error_for_status()?;
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| {
        error!("cannot deserialize {endpoint} response '{body}': {e}");
        ApiError::DeserializeError {
            endpoint,
            source: e,
        }
    })
}

fn typed_view<T: DeserializeOwned>(endpoint: &'static str, raw: &Value) -> Result<T> {
    serde_json::from_value(raw.clone()).map_err(|e| {
        error!("unexpected {endpoint} payload shape: {e}");
        ApiError::DeserializeError {
            endpoint,
            source: e,
        }
    })
}

// Chapter numbers arrive as JSON numbers or strings depending on the series.
fn number_or_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}

fn chapter_count<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(number)) => Some(number as u32),
        Some(Raw::Text(text)) => text.trim().parse::<f64>().ok().map(|number| number as u32),
        None => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chapter_info_reads_title_and_number() {
        let raw = json!({
            "manga": {"titulo": "Shin Kirari", "autor": "..."},
            "capitulo": {"numero": 12, "data": "2024-01-01"},
        });
        let info = parse_chapter_info(raw).unwrap();
        assert_eq!(info.manga_title, "Shin Kirari");
        assert_eq!(info.chapter_number, "12");
        // passthrough fields survive untouched
        assert_eq!(info.raw["capitulo"]["data"], "2024-01-01");
    }

    #[test]
    fn chapter_number_may_be_a_string() {
        let raw = json!({
            "manga": {"titulo": "Shin Kirari"},
            "capitulo": {"numero": "12.5"},
        });
        let info = parse_chapter_info(raw).unwrap();
        assert_eq!(info.chapter_number, "12.5");
    }

    #[test]
    fn chapter_pages_keep_source_order() {
        let raw = json!({
            "imageUrls": ["../obras/1/001.jpg", "../obras/1/002.jpg", "../obras/1/003.jpg"],
        });
        let pages = parse_chapter_pages(raw).unwrap();
        assert_eq!(
            pages.image_urls,
            ["../obras/1/001.jpg", "../obras/1/002.jpg", "../obras/1/003.jpg"]
        );
    }

    #[test]
    fn manga_info_parses_last_chapter_from_text() {
        let raw = json!({"titulo": "Harukaze no Etranger", "ultimo_capitulo": "42"});
        let info = parse_manga_info(raw).unwrap();
        assert_eq!(info.last_chapter, 42);
    }

    #[test]
    fn manga_info_defaults_last_chapter_to_one() {
        let raw = json!({"titulo": "Harukaze no Etranger"});
        let info = parse_manga_info(raw).unwrap();
        assert_eq!(info.title, "Harukaze no Etranger");
        assert_eq!(info.last_chapter, 1);
    }

    #[test]
    fn malformed_payload_is_an_api_error() {
        let err = parse_chapter_info(json!({"manga": {}})).unwrap_err();
        assert!(matches!(
            err,
            ApiError::DeserializeError {
                endpoint: "capitulos_info",
                ..
            }
        ));
    }
}
