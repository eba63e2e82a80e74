use std::path::{Path, PathBuf};

use log::{info, warn};
use reqwest::Client;

use crate::{
    api::{self, ApiError},
    config::SiteConfig,
    download::{download, DownloadError, DownloadItem, DownloadOptions},
    manifest::{self, ManifestError},
    meta::{self, MetaError, PageMeta},
};

type Result<T> = std::result::Result<T, ChapterError>;

#[derive(Debug, thiserror::Error)]
pub enum ChapterError {
    #[error(transparent)]
    MetaError(#[from] MetaError),
    #[error(transparent)]
    ApiError(#[from] ApiError),
    #[error(transparent)]
    ManifestError(#[from] ManifestError),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error("cannot download to {path}")]
    PathError {
        path: PathBuf,
        source: DownloadError,
    },
}

/// Where a chapter download starts from: a reader page URL, or the raw
/// id/token pair when the caller already has them.
#[derive(Debug, Clone)]
pub enum ChapterSource {
    Url(String),
    Token { chapter_id: String, token: String },
}

/// Full single-chapter pipeline: resolve credentials, fetch metadata, lay out
/// `mangas/<title>/<number>/` and pull every page image. Individual page
/// failures are logged and left behind; the chapter still counts as done.
pub async fn download_chapter(
    client: &Client,
    config: &SiteConfig,
    source: ChapterSource,
) -> Result<PathBuf> {
    let PageMeta { id, token } = match source {
        ChapterSource::Url(url) => {
            info!("extracting chapter metadata from {url}");
            meta::fetch_chapter_meta(client, &url).await?
        }
        ChapterSource::Token { chapter_id, token } => PageMeta {
            id: chapter_id,
            token,
        },
    };

    let chapter = api::chapter_info(client, config, &id, &token).await?;
    info!(
        "manga: {} - chapter: {}",
        chapter.manga_title, chapter.chapter_number
    );

    let chapter_dir = manifest::chapter_dir(config, &chapter.manga_title, &chapter.chapter_number);
    std::fs::create_dir_all(&chapter_dir)?;
    manifest::write_json(chapter_dir.join(manifest::CHAPTER_INFO_FILE), &chapter.raw)?;

    let pages = api::chapter_pages(client, config, &id, &token).await?;
    manifest::write_json(chapter_dir.join(manifest::CHAPTER_PAGES_FILE), &pages.raw)?;

    info!("downloading {} pages", pages.image_urls.len());
    let pages_dir = chapter_dir.join("pages");
    let mut options = DownloadOptions::new()
        .set_path(&pages_dir)
        .map_err(|e| ChapterError::PathError {
            path: pages_dir.clone(),
            source: e,
        })?;
    options.set_delay(config.image_delay);
    let items = page_download_items(&pages.image_urls, &config.base_url);
    options.add_download_items(&items);

    let results = download(client, &options).await;
    let failed = results.iter().filter(|result| result.is_err()).count();
    if failed > 0 {
        warn!("{failed} of {} pages failed to download", results.len());
    }
    Ok(chapter_dir)
}

/// Drives the chapter pipeline over a `links_caps.json` manifest, oldest
/// entry first (manifests are newest-first). Entries without a link are
/// skipped; a failed chapter never aborts the rest.
pub async fn download_from_manifest(
    client: &Client,
    config: &SiteConfig,
    path: impl AsRef<Path>,
) -> Result<()> {
    let path = path.as_ref();
    let chapters = manifest::read_manifest(path)?;
    info!(
        "processing {} manifest entries from {}",
        chapters.len(),
        path.display()
    );

    let mut entries = chapters.iter().rev().peekable();
    while let Some(entry) = entries.next() {
        if entry.link.is_empty() {
            warn!("chapter {} has no link, skipping", entry.number);
        } else {
            info!(
                "chapter {}: {} (scan: {})",
                entry.number, entry.title, entry.scan_group
            );
            let source = ChapterSource::Url(entry.link.clone());
            if let Err(e) = download_chapter(client, config, source).await {
                warn!("failed to download chapter {}: {e}", entry.number);
            }
        }
        if entries.peek().is_some() {
            tokio::time::sleep(config.chapter_delay).await;
        }
    }
    Ok(())
}

/// The pages endpoint hands back paths relative to the reader (`../…`). The
/// absolute URL keeps the normalized path; the local file keeps the original
/// basename.
fn page_download_items(image_urls: &[String], base_url: &str) -> Vec<DownloadItem> {
    image_urls
        .iter()
        .map(|relative| {
            let (url, file_name) = normalize_image_url(base_url, relative);
            DownloadItem::new(&url, Some(&file_name))
        })
        .collect()
}

fn normalize_image_url(base_url: &str, relative: &str) -> (String, String) {
    let mut clean = relative.trim_start_matches("../").to_string();
    if !clean.starts_with('/') {
        clean.insert(0, '/');
    }
    let file_name = relative.rsplit('/').next().unwrap_or(relative).to_string();
    (format!("{base_url}{clean}"), file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::ChapterRef;

    #[test]
    fn normalizes_relative_image_paths() {
        let (url, name) = normalize_image_url("https://sakuramangas.org", "../images/001.jpg");
        assert_eq!(url, "https://sakuramangas.org/images/001.jpg");
        assert_eq!(name, "001.jpg");
    }

    #[test]
    fn strips_repeated_parent_segments() {
        let (url, name) = normalize_image_url("https://sakuramangas.org", "../../obras/7/010.png");
        assert_eq!(url, "https://sakuramangas.org/obras/7/010.png");
        assert_eq!(name, "010.png");
    }

    #[test]
    fn rooted_paths_pass_through() {
        let (url, name) = normalize_image_url("https://sakuramangas.org", "/obras/7/002.jpg");
        assert_eq!(url, "https://sakuramangas.org/obras/7/002.jpg");
        assert_eq!(name, "002.jpg");
    }

    #[test]
    fn download_items_preserve_page_order() {
        let urls = vec![
            String::from("../obras/1/001.jpg"),
            String::from("../obras/1/002.jpg"),
            String::from("../obras/1/003.jpg"),
        ];
        let items = page_download_items(&urls, "https://sakuramangas.org");
        let names: Vec<_> = items.iter().filter_map(DownloadItem::name).collect();
        assert_eq!(names, ["001.jpg", "002.jpg", "003.jpg"]);
    }

    #[test]
    fn manifest_entries_run_oldest_first_and_skip_missing_links() {
        let entry = |number: &str, link: &str| ChapterRef {
            number: number.to_string(),
            title: String::new(),
            scan_group: String::new(),
            link: link.to_string(),
        };
        // newest-first on disk, entry "2" lost its link
        let chapters = vec![
            entry("3", "https://sakuramangas.org/ler/3"),
            entry("2", ""),
            entry("1", "https://sakuramangas.org/ler/1"),
        ];
        let processed: Vec<_> = chapters
            .iter()
            .rev()
            .filter(|entry| !entry.link.is_empty())
            .map(|entry| entry.number.as_str())
            .collect();
        assert_eq!(processed, ["1", "3"]);
    }
}
