use std::path::PathBuf;

use log::info;
use reqwest::Client;

use crate::{
    api::{self, ApiError},
    config::SiteConfig,
    listing,
    manifest::{self, ManifestError},
    meta::{self, MetaError},
};

type Result<T> = std::result::Result<T, SeriesError>;

#[derive(Debug, thiserror::Error)]
pub enum SeriesError {
    #[error(transparent)]
    MetaError(#[from] MetaError),
    #[error(transparent)]
    ApiError(#[from] ApiError),
    #[error(transparent)]
    ManifestError(#[from] ManifestError),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

/// What `archive_series` leaves on disk for one series.
#[derive(Debug)]
pub struct SeriesArchive {
    pub title: String,
    pub dir: PathBuf,
    pub manifest_path: PathBuf,
    pub chapter_count: usize,
}

/// Series pipeline: resolve credentials from the series page, store the raw
/// metadata, page through the chapter listing and persist both the raw HTML
/// and the parsed manifest.
pub async fn archive_series(
    client: &Client,
    config: &SiteConfig,
    url: &str,
) -> Result<SeriesArchive> {
    info!("extracting series metadata from {url}");
    let meta = meta::fetch_manga_meta(client, url).await?;

    let manga = api::manga_info(client, config, &meta.id, &meta.token).await?;
    info!(
        "series: {} (last chapter: {})",
        manga.title, manga.last_chapter
    );

    let dir = manifest::series_dir(config, &manga.title);
    std::fs::create_dir_all(&dir)?;
    manifest::write_json(dir.join(manifest::MANGA_INFO_FILE), &manga.raw)?;

    let listing =
        listing::fetch_listing(client, config, &meta.id, &meta.token, manga.last_chapter).await;
    manifest::write_html(dir.join(manifest::CHAPTERS_HTML_FILE), &listing.html)?;
    let manifest_path = dir.join(manifest::MANIFEST_FILE);
    manifest::write_manifest(&manifest_path, &listing.chapters)?;
    info!(
        "{} chapters listed in {}",
        listing.chapters.len(),
        manifest_path.display()
    );

    Ok(SeriesArchive {
        title: manga.title,
        dir,
        manifest_path,
        chapter_count: listing.chapters.len(),
    })
}
