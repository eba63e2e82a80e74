use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde_json::Value;

use crate::{config::SiteConfig, listing::ChapterRef};

pub const CHAPTER_INFO_FILE: &str = "capitulo_info.json";
pub const CHAPTER_PAGES_FILE: &str = "capitulo_pages.json";
pub const MANGA_INFO_FILE: &str = "manga_info.json";
pub const CHAPTERS_HTML_FILE: &str = "manga_caps.html";
pub const MANIFEST_FILE: &str = "links_caps.json";

type Result<T> = std::result::Result<T, ManifestError>;

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error(transparent)]
    IoError(#[from] io::Error),
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
}

/// `mangas/<title>/`. Title comes from untrusted metadata, so the component
/// is sanitized before it touches the filesystem.
pub fn series_dir(config: &SiteConfig, title: &str) -> PathBuf {
    config.library_dir.join(sanitize_filename::sanitize(title))
}

/// `mangas/<title>/<number>/`.
pub fn chapter_dir(config: &SiteConfig, title: &str, number: &str) -> PathBuf {
    series_dir(config, title).join(sanitize_filename::sanitize(number))
}

/// Raw API payload, pretty-printed. Existing files are overwritten in place.
pub fn write_json(path: impl AsRef<Path>, value: &Value) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

pub fn write_html(path: impl AsRef<Path>, content: &str) -> Result<()> {
    fs::write(path, content)?;
    Ok(())
}

pub fn write_manifest(path: impl AsRef<Path>, chapters: &[ChapterRef]) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(chapters)?)?;
    Ok(())
}

pub fn read_manifest(path: impl AsRef<Path>) -> Result<Vec<ChapterRef>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
