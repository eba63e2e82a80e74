use std::{
    fs,
    io::{self, Cursor},
    path::{Path, PathBuf},
    time::Duration,
};

use log::{error, info};
use reqwest::{header::CONTENT_TYPE, Client, Response};

type Result<T> = std::result::Result<T, DownloadError>;

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error(transparent)]
    IoError(#[from] io::Error),
    #[error("{source}")]
    RequestError {
        item: DownloadItem,
        source: reqwest::Error,
    },
}

#[derive(Debug, Clone)]
pub struct DownloadItem {
    url: String,
    name: Option<String>,
}

impl DownloadItem {
    pub fn new(url: &str, name: Option<&str>) -> Self {
        Self {
            url: url.to_string(),
            name: name.map(|name| name.to_string()),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    items: Vec<DownloadItem>,
    delay: Option<Duration>,
    path: PathBuf,
}

impl DownloadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_path(mut self, path: impl AsRef<Path>) -> Result<Self> {
        fs::create_dir_all(&path)?;
        self.path = path.as_ref().to_owned();
        Ok(self)
    }

    /// Fixed-interval gate inserted between consecutive requests.
    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = Some(delay);
    }

    pub fn add_download_item(&mut self, item: &DownloadItem) {
        self.items.push(item.clone());
    }

    pub fn add_download_items<'a>(&mut self, items: impl IntoIterator<Item = &'a DownloadItem>) {
        self.items.extend(items.into_iter().cloned());
    }
}

/// Downloads items one at a time, pausing for the configured delay between
/// requests. A failed item is logged and recorded; the batch always runs to
/// the end.
pub async fn download(client: &Client, options: &DownloadOptions) -> Vec<Result<PathBuf>> {
    let mut results = Vec::new();
    let mut items = options.items.iter().peekable();
    while let Some(item) = items.next() {
        let result = download_one(client, item, &options.path).await;
        match &result {
            Ok(path) => info!("Downloaded: {} -> {}", item.url(), path.display()),
            Err(e) => error!("{e}"),
        }
        results.push(result);
        if items.peek().is_some() {
            if let Some(delay) = options.delay {
                tokio::time::sleep(delay).await;
            }
        }
    }
    results
}

async fn download_one(client: &Client, item: &DownloadItem, path: &Path) -> Result<PathBuf> {
    let response = client
        .get(item.url())
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|e| DownloadError::RequestError {
            item: item.clone(),
            source: e,
        })?;

    // provided file name or inferred from url
    let file_name = match item.name() {
        Some(name) => name.to_string(),
        None => reqwest::Url::parse(item.url())
            .map_err(|_| DownloadError::InvalidUrl(item.url().to_string()))?
            .path_segments()
            .and_then(|segments| segments.last())
            .map(|segment| segment.to_string())
            .ok_or_else(|| DownloadError::InvalidUrl(item.url().to_string()))?,
    };

    let mut file_name = PathBuf::from(file_name);
    if file_name.extension().is_none() {
        if let Some(extension) = infer_extension_from_response(&response) {
            file_name = file_name.with_extension(extension);
        }
    }

    let file_path = path.join(file_name);
    let mut file = fs::File::create(&file_path)?;
    let bytes = response
        .bytes()
        .await
        .map_err(|e| DownloadError::RequestError {
            item: item.clone(),
            source: e,
        })?;
    io::copy(&mut Cursor::new(bytes), &mut file)?;
    Ok(file_path)
}

fn infer_extension_from_response(response: &Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<mime::Mime>().ok())
        .and_then(|mime| match mime.type_().as_str() {
            "image" => Some(mime.subtype().to_string().replace("jpeg", "jpg")),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_path_creates_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("pages");
        let options = DownloadOptions::new().set_path(&target).unwrap();
        assert!(target.is_dir());
        assert_eq!(options.path, target);
    }

    #[test]
    fn items_keep_insertion_order() {
        let mut options = DownloadOptions::new();
        options.add_download_item(&DownloadItem::new("https://x/1.jpg", Some("001.jpg")));
        options.add_download_items(&[
            DownloadItem::new("https://x/2.jpg", Some("002.jpg")),
            DownloadItem::new("https://x/3.jpg", None),
        ]);
        let names: Vec<_> = options.items.iter().map(DownloadItem::name).collect();
        assert_eq!(names, [Some("001.jpg"), Some("002.jpg"), None]);
    }
}
