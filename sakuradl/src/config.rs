use std::path::PathBuf;
use std::time::Duration;

/// The fixed site contract: origin, endpoint paths, listing page size and
/// request pacing. The defaults match sakuramangas.org; tests substitute
/// their own values instead of patching constants.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub base_url: String,
    /// Chapter records requested per listing call.
    pub page_size: usize,
    /// Pause between page-image downloads.
    pub image_delay: Duration,
    /// Pause between chapters when processing a manifest.
    pub chapter_delay: Duration,
    /// Root of the on-disk library tree.
    pub library_dir: PathBuf,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("https://sakuramangas.org"),
            page_size: 90,
            image_delay: Duration::from_millis(500),
            chapter_delay: Duration::from_secs(1),
            library_dir: PathBuf::from("mangas"),
        }
    }
}

impl SiteConfig {
    pub fn chapter_info_endpoint(&self) -> String {
        format!(
            "{}/dist/sakura/models/capitulo/capitulos_info.php",
            self.base_url
        )
    }

    pub fn chapter_pages_endpoint(&self) -> String {
        format!(
            "{}/dist/sakura/models/capitulo/capitulos_read.php",
            self.base_url
        )
    }

    pub fn manga_info_endpoint(&self) -> String {
        format!("{}/dist/sakura/models/manga/manga_info.php", self.base_url)
    }

    pub fn manga_chapters_endpoint(&self) -> String {
        format!(
            "{}/dist/sakura/models/manga/manga_capitulos.php",
            self.base_url
        )
    }
}

pub fn build_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().user_agent("sakuradl").build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_derive_from_base_url() {
        let config = SiteConfig {
            base_url: String::from("http://localhost:9999"),
            ..Default::default()
        };
        assert_eq!(
            config.manga_chapters_endpoint(),
            "http://localhost:9999/dist/sakura/models/manga/manga_capitulos.php"
        );
        assert_eq!(
            config.chapter_info_endpoint(),
            "http://localhost:9999/dist/sakura/models/capitulo/capitulos_info.php"
        );
    }
}
