//! Retrieval of configuration texts and folder listings over HTTP or from
//! the local file system.

use crate::domain::config::DiscoverySettings;
use crate::domain::error::{GnssConfError, GnssConfResult};
use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CACHE_CONTROL};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;
use url::Url;

const USER_AGENT: &str = concat!("gnssconf/", env!("CARGO_PKG_VERSION"));

/// Where a configuration or folder lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLocation {
    Url(Url),
    Path(PathBuf),
}

impl ConfigLocation {
    /// `http(s)://` strings become URLs, anything else a path
    pub fn parse(raw: &str) -> GnssConfResult<Self> {
        let lower = raw.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Url::parse(raw)
                .map(ConfigLocation::Url)
                .map_err(|e| GnssConfError::InvalidInput(format!("{}: {}", raw, e)))
        } else {
            Ok(ConfigLocation::Path(PathBuf::from(raw)))
        }
    }

    /// Resolve a name below this location, treated as a folder
    pub fn join(&self, name: &str) -> GnssConfResult<Self> {
        match self {
            ConfigLocation::Url(base) => folder_url(base)
                .join(name)
                .map(ConfigLocation::Url)
                .map_err(|e| GnssConfError::InvalidInput(format!("{}: {}", name, e))),
            ConfigLocation::Path(dir) => Ok(ConfigLocation::Path(dir.join(name))),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, ConfigLocation::Url(_))
    }
}

fn folder_url(url: &Url) -> Url {
    let mut folder = url.clone();
    if !folder.path().ends_with('/') {
        let path = format!("{}/", folder.path());
        folder.set_path(&path);
    }
    folder
}

impl fmt::Display for ConfigLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigLocation::Url(url) => write!(f, "{}", url),
            ConfigLocation::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

impl From<&Path> for ConfigLocation {
    fn from(path: &Path) -> Self {
        ConfigLocation::Path(path.to_path_buf())
    }
}

/// Read access to configuration resources
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Body of a resource as text
    async fn fetch_text(&self, location: &ConfigLocation) -> GnssConfResult<String>;

    /// File names inside a folder
    async fn list_directory(&self, location: &ConfigLocation) -> GnssConfResult<Vec<String>>;
}

/// HTTP and file system fetcher
pub struct ResourceFetcher {
    client: reqwest::Client,
}

impl ResourceFetcher {
    pub fn new(timeout: Duration) -> GnssConfResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| GnssConfError::Config {
                message: format!("HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }

    pub fn from_settings(settings: &DiscoverySettings) -> GnssConfResult<Self> {
        Self::new(Duration::from_secs(settings.timeout_secs.max(1)))
    }

    async fn get(&self, url: &Url) -> GnssConfResult<String> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "application/json, text/html, text/plain, */*")
            .send()
            .await
            .map_err(|e| GnssConfError::load_failure(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GnssConfError::load_failure(url, format!("HTTP {}", status.as_u16())));
        }

        response
            .text()
            .await
            .map_err(|e| GnssConfError::load_failure(url, e))
    }
}

#[async_trait]
impl Fetcher for ResourceFetcher {
    async fn fetch_text(&self, location: &ConfigLocation) -> GnssConfResult<String> {
        match location {
            ConfigLocation::Url(url) => self.get(url).await,
            ConfigLocation::Path(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|e| GnssConfError::load_failure(path.display(), e)),
        }
    }

    async fn list_directory(&self, location: &ConfigLocation) -> GnssConfResult<Vec<String>> {
        match location {
            ConfigLocation::Url(url) => {
                let html = self.get(&folder_url(url)).await?;
                Ok(listing_hrefs(&html))
            }
            ConfigLocation::Path(dir) => {
                let mut entries = tokio::fs::read_dir(dir)
                    .await
                    .map_err(|e| GnssConfError::load_failure(dir.display(), e))?;
                let mut names = Vec::new();
                while let Some(entry) = entries
                    .next_entry()
                    .await
                    .map_err(|e| GnssConfError::load_failure(dir.display(), e))?
                {
                    let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
                    if is_file {
                        names.push(entry.file_name().to_string_lossy().into_owned());
                    }
                }
                Ok(names)
            }
        }
    }
}

fn href_regex() -> &'static Regex {
    static HREF: OnceLock<Regex> = OnceLock::new();
    HREF.get_or_init(|| {
        Regex::new(r#"(?i)<a\s[^>]*?href\s*=\s*["']([^"']+)["']"#).expect("static href pattern")
    })
}

/// File links of an HTML auto-index page. Sorting links (`?C=N;O=D`),
/// absolute links and sub-folders are skipped.
pub fn listing_hrefs(html: &str) -> Vec<String> {
    href_regex()
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .filter(|href| !href.starts_with('?') && !href.starts_with('/') && !href.ends_with('/'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_location() {
        assert!(ConfigLocation::parse("https://example.org/conf").unwrap().is_remote());
        assert_eq!(
            ConfigLocation::parse("conf_files/rover.txt").unwrap(),
            ConfigLocation::Path(PathBuf::from("conf_files/rover.txt"))
        );
    }

    #[test]
    fn test_join_url_without_trailing_slash() {
        let base = ConfigLocation::parse("https://example.org/site").unwrap();
        let joined = base.join("conf_files").unwrap().join("manifest.json").unwrap();
        assert_eq!(
            joined.to_string(),
            "https://example.org/site/conf_files/manifest.json"
        );
    }

    #[test]
    fn test_listing_hrefs() {
        let html = r#"<html><body>
            <a href="?C=N;O=D">Name</a>
            <a href="/">Parent</a>
            <a href="sub/">sub/</a>
            <a href="rover.txt">rover.txt</a>
            <A HREF='base_um980.cfg'>base</A>
            </body></html>"#;
        assert_eq!(listing_hrefs(html), vec!["rover.txt", "base_um980.cfg"]);
    }

    #[tokio::test]
    async fn test_local_fetch_and_listing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("rover.txt"), "CMD\n").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let fetcher = ResourceFetcher::new(Duration::from_secs(1)).unwrap();
        let folder = ConfigLocation::from(dir.path());

        let names = fetcher.list_directory(&folder).await.unwrap();
        assert_eq!(names, vec!["rover.txt"]);

        let text = fetcher.fetch_text(&folder.join("rover.txt").unwrap()).await.unwrap();
        assert_eq!(text, "CMD\n");

        let missing = fetcher.fetch_text(&folder.join("none.txt").unwrap()).await;
        assert!(matches!(missing, Err(GnssConfError::ConfigLoadFailure { .. })));
    }
}
