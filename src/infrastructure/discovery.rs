//! Configuration file discovery
//!
//! Sources are tried in order and the first one returning at least one file
//! wins: the JSON manifest, the folder listing, then the GitHub contents
//! API. A failing source is logged and skipped.

use crate::core::text::normalize_text;
use crate::domain::config::{DiscoverySettings, GitHubSettings};
use crate::domain::error::{GnssConfError, GnssConfResult};
use crate::infrastructure::fetch::{ConfigLocation, Fetcher};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// Extensions recognised as configuration files
pub const ALLOWED_EXTENSIONS: [&str; 7] = ["txt", "cfg", "conf", "ini", "nmea", "csv", "log"];

pub fn has_allowed_extension(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .map_or(false, |(stem, ext)| {
            !stem.is_empty() && ALLOWED_EXTENSIONS.iter().any(|a| a.eq_ignore_ascii_case(ext))
        })
}

/// File name without extension, underscores shown as spaces
pub fn display_label(file_name: &str) -> String {
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    };
    stem.replace('_', " ")
}

/// One discovered configuration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub file_name: String,
    pub label: String,
    pub location: ConfigLocation,
}

impl ConfigEntry {
    pub fn new(file_name: impl Into<String>, label: Option<String>, location: ConfigLocation) -> Self {
        let file_name = file_name.into();
        let label = label
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| display_label(&file_name));
        Self {
            file_name,
            label,
            location,
        }
    }

    /// Whether `name` designates this entry (file name, stem or label)
    pub fn matches_name(&self, name: &str) -> bool {
        let name = name.trim();
        self.file_name.eq_ignore_ascii_case(name)
            || self.label.eq_ignore_ascii_case(name)
            || self
                .file_name
                .rsplit_once('.')
                .map_or(false, |(stem, _)| stem.eq_ignore_ascii_case(name))
    }
}

/// Source that produced a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryOrigin {
    Manifest,
    Local,
    GitHub,
}

impl fmt::Display for DiscoveryOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryOrigin::Manifest => write!(f, "manifest"),
            DiscoveryOrigin::Local => write!(f, "local"),
            DiscoveryOrigin::GitHub => write!(f, "github"),
        }
    }
}

/// Result of a discovery run
#[derive(Debug, Clone)]
pub struct Discovered {
    pub origin: DiscoveryOrigin,
    pub entries: Vec<ConfigEntry>,
}

impl Discovered {
    pub fn find(&self, name: &str) -> Option<&ConfigEntry> {
        self.entries.iter().find(|entry| entry.matches_name(name))
    }
}

/// One way of listing configuration files
#[async_trait]
pub trait ConfigSource: Send + Sync {
    fn origin(&self) -> DiscoveryOrigin;

    async fn list(&self, fetcher: &dyn Fetcher) -> GnssConfResult<Vec<ConfigEntry>>;
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Manifest {
    /// Non-string entries are skipped
    Files(Vec<serde_json::Value>),
    Items { items: Vec<ManifestItem> },
}

#[derive(Debug, Deserialize)]
struct ManifestItem {
    file: String,
    #[serde(default)]
    label: Option<String>,
}

/// `manifest.json` inside the configuration folder
pub struct ManifestSource {
    folder: ConfigLocation,
    manifest: String,
}

impl ManifestSource {
    pub fn new(folder: ConfigLocation, manifest: impl Into<String>) -> Self {
        Self {
            folder,
            manifest: manifest.into(),
        }
    }
}

#[async_trait]
impl ConfigSource for ManifestSource {
    fn origin(&self) -> DiscoveryOrigin {
        DiscoveryOrigin::Manifest
    }

    async fn list(&self, fetcher: &dyn Fetcher) -> GnssConfResult<Vec<ConfigEntry>> {
        let location = self.folder.join(&self.manifest)?;
        let body = fetcher.fetch_text(&location).await?;
        let manifest: Manifest = serde_json::from_str(&body)
            .map_err(|e| GnssConfError::load_failure(&location, e))?;

        let items: Vec<(String, Option<String>)> = match manifest {
            Manifest::Files(files) => files
                .iter()
                .filter_map(serde_json::Value::as_str)
                .map(|file| (file.to_string(), None))
                .collect(),
            Manifest::Items { items } => items
                .into_iter()
                .map(|item| (item.file, item.label))
                .collect(),
        };

        let mut entries = Vec::new();
        for (file, label) in items {
            let file = file.trim();
            if file.is_empty() || !has_allowed_extension(file) {
                continue;
            }
            entries.push(ConfigEntry::new(file, label, self.folder.join(file)?));
        }
        Ok(entries)
    }
}

/// Folder listing: HTML auto-index over HTTP, `read_dir` locally
pub struct DirectoryListingSource {
    folder: ConfigLocation,
}

impl DirectoryListingSource {
    pub fn new(folder: ConfigLocation) -> Self {
        Self { folder }
    }
}

#[async_trait]
impl ConfigSource for DirectoryListingSource {
    fn origin(&self) -> DiscoveryOrigin {
        DiscoveryOrigin::Local
    }

    async fn list(&self, fetcher: &dyn Fetcher) -> GnssConfResult<Vec<ConfigEntry>> {
        let names = fetcher.list_directory(&self.folder).await?;
        let mut entries = Vec::new();
        for name in names {
            // Listings may carry "./file" or a query suffix
            let name = name.trim_start_matches("./");
            let name = name.split(['?', '#']).next().unwrap_or(name);
            if has_allowed_extension(name) {
                entries.push(ConfigEntry::new(name, None, self.folder.join(name)?));
            }
        }
        Ok(entries)
    }
}

#[derive(Debug, Deserialize)]
struct GitHubItem {
    #[serde(rename = "type")]
    kind: String,
    name: Option<String>,
    download_url: Option<String>,
}

/// GitHub contents API, one request per candidate branch
pub struct GitHubSource {
    settings: GitHubSettings,
    conf_dir: String,
}

impl GitHubSource {
    pub fn new(settings: GitHubSettings, conf_dir: impl Into<String>) -> Self {
        Self {
            settings,
            conf_dir: conf_dir.into(),
        }
    }

    fn contents_url(&self, branch: &str) -> GnssConfResult<Url> {
        let raw = format!(
            "{}/repos/{}/{}/contents/{}",
            self.settings.api_base.trim_end_matches('/'),
            self.settings.owner,
            self.settings.repo,
            self.conf_dir.trim_matches('/'),
        );
        let mut url = Url::parse(&raw).map_err(|e| GnssConfError::Config {
            message: format!("GitHub API URL {}: {}", raw, e),
        })?;
        url.query_pairs_mut().append_pair("ref", branch);
        Ok(url)
    }
}

#[async_trait]
impl ConfigSource for GitHubSource {
    fn origin(&self) -> DiscoveryOrigin {
        DiscoveryOrigin::GitHub
    }

    async fn list(&self, fetcher: &dyn Fetcher) -> GnssConfResult<Vec<ConfigEntry>> {
        for branch in &self.settings.branches {
            let location = ConfigLocation::Url(self.contents_url(branch)?);
            let items: Vec<GitHubItem> = match fetcher.fetch_text(&location).await {
                Ok(body) => match serde_json::from_str(&body) {
                    Ok(items) => items,
                    Err(e) => {
                        debug!("Unexpected contents listing on {}: {}", branch, e);
                        continue;
                    }
                },
                Err(e) => {
                    debug!("Branch {} unavailable: {}", branch, e);
                    continue;
                }
            };

            let mut entries = Vec::new();
            for item in items {
                let (Some(name), Some(download)) = (item.name, item.download_url) else {
                    continue;
                };
                if item.kind != "file" || !has_allowed_extension(&name) {
                    continue;
                }
                entries.push(ConfigEntry::new(name, None, ConfigLocation::parse(&download)?));
            }

            if !entries.is_empty() {
                debug!("{} file(s) on branch {}", entries.len(), branch);
                return Ok(entries);
            }
        }
        Ok(Vec::new())
    }
}

/// Ordered chain of configuration sources
pub struct ConfigDiscovery {
    fetcher: Arc<dyn Fetcher>,
    sources: Vec<Box<dyn ConfigSource>>,
}

impl ConfigDiscovery {
    pub fn new(fetcher: Arc<dyn Fetcher>, sources: Vec<Box<dyn ConfigSource>>) -> Self {
        Self { fetcher, sources }
    }

    /// Standard chain for the given settings. Without a base the current
    /// directory is used.
    pub fn from_settings(settings: &DiscoverySettings, fetcher: Arc<dyn Fetcher>) -> GnssConfResult<Self> {
        let base = ConfigLocation::parse(settings.base.as_deref().unwrap_or("."))?;
        let folder = base.join(&settings.conf_dir)?;

        let mut sources: Vec<Box<dyn ConfigSource>> = vec![
            Box::new(ManifestSource::new(folder.clone(), settings.manifest.clone())),
            Box::new(DirectoryListingSource::new(folder)),
        ];
        if settings.github.enabled {
            sources.push(Box::new(GitHubSource::new(
                settings.github.clone(),
                settings.conf_dir.clone(),
            )));
        }

        Ok(Self::new(fetcher, sources))
    }

    pub fn fetcher(&self) -> &Arc<dyn Fetcher> {
        &self.fetcher
    }

    /// Run the chain; fails only when every source comes back empty
    pub async fn discover(&self) -> GnssConfResult<Discovered> {
        for source in &self.sources {
            let origin = source.origin();
            match source.list(self.fetcher.as_ref()).await {
                Ok(mut entries) if !entries.is_empty() => {
                    entries.sort_by_key(|entry| entry.file_name.to_lowercase());
                    entries.dedup_by(|a, b| a.file_name == b.file_name);
                    info!("Found {} configuration(s) via {}", entries.len(), origin);
                    return Ok(Discovered { origin, entries });
                }
                Ok(_) => debug!("No configuration via {}", origin),
                Err(e) => debug!("Discovery via {} failed: {}", origin, e),
            }
        }

        Err(GnssConfError::ConfigLoadFailure {
            location: "configuration list".to_string(),
            message: "no configuration file found".to_string(),
        })
    }
}

/// Fetch a configuration and normalize its text
pub async fn load_config(fetcher: &dyn Fetcher, location: &ConfigLocation) -> GnssConfResult<String> {
    let raw = fetcher.fetch_text(location).await?;
    debug!("Loaded {} ({} bytes)", location, raw.len());
    Ok(normalize_text(&raw))
}

/// Read a local configuration file and normalize its text
pub async fn load_config_file(path: &Path) -> GnssConfResult<String> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| GnssConfError::load_failure(path.display(), e))?;
    Ok(normalize_text(&raw))
}
