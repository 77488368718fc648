use async_trait::async_trait;
use gnssconf::domain::config::{DiscoverySettings, GitHubSettings};
use gnssconf::infrastructure::discovery::{load_config, ConfigDiscovery, DiscoveryOrigin};
use gnssconf::infrastructure::fetch::{ConfigLocation, Fetcher, ResourceFetcher};
use gnssconf::{GnssConfError, GnssConfResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Fetcher serving canned bodies and remembering every request
#[derive(Default)]
struct RecordingFetcher {
    texts: HashMap<String, String>,
    listings: HashMap<String, Vec<String>>,
    requests: Mutex<Vec<String>>,
}

impl RecordingFetcher {
    fn text(mut self, location: &str, body: &str) -> Self {
        self.texts.insert(location.to_string(), body.to_string());
        self
    }

    fn listing(mut self, location: &str, names: &[&str]) -> Self {
        self.listings
            .insert(location.to_string(), names.iter().map(|n| n.to_string()).collect());
        self
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, location: &ConfigLocation) -> String {
        let key = location.to_string();
        self.requests.lock().unwrap().push(key.clone());
        key
    }
}

#[async_trait]
impl Fetcher for RecordingFetcher {
    async fn fetch_text(&self, location: &ConfigLocation) -> GnssConfResult<String> {
        let key = self.record(location);
        self.texts.get(&key).cloned().ok_or_else(|| GnssConfError::ConfigLoadFailure {
            location: key,
            message: "HTTP 404".to_string(),
        })
    }

    async fn list_directory(&self, location: &ConfigLocation) -> GnssConfResult<Vec<String>> {
        let key = self.record(location);
        self.listings.get(&key).cloned().ok_or_else(|| GnssConfError::ConfigLoadFailure {
            location: key,
            message: "HTTP 404".to_string(),
        })
    }
}

const SITE: &str = "https://rtk.example.org/site";
const FOLDER: &str = "https://rtk.example.org/site/conf_files";
const MANIFEST: &str = "https://rtk.example.org/site/conf_files/manifest.json";

fn remote_settings(github: bool) -> DiscoverySettings {
    DiscoverySettings {
        base: Some(SITE.to_string()),
        github: GitHubSettings {
            enabled: github,
            owner: "acme".to_string(),
            repo: "rtk-configs".to_string(),
            branches: vec!["gh-pages".to_string(), "main".to_string()],
            ..GitHubSettings::default()
        },
        ..DiscoverySettings::default()
    }
}

fn contents_url(branch: &str) -> String {
    format!(
        "https://api.github.com/repos/acme/rtk-configs/contents/conf_files?ref={}",
        branch
    )
}

/// Discovery chain tests
#[cfg(test)]
mod discovery_tests {
    use super::*;

    #[tokio::test]
    async fn test_manifest_short_circuits_other_sources() {
        let fetcher = Arc::new(
            RecordingFetcher::default()
                .text(
                    MANIFEST,
                    r#"{"items":[{"file":"rover.txt","label":"Rover"},{"file":"Base_Station.cfg"},{"file":"readme.md"}]}"#,
                )
                .listing(FOLDER, &["other.txt"]),
        );
        let discovery = ConfigDiscovery::from_settings(&remote_settings(true), fetcher.clone()).unwrap();

        let discovered = discovery.discover().await.unwrap();
        assert_eq!(discovered.origin, DiscoveryOrigin::Manifest);
        let labels: Vec<_> = discovered.entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["Base Station", "Rover"]);
        assert_eq!(
            discovered.find("rover").unwrap().location.to_string(),
            "https://rtk.example.org/site/conf_files/rover.txt"
        );
        assert_eq!(fetcher.requests(), vec![MANIFEST.to_string()]);
    }

    #[tokio::test]
    async fn test_listing_used_when_manifest_missing() {
        let fetcher = Arc::new(RecordingFetcher::default().listing(
            FOLDER,
            &["b.txt", "./A.conf", "c.txt?raw=1", "image.png"],
        ));
        let discovery = ConfigDiscovery::from_settings(&remote_settings(true), fetcher.clone()).unwrap();

        let discovered = discovery.discover().await.unwrap();
        assert_eq!(discovered.origin, DiscoveryOrigin::Local);
        let names: Vec<_> = discovered.entries.iter().map(|e| e.file_name.as_str()).collect();
        assert_eq!(names, vec!["A.conf", "b.txt", "c.txt"]);
        assert_eq!(fetcher.requests(), vec![MANIFEST.to_string(), FOLDER.to_string()]);
    }

    #[tokio::test]
    async fn test_github_branches_tried_in_order() {
        let listing = r#"[
            {"type":"dir","name":"old","download_url":null},
            {"type":"file","name":"rover.txt","download_url":"https://raw.example.org/acme/main/conf_files/rover.txt"},
            {"type":"file","name":"notes.md","download_url":"https://raw.example.org/acme/main/conf_files/notes.md"}
        ]"#;
        let fetcher = Arc::new(RecordingFetcher::default().text(&contents_url("main"), listing));
        let discovery = ConfigDiscovery::from_settings(&remote_settings(true), fetcher.clone()).unwrap();

        let discovered = discovery.discover().await.unwrap();
        assert_eq!(discovered.origin, DiscoveryOrigin::GitHub);
        assert_eq!(discovered.entries.len(), 1);
        assert_eq!(
            discovered.entries[0].location.to_string(),
            "https://raw.example.org/acme/main/conf_files/rover.txt"
        );
        assert_eq!(
            fetcher.requests(),
            vec![
                MANIFEST.to_string(),
                FOLDER.to_string(),
                contents_url("gh-pages"),
                contents_url("main"),
            ]
        );
    }

    #[tokio::test]
    async fn test_nothing_found() {
        let fetcher = Arc::new(RecordingFetcher::default().text(MANIFEST, "[]"));
        let discovery = ConfigDiscovery::from_settings(&remote_settings(false), fetcher.clone()).unwrap();

        let result = discovery.discover().await;
        assert!(matches!(result, Err(GnssConfError::ConfigLoadFailure { .. })));
        assert_eq!(fetcher.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_local_folder_and_load() {
        let dir = TempDir::new().unwrap();
        let folder = dir.path().join("conf_files");
        std::fs::create_dir(&folder).unwrap();
        std::fs::write(folder.join("rover_rtk.txt"), "\u{feff}#title: Rover\r\nMODE ROVER\r\n").unwrap();
        std::fs::write(folder.join("notes.md"), "not a config").unwrap();
        std::fs::create_dir(folder.join("archive.txt")).unwrap();

        let settings = DiscoverySettings {
            base: Some(dir.path().display().to_string()),
            github: GitHubSettings {
                enabled: false,
                ..GitHubSettings::default()
            },
            ..DiscoverySettings::default()
        };
        let fetcher: Arc<dyn Fetcher> = Arc::new(ResourceFetcher::new(Duration::from_secs(1)).unwrap());
        let discovery = ConfigDiscovery::from_settings(&settings, Arc::clone(&fetcher)).unwrap();

        let discovered = discovery.discover().await.unwrap();
        assert_eq!(discovered.origin, DiscoveryOrigin::Local);
        assert_eq!(discovered.entries.len(), 1);
        let entry = &discovered.entries[0];
        assert_eq!(entry.label, "rover rtk");

        let text = load_config(fetcher.as_ref(), &entry.location).await.unwrap();
        assert_eq!(text, "#title: Rover\nMODE ROVER\n");
    }
}
