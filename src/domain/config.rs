use serde::{Deserialize, Serialize};

/// gnssconf settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GnssConfConfig {
    /// Global settings
    #[serde(default)]
    pub global: GlobalConfig,
    /// Serial link settings
    #[serde(default)]
    pub serial: SerialSettings,
    /// Batch transmission settings
    #[serde(default)]
    pub batch: BatchSettings,
    /// Configuration file discovery settings
    #[serde(default)]
    pub discovery: DiscoverySettings,
}

/// Global settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Default log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Serial link settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialSettings {
    /// Fixed port path; bypasses the vendor filter when set
    #[serde(default)]
    pub port: Option<String>,
    /// Baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// USB vendor IDs accepted during device selection
    #[serde(default = "default_vendor_ids")]
    pub vendor_ids: Vec<u16>,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default)]
    pub parity: ParityConfig,
    #[serde(default)]
    pub flow_control: FlowControlConfig,
    /// Blocking read timeout of the receive thread in milliseconds
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,
}

/// Batch transmission settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSettings {
    /// Delay between two commands in seconds
    #[serde(default = "default_delay_secs")]
    pub delay_secs: f64,
    /// Line terminator selector (LF, CRLF, CR, NONE or an escape template like "\r\n")
    #[serde(default = "default_terminator")]
    pub terminator: String,
    /// Time to keep listening for echoes once a batch is done, in milliseconds
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

/// Configuration file discovery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverySettings {
    /// Base URL or local directory holding the configuration folder
    #[serde(default)]
    pub base: Option<String>,
    /// Configuration folder name below the base
    #[serde(default = "default_conf_dir")]
    pub conf_dir: String,
    /// Manifest file name inside the configuration folder
    #[serde(default = "default_manifest")]
    pub manifest: String,
    /// Hosting API fallback
    #[serde(default)]
    pub github: GitHubSettings,
    /// HTTP timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

/// Repository listed through the GitHub contents API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubSettings {
    #[serde(default = "default_github_enabled")]
    pub enabled: bool,
    #[serde(default = "default_github_owner")]
    pub owner: String,
    #[serde(default = "default_github_repo")]
    pub repo: String,
    /// Branches tried in order
    #[serde(default = "default_github_branches")]
    pub branches: Vec<String>,
    #[serde(default = "default_github_api")]
    pub api_base: String,
}

/// Parity configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParityConfig {
    #[default]
    None,
    Odd,
    Even,
}

/// Flow control configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowControlConfig {
    #[default]
    None,
    Hardware,
    Software,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_baud_rate() -> u32 {
    115_200
}

fn default_vendor_ids() -> Vec<u16> {
    crate::core::transport::DEFAULT_VENDOR_IDS.to_vec()
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

fn default_read_timeout() -> u64 {
    100
}

fn default_delay_secs() -> f64 {
    5.0
}

fn default_terminator() -> String {
    "CRLF".to_string()
}

fn default_settle_ms() -> u64 {
    1000
}

fn default_conf_dir() -> String {
    "conf_files".to_string()
}

fn default_manifest() -> String {
    "manifest.json".to_string()
}

fn default_http_timeout() -> u64 {
    10
}

fn default_github_enabled() -> bool {
    true
}

fn default_github_owner() -> String {
    "jancelin".to_string()
}

fn default_github_repo() -> String {
    "WebSerial-CRTK".to_string()
}

fn default_github_branches() -> Vec<String> {
    vec!["gh-pages".to_string(), "main".to_string(), "master".to_string()]
}

fn default_github_api() -> String {
    "https://api.github.com".to_string()
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: default_baud_rate(),
            vendor_ids: default_vendor_ids(),
            data_bits: default_data_bits(),
            stop_bits: default_stop_bits(),
            parity: ParityConfig::default(),
            flow_control: FlowControlConfig::default(),
            read_timeout_ms: default_read_timeout(),
        }
    }
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            delay_secs: default_delay_secs(),
            terminator: default_terminator(),
            settle_ms: default_settle_ms(),
        }
    }
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            base: None,
            conf_dir: default_conf_dir(),
            manifest: default_manifest(),
            github: GitHubSettings::default(),
            timeout_secs: default_http_timeout(),
        }
    }
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            enabled: default_github_enabled(),
            owner: default_github_owner(),
            repo: default_github_repo(),
            branches: default_github_branches(),
            api_base: default_github_api(),
        }
    }
}
