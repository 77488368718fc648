use crate::domain::{config::GnssConfConfig, error::{GnssConfError, GnssConfResult}};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const APP_DIR: &str = "gnssconf";
const PROJECT_DIR: &str = ".gnssconf";
const CONFIG_FILE: &str = "config.toml";

/// Settings file manager
pub struct ConfigManager {
    global_config_path: PathBuf,
    project_config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Create new configuration manager
    pub fn new() -> GnssConfResult<Self> {
        let global_config_path = Self::get_global_config_path()?;
        let project_config_path = std::env::current_dir()
            .ok()
            .and_then(|dir| Self::find_project_config_path(&dir));

        Ok(Self {
            global_config_path,
            project_config_path,
        })
    }

    /// Manager reading exactly the given files
    pub fn with_paths(global_config_path: PathBuf, project_config_path: Option<PathBuf>) -> Self {
        Self {
            global_config_path,
            project_config_path,
        }
    }

    /// Load settings: defaults, then the global file, then the project file.
    /// Keys present in a later file replace earlier ones.
    pub fn load_config(&self) -> GnssConfResult<GnssConfConfig> {
        let mut merged = toml::Value::Table(toml::map::Map::new());

        if self.global_config_path.exists() {
            debug!("Loading settings from {}", self.global_config_path.display());
            merge_values(&mut merged, read_value(&self.global_config_path)?);
        }

        if let Some(project_path) = &self.project_config_path {
            if project_path.exists() {
                debug!("Loading project settings from {}", project_path.display());
                merge_values(&mut merged, read_value(project_path)?);
            }
        }

        merged.try_into().map_err(|e: toml::de::Error| GnssConfError::Config {
            message: format!("Invalid settings: {}", e),
        })
    }

    /// Write a default settings file to the global location
    pub fn init_config(&self, force: bool) -> GnssConfResult<PathBuf> {
        let path = self.global_config_path.clone();
        if path.exists() && !force {
            return Err(GnssConfError::Config {
                message: format!("Settings file already exists: {}", path.display()),
            });
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| GnssConfError::Config {
                message: format!("Failed to create config directory: {}", e),
            })?;
        }

        self.save_config_to_path(&path, &GnssConfConfig::default())?;
        Ok(path)
    }

    /// Get global configuration path
    fn get_global_config_path() -> GnssConfResult<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| GnssConfError::Config {
            message: "Could not determine home directory".to_string(),
        })?;

        Ok(home.join(".config").join(APP_DIR).join(CONFIG_FILE))
    }

    /// Find project configuration path by walking up directory tree
    fn find_project_config_path(start: &Path) -> Option<PathBuf> {
        let mut path = start;

        loop {
            let config_path = path.join(PROJECT_DIR).join(CONFIG_FILE);
            if config_path.exists() {
                return Some(config_path);
            }

            path = path.parent()?;
        }
    }

    /// Load configuration from specific path
    pub fn load_config_from_path(&self, path: &Path) -> GnssConfResult<GnssConfConfig> {
        let content = fs::read_to_string(path).map_err(|e| GnssConfError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        toml::from_str(&content).map_err(|e| GnssConfError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })
    }

    /// Save configuration to specific path
    pub fn save_config_to_path(&self, path: &Path, config: &GnssConfConfig) -> GnssConfResult<()> {
        let content = toml::to_string_pretty(config).map_err(|e| GnssConfError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(path, content).map_err(|e| GnssConfError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })
    }

    /// Get the global config path
    pub fn get_global_config_path_ref(&self) -> &PathBuf {
        &self.global_config_path
    }
}

fn read_value(path: &Path) -> GnssConfResult<toml::Value> {
    let content = fs::read_to_string(path).map_err(|e| GnssConfError::Config {
        message: format!("Failed to read config file {}: {}", path.display(), e),
    })?;

    content.parse::<toml::Value>().map_err(|e| GnssConfError::Config {
        message: format!("Failed to parse config file {}: {}", path.display(), e),
    })
}

/// Deep-merge `overlay` into `base`; tables merge, everything else replaces.
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
