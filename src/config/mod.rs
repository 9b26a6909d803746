/// Configuration management
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the directory used under the platform config and data dirs
pub const APP_DIR_NAME: &str = "spotify-autopause";

const CONFIG_FILE: &str = "config.toml";

/// Errors raised while loading or saving the configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unable to determine {0} directory")]
    NoPlatformDir(&'static str),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub spotify: SpotifyConfig,
    pub poller: PollerConfig,
    pub browser: BrowserConfig,
}

/// General application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
    /// Where the settings and credential stores live
    pub data_dir: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            data_dir: None,
        }
    }
}

/// Spotify Web API and OAuth settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotifyConfig {
    /// Spotify Client ID (OAuth application, implicit grant)
    pub client_id: String,
    /// Redirect URI registered for the application
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub api_base_url: String,
    pub accounts_url: String,
    /// Overall HTTP timeout; reqwest's default when unset
    pub request_timeout_secs: Option<u64>,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: "c08dd0211d9247a3b9f70cc54033f6ac".to_string(),
            redirect_uri: "https://hfiaballdkncfjfbnahiclnfockjnbpc.chromiumapp.org/".to_string(),
            scopes: [
                "user-read-private",
                "user-read-email",
                "playlist-read-private",
                "user-library-read",
                "user-modify-playback-state",
                "user-read-playback-state",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            api_base_url: "https://api.spotify.com/v1".to_string(),
            accounts_url: "https://accounts.spotify.com".to_string(),
            request_timeout_secs: None,
        }
    }
}

/// Audio poller settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    pub interval_ms: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self { interval_ms: 1000 }
    }
}

/// Browser bridge settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// JSON snapshot of the open tabs, kept up to date by the browser bridge
    pub tabs_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default location or create it
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir()?.join(CONFIG_FILE);
        Self::load_from(&config_path)
    }

    /// Load configuration from `path`, writing the defaults there if it does not exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            Ok(toml::from_str(&content)?)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_dir()?.join(CONFIG_FILE);
        self.save_to(&config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(io_error)?;
        Ok(())
    }

    /// Get configuration directory path
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        let dir = dirs::config_dir()
            .ok_or(ConfigError::NoPlatformDir("config"))?
            .join(APP_DIR_NAME);
        Ok(dir)
    }

    /// Directory holding the settings and credential stores
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(ref custom_dir) = self.general.data_dir {
            Ok(custom_dir.clone())
        } else {
            Ok(dirs::data_dir()
                .ok_or(ConfigError::NoPlatformDir("data"))?
                .join(APP_DIR_NAME))
        }
    }

    pub fn tabs_file(&self) -> Result<PathBuf, ConfigError> {
        match self.browser.tabs_file {
            Some(ref path) => Ok(path.clone()),
            None => Ok(self.data_dir()?.join("tabs.json")),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        // a zero period would make tokio's interval panic
        Duration::from_millis(self.poller.interval_ms.max(1))
    }
}
