//! Application configuration for Courseware.
//!
//! User config lives at `~/.courseware/courseware.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CoursewareError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "courseware.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".courseware";

// ---------------------------------------------------------------------------
// Config structs (matching courseware.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Video download preferences.
    #[serde(default)]
    pub downloads: DownloadsConfig,

    /// Find-courses search settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Stored credentials answered to HTTP authentication challenges.
    #[serde(default)]
    pub credentials: Vec<HostCredential>,
}

/// `[downloads]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadsConfig {
    /// Only allow video downloads while connected to Wi-Fi.
    #[serde(default = "default_true")]
    pub only_on_wifi: bool,

    /// Reachability answer for front-ends without a radio to ask.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_wifi: Option<bool>,
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            only_on_wifi: true,
            on_wifi: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// `[search]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Base URL the search bar appends `search_query` to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<Url>,

    /// Course detail page template; `{path_id}` is replaced by the course path id.
    #[serde(default)]
    pub course_info_url_template: String,
}

/// `[[credentials]]` entry: basic-auth credential for one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostCredential {
    /// Host name the credential applies to (case-insensitive).
    pub host: String,
    pub username: String,
    pub password: String,
}

impl AppConfig {
    /// Credential configured for `host`, if any.
    pub fn credential_for_host(&self, host: &str) -> Option<&HostCredential> {
        self.credentials
            .iter()
            .find(|c| c.host.eq_ignore_ascii_case(host))
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.courseware/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CoursewareError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.courseware/courseware.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CoursewareError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        CoursewareError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CoursewareError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CoursewareError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CoursewareError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
