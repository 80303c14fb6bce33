//! Application configuration for SheetLoad.
//!
//! User config lives at `~/.sheetload/sheetload.toml`.
//! CLI flags override config file values, which override defaults.
//!
//! Secrets (webhook URLs, access tokens) are never stored here: the config
//! only names the environment variables that hold them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SheetloadError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "sheetload.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".sheetload";

// ---------------------------------------------------------------------------
// Config structs (matching sheetload.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// File and directory locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Spreadsheet source settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Notification sinks.
    #[serde(default)]
    pub notify: NotifyConfig,

    /// HTTP entrypoint settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Multi-job JSON file mapping job keys to job records.
    #[serde(default = "default_jobs_file")]
    pub jobs_file: String,

    /// Directory of per-job files (`<key>.json`). Takes precedence over
    /// `jobs_file` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs_dir: Option<String>,

    /// Directory schema file references are resolved against.
    #[serde(default = "default_schemas_dir")]
    pub schemas_dir: String,

    /// libSQL database file backing the destination warehouse.
    #[serde(default = "default_warehouse_path")]
    pub warehouse_path: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            jobs_file: default_jobs_file(),
            jobs_dir: None,
            schemas_dir: default_schemas_dir(),
            warehouse_path: default_warehouse_path(),
        }
    }
}

fn default_jobs_file() -> String {
    "configs/main_configs.json".into()
}
fn default_schemas_dir() -> String {
    "schemas".into()
}
fn default_warehouse_path() -> String {
    "var/warehouse.db".into()
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the spreadsheet values API.
    #[serde(default = "default_source_base_url")]
    pub base_url: String,

    /// Name of the env var holding a bearer access token.
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_source_base_url(),
            token_env: default_token_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_source_base_url() -> String {
    "https://sheets.googleapis.com".into()
}
fn default_token_env() -> String {
    "GOOGLE_OAUTH_ACCESS_TOKEN".into()
}
fn default_timeout_secs() -> u64 {
    60
}

/// `[notify]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Name of the env var holding the Slack incoming-webhook URL.
    #[serde(default = "default_slack_env")]
    pub slack_webhook_env: String,

    /// Name of the env var holding the Jandi incoming-webhook URL.
    #[serde(default = "default_jandi_env")]
    pub jandi_webhook_env: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            slack_webhook_env: default_slack_env(),
            jandi_webhook_env: default_jandi_env(),
        }
    }
}

fn default_slack_env() -> String {
    "SLACK_WEBHOOK_URL".into()
}
fn default_jandi_env() -> String {
    "JANDI_WEBHOOK_URL".into()
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.sheetload/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SheetloadError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.sheetload/sheetload.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| SheetloadError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        SheetloadError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SheetloadError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SheetloadError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SheetloadError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read an env var, treating unset and empty as absent.
pub fn env_value(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Some(val.trim().to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("jobs_file"));
        assert!(toml_str.contains("SLACK_WEBHOOK_URL"));
        assert!(!toml_str.contains("jobs_dir"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.paths.schemas_dir, "schemas");
        assert_eq!(parsed.server.port, 8080);
        assert_eq!(parsed.notify.jandi_webhook_env, "JANDI_WEBHOOK_URL");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[paths]
jobs_dir = "/srv/jobs"

[source]
base_url = "http://localhost:9000"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.paths.jobs_dir.as_deref(), Some("/srv/jobs"));
        assert_eq!(config.paths.jobs_file, "configs/main_configs.json");
        assert_eq!(config.source.base_url, "http://localhost:9000");
        assert_eq!(config.source.token_env, "GOOGLE_OAUTH_ACCESS_TOKEN");
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn env_value_treats_empty_as_absent() {
        // Unique env var names avoid interfering with other tests
        assert!(env_value("SL_TEST_NONEXISTENT_VAR_12345").is_none());
    }
}
