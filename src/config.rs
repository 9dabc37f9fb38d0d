//! Configuration file utilities
//!
//! The upload endpoint is external configuration: it is read from
//! `config.json` in the platform-specific config directory under
//! "crop-diagnosis-uploader/", can be overridden from the environment, and
//! finally from command-line flags.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::upload_client::DEFAULT_TIMEOUT_SECS;

pub const APP_DIR_NAME: &str = "crop-diagnosis-uploader";
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Route served by the classification server
pub const DEFAULT_ENDPOINT_URL: &str = "http://127.0.0.1:8000/upload";

pub const ENDPOINT_ENV_VAR: &str = "CROP_UPLOADER_ENDPOINT";
pub const TIMEOUT_ENV_VAR: &str = "CROP_UPLOADER_TIMEOUT_SECS";

/// Settings for talking to the classifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploaderConfig {
    pub endpoint_url: String,
    pub timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staging_dir: Option<PathBuf>,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            endpoint_url: DEFAULT_ENDPOINT_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            staging_dir: None,
        }
    }
}

impl UploaderConfig {
    /// Load from the config directory, falling back to defaults when no file exists
    pub fn load() -> Result<Self, String> {
        Ok(load_config_file(CONFIG_FILE_NAME)?.unwrap_or_default())
    }

    /// Load from an explicit file path
    pub fn load_from(path: &Path) -> Result<Self, String> {
        Ok(read_json_file(path)?.unwrap_or_default())
    }

    /// Persist to the config directory
    pub fn save(&self) -> Result<PathBuf, String> {
        save_config_file(CONFIG_FILE_NAME, self)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Apply `CROP_UPLOADER_ENDPOINT` / `CROP_UPLOADER_TIMEOUT_SECS`
    pub fn apply_env(self) -> Self {
        self.apply_overrides(
            std::env::var(ENDPOINT_ENV_VAR).ok().as_deref(),
            std::env::var(TIMEOUT_ENV_VAR).ok().as_deref(),
        )
    }

    /// Apply command-line flags, which win over everything else
    pub fn apply_flags(mut self, endpoint: Option<String>, timeout_secs: Option<u64>) -> Self {
        if let Some(url) = endpoint {
            self.endpoint_url = url;
        }
        if let Some(secs) = timeout_secs {
            self.timeout_secs = secs;
        }
        self
    }

    /// Apply raw override values; blank or invalid values are ignored
    pub fn apply_overrides(mut self, endpoint: Option<&str>, timeout_secs: Option<&str>) -> Self {
        if let Some(url) = endpoint.map(str::trim).filter(|u| !u.is_empty()) {
            self.endpoint_url = url.to_string();
        }

        if let Some(raw) = timeout_secs {
            match parse_timeout_secs(raw) {
                Ok(secs) => self.timeout_secs = secs,
                Err(e) => tracing::warn!(value = raw, error = %e, "Ignoring timeout override"),
            }
        }

        self
    }
}

/// Parse a positive number of seconds
pub fn parse_timeout_secs(raw: &str) -> Result<u64, String> {
    let secs: u64 = raw
        .trim()
        .parse()
        .map_err(|e| format!("Invalid timeout '{}': {}", raw.trim(), e))?;
    if secs == 0 {
        return Err("Timeout must be at least 1 second".to_string());
    }
    Ok(secs)
}

/// Get the app's config directory path.
///
/// Returns: `~/.config/crop-diagnosis-uploader` (Linux)
///          `~/Library/Application Support/crop-diagnosis-uploader` (macOS)
///          `C:\Users\<User>\AppData\Roaming\crop-diagnosis-uploader` (Windows)
pub fn get_config_dir() -> Result<PathBuf, String> {
    let config_dir = dirs::config_dir()
        .ok_or("Could not find config directory")?;
    Ok(config_dir.join(APP_DIR_NAME))
}

/// Get the directory where log files are written.
///
/// Returns: `~/.crop-diagnosis-uploader/logs`
pub fn get_logs_dir() -> Result<PathBuf, String> {
    let home_dir = dirs::home_dir()
        .ok_or_else(|| "Could not find home directory".to_string())?;
    Ok(home_dir.join(format!(".{}", APP_DIR_NAME)).join("logs"))
}

/// Get the full path to a config file.
pub fn config_file_path(filename: &str) -> Result<PathBuf, String> {
    Ok(get_config_dir()?.join(filename))
}

/// Save data to a config file as JSON.
///
/// # Returns
/// The path where the file was saved
pub fn save_config_file<T: Serialize>(filename: &str, data: &T) -> Result<PathBuf, String> {
    let config_file = config_file_path(filename)?;
    write_json_file(&config_file, data)?;
    Ok(config_file)
}

/// Load data from a config file.
///
/// # Returns
/// * `Ok(Some(data))` if file exists and was parsed successfully
/// * `Ok(None)` if file doesn't exist
/// * `Err(...)` if file exists but couldn't be read/parsed
pub fn load_config_file<T: DeserializeOwned>(filename: &str) -> Result<Option<T>, String> {
    read_json_file(&config_file_path(filename)?)
}

fn write_json_file<T: Serialize>(path: &Path, data: &T) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }

    let json = serde_json::to_string_pretty(data)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;

    fs::write(path, json)
        .map_err(|e| format!("Failed to write config file: {}", e))
}

fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, String> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file: {}", e))?;

    let data = serde_json::from_str(&contents)
        .map_err(|e| format!("Failed to parse config file: {}", e))?;

    Ok(Some(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = UploaderConfig::default();
        assert_eq!(config.endpoint_url, "http://127.0.0.1:8000/upload");
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert!(config.staging_dir.is_none());
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = UploaderConfig::load_from(&temp_dir.path().join("config.json")).unwrap();
        assert_eq!(config, UploaderConfig::default());
    }

    #[test]
    fn test_write_then_load_from() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.json");
        let config = UploaderConfig {
            endpoint_url: "http://192.168.1.20:8000/upload".to_string(),
            timeout_secs: 15,
            staging_dir: Some(temp_dir.path().join("staging")),
        };

        write_json_file(&path, &config).unwrap();
        let loaded = UploaderConfig::load_from(&path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, r#"{"endpoint_url": "http://example.com/upload"}"#).unwrap();

        let config = UploaderConfig::load_from(&path).unwrap();

        assert_eq!(config.endpoint_url, "http://example.com/upload");
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_invalid_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();

        let err = UploaderConfig::load_from(&path).unwrap_err();
        assert!(err.contains("Failed to parse config file"));
    }

    #[test]
    fn test_overrides_replace_values() {
        let config = UploaderConfig::default()
            .apply_overrides(Some(" http://10.0.0.5:8000/upload "), Some("30"));

        assert_eq!(config.endpoint_url, "http://10.0.0.5:8000/upload");
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_invalid_overrides_are_ignored() {
        let config = UploaderConfig::default().apply_overrides(Some("   "), Some("soon"));
        assert_eq!(config, UploaderConfig::default());

        let config = UploaderConfig::default().apply_overrides(None, Some("0"));
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_flags_replace_values() {
        let config = UploaderConfig::default()
            .apply_flags(Some("http://flag.local/upload".to_string()), Some(7));
        assert_eq!(config.endpoint_url, "http://flag.local/upload");
        assert_eq!(config.timeout_secs, 7);

        let untouched = UploaderConfig::default().apply_flags(None, None);
        assert_eq!(untouched, UploaderConfig::default());
    }

    #[test]
    fn test_apply_env_reads_variables() {
        // The only test that touches these variables
        std::env::set_var(ENDPOINT_ENV_VAR, "http://env.local:8000/upload");
        std::env::set_var(TIMEOUT_ENV_VAR, "12");

        let config = UploaderConfig::default().apply_env();

        std::env::remove_var(ENDPOINT_ENV_VAR);
        std::env::remove_var(TIMEOUT_ENV_VAR);

        assert_eq!(config.endpoint_url, "http://env.local:8000/upload");
        assert_eq!(config.timeout_secs, 12);
    }

    #[test]
    fn test_parse_timeout_secs() {
        assert_eq!(parse_timeout_secs("45"), Ok(45));
        assert!(parse_timeout_secs("0").is_err());
        assert!(parse_timeout_secs("-1").is_err());
    }

    #[test]
    fn test_get_config_dir_returns_path() {
        let result = get_config_dir();
        assert!(result.is_ok(), "Should return a config directory");
        let path = result.unwrap();
        assert!(path.to_string_lossy().contains(APP_DIR_NAME));
    }

    #[test]
    fn test_config_file_path_includes_filename() {
        let result = config_file_path("test.json");
        assert!(result.is_ok());
        let path = result.unwrap();
        assert!(path.to_string_lossy().contains("test.json"));
    }
}
