use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Theme;

/// Application-level constants
pub const APP_NAME: &str = "ClinicOps";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Bounds for the dashboard refresh interval, in seconds.
pub const MIN_REFRESH_SECS: u32 = 1;
pub const MAX_REFRESH_SECS: u32 = 60;

/// Get the application data directory
/// ~/ClinicOps/ on all platforms; falls back to the working directory when
/// no home directory can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Get the ledger database path
pub fn ledger_db_path() -> PathBuf {
    app_data_dir().join("ledger.db")
}

/// Get the settings file path
pub fn settings_path() -> PathBuf {
    app_data_dir().join("settings.json")
}

/// Default tracing filter when `RUST_LOG` is not set
pub fn default_log_filter() -> &'static str {
    "clinic_ops_lib=info,warn"
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Setting {field} out of range: {value}")]
    OutOfRange { field: String, value: String },
}

/// User preferences, persisted as JSON next to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicSettings {
    pub username: String,
    pub theme: Theme,
    pub notifications: bool,
    pub refresh_rate_secs: u32,
}

impl Default for ClinicSettings {
    fn default() -> Self {
        Self {
            username: String::new(),
            theme: Theme::Light,
            notifications: true,
            refresh_rate_secs: 10,
        }
    }
}

impl ClinicSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_REFRESH_SECS..=MAX_REFRESH_SECS).contains(&self.refresh_rate_secs) {
            return Err(ConfigError::OutOfRange {
                field: "refresh_rate_secs".into(),
                value: self.refresh_rate_secs.to_string(),
            });
        }
        Ok(())
    }

    pub fn apply(&mut self, update: SettingsUpdate) {
        if let Some(username) = update.username {
            self.username = username.trim().to_string();
        }
        if let Some(theme) = update.theme {
            self.theme = theme;
        }
        if let Some(notifications) = update.notifications {
            self.notifications = notifications;
        }
        if let Some(secs) = update.refresh_rate_secs {
            self.refresh_rate_secs = secs;
        }
    }
}

/// A partial change to the stored settings; `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsUpdate {
    pub username: Option<String>,
    pub theme: Option<Theme>,
    pub notifications: Option<bool>,
    pub refresh_rate_secs: Option<u32>,
}

/// Load settings, or defaults when the file does not exist yet.
pub fn load_settings(path: &Path) -> Result<ClinicSettings, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No settings file, using defaults");
        return Ok(ClinicSettings::default());
    }
    let settings: ClinicSettings = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    settings.validate()?;
    Ok(settings)
}

/// Validate and write settings, creating the parent directory if needed.
pub fn save_settings(path: &Path, settings: &ClinicSettings) -> Result<(), ConfigError> {
    settings.validate()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(settings)?)?;
    tracing::info!(path = %path.display(), "Settings saved");
    Ok(())
}

/// Load, change and save in one step. Nothing is written if the result is
/// out of range.
pub fn update_settings(path: &Path, update: SettingsUpdate) -> Result<ClinicSettings, ConfigError> {
    let mut settings = load_settings(path)?;
    settings.apply(update);
    save_settings(path, &settings)?;
    Ok(settings)
}
