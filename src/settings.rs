use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{FblrError, Result};

/// Explicit pipeline configuration: the filesystem root standing in for the
/// object store, plus the source-system and database names that key every
/// derived path. Loaded once and passed into each component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default = "default_system_name")]
    pub system_name: String,
    #[serde(default = "default_database")]
    pub database: String,
}

fn default_system_name() -> String {
    "sap".to_string()
}

fn default_database() -> String {
    "fbl5n".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            system_name: default_system_name(),
            database: default_database(),
        }
    }
}

impl Settings {
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("fblr.db")
    }

    /// Terminal area for a fully handled file: `processed` or `error`.
    pub fn final_state_dir(&self, state: &str) -> PathBuf {
        PathBuf::from(&self.data_dir)
            .join("raw-data")
            .join(&self.system_name)
            .join(&self.database)
            .join(state)
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("fblr")
}

fn settings_path() -> PathBuf {
    match std::env::var("FBLR_CONFIG") {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => config_dir().join("settings.json"),
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("fblr")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let path = settings_path();
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| FblrError::Settings(e.to_string()))?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            data_dir: "/tmp/fblr-test".to_string(),
            system_name: "sap".to_string(),
            database: "fbl5n".to_string(),
        };
        let json = serde_json::to_string_pretty(&settings).unwrap();
        std::fs::write(&path, &json).unwrap();
        let loaded: Settings =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.data_dir, "/tmp/fblr-test");
        assert_eq!(loaded.database, "fbl5n");
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let s: Settings = serde_json::from_str(r#"{"data_dir": "/tmp/x"}"#).unwrap();
        assert_eq!(s.system_name, "sap");
        assert_eq!(s.database, "fbl5n");
    }

    #[test]
    fn test_final_state_dirs() {
        let s = Settings {
            data_dir: "/tmp/x".to_string(),
            ..Default::default()
        };
        assert_eq!(
            s.final_state_dir("processed"),
            PathBuf::from("/tmp/x/raw-data/sap/fbl5n/processed")
        );
        assert_eq!(
            s.final_state_dir("error"),
            PathBuf::from("/tmp/x/raw-data/sap/fbl5n/error")
        );
    }
}
