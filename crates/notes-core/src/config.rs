use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotesConfig {
    /// Directory opened as the local tree
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_root: Option<PathBuf>,

    /// Metadata endpoint of the remote document store
    #[serde(default = "default_drive_api_base")]
    pub drive_api_base: String,

    /// Content upload endpoint of the remote document store
    #[serde(default = "default_drive_upload_base")]
    pub drive_upload_base: String,

    /// Application folder in the remote account root
    #[serde(default = "default_drive_folder_name")]
    pub drive_folder_name: String,

    /// Where the remote access token is persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_path: Option<PathBuf>,
}

fn default_drive_api_base() -> String {
    "https://www.googleapis.com/drive/v3".to_string()
}
fn default_drive_upload_base() -> String {
    "https://www.googleapis.com/upload/drive/v3".to_string()
}
fn default_drive_folder_name() -> String {
    "fs-notes".to_string()
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            local_root: None,
            drive_api_base: default_drive_api_base(),
            drive_upload_base: default_drive_upload_base(),
            drive_folder_name: default_drive_folder_name(),
            token_path: None,
        }
    }
}

impl NotesConfig {
    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "fs-notes", "fs-notes")
    }

    /// Default config file path for this platform
    pub fn default_path() -> PathBuf {
        if let Some(dirs) = Self::project_dirs() {
            dirs.config_dir().join("config.json")
        } else {
            PathBuf::from("fs-notes-config.json")
        }
    }

    /// Token file to use: the configured one, else the platform data dir
    pub fn token_path(&self) -> PathBuf {
        if let Some(path) = &self.token_path {
            return path.clone();
        }
        if let Some(dirs) = Self::project_dirs() {
            dirs.data_dir().join("drive-token.json")
        } else {
            PathBuf::from("fs-notes-token.json")
        }
    }

    /// Load config from a file path
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        let config: Self =
            serde_json::from_str(&data).with_context(|| "failed to parse config JSON")?;
        Ok(config)
    }

    /// Load config, falling back to defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to a file path
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create config dir {}", parent.display()))?;
        }
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: NotesConfig = serde_json::from_str(r#"{"local_root": "/tmp/notes"}"#).unwrap();
        assert_eq!(config.local_root, Some(PathBuf::from("/tmp/notes")));
        assert_eq!(config.drive_folder_name, "fs-notes");
        assert_eq!(config.drive_api_base, "https://www.googleapis.com/drive/v3");
        assert!(config.token_path.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = NotesConfig {
            drive_folder_name: "journal".to_string(),
            token_path: Some(dir.path().join("token.json")),
            ..NotesConfig::default()
        };
        config.save(&path).unwrap();

        let loaded = NotesConfig::load(&path).unwrap();
        assert_eq!(loaded.drive_folder_name, "journal");
        assert_eq!(loaded.token_path(), dir.path().join("token.json"));
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = NotesConfig::load_or_default(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.drive_upload_base, "https://www.googleapis.com/upload/drive/v3");
    }

    #[test]
    fn test_load_rejects_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(NotesConfig::load(&path).is_err());
    }
}
