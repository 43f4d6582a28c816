use crate::game::GameTarget;
use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub showed_preview_panel: bool,
    #[serde(default)]
    pub last_version_shown: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_true")]
    pub dark_theme: bool,
    #[serde(default = "default_true")]
    pub generation_ot: bool,
    #[serde(default = "default_true")]
    pub generation_le: bool,
    #[serde(default)]
    pub mod_library_path: PathBuf,
    #[serde(default)]
    pub keybinds_dir: PathBuf,
    #[serde(default)]
    pub updater_service_username: String,
    #[serde(default)]
    pub updater_service_lzma_storage_path: String,
    #[serde(default)]
    pub updater_service_manifest_storage_path: String,
    #[serde(default)]
    pub targets: Vec<GameTarget>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            showed_preview_panel: false,
            last_version_shown: None,
            language: default_language(),
            dark_theme: true,
            generation_ot: true,
            generation_le: true,
            mod_library_path: PathBuf::new(),
            keybinds_dir: PathBuf::new(),
            updater_service_username: String::new(),
            updater_service_lzma_storage_path: String::new(),
            updater_service_manifest_storage_path: String::new(),
            targets: Vec::new(),
        }
    }
}

/// Persisted settings handed to panels instead of a global.
pub trait SettingsStore {
    fn settings(&self) -> &AppConfig;
    fn settings_mut(&mut self) -> &mut AppConfig;
    fn save(&mut self) -> Result<()>;
}

/// Settings backed by `config.json` in the data dir.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
    config: AppConfig,
}

impl ConfigFile {
    pub fn load_or_create(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir).context("create app data dir")?;
        let path = data_dir.join("config.json");
        if path.exists() {
            let raw = fs::read_to_string(&path).context("read app config")?;
            let mut config: AppConfig = serde_json::from_str(&raw).context("parse app config")?;
            let mut dirty = false;
            if config.mod_library_path.as_os_str().is_empty() {
                config.mod_library_path = data_dir.join("mods");
                dirty = true;
            }
            if config.keybinds_dir.as_os_str().is_empty() {
                config.keybinds_dir = data_dir.join("keybinds");
                dirty = true;
            }
            let mut file = Self { path, config };
            if dirty {
                file.save()?;
            }
            return Ok(file);
        }

        let config = AppConfig {
            mod_library_path: data_dir.join("mods"),
            keybinds_dir: data_dir.join("keybinds"),
            ..AppConfig::default()
        };
        let mut file = Self { path, config };
        file.save()?;
        Ok(file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for ConfigFile {
    fn settings(&self) -> &AppConfig {
        &self.config
    }

    fn settings_mut(&mut self) -> &mut AppConfig {
        &mut self.config
    }

    fn save(&mut self) -> Result<()> {
        let raw = serde_json::to_string_pretty(&self.config).context("serialize app config")?;
        fs::write(&self.path, raw).context("write app config")?;
        Ok(())
    }
}

pub fn base_data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base.data_local_dir().join("busypanel"))
}

fn default_true() -> bool {
    true
}

fn default_language() -> String {
    "int".to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// In-memory settings that count saves.
    #[derive(Debug, Default)]
    pub(crate) struct MemorySettings {
        pub config: AppConfig,
        pub saves: usize,
    }

    impl SettingsStore for MemorySettings {
        fn settings(&self) -> &AppConfig {
            &self.config
        }

        fn settings_mut(&mut self) -> &mut AppConfig {
            &mut self.config
        }

        fn save(&mut self) -> Result<()> {
            self.saves += 1;
            Ok(())
        }
    }

    #[test]
    fn creates_config_with_default_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let file = ConfigFile::load_or_create(dir.path()).unwrap();
        assert!(file.path().exists());
        assert_eq!(file.settings().mod_library_path, dir.path().join("mods"));
        assert_eq!(file.settings().keybinds_dir, dir.path().join("keybinds"));
        assert!(!file.settings().showed_preview_panel);
    }

    #[test]
    fn saved_flag_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = ConfigFile::load_or_create(dir.path()).unwrap();
        file.settings_mut().showed_preview_panel = true;
        file.save().unwrap();

        let reloaded = ConfigFile::load_or_create(dir.path()).unwrap();
        assert!(reloaded.settings().showed_preview_panel);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.json"), r#"{"dark_theme":false}"#).unwrap();
        let file = ConfigFile::load_or_create(dir.path()).unwrap();
        assert!(!file.settings().dark_theme);
        assert!(file.settings().generation_le);
        assert_eq!(file.settings().language, "int");
        assert!(file.settings().targets.is_empty());
    }
}
