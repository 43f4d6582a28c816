use crate::game::GameId;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Component, Path, PathBuf},
};

pub const DEFAULT_WEBSITE: &str = "http://example.com";

/// Library access handed to panels. The host owns the storage.
pub trait ModLibrary {
    /// Removes the entry and its folder under `library_root`, then persists.
    fn delete_mod(&mut self, mod_entry: &ModEntry, library_root: &Path) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    pub mods: Vec<ModEntry>,
    #[serde(skip)]
    data_dir: PathBuf,
}

impl Library {
    pub fn load_or_create(data_dir: &Path) -> Result<Self> {
        let library_path = data_dir.join("library.json");
        if library_path.exists() {
            let raw = fs::read_to_string(&library_path).context("read library.json")?;
            let mut library: Library =
                serde_json::from_str(&raw).context("parse library.json")?;
            library.data_dir = data_dir.to_path_buf();
            return Ok(library);
        }

        let library = Library {
            mods: Vec::new(),
            data_dir: data_dir.to_path_buf(),
        };
        library.save()?;
        Ok(library)
    }

    #[cfg(test)]
    pub fn in_dir(data_dir: &Path, mods: Vec<ModEntry>) -> Self {
        Self {
            mods,
            data_dir: data_dir.to_path_buf(),
        }
    }

    pub fn save(&self) -> Result<()> {
        let library_path = self.data_dir.join("library.json");
        let raw = serde_json::to_string_pretty(self).context("serialize library.json")?;
        fs::write(library_path, raw).context("write library.json")?;
        Ok(())
    }

    pub fn failed_mods(&self) -> Vec<ModEntry> {
        self.mods
            .iter()
            .filter(|mod_entry| !mod_entry.valid)
            .cloned()
            .collect()
    }
}

impl ModLibrary for Library {
    fn delete_mod(&mut self, mod_entry: &ModEntry, library_root: &Path) -> Result<()> {
        let index = self
            .mods
            .iter()
            .position(|entry| entry.id == mod_entry.id)
            .with_context(|| format!("{} is not in the library", mod_entry.name))?;
        if let Some(folder) = mod_folder(library_root, &mod_entry.id) {
            if folder.is_dir() {
                fs::remove_dir_all(&folder)
                    .with_context(|| format!("remove {}", folder.display()))?;
            }
        }
        self.mods.remove(index);
        self.save()
    }
}

/// Folder of mod `id` inside the library root. `None` when the root is unset
/// or the id is not a plain folder name.
pub fn mod_folder(library_root: &Path, id: &str) -> Option<PathBuf> {
    if library_root.as_os_str().is_empty() {
        return None;
    }
    let mut components = Path::new(id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Some(library_root.join(id)),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub game: GameId,
    #[serde(default = "default_website")]
    pub website: String,
    /// Whether the update service can restore this mod.
    #[serde(default)]
    pub updatable: bool,
    #[serde(default = "default_true")]
    pub valid: bool,
    #[serde(default)]
    pub load_failure: Option<String>,
    #[serde(default)]
    pub updater_service_folder: Option<String>,
}

impl ModEntry {
    #[cfg(test)]
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            game: GameId::Unknown,
            website: default_website(),
            updatable: false,
            valid: true,
            load_failure: None,
            updater_service_folder: None,
        }
    }

    pub fn has_website(&self) -> bool {
        !self.website.trim().is_empty() && self.website != DEFAULT_WEBSITE
    }
}

fn default_website() -> String {
    DEFAULT_WEBSITE.to_string()
}

fn default_true() -> bool {
    true
}
