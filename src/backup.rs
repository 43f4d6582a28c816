use crate::game::{self, GameId};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct BackupIndex {
    #[serde(default)]
    backups: HashMap<GameId, PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameBackupStatus {
    pub game: GameId,
    pub path: Option<PathBuf>,
    pub backed_up: bool,
}

/// Recorded game backups, keyed by game.
#[derive(Debug, Clone, Default)]
pub struct BackupStatuses {
    index_path: Option<PathBuf>,
    index: BackupIndex,
    statuses: Vec<GameBackupStatus>,
}

impl BackupStatuses {
    pub fn load(data_dir: &Path) -> Result<Self> {
        let index_path = data_dir.join("backups.json");
        let index = if index_path.exists() {
            let raw = fs::read_to_string(&index_path).context("read backups.json")?;
            serde_json::from_str(&raw).context("parse backups.json")?
        } else {
            BackupIndex::default()
        };
        let mut statuses = Self {
            index_path: Some(index_path),
            index,
            statuses: Vec::new(),
        };
        statuses.refresh();
        Ok(statuses)
    }

    #[cfg(test)]
    pub fn from_paths(backups: impl IntoIterator<Item = (GameId, PathBuf)>) -> Self {
        let mut statuses = Self {
            index_path: None,
            index: BackupIndex {
                backups: backups.into_iter().collect(),
            },
            statuses: Vec::new(),
        };
        statuses.refresh();
        statuses
    }

    /// Rereads the index from disk (when loaded from one) and rechecks every path.
    pub fn refresh(&mut self) {
        if let Some(path) = &self.index_path {
            match fs::read_to_string(path)
                .map_err(anyhow::Error::from)
                .and_then(|raw| serde_json::from_str::<BackupIndex>(&raw).map_err(Into::into))
            {
                Ok(index) => self.index = index,
                Err(err) if path.exists() => {
                    log::warn!("Keeping previous backup index, reload failed: {err}");
                }
                Err(_) => {}
            }
        }
        self.statuses = game::backup_tracked_games()
            .into_iter()
            .map(|game| {
                let path = self.index.backups.get(&game).cloned();
                let backed_up = path.as_deref().map(Path::exists).unwrap_or(false);
                GameBackupStatus {
                    game,
                    path,
                    backed_up,
                }
            })
            .collect();
    }

    pub fn status(&self, game: GameId) -> Option<&GameBackupStatus> {
        self.statuses.iter().find(|status| status.game == game)
    }

    pub fn statuses(&self) -> &[GameBackupStatus] {
        &self.statuses
    }

    pub fn is_backed_up(&self, game: GameId) -> bool {
        self.status(game).map(|status| status.backed_up).unwrap_or(false)
    }

    pub fn backup_path(&self, game: GameId) -> Option<&Path> {
        self.status(game)
            .filter(|status| status.backed_up)
            .and_then(|status| status.path.as_deref())
    }

    pub fn recorded(&self) -> Vec<(GameId, PathBuf)> {
        let mut recorded: Vec<_> = self
            .index
            .backups
            .iter()
            .map(|(game, path)| (*game, path.clone()))
            .collect();
        recorded.sort_by_key(|(game, _)| game.as_str());
        recorded
    }
}

/// Checks every recorded backup directory. Returns the games whose backup is missing.
pub fn verify_backups(recorded: &[(GameId, PathBuf)]) -> Vec<GameId> {
    recorded
        .iter()
        .filter(|(_, path)| !path.is_dir())
        .map(|(game, _)| *game)
        .collect()
}
