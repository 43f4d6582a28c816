use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameId {
    Me1,
    Me2,
    Me3,
    Le1,
    Le2,
    Le3,
    LeLauncher,
    Unknown,
}

impl Default for GameId {
    fn default() -> Self {
        GameId::Unknown
    }
}

impl GameId {
    pub fn display_name(self) -> &'static str {
        match self {
            GameId::Me1 => "Mass Effect",
            GameId::Me2 => "Mass Effect 2",
            GameId::Me3 => "Mass Effect 3",
            GameId::Le1 => "Mass Effect LE",
            GameId::Le2 => "Mass Effect 2 LE",
            GameId::Le3 => "Mass Effect 3 LE",
            GameId::LeLauncher => "Legendary Edition Launcher",
            GameId::Unknown => "Unknown",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GameId::Me1 => "me1",
            GameId::Me2 => "me2",
            GameId::Me3 => "me3",
            GameId::Le1 => "le1",
            GameId::Le2 => "le2",
            GameId::Le3 => "le3",
            GameId::LeLauncher => "le_launcher",
            GameId::Unknown => "unknown",
        }
    }

    pub fn is_ot_game(self) -> bool {
        matches!(self, GameId::Me1 | GameId::Me2 | GameId::Me3)
    }

    // The launcher is part of the LE generation but is never backed up.
    pub fn is_le_game(self) -> bool {
        matches!(self, GameId::Le1 | GameId::Le2 | GameId::Le3)
    }
}

pub fn backup_tracked_games() -> Vec<GameId> {
    vec![
        GameId::Me1,
        GameId::Me2,
        GameId::Me3,
        GameId::Le1,
        GameId::Le2,
        GameId::Le3,
    ]
}

/// An installation of a game the host knows about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameTarget {
    pub game: GameId,
    pub path: PathBuf,
    #[serde(default = "default_true")]
    pub selectable: bool,
    #[serde(default)]
    pub texture_modded: bool,
    #[serde(default)]
    pub installed_dlc: Vec<String>,
}

impl GameTarget {
    #[cfg(test)]
    pub fn new(game: GameId, path: impl Into<PathBuf>) -> Self {
        Self {
            game,
            path: path.into(),
            selectable: true,
            texture_modded: false,
            installed_dlc: Vec::new(),
        }
    }

    pub fn label(&self) -> String {
        format!("{} ({})", self.game.display_name(), self.path.display())
    }
}

/// Returns the targets for `game` in master-list order.
pub fn targets_for_game(targets: &[GameTarget], game: GameId) -> Vec<GameTarget> {
    targets
        .iter()
        .filter(|target| target.game == game)
        .cloned()
        .collect()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generations_split_without_launcher() {
        assert!(GameId::Me2.is_ot_game());
        assert!(!GameId::Me2.is_le_game());
        assert!(GameId::Le3.is_le_game());
        assert!(!GameId::LeLauncher.is_le_game());
        assert!(!GameId::LeLauncher.is_ot_game());
    }

    #[test]
    fn target_filter_keeps_source_order() {
        let targets = vec![
            GameTarget::new(GameId::Me3, "/games/a"),
            GameTarget::new(GameId::Me2, "/games/b"),
            GameTarget::new(GameId::Me3, "/games/c"),
        ];
        let me3 = targets_for_game(&targets, GameId::Me3);
        let paths: Vec<_> = me3.iter().map(|t| t.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("/games/a"), PathBuf::from("/games/c")]);
        assert!(targets_for_game(&targets, GameId::Le1).is_empty());
    }

    #[test]
    fn target_defaults_when_deserialized() {
        let raw = r#"{"game":"le2","path":"/le2"}"#;
        let target: GameTarget = serde_json::from_str(raw).unwrap();
        assert_eq!(target.game, GameId::Le2);
        assert!(target.selectable);
        assert!(!target.texture_modded);
        assert!(target.installed_dlc.is_empty());
    }
}
