use super::{
    task::{self, CancelToken, TaskHandle, TaskOutcome},
    BusyPanel, PanelContext, PanelCore, PanelId, PanelResult,
};
use crate::game::{self, GameId, GameTarget};
use anyhow::Context;
use crossterm::event::{KeyCode, KeyEvent};
use std::{
    fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

const WORKER_NAME: &str = "KeybindsInstallerThread";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeybindsFile {
    pub path: PathBuf,
}

impl KeybindsFile {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Override file the injector reads for `game`.
pub fn default_keybinds_path(keybinds_dir: &Path, game: GameId) -> Option<PathBuf> {
    let name = match game {
        GameId::Me1 => "me1-bioinput.ini",
        GameId::Me2 => "me2-bioinput.ini",
        GameId::Me3 => "me3-bioinput.xml",
        GameId::Le1 => "le1-bioinput.ini",
        GameId::Le2 => "le2-bioinput.ini",
        GameId::Le3 => "le3-bioinput.xml",
        GameId::LeLauncher | GameId::Unknown => return None,
    };
    Some(keybinds_dir.join(name))
}

/// Where installed keybinds land inside a game folder (or its backup).
pub fn game_keybinds_path(game_root: &Path, game: GameId) -> Option<PathBuf> {
    let relative: &[&str] = match game {
        GameId::Me2 => &["BioGame", "Config", "PC", "Cooked", "BIOInput.ini"],
        GameId::Me3 => &["BioGame", "CookedPCConsole", "BioInput.xml"],
        _ => return None,
    };
    Some(relative.iter().fold(game_root.to_path_buf(), |path, part| path.join(part)))
}

#[derive(Debug, Default)]
struct GameKeybinds {
    files: Vec<KeybindsFile>,
    selected_file: Option<usize>,
    targets: Vec<GameTarget>,
    selected_target: Option<usize>,
}

impl GameKeybinds {
    fn selected_file(&self) -> Option<&KeybindsFile> {
        self.selected_file.and_then(|index| self.files.get(index))
    }

    fn selected_target(&self) -> Option<&GameTarget> {
        self.selected_target.and_then(|index| self.targets.get(index))
    }

    fn set_files(&mut self, files: Vec<KeybindsFile>) {
        self.selected_file = first_index(&files);
        self.files = files;
    }

    fn set_targets(&mut self, targets: Vec<GameTarget>) {
        self.selected_target = first_index(&targets);
        self.targets = targets;
    }
}

/// Lists keybind files from the keybinds folder and installs one into a game.
pub struct KeybindsInjectorPanel {
    core: PanelCore,
    me1: GameKeybinds,
    me2: GameKeybinds,
    me3: GameKeybinds,
    focus: GameId,
    installing: Option<GameId>,
    task: Option<TaskHandle>,
    last_message: Option<String>,
}

impl KeybindsInjectorPanel {
    pub fn new() -> Self {
        Self {
            core: PanelCore::new(),
            me1: GameKeybinds::default(),
            me2: GameKeybinds::default(),
            me3: GameKeybinds::default(),
            focus: GameId::Me3,
            installing: None,
            task: None,
            last_message: None,
        }
    }

    pub fn me1_keybinds(&self) -> &[KeybindsFile] {
        &self.me1.files
    }

    pub fn me2_keybinds(&self) -> &[KeybindsFile] {
        &self.me2.files
    }

    pub fn me3_keybinds(&self) -> &[KeybindsFile] {
        &self.me3.files
    }

    pub fn me2_targets(&self) -> &[GameTarget] {
        &self.me2.targets
    }

    pub fn me3_targets(&self) -> &[GameTarget] {
        &self.me3.targets
    }

    pub fn selected_me2_target(&self) -> Option<&GameTarget> {
        self.me2.selected_target()
    }

    pub fn selected_me3_target(&self) -> Option<&GameTarget> {
        self.me3.selected_target()
    }

    pub fn selected_keybinds(&self, game: GameId) -> Option<&KeybindsFile> {
        self.view(game).and_then(GameKeybinds::selected_file)
    }

    /// Game whose row the keys act on.
    pub fn focus(&self) -> GameId {
        self.focus
    }

    pub fn is_installing(&self) -> bool {
        self.installing.is_some()
    }

    pub fn last_message(&self) -> Option<&str> {
        self.last_message.as_deref()
    }

    pub fn can_install(&self, game: GameId) -> bool {
        !self.is_installing()
            && matches!(game, GameId::Me2 | GameId::Me3)
            && self
                .view(game)
                .map(|view| view.selected_file().is_some() && view.selected_target().is_some())
                .unwrap_or(false)
    }

    /// Copies the selected keybinds file into the selected target on a worker.
    pub fn install_selected(&mut self, game: GameId, ctx: &mut PanelContext<'_>) {
        if !self.can_install(game) {
            return;
        }
        let Some(view) = self.view(game) else {
            return;
        };
        let (Some(file), Some(target)) = (view.selected_file(), view.selected_target()) else {
            return;
        };
        let Some(destination) = game_keybinds_path(&target.path, game) else {
            return;
        };
        if !ctx.backups.is_backed_up(game) {
            log::warn!(
                "Installing keybinds into {} without a backup",
                game.display_name()
            );
        }
        let source = file.path.clone();
        log::info!(
            "Installing {} into {}",
            file.file_name(),
            destination.display()
        );
        self.start(game, source, destination);
    }

    pub fn can_reset(&self, game: GameId, ctx: &PanelContext<'_>) -> bool {
        !self.is_installing()
            && ctx.backups.backup_path(game).is_some()
            && self
                .view(game)
                .and_then(GameKeybinds::selected_target)
                .is_some()
    }

    /// Restores the selected target's keybinds from the game backup.
    pub fn reset_from_backup(&mut self, game: GameId, ctx: &mut PanelContext<'_>) {
        if !self.can_reset(game, ctx) {
            return;
        }
        let Some(backup) = ctx.backups.backup_path(game) else {
            return;
        };
        let Some(target) = self.view(game).and_then(GameKeybinds::selected_target) else {
            return;
        };
        let (Some(source), Some(destination)) = (
            game_keybinds_path(backup, game),
            game_keybinds_path(&target.path, game),
        ) else {
            return;
        };
        log::info!("Resetting {} keybinds from backup", game.display_name());
        self.start(game, source, destination);
    }

    pub fn can_close(&self) -> bool {
        !self.is_installing()
    }

    pub fn close(&mut self) {
        if !self.can_close() {
            log::debug!("Keybinds are still being installed");
            return;
        }
        let _ = self.close_with(PanelResult::empty());
    }

    fn start(&mut self, game: GameId, source: PathBuf, destination: PathBuf) {
        let action = Box::new(move |token: &CancelToken| {
            token.checkpoint()?;
            copy_keybinds(&source, &destination)
        });
        match task::spawn_named(WORKER_NAME, CancelToken::new(), action) {
            Ok(handle) => {
                self.installing = Some(game);
                self.task = Some(handle);
                self.last_message = None;
            }
            Err(err) => {
                log::error!("{err}");
                self.last_message = Some(err.to_string());
            }
        }
    }

    fn finish(&mut self, outcome: TaskOutcome) {
        let Some(game) = self.installing.take() else {
            return;
        };
        self.last_message = Some(match outcome {
            TaskOutcome::Completed => format!("{} keybinds installed", game.display_name()),
            TaskOutcome::Cancelled => "Keybinds install cancelled".to_string(),
            TaskOutcome::Faulted(fault) => {
                log::error!(
                    "Error setting {} keybinds: {}",
                    game.display_name(),
                    fault.message
                );
                format!("Error: {}", fault.message)
            }
        });
    }

    fn view(&self, game: GameId) -> Option<&GameKeybinds> {
        match game {
            GameId::Me1 => Some(&self.me1),
            GameId::Me2 => Some(&self.me2),
            GameId::Me3 => Some(&self.me3),
            _ => None,
        }
    }

    fn view_mut(&mut self, game: GameId) -> Option<&mut GameKeybinds> {
        match game {
            GameId::Me1 => Some(&mut self.me1),
            GameId::Me2 => Some(&mut self.me2),
            GameId::Me3 => Some(&mut self.me3),
            _ => None,
        }
    }

    fn cycle_focus(&mut self) {
        self.focus = match self.focus {
            GameId::Me1 => GameId::Me2,
            GameId::Me2 => GameId::Me3,
            _ => GameId::Me1,
        };
    }

    fn cycle_file(&mut self, down: bool) {
        let Some(view) = self.view_mut(self.focus) else {
            return;
        };
        view.selected_file = step(view.selected_file, view.files.len(), down);
    }

    fn cycle_target(&mut self) {
        let Some(view) = self.view_mut(self.focus) else {
            return;
        };
        view.selected_target = step(view.selected_target, view.targets.len(), true);
    }

    fn refresh_targets(&mut self, targets: &[GameTarget]) {
        self.me2
            .set_targets(game::targets_for_game(targets, GameId::Me2));
        self.me3
            .set_targets(game::targets_for_game(targets, GameId::Me3));
    }

    fn refresh_keybinds(&mut self, keybinds_dir: &Path) {
        let mut me1 = Vec::new();
        let mut me2 = Vec::new();
        let mut me3 = Vec::new();
        if keybinds_dir.is_dir() {
            let entries = WalkDir::new(keybinds_dir)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file());
            for entry in entries {
                let name = entry.file_name().to_string_lossy().to_string();
                let file = KeybindsFile {
                    path: entry.path().to_path_buf(),
                };
                if name.starts_with("me1-") && name.ends_with(".ini") {
                    me1.push(file);
                } else if name.starts_with("me2-") && name.ends_with(".ini") {
                    me2.push(file);
                } else if name.starts_with("me3-") && name.ends_with(".xml") {
                    me3.push(file);
                }
            }
        }
        self.me1.set_files(me1);
        self.me2.set_files(me2);
        self.me3.set_files(me3);
    }
}

fn copy_keybinds(source: &Path, destination: &Path) -> anyhow::Result<()> {
    anyhow::ensure!(source.is_file(), "{} does not exist", source.display());
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::copy(source, destination)
        .with_context(|| format!("copy {} to {}", source.display(), destination.display()))?;
    Ok(())
}

fn first_index<T>(items: &[T]) -> Option<usize> {
    if items.is_empty() {
        None
    } else {
        Some(0)
    }
}

// Wraps around in both directions.
fn step(current: Option<usize>, len: usize, down: bool) -> Option<usize> {
    if len == 0 {
        return None;
    }
    Some(match (current, down) {
        (None, _) => 0,
        (Some(index), true) => (index + 1) % len,
        (Some(index), false) => (index + len - 1) % len,
    })
}

impl Default for KeybindsInjectorPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl BusyPanel for KeybindsInjectorPanel {
    fn id(&self) -> PanelId {
        PanelId::KeybindsInjector
    }

    fn core(&self) -> &PanelCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PanelCore {
        &mut self.core
    }

    fn on_visible(&mut self, ctx: &mut PanelContext<'_>) {
        let keybinds_dir = ctx.settings.settings().keybinds_dir.clone();
        self.refresh_keybinds(&keybinds_dir);
        self.refresh_targets(ctx.targets);
    }

    fn handle_key(&mut self, key: KeyEvent, ctx: &mut PanelContext<'_>) -> bool {
        match key.code {
            KeyCode::Esc => self.close(),
            KeyCode::Tab => self.cycle_focus(),
            KeyCode::Up => self.cycle_file(false),
            KeyCode::Down => self.cycle_file(true),
            KeyCode::Char('t') => self.cycle_target(),
            KeyCode::Enter => self.install_selected(self.focus, ctx),
            KeyCode::Char('r') => self.reset_from_backup(self.focus, ctx),
            _ => return false,
        }
        true
    }

    fn poll(&mut self, _ctx: &mut PanelContext<'_>) {
        let Some(outcome) = self.task.as_ref().and_then(TaskHandle::try_outcome) else {
            return;
        };
        self.task = None;
        self.finish(outcome);
    }
}
