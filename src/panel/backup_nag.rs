use super::{BusyPanel, ClosingPayload, PanelContext, PanelCore, PanelId, PanelResult};
use crate::{
    backup::{BackupStatuses, GameBackupStatus},
    config::AppConfig,
    game::{self, GameId, GameTarget},
};
use crossterm::event::{KeyCode, KeyEvent};
use std::collections::HashSet;

/// Reminds the user that installed games have no backup.
pub struct BackupNagPanel {
    core: PanelCore,
    installed: HashSet<GameId>,
    generation_ot: bool,
    generation_le: bool,
    statuses_ot: Vec<GameBackupStatus>,
    statuses_le: Vec<GameBackupStatus>,
    title: String,
}

impl BackupNagPanel {
    pub fn new(targets: &[GameTarget]) -> Self {
        Self {
            core: PanelCore::new(),
            installed: targets.iter().map(|target| target.game).collect(),
            generation_ot: true,
            generation_le: true,
            statuses_ot: Vec::new(),
            statuses_le: Vec::new(),
            title: String::new(),
        }
    }

    /// True when an installed, enabled-generation game has no usable backup.
    pub fn should_show_nag_screen(
        targets: &[GameTarget],
        settings: &AppConfig,
        backups: &BackupStatuses,
    ) -> bool {
        game::backup_tracked_games().into_iter().any(|game| {
            generation_enabled(game, settings)
                && targets.iter().any(|target| target.game == game)
                && backups.backup_path(game).is_none()
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn statuses_ot(&self) -> &[GameBackupStatus] {
        &self.statuses_ot
    }

    pub fn statuses_le(&self) -> &[GameBackupStatus] {
        &self.statuses_le
    }

    pub fn open_backup_panel(&mut self) {
        let mut result = PanelResult::with_payload(ClosingPayload::Decision(false));
        result.panel_to_open = Some(PanelId::BackupCreator);
        let _ = self.close_with(result);
    }

    pub fn close(&mut self) {
        let _ = self.close_with(PanelResult::with_payload(ClosingPayload::Decision(false)));
    }

    fn refresh(&mut self, backups: &BackupStatuses) {
        let generation_ot = self.generation_ot;
        let generation_le = self.generation_le;
        let enabled = |game: GameId| {
            (game.is_ot_game() && generation_ot) || (game.is_le_game() && generation_le)
        };
        self.statuses_ot = backups
            .statuses()
            .iter()
            .filter(|status| status.game.is_ot_game() && enabled(status.game))
            .cloned()
            .collect();
        self.statuses_le = backups
            .statuses()
            .iter()
            .filter(|status| status.game.is_le_game() && enabled(status.game))
            .cloned()
            .collect();

        let missing = self
            .statuses_ot
            .iter()
            .chain(self.statuses_le.iter())
            .filter(|status| self.installed.contains(&status.game) && !status.backed_up)
            .count();
        self.title = match missing {
            0 => "All games are backed up".to_string(),
            1 => "1 game is not backed up".to_string(),
            count => format!("{count} games are not backed up"),
        };
    }
}

fn generation_enabled(game: GameId, settings: &AppConfig) -> bool {
    (game.is_ot_game() && settings.generation_ot) || (game.is_le_game() && settings.generation_le)
}

impl BusyPanel for BackupNagPanel {
    fn id(&self) -> PanelId {
        PanelId::BackupNag
    }

    fn core(&self) -> &PanelCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PanelCore {
        &mut self.core
    }

    fn on_visible(&mut self, ctx: &mut PanelContext<'_>) {
        let settings = ctx.settings.settings();
        self.generation_ot = settings.generation_ot;
        self.generation_le = settings.generation_le;
        ctx.backups.refresh();
        self.refresh(ctx.backups);
    }

    fn handle_key(&mut self, key: KeyEvent, _ctx: &mut PanelContext<'_>) -> bool {
        match key.code {
            KeyCode::Esc => self.close(),
            KeyCode::Char('b') | KeyCode::Enter => self.open_backup_panel(),
            _ => return false,
        }
        true
    }
}
