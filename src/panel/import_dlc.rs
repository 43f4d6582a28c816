use super::{BusyPanel, PanelContext, PanelCore, PanelError, PanelId, PanelResult};
use crate::game::{GameId, GameTarget};
use crossterm::event::{KeyCode, KeyEvent};

/// Imports a DLC folder already installed in a game into the mod library.
pub struct ImportInstalledDlcModPanel {
    core: PanelCore,
    targets: Vec<GameTarget>,
    selected_target: Option<usize>,
    installed_dlc: Vec<String>,
    selected_dlc: Option<usize>,
    mod_name: String,
    mod_site: String,
    editing_site: bool,
}

impl ImportInstalledDlcModPanel {
    pub fn new() -> Self {
        Self {
            core: PanelCore::new(),
            targets: Vec::new(),
            selected_target: None,
            installed_dlc: Vec::new(),
            selected_dlc: None,
            mod_name: String::new(),
            mod_site: String::new(),
            editing_site: false,
        }
    }

    pub fn targets(&self) -> &[GameTarget] {
        &self.targets
    }

    pub fn selected_target(&self) -> Option<&GameTarget> {
        self.selected_target.and_then(|index| self.targets.get(index))
    }

    pub fn installed_dlc(&self) -> &[String] {
        &self.installed_dlc
    }

    pub fn selected_dlc(&self) -> Option<&str> {
        self.selected_dlc
            .and_then(|index| self.installed_dlc.get(index))
            .map(String::as_str)
    }

    pub fn mod_name(&self) -> &str {
        &self.mod_name
    }

    pub fn mod_site(&self) -> &str {
        &self.mod_site
    }

    pub fn select_target(&mut self, index: Option<usize>) {
        self.selected_target = index.filter(|index| *index < self.targets.len());
        self.installed_dlc = self
            .selected_target()
            .map(|target| target.installed_dlc.clone())
            .unwrap_or_default();
        self.select_dlc(None);
    }

    pub fn select_dlc(&mut self, index: Option<usize>) {
        self.selected_dlc = index.filter(|index| *index < self.installed_dlc.len());
        self.mod_site.clear();
        self.mod_name = self.selected_dlc().unwrap_or_default().to_string();
    }

    /// True when typed text goes to the site field rather than the name.
    pub fn editing_site(&self) -> bool {
        self.editing_site
    }

    pub fn set_mod_name(&mut self, name: &str) {
        self.mod_name = name.to_string();
    }

    pub fn set_mod_site(&mut self, site: &str) {
        self.mod_site = site.to_string();
    }

    pub fn can_import(&self) -> bool {
        self.selected_dlc().is_some()
            && !self.mod_name.trim().is_empty()
            && self
                .selected_target()
                .map(|target| !target.texture_modded)
                .unwrap_or(false)
    }

    pub fn import_selected_folder(&mut self) -> Result<(), PanelError> {
        if !self.can_import() {
            return Ok(());
        }
        Err(PanelError::Unimplemented("importing an installed DLC folder"))
    }

    pub fn close(&mut self) {
        let _ = self.close_with(PanelResult::empty());
    }

    fn edit_field(&mut self, edit: impl FnOnce(&mut String)) {
        let mut text = if self.editing_site {
            self.mod_site.clone()
        } else {
            self.mod_name.clone()
        };
        edit(&mut text);
        if self.editing_site {
            self.set_mod_site(&text);
        } else {
            self.set_mod_name(&text);
        }
    }

    fn cycle_target(&mut self) {
        if self.targets.is_empty() {
            return;
        }
        let next = self
            .selected_target
            .map(|index| (index + 1) % self.targets.len())
            .unwrap_or(0);
        self.select_target(Some(next));
    }

    fn move_dlc(&mut self, down: bool) {
        if self.installed_dlc.is_empty() {
            return;
        }
        let last = self.installed_dlc.len() - 1;
        let next = match (self.selected_dlc, down) {
            (None, _) => 0,
            (Some(index), true) => (index + 1).min(last),
            (Some(index), false) => index.saturating_sub(1),
        };
        self.select_dlc(Some(next));
    }
}

impl Default for ImportInstalledDlcModPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl BusyPanel for ImportInstalledDlcModPanel {
    fn id(&self) -> PanelId {
        PanelId::ImportInstalledDlcMod
    }

    fn core(&self) -> &PanelCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PanelCore {
        &mut self.core
    }

    fn on_visible(&mut self, ctx: &mut PanelContext<'_>) {
        self.targets = ctx
            .targets
            .iter()
            .filter(|target| target.selectable && target.game != GameId::LeLauncher)
            .cloned()
            .collect();
        let first = if self.targets.is_empty() { None } else { Some(0) };
        self.select_target(first);
    }

    fn handle_key(&mut self, key: KeyEvent, _ctx: &mut PanelContext<'_>) -> bool {
        match key.code {
            KeyCode::Esc => self.close(),
            KeyCode::Tab => self.cycle_target(),
            KeyCode::Up => self.move_dlc(false),
            KeyCode::Down => self.move_dlc(true),
            KeyCode::BackTab => self.editing_site = !self.editing_site,
            KeyCode::Backspace => self.edit_field(|text| {
                text.pop();
            }),
            KeyCode::Char(c) => self.edit_field(|text| text.push(c)),
            KeyCode::Enter => {
                if let Err(err) = self.import_selected_folder() {
                    log::warn!("{err}");
                }
            }
            _ => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::{testing::*, Panel};

    fn env_with_targets() -> TestEnv {
        let mut env = TestEnv::new();
        let mut hidden = GameTarget::new(GameId::Me3, "/hidden");
        hidden.selectable = false;
        let mut le3 = GameTarget::new(GameId::Le3, "/le3");
        le3.installed_dlc = vec!["DLC_MOD_Alpha".to_string(), "DLC_MOD_Beta".to_string()];
        env.targets = vec![
            GameTarget::new(GameId::LeLauncher, "/launcher"),
            hidden,
            le3,
            GameTarget::new(GameId::Me2, "/me2"),
        ];
        env
    }

    fn visible(env: &mut TestEnv) -> ImportInstalledDlcModPanel {
        let mut panel = ImportInstalledDlcModPanel::new();
        panel.core_mut().mark_visible();
        panel.on_visible(&mut env.ctx());
        panel
    }

    #[test]
    fn targets_skip_launcher_and_unselectable() {
        let mut env = env_with_targets();
        let panel = visible(&mut env);
        let games: Vec<_> = panel.targets().iter().map(|target| target.game).collect();
        assert_eq!(games, vec![GameId::Le3, GameId::Me2]);
        assert_eq!(panel.selected_target().map(|t| t.game), Some(GameId::Le3));
        assert_eq!(panel.installed_dlc().len(), 2);
        assert_eq!(env.targets.len(), 4);
    }

    #[test]
    fn import_is_gated_then_unimplemented() {
        let mut env = env_with_targets();
        let mut panel = visible(&mut env);
        assert!(!panel.can_import());
        assert!(panel.import_selected_folder().is_ok());

        panel.select_dlc(Some(1));
        assert_eq!(panel.mod_name(), "DLC_MOD_Beta");
        panel.set_mod_name("   ");
        assert!(!panel.can_import());

        panel.set_mod_name("Beta Mod");
        assert!(panel.can_import());
        let err = panel.import_selected_folder().unwrap_err();
        assert!(matches!(err, PanelError::Unimplemented(_)));
        assert!(panel.core_mut().take_result().is_none());
    }

    #[test]
    fn texture_modded_target_blocks_import() {
        let mut env = env_with_targets();
        env.targets[2].texture_modded = true;
        let mut panel = visible(&mut env);
        panel.select_dlc(Some(0));
        assert!(!panel.can_import());
    }

    #[test]
    fn escape_closes_when_idle() {
        let mut env = env_with_targets();
        let mut panel = shown(
            Panel::ImportInstalledDlcMod(ImportInstalledDlcModPanel::new()),
            &mut env,
        );
        panel.handle_key(key(KeyCode::Esc), &mut env.ctx());
        assert_eq!(panel.take_result(), Some(PanelResult::empty()));
    }

    #[test]
    fn typing_edits_name_then_site() {
        let mut env = env_with_targets();
        let mut panel = shown(
            Panel::ImportInstalledDlcMod(ImportInstalledDlcModPanel::new()),
            &mut env,
        );
        panel.handle_key(key(KeyCode::Down), &mut env.ctx());
        for _ in 0.."DLC_MOD_Alpha".len() {
            panel.handle_key(key(KeyCode::Backspace), &mut env.ctx());
        }
        for c in "Alpha".chars() {
            panel.handle_key(key(KeyCode::Char(c)), &mut env.ctx());
        }
        panel.handle_key(key(KeyCode::BackTab), &mut env.ctx());
        for c in "x.io".chars() {
            panel.handle_key(key(KeyCode::Char(c)), &mut env.ctx());
        }

        let Panel::ImportInstalledDlcMod(import) = &panel else {
            panic!("wrong variant");
        };
        assert_eq!(import.mod_name(), "Alpha");
        assert_eq!(import.mod_site(), "x.io");
        assert!(import.editing_site());
        assert!(import.can_import());
        assert!(panel.take_result().is_none());
    }
}
