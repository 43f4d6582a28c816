use super::{BusyPanel, ClosingPayload, PanelContext, PanelCore, PanelId, PanelResult};
use crate::links::DISCORD_INVITE_URL;
use crossterm::event::{KeyCode, KeyEvent};
use std::path::PathBuf;

pub const LANGUAGES: [&str; 7] = ["int", "deu", "rus", "pol", "fra", "esn", "cze"];

/// First-run welcome screen.
pub struct PreviewWelcomePanel {
    core: PanelCore,
    library_dir: PathBuf,
}

impl PreviewWelcomePanel {
    pub fn new() -> Self {
        Self {
            core: PanelCore::new(),
            library_dir: PathBuf::new(),
        }
    }

    pub fn library_dir(&self) -> &PathBuf {
        &self.library_dir
    }

    pub fn change_language(&mut self, ctx: &mut PanelContext<'_>, language: &str) {
        if ctx.settings.settings().language == language {
            return;
        }
        ctx.settings.settings_mut().language = language.to_string();
        save_settings(ctx);
    }

    pub fn change_theme(&mut self, ctx: &mut PanelContext<'_>, dark: bool) {
        if ctx.settings.settings().dark_theme == dark {
            return;
        }
        ctx.settings.settings_mut().dark_theme = dark;
        save_settings(ctx);
    }

    pub fn join_discord(&mut self, ctx: &mut PanelContext<'_>) {
        ctx.open_link(DISCORD_INVITE_URL);
    }

    /// Records that the welcome was shown, then closes.
    pub fn close(&mut self, ctx: &mut PanelContext<'_>) {
        if !self.core.is_visible() || self.core.is_closed() {
            log::error!("{}: close ignored", PanelId::PreviewWelcome.label());
            return;
        }
        ctx.settings.settings_mut().showed_preview_panel = true;
        save_settings(ctx);
        let _ = self.close_with(PanelResult::with_payload(ClosingPayload::Decision(true)));
    }

    fn next_language(&mut self, ctx: &mut PanelContext<'_>) {
        let current = ctx.settings.settings().language.clone();
        let index = LANGUAGES
            .iter()
            .position(|language| *language == current)
            .map(|index| (index + 1) % LANGUAGES.len())
            .unwrap_or(0);
        self.change_language(ctx, LANGUAGES[index]);
    }
}

fn save_settings(ctx: &mut PanelContext<'_>) {
    if let Err(err) = ctx.settings.save() {
        log::error!("Failed to save settings: {err:#}");
    }
}

impl Default for PreviewWelcomePanel {
    fn default() -> Self {
        Self::new()
    }
}

impl BusyPanel for PreviewWelcomePanel {
    fn id(&self) -> PanelId {
        PanelId::PreviewWelcome
    }

    fn core(&self) -> &PanelCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PanelCore {
        &mut self.core
    }

    fn on_visible(&mut self, ctx: &mut PanelContext<'_>) {
        self.library_dir = ctx.settings.settings().mod_library_path.clone();
    }

    fn handle_key(&mut self, key: KeyEvent, ctx: &mut PanelContext<'_>) -> bool {
        match key.code {
            KeyCode::Esc | KeyCode::Enter => self.close(ctx),
            KeyCode::Char('l') => self.next_language(ctx),
            KeyCode::Char('d') => self.change_theme(ctx, true),
            KeyCode::Char('t') => self.change_theme(ctx, false),
            KeyCode::Char('j') => self.join_discord(ctx),
            _ => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::{testing::*, Panel};

    #[test]
    fn escape_saves_flag_before_closing() {
        let mut env = TestEnv::new();
        let mut panel = shown(Panel::PreviewWelcome(PreviewWelcomePanel::new()), &mut env);
        assert!(panel.handle_key(key(KeyCode::Esc), &mut env.ctx()));
        assert!(env.settings.config.showed_preview_panel);
        assert_eq!(env.settings.saves, 1);
        assert_eq!(
            panel.take_result().unwrap().payload,
            ClosingPayload::Decision(true)
        );
    }

    #[test]
    fn escape_matches_close_action() {
        let mut env = TestEnv::new();
        let mut by_key = shown(Panel::PreviewWelcome(PreviewWelcomePanel::new()), &mut env);
        by_key.handle_key(key(KeyCode::Esc), &mut env.ctx());

        let mut by_action = PreviewWelcomePanel::new();
        by_action.core_mut().mark_visible();
        by_action.close(&mut env.ctx());
        assert_eq!(by_key.take_result(), by_action.core_mut().take_result());
    }

    #[test]
    fn second_close_does_not_save_again() {
        let mut env = TestEnv::new();
        let mut panel = PreviewWelcomePanel::new();
        panel.core_mut().mark_visible();
        panel.close(&mut env.ctx());
        panel.close(&mut env.ctx());
        assert_eq!(env.settings.saves, 1);
    }

    #[test]
    fn theme_saves_only_on_change() {
        let mut env = TestEnv::new();
        let mut panel = PreviewWelcomePanel::new();
        panel.change_theme(&mut env.ctx(), true);
        assert_eq!(env.settings.saves, 0);
        panel.change_theme(&mut env.ctx(), false);
        assert!(!env.settings.config.dark_theme);
        assert_eq!(env.settings.saves, 1);
    }

    #[test]
    fn language_cycles() {
        let mut env = TestEnv::new();
        let mut panel = shown(Panel::PreviewWelcome(PreviewWelcomePanel::new()), &mut env);
        panel.handle_key(key(KeyCode::Char('l')), &mut env.ctx());
        assert_eq!(env.settings.config.language, "deu");
        assert!(panel.take_result().is_none());
    }

    #[test]
    fn library_dir_read_on_visible() {
        let mut env = TestEnv::new();
        env.settings.config.mod_library_path = PathBuf::from("/library");
        let panel = shown(Panel::PreviewWelcome(PreviewWelcomePanel::new()), &mut env);
        let Panel::PreviewWelcome(inner) = &panel else {
            unreachable!()
        };
        assert_eq!(inner.library_dir(), &PathBuf::from("/library"));
    }
}
