use super::{BusyPanel, PanelContext, PanelCore, PanelId, PanelResult};
use crate::links::HOMEPAGE_URL;
use crossterm::event::{KeyCode, KeyEvent};

pub struct AboutPanel {
    core: PanelCore,
    version: &'static str,
}

impl AboutPanel {
    pub fn new() -> Self {
        Self {
            core: PanelCore::new(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    pub fn version(&self) -> &str {
        self.version
    }

    pub fn open_homepage(&mut self, ctx: &mut PanelContext<'_>) {
        ctx.open_link(HOMEPAGE_URL);
    }

    pub fn close(&mut self) {
        let _ = self.close_with(PanelResult::empty());
    }
}

impl Default for AboutPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl BusyPanel for AboutPanel {
    fn id(&self) -> PanelId {
        PanelId::About
    }

    fn core(&self) -> &PanelCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PanelCore {
        &mut self.core
    }

    // Any key dismisses, except `w` which opens the homepage first.
    fn handle_key(&mut self, key: KeyEvent, ctx: &mut PanelContext<'_>) -> bool {
        if key.code == KeyCode::Char('w') {
            self.open_homepage(ctx);
        }
        self.close();
        true
    }
}
