use super::{BusyPanel, PanelContext, PanelCore, PanelId, PanelResult};
use crossterm::event::{KeyCode, KeyEvent};

pub struct UpdateCompletedPanel {
    core: PanelCore,
    title: String,
    message: String,
}

impl UpdateCompletedPanel {
    pub fn new(title: &str, message: &str) -> Self {
        Self {
            core: PanelCore::new(),
            title: title.to_string(),
            message: message.to_string(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn close(&mut self) {
        let _ = self.close_with(PanelResult::empty());
    }
}

impl BusyPanel for UpdateCompletedPanel {
    fn id(&self) -> PanelId {
        PanelId::UpdateCompleted
    }

    fn core(&self) -> &PanelCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PanelCore {
        &mut self.core
    }

    fn handle_key(&mut self, key: KeyEvent, _ctx: &mut PanelContext<'_>) -> bool {
        match key.code {
            KeyCode::Esc | KeyCode::Enter => {
                self.close();
                true
            }
            _ => false,
        }
    }
}
