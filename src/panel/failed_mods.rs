use super::{BusyPanel, ClosingPayload, PanelContext, PanelCore, PanelId, PanelResult};
use crate::library::ModEntry;
use crossterm::event::{KeyCode, KeyEvent};

/// Lists mods that failed to load and offers to restore or delete them.
pub struct FailedModsPanel {
    core: PanelCore,
    failed_mods: Vec<ModEntry>,
    selected: Option<usize>,
    deleted_any: bool,
}

impl FailedModsPanel {
    pub fn new(failed_mods: Vec<ModEntry>) -> Self {
        Self {
            core: PanelCore::new(),
            failed_mods,
            selected: None,
            deleted_any: false,
        }
    }

    pub fn failed_mods(&self) -> &[ModEntry] {
        &self.failed_mods
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_mod(&self) -> Option<&ModEntry> {
        self.selected.and_then(|index| self.failed_mods.get(index))
    }

    /// Selects an entry; out-of-range indexes clear the selection.
    pub fn select(&mut self, index: Option<usize>) {
        self.selected = index.filter(|index| *index < self.failed_mods.len());
    }

    pub fn can_restore_mod(&self) -> bool {
        self.selected_mod()
            .map(|mod_entry| mod_entry.updatable)
            .unwrap_or(false)
    }

    pub fn restore_selected(&mut self) {
        if !self.can_restore_mod() {
            return;
        }
        let Some(mod_entry) = self.selected_mod().cloned() else {
            return;
        };
        let _ = self.close_with(self.result(ClosingPayload::Mod(mod_entry)));
    }

    pub fn can_delete_mod(&self) -> bool {
        self.selected_mod().is_some()
    }

    /// Deletes the selected mod from the library and drops it from the list.
    pub fn delete_selected(&mut self, ctx: &mut PanelContext<'_>) {
        if !self.can_delete_mod() {
            return;
        }
        let Some(index) = self.selected else {
            return;
        };
        let mod_entry = self.failed_mods[index].clone();
        let library_root = ctx.settings.settings().mod_library_path.clone();
        if let Err(err) = ctx.library.delete_mod(&mod_entry, &library_root) {
            log::error!("Failed to delete {}: {err:#}", mod_entry.name);
            return;
        }
        log::info!("Deleted failed mod {}", mod_entry.name);
        self.failed_mods.remove(index);
        self.deleted_any = true;
        let next = index.min(self.failed_mods.len().saturating_sub(1));
        self.select(Some(next));
    }

    pub fn can_visit_website(&self) -> bool {
        self.selected_mod()
            .map(ModEntry::has_website)
            .unwrap_or(false)
    }

    pub fn visit_website(&mut self, ctx: &mut PanelContext<'_>) {
        if !self.can_visit_website() {
            return;
        }
        if let Some(mod_entry) = self.selected_mod() {
            ctx.open_link(&mod_entry.website);
        }
    }

    pub fn close(&mut self) {
        let _ = self.close_with(self.result(ClosingPayload::Empty));
    }

    fn result(&self, payload: ClosingPayload) -> PanelResult {
        PanelResult {
            reload_mods: self.deleted_any,
            ..PanelResult::with_payload(payload)
        }
    }

    fn move_selection(&mut self, delta: isize) {
        if self.failed_mods.is_empty() {
            return;
        }
        let last = self.failed_mods.len() - 1;
        let next = match self.selected {
            None => 0,
            Some(index) if delta < 0 => index.saturating_sub(delta.unsigned_abs()),
            Some(index) => index.saturating_add(delta as usize).min(last),
        };
        self.select(Some(next));
    }
}

impl BusyPanel for FailedModsPanel {
    fn id(&self) -> PanelId {
        PanelId::FailedMods
    }

    fn core(&self) -> &PanelCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PanelCore {
        &mut self.core
    }

    fn handle_key(&mut self, key: KeyEvent, ctx: &mut PanelContext<'_>) -> bool {
        match key.code {
            KeyCode::Esc => self.close(),
            KeyCode::Up => self.move_selection(-1),
            KeyCode::Down => self.move_selection(1),
            KeyCode::Char('r') | KeyCode::Enter => self.restore_selected(),
            KeyCode::Char('w') => self.visit_website(ctx),
            KeyCode::Char('d') | KeyCode::Delete => self.delete_selected(ctx),
            _ => return false,
        }
        true
    }
}
