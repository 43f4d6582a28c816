//! Modal busy panels and the contract the host drives them through.
//!
//! A panel is shown once, becomes visible once, receives keys while it is on
//! top, and raises exactly one closing result. The host reads that result
//! with [`Panel::take_result`] and then releases the panel.

pub mod about;
pub mod backup_nag;
pub mod closing;
pub mod failed_mods;
pub mod import_dlc;
pub mod keybinds;
pub mod preview_welcome;
pub mod run_and_done;
pub mod task;
pub mod update_completed;
pub mod updater_service;

use crate::{
    backup::BackupStatuses,
    config::SettingsStore,
    game::GameTarget,
    library::{ModEntry, ModLibrary},
    links::LinkOpener,
};
use crossterm::event::KeyEvent;
use thiserror::Error;

pub use about::AboutPanel;
pub use backup_nag::BackupNagPanel;
pub use closing::PanelCore;
pub use failed_mods::FailedModsPanel;
pub use import_dlc::ImportInstalledDlcModPanel;
pub use keybinds::KeybindsInjectorPanel;
pub use preview_welcome::PreviewWelcomePanel;
pub use run_and_done::RunAndDonePanel;
pub use task::{CancelToken, TaskFault, TaskOutcome};
pub use update_completed::UpdateCompletedPanel;
pub use updater_service::UpdaterServicePanel;

#[derive(Debug, Error)]
pub enum PanelError {
    #[error("{0} is not implemented yet")]
    Unimplemented(&'static str),
    #[error("panel closed more than once")]
    AlreadyClosed,
    #[error("panel closed before it became visible")]
    NotVisible,
    #[error("panel content was detached")]
    Detached,
    #[error("failed to start worker: {0}")]
    Spawn(#[source] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelId {
    About,
    BackupNag,
    BackupCreator,
    FailedMods,
    ImportInstalledDlcMod,
    KeybindsInjector,
    PreviewWelcome,
    RunAndDone,
    UpdateCompleted,
    UpdaterService,
}

impl PanelId {
    pub fn label(self) -> &'static str {
        match self {
            PanelId::About => "About",
            PanelId::BackupNag => "Backup reminder",
            PanelId::BackupCreator => "Backup creator",
            PanelId::FailedMods => "Failed mods",
            PanelId::ImportInstalledDlcMod => "Import installed DLC mod",
            PanelId::KeybindsInjector => "Keybinds injector",
            PanelId::PreviewWelcome => "Welcome",
            PanelId::RunAndDone => "Working",
            PanelId::UpdateCompleted => "Update completed",
            PanelId::UpdaterService => "Updater service",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClosingPayload {
    Empty,
    Decision(bool),
    Mod(ModEntry),
    Task(TaskOutcome),
}

/// What a panel hands back to the host when it closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelResult {
    pub payload: ClosingPayload,
    pub panel_to_open: Option<PanelId>,
    pub reload_mods: bool,
    pub mod_to_highlight: Option<ModEntry>,
}

impl PanelResult {
    pub fn empty() -> Self {
        Self::with_payload(ClosingPayload::Empty)
    }

    pub fn with_payload(payload: ClosingPayload) -> Self {
        Self {
            payload,
            panel_to_open: None,
            reload_mods: false,
            mod_to_highlight: None,
        }
    }

    pub fn error(&self) -> Option<&TaskFault> {
        match &self.payload {
            ClosingPayload::Task(TaskOutcome::Faulted(fault)) => Some(fault),
            _ => None,
        }
    }
}

/// Host collaborators a panel may use while it is displayed.
pub struct PanelContext<'a> {
    /// Master installation-target list. Read-only to panels.
    pub targets: &'a [GameTarget],
    pub settings: &'a mut dyn SettingsStore,
    pub backups: &'a mut BackupStatuses,
    pub library: &'a mut dyn ModLibrary,
    pub links: &'a mut dyn LinkOpener,
}

impl PanelContext<'_> {
    pub fn open_link(&mut self, url: &str) {
        if let Err(err) = self.links.open_link(url) {
            log::warn!("{err:#}");
        }
    }
}

pub trait BusyPanel {
    fn id(&self) -> PanelId;
    fn core(&self) -> &PanelCore;
    fn core_mut(&mut self) -> &mut PanelCore;

    fn on_visible(&mut self, _ctx: &mut PanelContext<'_>) {}

    /// Returns true when the key was handled.
    fn handle_key(&mut self, key: KeyEvent, ctx: &mut PanelContext<'_>) -> bool;

    /// Runs on the interactive loop every tick while displayed.
    fn poll(&mut self, _ctx: &mut PanelContext<'_>) {}

    fn close_with(&mut self, result: PanelResult) -> Result<(), PanelError> {
        let id = self.id();
        self.core_mut().close(result).map_err(|err| {
            log::error!("{}: {err}", id.label());
            err
        })
    }
}

pub enum Panel {
    About(AboutPanel),
    BackupNag(BackupNagPanel),
    FailedMods(FailedModsPanel),
    ImportInstalledDlcMod(ImportInstalledDlcModPanel),
    KeybindsInjector(KeybindsInjectorPanel),
    PreviewWelcome(PreviewWelcomePanel),
    RunAndDone(RunAndDonePanel),
    UpdateCompleted(UpdateCompletedPanel),
    UpdaterService(UpdaterServicePanel),
}

impl Panel {
    fn inner(&self) -> &dyn BusyPanel {
        match self {
            Panel::About(panel) => panel,
            Panel::BackupNag(panel) => panel,
            Panel::FailedMods(panel) => panel,
            Panel::ImportInstalledDlcMod(panel) => panel,
            Panel::KeybindsInjector(panel) => panel,
            Panel::PreviewWelcome(panel) => panel,
            Panel::RunAndDone(panel) => panel,
            Panel::UpdateCompleted(panel) => panel,
            Panel::UpdaterService(panel) => panel,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn BusyPanel {
        match self {
            Panel::About(panel) => panel,
            Panel::BackupNag(panel) => panel,
            Panel::FailedMods(panel) => panel,
            Panel::ImportInstalledDlcMod(panel) => panel,
            Panel::KeybindsInjector(panel) => panel,
            Panel::PreviewWelcome(panel) => panel,
            Panel::RunAndDone(panel) => panel,
            Panel::UpdateCompleted(panel) => panel,
            Panel::UpdaterService(panel) => panel,
        }
    }

    pub fn id(&self) -> PanelId {
        self.inner().id()
    }

    pub fn is_visible(&self) -> bool {
        self.inner().core().is_visible()
    }

    pub fn is_closed(&self) -> bool {
        self.inner().core().is_closed()
    }

    /// Fires `on_visible` on the first call only.
    pub fn become_visible(&mut self, ctx: &mut PanelContext<'_>) {
        let panel = self.inner_mut();
        if !panel.core_mut().mark_visible() {
            log::debug!("{} is already visible", panel.id().label());
            return;
        }
        panel.on_visible(ctx);
    }

    pub fn handle_key(&mut self, key: KeyEvent, ctx: &mut PanelContext<'_>) -> bool {
        let panel = self.inner_mut();
        if !panel.core().is_visible() || panel.core().is_closed() {
            return false;
        }
        panel.handle_key(key, ctx)
    }

    pub fn poll(&mut self, ctx: &mut PanelContext<'_>) {
        let panel = self.inner_mut();
        if panel.core().is_visible() && !panel.core().is_closed() {
            panel.poll(ctx);
        }
    }

    pub fn take_result(&mut self) -> Option<PanelResult> {
        self.inner_mut().core_mut().take_result()
    }
}
