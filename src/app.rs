use crate::{
    backup::{self, BackupStatuses, GameBackupStatus},
    config::{self, AppConfig, ConfigFile, SettingsStore},
    game::GameTarget,
    host::BusyHost,
    library::{Library, ModEntry},
    links::{LinkOpener, SystemLinkOpener},
    panel::{
        AboutPanel, BackupNagPanel, ClosingPayload, FailedModsPanel, ImportInstalledDlcModPanel,
        KeybindsInjectorPanel, Panel, PanelContext, PanelId, PanelResult, PreviewWelcomePanel,
        RunAndDonePanel, TaskOutcome, UpdateCompletedPanel, UpdaterServicePanel,
    },
};
use anyhow::Result;
use std::path::PathBuf;

const LOG_CAPACITY: usize = 200;

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

pub struct App {
    pub data_dir: PathBuf,
    settings: ConfigFile,
    targets: Vec<GameTarget>,
    pub library: Library,
    backups: BackupStatuses,
    links: Box<dyn LinkOpener>,
    host: BusyHost,
    pub selected: usize,
    pub status: String,
    pub logs: Vec<LogEntry>,
    pub should_quit: bool,
}

impl App {
    pub fn initialize() -> Result<Self> {
        let data_dir = config::base_data_dir()?;
        Self::load(data_dir, Box::new(SystemLinkOpener))
    }

    /// Loads state from `data_dir` and queues the startup panels.
    pub fn load(data_dir: PathBuf, links: Box<dyn LinkOpener>) -> Result<Self> {
        let settings = ConfigFile::load_or_create(&data_dir)?;
        let library = Library::load_or_create(&data_dir)?;
        let backups = BackupStatuses::load(&data_dir)?;
        let targets = settings.settings().targets.clone();
        log::info!(
            "Loaded {} target(s) and {} mod(s), settings at {}",
            targets.len(),
            library.mods.len(),
            settings.path().display()
        );

        let mut app = Self {
            data_dir,
            settings,
            targets,
            library,
            backups,
            links,
            host: BusyHost::new(),
            selected: 0,
            status: "Ready".to_string(),
            logs: Vec::new(),
            should_quit: false,
        };
        app.queue_startup_panels();
        Ok(app)
    }

    fn queue_startup_panels(&mut self) {
        if !self.settings.settings().showed_preview_panel {
            self.show(Panel::PreviewWelcome(PreviewWelcomePanel::new()));
        }

        let version = env!("CARGO_PKG_VERSION");
        let previous = self.settings.settings().last_version_shown.clone();
        if previous.as_deref() != Some(version) {
            self.settings.settings_mut().last_version_shown = Some(version.to_string());
            if let Err(err) = self.settings.save() {
                self.log_error(format!("Failed to save settings: {err:#}"));
            }
            // A first run has nothing to report.
            if let Some(previous) = previous {
                self.show(Panel::UpdateCompleted(UpdateCompletedPanel::new(
                    "Update completed",
                    &format!("Updated from {previous} to {version}."),
                )));
            }
        }

        if BackupNagPanel::should_show_nag_screen(
            &self.targets,
            self.settings.settings(),
            &self.backups,
        ) {
            self.show(Panel::BackupNag(BackupNagPanel::new(&self.targets)));
        }

        let failed = self.library.failed_mods();
        if !failed.is_empty() {
            self.log_warn(format!("{} mod(s) failed to load", failed.len()));
            self.show(Panel::FailedMods(FailedModsPanel::new(failed)));
        }
    }

    pub fn is_busy(&self) -> bool {
        self.host.is_busy()
    }

    pub fn current_panel(&self) -> Option<&Panel> {
        self.host.current()
    }

    pub fn queued_panels(&self) -> usize {
        self.host.queued()
    }

    pub fn settings(&self) -> &AppConfig {
        self.settings.settings()
    }

    pub fn backup_statuses(&self) -> &[GameBackupStatus] {
        self.backups.statuses()
    }

    pub fn selected_mod(&self) -> Option<&ModEntry> {
        self.library.mods.get(self.selected)
    }

    pub fn move_selection(&mut self, delta: isize) {
        if self.library.mods.is_empty() {
            self.selected = 0;
            return;
        }
        let last = self.library.mods.len() - 1;
        self.selected = self.selected.saturating_add_signed(delta).min(last);
    }

    fn host_and_context(&mut self) -> (&mut BusyHost, PanelContext<'_>) {
        (
            &mut self.host,
            PanelContext {
                targets: &self.targets,
                settings: &mut self.settings,
                backups: &mut self.backups,
                library: &mut self.library,
                links: self.links.as_mut(),
            },
        )
    }

    fn show(&mut self, panel: Panel) {
        let (host, mut ctx) = self.host_and_context();
        host.show(panel, false, &mut ctx);
    }

    /// Forwards a key to the displayed panel.
    pub fn panel_key(&mut self, key: crossterm::event::KeyEvent) -> bool {
        let (host, mut ctx) = self.host_and_context();
        host.handle_key(key, &mut ctx)
    }

    pub fn tick(&mut self) {
        let (host, mut ctx) = self.host_and_context();
        if let Some(result) = host.pump(&mut ctx) {
            self.apply_result(result);
        }
    }

    fn apply_result(&mut self, result: PanelResult) {
        // The panel already wrote the fault to the log file.
        if let Some(fault) = result.error() {
            self.record(
                LogLevel::Error,
                format!("Exception occurred in {} thread: {}", fault.worker, fault.message),
            );
            self.status = format!("Error: {}", fault.message);
        }

        match &result.payload {
            ClosingPayload::Task(TaskOutcome::Completed) => {
                self.backups.refresh();
                self.log_info("Background task completed".to_string());
            }
            ClosingPayload::Task(TaskOutcome::Cancelled) => {
                self.log_warn("Background task cancelled".to_string());
            }
            ClosingPayload::Mod(mod_entry) => {
                self.log_info(format!("Restore requested for {}", mod_entry.name));
                self.highlight(mod_entry);
            }
            ClosingPayload::Task(TaskOutcome::Faulted(_))
            | ClosingPayload::Decision(_)
            | ClosingPayload::Empty => {}
        }

        if result.reload_mods {
            self.reload_library();
        }
        if let Some(mod_entry) = &result.mod_to_highlight {
            self.highlight(mod_entry);
        }
        if let Some(panel) = result.panel_to_open {
            self.open_panel(panel);
        }
    }

    fn highlight(&mut self, mod_entry: &ModEntry) {
        if let Some(index) = self
            .library
            .mods
            .iter()
            .position(|entry| entry.id == mod_entry.id)
        {
            self.selected = index;
        }
    }

    fn reload_library(&mut self) {
        match Library::load_or_create(&self.data_dir) {
            Ok(library) => {
                self.library = library;
                self.move_selection(0);
            }
            Err(err) => self.log_error(format!("Failed to reload mods: {err:#}")),
        }
    }

    pub fn open_panel(&mut self, id: PanelId) {
        match id {
            PanelId::About => self.show(Panel::About(AboutPanel::new())),
            PanelId::BackupNag => {
                let panel = BackupNagPanel::new(&self.targets);
                self.show(Panel::BackupNag(panel));
            }
            PanelId::FailedMods => {
                let failed = self.library.failed_mods();
                if failed.is_empty() {
                    self.status = "No mods failed to load".to_string();
                    return;
                }
                self.show(Panel::FailedMods(FailedModsPanel::new(failed)));
            }
            PanelId::ImportInstalledDlcMod => {
                self.show(Panel::ImportInstalledDlcMod(ImportInstalledDlcModPanel::new()))
            }
            PanelId::KeybindsInjector => {
                self.show(Panel::KeybindsInjector(KeybindsInjectorPanel::new()))
            }
            PanelId::PreviewWelcome => {
                self.show(Panel::PreviewWelcome(PreviewWelcomePanel::new()))
            }
            PanelId::RunAndDone => self.verify_backups(),
            PanelId::UpdaterService => {
                let Some(mod_entry) = self.selected_mod().cloned() else {
                    self.status = "Select a mod first".to_string();
                    return;
                };
                self.show(Panel::UpdaterService(UpdaterServicePanel::new(mod_entry)));
            }
            PanelId::BackupCreator | PanelId::UpdateCompleted => {
                self.status = format!("{} is not available here", id.label());
            }
        }
    }

    /// Checks recorded backup folders on a worker.
    pub fn verify_backups(&mut self) {
        let recorded = self.backups.recorded();
        let panel = RunAndDonePanel::new("Verifying backups", move |token| {
            token.checkpoint()?;
            let missing = backup::verify_backups(&recorded);
            if missing.is_empty() {
                return Ok(());
            }
            let names: Vec<_> = missing.iter().map(|game| game.display_name()).collect();
            anyhow::bail!("backup missing for {}", names.join(", "))
        });
        self.show(Panel::RunAndDone(panel));
    }

    /// Asks a running background task to stop before exit.
    pub fn shutdown(&self) {
        if let Some(Panel::RunAndDone(task)) = self.host.current() {
            log::info!("Cancelling {} on exit", task.action_text());
            task.cancel();
        }
    }

    pub fn hint(&self) -> &'static str {
        if self.is_busy() {
            "Keys go to the open panel"
        } else {
            "a about | b backups | f failed | i import | k keybinds | u updater | v verify | q quit"
        }
    }

    pub fn log_info(&mut self, message: String) {
        self.push_log(LogLevel::Info, message);
    }

    pub fn log_warn(&mut self, message: String) {
        self.push_log(LogLevel::Warn, message);
    }

    pub fn log_error(&mut self, message: String) {
        self.push_log(LogLevel::Error, message);
    }

    fn push_log(&mut self, level: LogLevel, message: String) {
        match level {
            LogLevel::Info => log::info!("{message}"),
            LogLevel::Warn => log::warn!("{message}"),
            LogLevel::Error => log::error!("{message}"),
        }
        self.record(level, message);
    }

    /// Adds an entry to the on-screen log only.
    fn record(&mut self, level: LogLevel, message: String) {
        self.status = message.clone();
        self.logs.push(LogEntry { level, message });
        if self.logs.len() > LOG_CAPACITY {
            let overflow = self.logs.len() - LOG_CAPACITY;
            self.logs.drain(0..overflow);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        game::GameId,
        links::tests::RecordingOpener,
        panel::testing::{capture_logs, captured_logs, key},
    };
    use crossterm::event::KeyCode;
    use std::{
        fs, thread,
        time::{Duration, Instant},
    };

    fn write_config(dir: &std::path::Path, config: &AppConfig) {
        fs::write(
            dir.join("config.json"),
            serde_json::to_string(config).unwrap(),
        )
        .unwrap();
    }

    fn load(dir: &std::path::Path) -> App {
        App::load(dir.to_path_buf(), Box::new(RecordingOpener::default())).unwrap()
    }

    fn seen_config() -> AppConfig {
        AppConfig {
            showed_preview_panel: true,
            last_version_shown: Some(env!("CARGO_PKG_VERSION").to_string()),
            ..AppConfig::default()
        }
    }

    fn drain(app: &mut App) -> Vec<PanelId> {
        let mut seen = Vec::new();
        for _ in 0..10 {
            let Some(id) = app.current_panel().map(Panel::id) else {
                break;
            };
            seen.push(id);
            app.panel_key(key(KeyCode::Esc));
            app.tick();
        }
        seen
    }

    #[test]
    fn first_run_shows_welcome_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = load(dir.path());
        assert_eq!(app.current_panel().map(Panel::id), Some(PanelId::PreviewWelcome));
        assert_eq!(app.queued_panels(), 0);
        assert_eq!(drain(&mut app), vec![PanelId::PreviewWelcome]);

        let reloaded = load(dir.path());
        assert!(!reloaded.is_busy());
    }

    #[test]
    fn startup_queue_follows_order() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            showed_preview_panel: false,
            last_version_shown: Some("0.0.1".to_string()),
            targets: vec![GameTarget::new(GameId::Me3, "/games/me3")],
            ..AppConfig::default()
        };
        write_config(dir.path(), &config);
        let mut broken = ModEntry::new("broken", "Broken Mod");
        broken.valid = false;
        let mods = vec![ModEntry::new("ok", "Fine"), broken];
        Library::in_dir(dir.path(), mods).save().unwrap();

        let mut app = load(dir.path());
        assert_eq!(app.queued_panels(), 3);
        assert_eq!(
            drain(&mut app),
            vec![
                PanelId::PreviewWelcome,
                PanelId::UpdateCompleted,
                PanelId::BackupNag,
                PanelId::FailedMods,
            ]
        );
    }

    #[test]
    fn backup_request_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            &AppConfig {
                targets: vec![GameTarget::new(GameId::Le1, "/games/le1")],
                ..seen_config()
            },
        );
        let mut app = load(dir.path());
        assert_eq!(app.current_panel().map(Panel::id), Some(PanelId::BackupNag));
        app.panel_key(key(KeyCode::Char('b')));
        app.tick();
        assert!(!app.is_busy());
        assert_eq!(app.status, "Backup creator is not available here");
    }

    #[test]
    fn failed_verification_surfaces_the_error() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), &seen_config());
        fs::write(
            dir.path().join("backups.json"),
            r#"{"backups":{"me2":"/definitely/not/here"}}"#,
        )
        .unwrap();
        capture_logs();
        let mut app = load(dir.path());
        assert!(!app.is_busy());

        app.open_panel(PanelId::RunAndDone);
        assert!(app.is_busy());
        let deadline = Instant::now() + Duration::from_secs(5);
        while app.is_busy() {
            assert!(Instant::now() < deadline, "verification never finished");
            app.tick();
            thread::sleep(Duration::from_millis(5));
        }
        let last = app.logs.last().unwrap();
        assert_eq!(last.level, LogLevel::Error);
        assert!(last.message.contains("RunAndDoneThread"));
        assert!(last.message.contains("Mass Effect 2"));
        assert!(app.status.starts_with("Error: "));

        let written = captured_logs()
            .iter()
            .filter(|line| line.contains("backup missing for Mass Effect 2"))
            .count();
        assert_eq!(written, 1);
    }

    #[test]
    fn restored_mod_is_highlighted() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), &seen_config());
        let mut broken = ModEntry::new("broken", "Broken Mod");
        broken.valid = false;
        broken.updatable = true;
        let mods = vec![ModEntry::new("a", "A"), ModEntry::new("b", "B"), broken];
        Library::in_dir(dir.path(), mods).save().unwrap();

        let mut app = load(dir.path());
        assert_eq!(app.current_panel().map(Panel::id), Some(PanelId::FailedMods));
        app.panel_key(key(KeyCode::Down));
        app.panel_key(key(KeyCode::Char('r')));
        app.tick();
        assert_eq!(app.selected, 2);
        assert_eq!(app.status, "Restore requested for Broken Mod");
    }

    #[test]
    fn deleted_failed_mod_leaves_the_library() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), &seen_config());
        let mut broken = ModEntry::new("broken", "Broken Mod");
        broken.valid = false;
        let mods = vec![ModEntry::new("a", "A"), broken];
        Library::in_dir(dir.path(), mods).save().unwrap();

        let mut app = load(dir.path());
        assert_eq!(app.current_panel().map(Panel::id), Some(PanelId::FailedMods));
        app.panel_key(key(KeyCode::Down));
        app.panel_key(key(KeyCode::Char('d')));
        app.panel_key(key(KeyCode::Esc));
        app.tick();
        assert!(!app.is_busy());
        assert_eq!(app.library.mods, vec![ModEntry::new("a", "A")]);
        let reloaded = Library::load_or_create(dir.path()).unwrap();
        assert_eq!(reloaded.mods, vec![ModEntry::new("a", "A")]);
    }

    #[test]
    fn updater_service_needs_a_selected_mod() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), &seen_config());
        let mut app = load(dir.path());
        app.open_panel(PanelId::UpdaterService);
        assert!(!app.is_busy());
        assert_eq!(app.status, "Select a mod first");
    }

    #[test]
    fn log_is_capped() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), &seen_config());
        let mut app = load(dir.path());
        for index in 0..LOG_CAPACITY + 5 {
            app.log_info(format!("entry {index}"));
        }
        assert_eq!(app.logs.len(), LOG_CAPACITY);
        assert_eq!(app.logs[0].message, "entry 5");
    }
}
