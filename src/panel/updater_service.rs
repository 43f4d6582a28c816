use super::{
    task::{self, CancelToken, TaskAction, TaskHandle, TaskOutcome},
    BusyPanel, PanelContext, PanelCore, PanelId, PanelResult,
};
use crate::library::{self, ModEntry};
use anyhow::Context;
use crossterm::event::{KeyCode, KeyEvent};
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

const WORKER_NAME: &str = "UpdaterServicePrepareThread";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdaterField {
    Username,
    LzmaStoragePath,
    ManifestStoragePath,
    Changelog,
}

impl UpdaterField {
    fn next(self) -> Self {
        match self {
            UpdaterField::Username => UpdaterField::LzmaStoragePath,
            UpdaterField::LzmaStoragePath => UpdaterField::ManifestStoragePath,
            UpdaterField::ManifestStoragePath => UpdaterField::Changelog,
            UpdaterField::Changelog => UpdaterField::Username,
        }
    }
}

/// Prepares a mod for the updater service.
pub struct UpdaterServicePanel {
    core: PanelCore,
    focus: UpdaterField,
    mod_entry: ModEntry,
    username: String,
    lzma_storage_path: String,
    manifest_storage_path: String,
    changelog: String,
    changelog_not_yet_set: bool,
    settings_expanded: bool,
    settings_subtext: Option<String>,
    current_action_text: String,
    operation_in_progress: bool,
    cancel_requested: bool,
    task: Option<TaskHandle>,
}

impl UpdaterServicePanel {
    pub fn new(mod_entry: ModEntry) -> Self {
        Self {
            core: PanelCore::new(),
            focus: UpdaterField::Username,
            mod_entry,
            username: String::new(),
            lzma_storage_path: String::new(),
            manifest_storage_path: String::new(),
            changelog: String::new(),
            changelog_not_yet_set: true,
            settings_expanded: false,
            settings_subtext: None,
            current_action_text: String::new(),
            operation_in_progress: false,
            cancel_requested: false,
            task: None,
        }
    }

    pub fn mod_entry(&self) -> &ModEntry {
        &self.mod_entry
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn lzma_storage_path(&self) -> &str {
        &self.lzma_storage_path
    }

    pub fn manifest_storage_path(&self) -> &str {
        &self.manifest_storage_path
    }

    pub fn changelog(&self) -> &str {
        &self.changelog
    }

    pub fn settings_expanded(&self) -> bool {
        self.settings_expanded
    }

    pub fn settings_subtext(&self) -> Option<&str> {
        self.settings_subtext.as_deref()
    }

    pub fn current_action_text(&self) -> &str {
        &self.current_action_text
    }

    pub fn focus(&self) -> UpdaterField {
        self.focus
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested
    }

    pub fn operation_in_progress(&self) -> bool {
        self.operation_in_progress
    }

    fn updater_folder(&self) -> Option<&str> {
        self.mod_entry
            .updater_service_folder
            .as_deref()
            .map(str::trim)
            .filter(|folder| !folder.is_empty())
    }

    pub fn can_set_changelog(&self) -> bool {
        !self.changelog.trim().is_empty() && self.changelog_not_yet_set
    }

    /// Locks the changelog in.
    pub fn set_changelog(&mut self) {
        if self.can_set_changelog() {
            self.changelog_not_yet_set = false;
        }
    }

    pub fn can_save_settings(&self) -> bool {
        !self.operation_in_progress
    }

    pub fn save_settings(&mut self, ctx: &mut PanelContext<'_>) {
        if !self.can_save_settings() {
            return;
        }
        let settings = ctx.settings.settings_mut();
        settings.updater_service_username = self.username.clone();
        settings.updater_service_lzma_storage_path = self.lzma_storage_path.clone();
        settings.updater_service_manifest_storage_path = self.manifest_storage_path.clone();
        match ctx.settings.save() {
            Ok(()) => {
                self.settings_subtext = None;
                self.settings_expanded = self.settings_incomplete();
            }
            Err(err) => {
                log::error!("Failed to save updater service settings: {err:#}");
                self.settings_subtext = Some("Error saving settings".to_string());
            }
        }
    }

    pub fn can_prepare(&self) -> bool {
        !self.operation_in_progress
            && self.updater_folder().is_some()
            && !self.settings_incomplete()
    }

    /// Builds the server manifest for the mod's library folder on a worker.
    pub fn prepare(&mut self, ctx: &mut PanelContext<'_>) {
        if !self.can_prepare() {
            return;
        }
        let Some(folder) = self.updater_folder().map(str::to_string) else {
            return;
        };
        let library_root = &ctx.settings.settings().mod_library_path;
        let Some(source) = library::mod_folder(library_root, &self.mod_entry.id) else {
            log::warn!("No library folder for {}", self.mod_entry.name);
            self.current_action_text = "The mod library folder is not set".to_string();
            return;
        };
        let manifest_dir = PathBuf::from(self.manifest_storage_path.trim());
        let changelog = if self.changelog_not_yet_set {
            String::new()
        } else {
            self.changelog.clone()
        };
        let text = format!("Building server manifest for {}", self.mod_entry.name);
        self.start_operation(
            text,
            Box::new(move |token: &CancelToken| {
                let path = write_manifest(&source, &folder, &changelog, &manifest_dir, token)?;
                log::info!("Wrote server manifest {}", path.display());
                Ok(())
            }),
        );
    }

    fn start_operation(&mut self, text: String, action: TaskAction) {
        match task::spawn_named(WORKER_NAME, CancelToken::new(), action) {
            Ok(handle) => {
                self.task = Some(handle);
                self.operation_in_progress = true;
                self.cancel_requested = false;
                self.current_action_text = text;
            }
            Err(err) => {
                log::error!("{err}");
                self.current_action_text = "Could not start the operation".to_string();
            }
        }
    }

    fn finish_operation(&mut self, outcome: TaskOutcome) {
        self.operation_in_progress = false;
        self.current_action_text = match outcome {
            TaskOutcome::Completed => format!("Manifest ready for {}", self.mod_entry.name),
            TaskOutcome::Cancelled => "Operation cancelled".to_string(),
            TaskOutcome::Faulted(fault) => {
                log::error!(
                    "Exception occurred in {} thread: {}",
                    fault.worker,
                    fault.message
                );
                format!("Error: {}", fault.message)
            }
        };
    }

    pub fn can_cancel(&self) -> bool {
        !self.cancel_requested && self.operation_in_progress
    }

    pub fn cancel(&mut self) {
        if !self.can_cancel() {
            return;
        }
        self.cancel_requested = true;
        if let Some(handle) = &self.task {
            handle.token().cancel();
        }
        self.current_action_text = "Cancelling".to_string();
    }

    pub fn can_close(&self) -> bool {
        !self.operation_in_progress
    }

    pub fn close(&mut self) {
        if !self.can_close() {
            return;
        }
        self.cancel_requested = true;
        let _ = self.close_with(PanelResult::empty());
    }

    fn focused_field_mut(&mut self) -> Option<&mut String> {
        match self.focus {
            UpdaterField::Username => Some(&mut self.username),
            UpdaterField::LzmaStoragePath => Some(&mut self.lzma_storage_path),
            UpdaterField::ManifestStoragePath => Some(&mut self.manifest_storage_path),
            UpdaterField::Changelog if self.changelog_not_yet_set => Some(&mut self.changelog),
            UpdaterField::Changelog => None,
        }
    }

    fn settings_incomplete(&self) -> bool {
        [
            &self.username,
            &self.lzma_storage_path,
            &self.manifest_storage_path,
        ]
        .iter()
        .any(|value| value.trim().is_empty())
    }
}

impl BusyPanel for UpdaterServicePanel {
    fn id(&self) -> PanelId {
        PanelId::UpdaterService
    }

    fn core(&self) -> &PanelCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PanelCore {
        &mut self.core
    }

    fn on_visible(&mut self, ctx: &mut PanelContext<'_>) {
        let settings = ctx.settings.settings();
        self.username = settings.updater_service_username.clone();
        self.lzma_storage_path = settings.updater_service_lzma_storage_path.clone();
        self.manifest_storage_path = settings.updater_service_manifest_storage_path.clone();
        self.settings_expanded = self.settings_incomplete();

        self.current_action_text = if self.updater_folder().is_some() {
            format!("Ready to prepare {}", self.mod_entry.name)
        } else {
            log::warn!(
                "{} has no updater service folder set in its moddesc",
                self.mod_entry.name
            );
            "This mod does not have an updater service folder".to_string()
        };
    }

    // Esc is left to the text fields; F10 closes.
    fn handle_key(&mut self, key: KeyEvent, ctx: &mut PanelContext<'_>) -> bool {
        match key.code {
            KeyCode::F(2) => self.save_settings(ctx),
            KeyCode::F(3) => self.set_changelog(),
            KeyCode::F(4) => self.cancel(),
            KeyCode::F(5) => self.prepare(ctx),
            KeyCode::F(10) => self.close(),
            KeyCode::Tab => self.focus = self.focus.next(),
            KeyCode::Backspace => {
                if let Some(field) = self.focused_field_mut() {
                    field.pop();
                }
            }
            KeyCode::Char(ch) => match self.focused_field_mut() {
                Some(field) => field.push(ch),
                None => return false,
            },
            _ => return false,
        }
        true
    }

    fn poll(&mut self, _ctx: &mut PanelContext<'_>) {
        let Some(outcome) = self.task.as_ref().and_then(TaskHandle::try_outcome) else {
            return;
        };
        self.task = None;
        self.finish_operation(outcome);
    }
}

#[derive(Debug, Serialize)]
struct ManifestFile {
    path: String,
    size: u64,
}

#[derive(Debug, Serialize)]
struct ServerManifest<'a> {
    folder: &'a str,
    changelog: &'a str,
    files: Vec<ManifestFile>,
}

/// Lists every file under `source` with its size into `<manifest_dir>/<folder>.json`.
fn write_manifest(
    source: &Path,
    folder: &str,
    changelog: &str,
    manifest_dir: &Path,
    token: &CancelToken,
) -> anyhow::Result<PathBuf> {
    anyhow::ensure!(
        source.is_dir(),
        "mod folder {} does not exist",
        source.display()
    );
    let mut files = Vec::new();
    for entry in WalkDir::new(source).sort_by_file_name() {
        token.checkpoint()?;
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(source)?;
        files.push(ManifestFile {
            path: relative.to_string_lossy().replace('\\', "/"),
            size: entry.metadata()?.len(),
        });
    }
    token.checkpoint()?;

    fs::create_dir_all(manifest_dir)
        .with_context(|| format!("create {}", manifest_dir.display()))?;
    let path = manifest_dir.join(format!("{folder}.json"));
    let manifest = ServerManifest {
        folder,
        changelog,
        files,
    };
    fs::write(&path, serde_json::to_string_pretty(&manifest)?)
        .with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::{testing::*, Panel};
    use std::{
        sync::mpsc,
        thread,
        time::{Duration, Instant},
    };

    fn type_text(panel: &mut UpdaterServicePanel, env: &mut TestEnv, text: &str) {
        for ch in text.chars() {
            panel.handle_key(key(KeyCode::Char(ch)), &mut env.ctx());
        }
    }

    fn focus_on(panel: &mut UpdaterServicePanel, env: &mut TestEnv, field: UpdaterField) {
        while panel.focus() != field {
            panel.handle_key(key(KeyCode::Tab), &mut env.ctx());
        }
    }

    fn visible(env: &mut TestEnv, mod_entry: ModEntry) -> UpdaterServicePanel {
        let mut panel = UpdaterServicePanel::new(mod_entry);
        panel.core_mut().mark_visible();
        panel.on_visible(&mut env.ctx());
        panel
    }

    #[test]
    fn blank_settings_expand_the_form() {
        let mut env = TestEnv::new();
        let panel = visible(&mut env, ModEntry::new("m", "Mod"));
        assert!(panel.settings_expanded());
        assert_eq!(
            panel.current_action_text(),
            "This mod does not have an updater service folder"
        );
    }

    #[test]
    fn stored_settings_are_loaded() {
        let mut env = TestEnv::new();
        env.settings.config.updater_service_username = "shepard".to_string();
        env.settings.config.updater_service_lzma_storage_path = "/lzma".to_string();
        env.settings.config.updater_service_manifest_storage_path = "/manifest".to_string();
        let mut entry = ModEntry::new("m", "Mod");
        entry.updater_service_folder = Some("mod".to_string());
        let panel = visible(&mut env, entry);
        assert!(!panel.settings_expanded());
        assert_eq!(panel.username(), "shepard");
        assert_eq!(panel.current_action_text(), "Ready to prepare Mod");
    }

    #[test]
    fn save_settings_persists_fields() {
        let mut env = TestEnv::new();
        let mut panel = visible(&mut env, ModEntry::new("m", "Mod"));
        type_text(&mut panel, &mut env, "garrus");
        focus_on(&mut panel, &mut env, UpdaterField::LzmaStoragePath);
        type_text(&mut panel, &mut env, "/l");
        focus_on(&mut panel, &mut env, UpdaterField::ManifestStoragePath);
        type_text(&mut panel, &mut env, "/m");
        panel.handle_key(key(KeyCode::F(2)), &mut env.ctx());
        assert_eq!(env.settings.saves, 1);
        assert_eq!(env.settings.config.updater_service_username, "garrus");
        assert_eq!(env.settings.config.updater_service_manifest_storage_path, "/m");
        assert!(!panel.settings_expanded());
    }

    #[test]
    fn changelog_locks_once_set() {
        let mut env = TestEnv::new();
        let mut panel = visible(&mut env, ModEntry::new("m", "Mod"));
        assert!(!panel.can_set_changelog());
        focus_on(&mut panel, &mut env, UpdaterField::Changelog);
        type_text(&mut panel, &mut env, "Fixed things");
        assert!(panel.can_set_changelog());
        panel.set_changelog();
        assert!(!panel.can_set_changelog());
        type_text(&mut panel, &mut env, " again");
        assert_eq!(panel.changelog(), "Fixed things");
    }

    fn finish(panel: &mut UpdaterServicePanel, env: &mut TestEnv) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while panel.operation_in_progress() {
            assert!(Instant::now() < deadline, "operation never finished");
            panel.poll(&mut env.ctx());
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn ready_env(root: &Path) -> TestEnv {
        let mut env = TestEnv::new();
        env.settings.config.mod_library_path = root.join("library");
        env.settings.config.updater_service_username = "shepard".to_string();
        env.settings.config.updater_service_lzma_storage_path =
            root.join("lzma").display().to_string();
        env.settings.config.updater_service_manifest_storage_path =
            root.join("manifests").display().to_string();
        env
    }

    fn updatable_mod() -> ModEntry {
        let mut entry = ModEntry::new("m", "Mod");
        entry.updater_service_folder = Some("mod-folder".to_string());
        entry
    }

    #[test]
    fn prepare_writes_manifest_and_blocks_close() {
        let dir = tempfile::tempdir().unwrap();
        let mod_dir = dir.path().join("library").join("m");
        fs::create_dir_all(mod_dir.join("sub")).unwrap();
        fs::write(mod_dir.join("a.txt"), "abc").unwrap();
        fs::write(mod_dir.join("sub").join("b.bin"), [0u8; 10]).unwrap();
        let mut env = ready_env(dir.path());
        let mut panel = visible(&mut env, updatable_mod());
        focus_on(&mut panel, &mut env, UpdaterField::Changelog);
        type_text(&mut panel, &mut env, "First release");
        panel.handle_key(key(KeyCode::F(3)), &mut env.ctx());

        assert!(panel.can_prepare());
        panel.handle_key(key(KeyCode::F(5)), &mut env.ctx());
        assert!(panel.operation_in_progress());
        assert!(!panel.can_close());
        assert!(!panel.can_save_settings());
        panel.handle_key(key(KeyCode::F(10)), &mut env.ctx());
        assert!(panel.core_mut().take_result().is_none());

        finish(&mut panel, &mut env);
        assert_eq!(panel.current_action_text(), "Manifest ready for Mod");
        let written =
            fs::read_to_string(dir.path().join("manifests").join("mod-folder.json")).unwrap();
        let manifest: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(manifest["changelog"], "First release");
        assert_eq!(manifest["files"][0]["path"], "a.txt");
        assert_eq!(manifest["files"][1]["path"], "sub/b.bin");
        assert_eq!(manifest["files"][1]["size"], 10);
        assert!(panel.can_close());
    }

    #[test]
    fn missing_mod_folder_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = ready_env(dir.path());
        let mut panel = visible(&mut env, updatable_mod());
        panel.prepare(&mut env.ctx());
        finish(&mut panel, &mut env);
        assert!(panel.current_action_text().starts_with("Error: mod folder"));
        assert!(!dir.path().join("manifests").exists());
    }

    #[test]
    fn prepare_needs_folder_and_settings() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = TestEnv::new();
        let mut panel = visible(&mut env, updatable_mod());
        assert!(!panel.can_prepare());
        panel.handle_key(key(KeyCode::F(5)), &mut env.ctx());
        assert!(!panel.operation_in_progress());

        let mut env = ready_env(dir.path());
        let panel = visible(&mut env, ModEntry::new("m", "Mod"));
        assert!(!panel.can_prepare());
    }

    #[test]
    fn cancel_stops_the_running_operation() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = ready_env(dir.path());
        let mut panel = visible(&mut env, updatable_mod());
        assert!(!panel.can_cancel());
        panel.handle_key(key(KeyCode::F(4)), &mut env.ctx());
        assert!(!panel.cancel_requested());

        let (go_tx, go_rx) = mpsc::channel::<()>();
        panel.start_operation(
            "Waiting".to_string(),
            Box::new(move |token: &CancelToken| {
                let _ = go_rx.recv();
                token.checkpoint()?;
                Ok(())
            }),
        );
        assert!(panel.can_cancel());
        panel.handle_key(key(KeyCode::F(4)), &mut env.ctx());
        assert!(panel.cancel_requested());
        assert!(!panel.can_cancel());
        assert!(!panel.can_close());

        go_tx.send(()).unwrap();
        finish(&mut panel, &mut env);
        assert_eq!(panel.current_action_text(), "Operation cancelled");
        panel.close();
        assert_eq!(panel.core_mut().take_result(), Some(PanelResult::empty()));
    }

    #[test]
    fn escape_is_not_intercepted() {
        let mut env = TestEnv::new();
        let mut panel = shown(
            Panel::UpdaterService(UpdaterServicePanel::new(ModEntry::new("m", "Mod"))),
            &mut env,
        );
        assert!(!panel.handle_key(key(KeyCode::Esc), &mut env.ctx()));
        assert!(panel.take_result().is_none());
    }

    #[test]
    fn close_key_closes_and_flags_cancel() {
        let mut env = TestEnv::new();
        let mut panel = visible(&mut env, ModEntry::new("m", "Mod"));
        assert!(panel.handle_key(key(KeyCode::F(10)), &mut env.ctx()));
        assert!(panel.cancel_requested());
        assert_eq!(panel.core_mut().take_result(), Some(PanelResult::empty()));
    }

    #[test]
    fn typing_fills_the_focused_field() {
        let mut env = TestEnv::new();
        let mut panel = visible(&mut env, ModEntry::new("m", "Mod"));
        for ch in "liara".chars() {
            panel.handle_key(key(KeyCode::Char(ch)), &mut env.ctx());
        }
        panel.handle_key(key(KeyCode::Backspace), &mut env.ctx());
        panel.handle_key(key(KeyCode::Tab), &mut env.ctx());
        panel.handle_key(key(KeyCode::Char('/')), &mut env.ctx());
        assert_eq!(panel.username(), "liar");
        assert_eq!(panel.lzma_storage_path(), "/");
        assert_eq!(panel.focus(), UpdaterField::LzmaStoragePath);
    }
}
