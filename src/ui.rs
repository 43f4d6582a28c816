use crate::{
    app::{App, LogLevel},
    game::GameId,
    panel::{
        keybinds::{default_keybinds_path, KeybindsFile},
        updater_service::UpdaterField,
        Panel, PanelId,
    },
};
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};
use std::{
    io,
    time::{Duration, Instant},
};

const SIDE_PANEL_WIDTH: u16 = 40;
const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

#[derive(Clone)]
struct Theme {
    accent: Color,
    border: Color,
    text: Color,
    muted: Color,
    success: Color,
    warning: Color,
    error: Color,
    header_bg: Color,
}

impl Theme {
    fn new(dark: bool) -> Self {
        if dark {
            Self {
                accent: Color::Rgb(120, 190, 255),
                border: Color::Rgb(65, 75, 90),
                text: Color::Rgb(220, 230, 240),
                muted: Color::Rgb(135, 145, 155),
                success: Color::Rgb(120, 220, 140),
                warning: Color::Rgb(230, 200, 120),
                error: Color::Rgb(235, 100, 95),
                header_bg: Color::Rgb(22, 28, 36),
            }
        } else {
            Self {
                accent: Color::Rgb(20, 90, 170),
                border: Color::Rgb(160, 170, 180),
                text: Color::Rgb(25, 30, 35),
                muted: Color::Rgb(100, 110, 120),
                success: Color::Rgb(30, 130, 60),
                warning: Color::Rgb(160, 110, 0),
                error: Color::Rgb(180, 40, 35),
                header_bg: Color::Rgb(235, 238, 242),
            }
        }
    }

    fn block(&self, title: &str) -> Block<'static> {
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(self.border))
            .title(Span::styled(
                title.to_string(),
                Style::default()
                    .fg(self.accent)
                    .add_modifier(Modifier::BOLD),
            ))
    }
}

pub fn run(app: &mut App) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_loop(terminal: &mut Terminal<impl Backend>, app: &mut App) -> Result<()> {
    let started = Instant::now();
    loop {
        app.tick();
        let frame_index = (started.elapsed().as_millis() / 200) as usize;
        terminal.draw(|frame| draw(frame, app, frame_index))?;

        if app.should_quit {
            break;
        }

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    handle_key(app, key);
                }
            }
        }
    }

    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    // The host owns input while a panel is displayed.
    if app.is_busy() {
        app.panel_key(key);
        return;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') => app.should_quit = true,
        KeyCode::Up => app.move_selection(-1),
        KeyCode::Down => app.move_selection(1),
        KeyCode::Char('a') => app.open_panel(PanelId::About),
        KeyCode::Char('b') => app.open_panel(PanelId::BackupNag),
        KeyCode::Char('f') => app.open_panel(PanelId::FailedMods),
        KeyCode::Char('i') => app.open_panel(PanelId::ImportInstalledDlcMod),
        KeyCode::Char('k') => app.open_panel(PanelId::KeybindsInjector),
        KeyCode::Char('w') => app.open_panel(PanelId::PreviewWelcome),
        KeyCode::Char('u') => app.open_panel(PanelId::UpdaterService),
        KeyCode::Char('v') => app.open_panel(PanelId::RunAndDone),
        _ => {}
    }
}

fn draw(frame: &mut Frame<'_>, app: &App, frame_index: usize) {
    let theme = Theme::new(app.settings().dark_theme);
    let area = frame.size();

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(5),
            Constraint::Length(6),
            Constraint::Length(1),
        ])
        .split(area);

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            " BusyPanel ",
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(theme.muted),
        ),
        Span::styled(
            match app.queued_panels() {
                0 => String::new(),
                count => format!("  {count} panel(s) waiting"),
            },
            Style::default().fg(theme.warning),
        ),
    ]))
    .style(Style::default().bg(theme.header_bg));
    frame.render_widget(header, rows[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(20), Constraint::Length(SIDE_PANEL_WIDTH)])
        .split(rows[1]);

    let items: Vec<ListItem> = app
        .library
        .mods
        .iter()
        .map(|mod_entry| {
            let style = if mod_entry.valid {
                Style::default().fg(theme.text)
            } else {
                Style::default().fg(theme.error)
            };
            ListItem::new(Line::from(vec![
                Span::styled(mod_entry.name.clone(), style),
                Span::styled(
                    format!("  {}", mod_entry.game.display_name()),
                    Style::default().fg(theme.muted),
                ),
            ]))
        })
        .collect();
    let mut state = ListState::default();
    if !app.library.mods.is_empty() {
        state.select(Some(app.selected));
    }
    let list = List::new(items)
        .block(theme.block("Mods"))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    frame.render_stateful_widget(list, body[0], &mut state);

    let backup_lines: Vec<Line> = app
        .backup_statuses()
        .iter()
        .map(|status| backup_line(status.game, status.backed_up, &theme))
        .collect();
    frame.render_widget(
        Paragraph::new(backup_lines).block(theme.block("Backups")),
        body[1],
    );

    let log_height = rows[2].height.saturating_sub(2) as usize;
    frame.render_widget(
        Paragraph::new(build_log_lines(app, &theme, log_height)).block(theme.block("Log")),
        rows[2],
    );

    let status = status_bar_line(app, rows[3].width);
    frame.render_widget(
        Paragraph::new(status).style(Style::default().fg(theme.muted)),
        rows[3],
    );

    if let Some(panel) = app.current_panel() {
        draw_panel(frame, app, panel, &theme, frame_index);
    }
}

fn backup_line(game: GameId, backed_up: bool, theme: &Theme) -> Line<'static> {
    let (label, color) = if backed_up {
        ("Backed up", theme.success)
    } else {
        ("No backup", theme.warning)
    };
    Line::from(vec![
        Span::styled(
            format!("{:<20}", game.display_name()),
            Style::default().fg(theme.text),
        ),
        Span::styled(label, Style::default().fg(color)),
    ])
}

fn status_bar_line(app: &App, width: u16) -> String {
    let width = width as usize;
    let left = format!("Status: {}", app.status);
    let right = app.hint().to_string();
    if width == 0 {
        return String::new();
    }
    if left.len() + right.len() + 1 > width {
        let available = width.saturating_sub(left.len() + 1);
        let mut trimmed_right = right;
        if trimmed_right.len() > available {
            trimmed_right.truncate(available);
        }
        return format!("{left} {trimmed_right}");
    }
    let spaces = width - left.len() - right.len();
    format!("{left}{}{right}", " ".repeat(spaces))
}

fn build_log_lines(app: &App, theme: &Theme, height: usize) -> Vec<Line<'static>> {
    if height == 0 {
        return Vec::new();
    }
    if app.logs.is_empty() {
        return vec![Line::from(Span::styled(
            "No recent events.",
            Style::default().fg(theme.muted),
        ))];
    }
    let start = app.logs.len().saturating_sub(height);
    app.logs[start..]
        .iter()
        .map(|entry| {
            let (label, color) = match entry.level {
                LogLevel::Info => ("[i]", theme.accent),
                LogLevel::Warn => ("[!]", theme.warning),
                LogLevel::Error => ("[x]", theme.error),
            };
            Line::from(vec![
                Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD)),
                Span::raw(" "),
                Span::styled(entry.message.clone(), Style::default().fg(theme.text)),
            ])
        })
        .collect()
}

fn draw_panel(frame: &mut Frame<'_>, app: &App, panel: &Panel, theme: &Theme, frame_index: usize) {
    let area = frame.size();
    let (mut lines, footer) = panel_lines(app, panel, theme, frame_index);
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(footer, Style::default().fg(theme.muted))));

    let height = (lines.len() as u16 + 2).clamp(7, area.height.saturating_sub(2).max(7));
    let width = area.width.saturating_mul(2) / 3;
    let width = width.clamp(40, area.width.saturating_sub(2).max(40));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    let panel_area = Rect::new(x, y, width, height).intersection(area);

    frame.render_widget(Clear, panel_area);
    let block = theme
        .block(panel.id().label())
        .style(Style::default().bg(theme.header_bg));
    let widget = Paragraph::new(lines)
        .block(block)
        .style(Style::default().fg(theme.text))
        .wrap(Wrap { trim: false });
    frame.render_widget(widget, panel_area);
}

fn marker(selected: bool) -> &'static str {
    if selected {
        "> "
    } else {
        "  "
    }
}

fn keybind_files_line(
    label: &str,
    files: &[KeybindsFile],
    selected: Option<&KeybindsFile>,
) -> Line<'static> {
    let names = if files.is_empty() {
        "none".to_string()
    } else {
        files
            .iter()
            .map(|file| {
                if selected == Some(file) {
                    format!("[{}]", file.file_name())
                } else {
                    file.file_name()
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    };
    Line::from(format!("{label}: {names}"))
}

fn panel_lines(
    app: &App,
    panel: &Panel,
    theme: &Theme,
    frame_index: usize,
) -> (Vec<Line<'static>>, &'static str) {
    let heading = |text: String| {
        Line::from(Span::styled(
            text,
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        ))
    };
    let mut lines = Vec::new();
    let footer = match panel {
        Panel::About(about) => {
            lines.push(heading(format!("BusyPanel {}", about.version())));
            lines.push(Line::from("Modal panels for a game mod manager."));
            "w homepage | any key close"
        }
        Panel::BackupNag(nag) => {
            lines.push(heading(nag.title().to_string()));
            for (label, statuses) in [
                ("Original trilogy", nag.statuses_ot()),
                ("Legendary Edition", nag.statuses_le()),
            ] {
                if statuses.is_empty() {
                    continue;
                }
                lines.push(Line::from(""));
                lines.push(Line::from(label));
                for status in statuses {
                    lines.push(backup_line(status.game, status.backed_up, theme));
                }
            }
            "b create backup | Esc later"
        }
        Panel::FailedMods(failed) => {
            lines.push(heading("These mods failed to load".to_string()));
            for (index, mod_entry) in failed.failed_mods().iter().enumerate() {
                let reason = mod_entry.load_failure.as_deref().unwrap_or("unknown error");
                lines.push(Line::from(format!(
                    "{}{}: {reason}",
                    marker(failed.selected_index() == Some(index)),
                    mod_entry.name
                )));
            }
            if failed.failed_mods().is_empty() {
                lines.push(Line::from("All failed mods were deleted"));
            }
            match (failed.can_restore_mod(), failed.can_visit_website()) {
                (true, true) => "Up/Down select | r restore | w website | d delete | Esc close",
                (true, false) => "Up/Down select | r restore | d delete | Esc close",
                (false, true) => "Up/Down select | w website | d delete | Esc close",
                (false, false) if failed.can_delete_mod() => "Up/Down select | d delete | Esc close",
                (false, false) => "Up/Down select | Esc close",
            }
        }
        Panel::ImportInstalledDlcMod(import) => {
            lines.push(heading("Import an installed DLC folder".to_string()));
            let selected_path = import.selected_target().map(|target| target.path.clone());
            for target in import.targets() {
                lines.push(Line::from(format!(
                    "{}{}",
                    marker(selected_path.as_ref() == Some(&target.path)),
                    target.label()
                )));
            }
            if import.targets().is_empty() {
                lines.push(Line::from("No selectable targets"));
            }
            lines.push(Line::from(""));
            for dlc in import.installed_dlc() {
                lines.push(Line::from(format!(
                    "{}{dlc}",
                    marker(import.selected_dlc() == Some(dlc.as_str()))
                )));
            }
            lines.push(Line::from(format!(
                "{}Mod name: {}",
                marker(!import.editing_site()),
                import.mod_name()
            )));
            lines.push(Line::from(format!(
                "{}Mod site: {}",
                marker(import.editing_site()),
                import.mod_site()
            )));
            if import.can_import() {
                "Tab target | Up/Down folder | type to edit | Shift+Tab field | Enter import | Esc close"
            } else {
                "Tab target | Up/Down folder | type to edit | Shift+Tab field | Esc close"
            }
        }
        Panel::KeybindsInjector(keybinds) => {
            for (game, files, target) in [
                (GameId::Me1, keybinds.me1_keybinds(), None),
                (GameId::Me2, keybinds.me2_keybinds(), Some(keybinds.selected_me2_target())),
                (GameId::Me3, keybinds.me3_keybinds(), Some(keybinds.selected_me3_target())),
            ] {
                lines.push(heading(format!(
                    "{}{}",
                    marker(keybinds.focus() == game),
                    game.display_name()
                )));
                lines.push(keybind_files_line(
                    "  Files",
                    files,
                    keybinds.selected_keybinds(game),
                ));
                if let Some(target) = target {
                    let target = target
                        .map(|target| target.path.display().to_string())
                        .unwrap_or_else(|| "not installed".to_string());
                    lines.push(Line::from(format!("  Target: {target}")));
                }
            }
            lines.push(Line::from(""));
            let keybinds_dir = &app.settings().keybinds_dir;
            for game in [GameId::Me1, GameId::Me2, GameId::Me3] {
                if let Some(path) = default_keybinds_path(keybinds_dir, game) {
                    let state = if path.exists() { "present" } else { "missing" };
                    lines.push(Line::from(format!("{} ({state})", path.display())));
                }
            }
            if keybinds.is_installing() {
                let spinner = SPINNER[frame_index % SPINNER.len()];
                lines.push(Line::from(format!("{spinner} Installing keybinds")));
            } else if let Some(message) = keybinds.last_message() {
                lines.push(Line::from(message.to_string()));
            }
            if keybinds.is_installing() {
                "Please wait"
            } else {
                "Tab game | Up/Down file | t target | Enter install | r reset | Esc close"
            }
        }
        Panel::PreviewWelcome(welcome) => {
            let settings = app.settings();
            lines.push(heading("Welcome".to_string()));
            lines.push(Line::from(format!("Language: {}", settings.language)));
            lines.push(Line::from(format!(
                "Theme: {}",
                if settings.dark_theme { "dark" } else { "light" }
            )));
            lines.push(Line::from(format!(
                "Mod library: {}",
                welcome.library_dir().display()
            )));
            "l language | d dark | t light | j discord | Enter continue"
        }
        Panel::RunAndDone(task) => {
            let spinner = if task.is_running() {
                SPINNER[frame_index % SPINNER.len()]
            } else {
                " "
            };
            lines.push(Line::from(format!("{spinner} {}", task.action_text())));
            "Please wait"
        }
        Panel::UpdateCompleted(update) => {
            lines.push(heading(update.title().to_string()));
            lines.push(Line::from(update.message().to_string()));
            "Enter close"
        }
        Panel::UpdaterService(updater) => {
            lines.push(heading(updater.mod_entry().name.clone()));
            lines.push(Line::from(updater.current_action_text().to_string()));
            if updater.operation_in_progress() {
                let spinner = SPINNER[frame_index % SPINNER.len()];
                let state = if updater.cancel_requested() {
                    "Cancelling..."
                } else {
                    "Working"
                };
                lines.push(Line::from(format!("{spinner} {state}")));
            }
            if updater.settings_expanded() {
                lines.push(Line::from(""));
                for (field, label, value) in [
                    (UpdaterField::Username, "Username", updater.username()),
                    (
                        UpdaterField::LzmaStoragePath,
                        "LZMA storage",
                        updater.lzma_storage_path(),
                    ),
                    (
                        UpdaterField::ManifestStoragePath,
                        "Manifest storage",
                        updater.manifest_storage_path(),
                    ),
                ] {
                    lines.push(Line::from(format!(
                        "{}{label}: {value}",
                        marker(updater.focus() == field)
                    )));
                }
            }
            if let Some(subtext) = updater.settings_subtext() {
                lines.push(Line::from(Span::styled(
                    subtext.to_string(),
                    Style::default().fg(theme.error),
                )));
            }
            lines.push(Line::from(format!(
                "{}Changelog: {}",
                marker(updater.focus() == UpdaterField::Changelog),
                updater.changelog()
            )));
            if updater.operation_in_progress() {
                "F4 cancel"
            } else {
                "Tab field | F2 save | F3 set changelog | F5 prepare | F10 close"
            }
        }
    };
    (lines, footer)
}
