mod app;
mod backup;
mod config;
mod game;
mod host;
mod library;
mod links;
mod panel;
mod ui;

use anyhow::{Context, Result};
use std::{fs, io::Write, path::Path};

fn main() -> Result<()> {
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => {
                println!("BusyPanel");
                println!("  --version   Print the version");
                println!("  RUST_LOG    Log filter, written to busypanel.log in the data dir");
                return Ok(());
            }
            "--version" | "-V" => {
                println!("busypanel {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            other => eprintln!("Ignoring unknown argument {other}"),
        }
    }

    let data_dir = config::base_data_dir()?;
    init_logging(&data_dir)?;
    panel::task::install_panic_hook();
    log::info!("Starting busypanel {}", env!("CARGO_PKG_VERSION"));

    let mut app = app::App::initialize()?;
    let result = ui::run(&mut app);
    app.shutdown();
    if let Err(err) = &result {
        log::error!("UI exited with error: {err:#}");
    }
    result
}

// The terminal belongs to the UI, so log records go to a file.
fn init_logging(data_dir: &Path) -> Result<()> {
    fs::create_dir_all(data_dir).context("create app data dir")?;
    let log_path = data_dir.join("busypanel.log");
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("open {}", log_path.display()))?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}
