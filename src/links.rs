use anyhow::{bail, Result};
use std::process::{Command, Stdio};

pub const HOMEPAGE_URL: &str = "https://me3tweaks.com";
pub const DISCORD_INVITE_URL: &str = "https://discord.gg/s8HA6dc";

pub trait LinkOpener {
    fn open_link(&mut self, url: &str) -> Result<()>;
}

/// Hands links to the desktop's opener.
#[derive(Debug, Default)]
pub struct SystemLinkOpener;

impl LinkOpener for SystemLinkOpener {
    fn open_link(&mut self, url: &str) -> Result<()> {
        let mut errors = Vec::new();
        let candidates = [
            ("xdg-open", vec![url]),
            ("gio", vec!["open", url]),
            ("kde-open5", vec![url]),
            ("open", vec![url]),
        ];
        for (command, args) in candidates {
            match Command::new(command)
                .args(&args)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
            {
                Ok(status) if status.success() => {
                    log::info!("Opened {url}");
                    return Ok(());
                }
                Ok(status) => errors.push(format!("{command} exited {status}")),
                Err(err) => errors.push(format!("{command} failed: {err}")),
            }
        }
        bail!("failed to open {url}: {}", errors.join("; "))
    }
}
