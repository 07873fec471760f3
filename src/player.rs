use anyhow::{Context, Result, bail};
use std::path::Path;
use std::process::Command;

/// Open a file with the platform's default application.
pub fn open_with_default_app(path: &Path) -> Result<()> {
    let status = if cfg!(target_os = "macos") {
        Command::new("open").arg(path).status()
    } else if cfg!(windows) {
        Command::new("cmd").args(["/C", "start", ""]).arg(path).status()
    } else {
        Command::new("xdg-open").arg(path).status()
    }
    .with_context(|| format!("failed to open {}", path.display()))?;

    if !status.success() {
        bail!("player exited with status: {status}");
    }
    Ok(())
}
