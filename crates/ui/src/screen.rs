//! Screenshot capture for the fallback chain. A capture lives inside
//! a guard that deletes the file when the operation ends; screenshots
//! are never retained past the single operation that produced them.

use crate::error::{UiError, UiResult};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Owns a screenshot file and removes it on drop.
pub struct Screenshot {
    path: PathBuf,
}

impl Screenshot {
    /// Take ownership of an existing capture file; it is deleted when
    /// the guard drops.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Screenshot {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove screenshot {:?}: {}", self.path, e);
            }
        }
    }
}

async fn command_exists(command: &str) -> bool {
    Command::new("which")
        .arg(command)
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}

async fn run_capture(display_ref: &str, command: &str, args: &[&str]) -> UiResult<()> {
    let output = Command::new(command)
        .args(args)
        .env("DISPLAY", display_ref)
        .output()
        .await?;
    if output.status.success() {
        return Ok(());
    }
    Err(UiError::OperationFailed(
        String::from_utf8_lossy(&output.stderr).to_string(),
    ))
}

/// Capture the surface bound to `display_ref` into a fresh temp file.
pub async fn capture(display_ref: &str) -> UiResult<Screenshot> {
    let path = std::env::temp_dir().join(format!(
        "veildesk-shot-{}-{}.png",
        std::process::id(),
        unique_suffix()
    ));
    let target = path.to_string_lossy().to_string();

    if command_exists("scrot").await {
        run_capture(display_ref, "scrot", &["-o", &target]).await?;
    } else if command_exists("import").await {
        run_capture(display_ref, "import", &["-window", "root", &target]).await?;
    } else {
        return Err(UiError::OperationFailed(
            "No screenshot backend found (install 'scrot' or ImageMagick)".to_string(),
        ));
    }

    debug!("Captured {} from display {}", target, display_ref);
    Ok(Screenshot { path })
}

fn unique_suffix() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screenshot_guard_removes_file_on_drop() {
        let path = std::env::temp_dir().join("veildesk-shot-test.png");
        std::fs::write(&path, b"fake").unwrap();

        {
            let _shot = Screenshot { path: path.clone() };
        }
        assert!(!path.exists());
    }

    #[test]
    fn missing_file_on_drop_is_not_an_error() {
        let path = std::env::temp_dir().join("veildesk-shot-missing.png");
        let _shot = Screenshot { path };
        // Drop must not panic.
    }
}
