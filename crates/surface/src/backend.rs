use crate::error::{SurfaceError, SurfaceResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// OS primitive behind a hidden surface: create/destroy a non-visible
/// display and spawn processes bound to it.
#[async_trait]
pub trait SurfaceBackend: Send + Sync {
    /// Create the isolation primitive and return its display reference.
    async fn create_surface(&self, name: &str) -> SurfaceResult<String>;

    async fn destroy_surface(&self, display_ref: &str) -> SurfaceResult<()>;

    /// Spawn a process bound to the surface; returns its pid.
    async fn spawn_process(
        &self,
        display_ref: &str,
        path: &str,
        args: &[String],
    ) -> SurfaceResult<u32>;

    /// Spawn a script file on the surface with stdout/stderr redirected
    /// to capture files. The caller owns polling and termination.
    async fn spawn_script(
        &self,
        display_ref: &str,
        script_file: &Path,
        stdout_file: &Path,
        stderr_file: &Path,
    ) -> SurfaceResult<Child>;
}

async fn command_exists(command: &str) -> bool {
    Command::new("which")
        .arg(command)
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Virtual-display backend (Xvfb). Each surface is a headless X
/// display; windows opened there never reach the interactive session.
pub struct HeadlessBackend {
    next_display: AtomicU32,
    servers: Mutex<HashMap<String, Child>>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self {
            next_display: AtomicU32::new(90),
            servers: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SurfaceBackend for HeadlessBackend {
    async fn create_surface(&self, name: &str) -> SurfaceResult<String> {
        if !command_exists("Xvfb").await {
            return Err(SurfaceError::CreateFailed(
                "Xvfb not found (install 'xvfb' package)".to_string(),
            ));
        }

        let display_ref = format!(":{}", self.next_display.fetch_add(1, Ordering::SeqCst));
        let child = Command::new("Xvfb")
            .args([&display_ref, "-screen", "0", "1920x1080x24", "-nolisten", "tcp"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SurfaceError::CreateFailed(e.to_string()))?;

        // Give the server a moment to take the display before anything
        // binds to it.
        sleep(Duration::from_millis(200)).await;

        info!("Created hidden surface '{}' on display {}", name, display_ref);
        self.servers.lock().await.insert(display_ref.clone(), child);
        Ok(display_ref)
    }

    async fn destroy_surface(&self, display_ref: &str) -> SurfaceResult<()> {
        let mut servers = self.servers.lock().await;
        if let Some(mut child) = servers.remove(display_ref) {
            if let Err(e) = child.start_kill() {
                warn!("Failed to kill display server {}: {}", display_ref, e);
            }
            let _ = child.wait().await;
            info!("Destroyed hidden surface on display {}", display_ref);
        }
        Ok(())
    }

    async fn spawn_process(
        &self,
        display_ref: &str,
        path: &str,
        args: &[String],
    ) -> SurfaceResult<u32> {
        debug!("Spawning '{}' on display {}", path, display_ref);
        let child = Command::new(path)
            .args(args)
            .env("DISPLAY", display_ref)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| SurfaceError::ProcessFailed(e.kind().to_string()))?;

        child
            .id()
            .ok_or_else(|| SurfaceError::ProcessFailed("no_pid".to_string()))
    }

    async fn spawn_script(
        &self,
        display_ref: &str,
        script_file: &Path,
        stdout_file: &Path,
        stderr_file: &Path,
    ) -> SurfaceResult<Child> {
        let stdout = std::fs::File::create(stdout_file)?;
        let stderr = std::fs::File::create(stderr_file)?;

        let mut cmd = Command::new("sh");
        cmd.arg(script_file)
            .env("DISPLAY", display_ref)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true);

        // New process group so a timeout kill reaps the whole script.
        #[cfg(unix)]
        {
            unsafe {
                cmd.pre_exec(|| {
                    libc::setsid();
                    Ok(())
                });
            }
        }

        cmd.spawn()
            .map_err(|e| SurfaceError::ProcessFailed(e.kind().to_string()))
    }
}
