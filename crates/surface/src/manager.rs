use crate::backend::SurfaceBackend;
use crate::error::{SurfaceError, SurfaceResult};
use crate::workspace::Workspace;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{sleep, Duration, Instant};
use tracing::{info, warn};

/// Exit code reported when a script is force-terminated on timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

const POLL_INTERVAL_MS: u64 = 50;
const CAPTURE_DIR_PREFIX: &str = "veildesk-cap-";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchOutcome {
    pub pid: u32,
    pub workspace_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub timed_out: bool,
}

/// Owns every hidden surface in the process. Creation is lazy, reuse
/// is the norm, destruction happens on the idle sweep or shutdown.
pub struct WorkspaceManager {
    backend: Arc<dyn SurfaceBackend>,
    workspaces: RwLock<HashMap<String, Workspace>>,
    name_prefix: String,
    idle_timeout: Duration,
}

impl WorkspaceManager {
    pub fn new(backend: Arc<dyn SurfaceBackend>) -> Self {
        Self {
            backend,
            workspaces: RwLock::new(HashMap::new()),
            name_prefix: "veil".to_string(),
            idle_timeout: Duration::from_secs(300),
        }
    }

    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    fn default_name(&self) -> String {
        format!("{}-main", self.name_prefix)
    }

    /// Create the surface for `name` if missing and return its display
    /// reference. The first surface created becomes the active one.
    pub async fn ensure_workspace(&self, name: &str) -> SurfaceResult<String> {
        {
            let mut workspaces = self.workspaces.write().await;
            if let Some(ws) = workspaces.get_mut(name) {
                ws.touch();
                return Ok(ws.display_ref.clone());
            }
        }

        let display_ref = self.backend.create_surface(name).await?;

        let mut workspaces = self.workspaces.write().await;
        let mut workspace = Workspace::new(name, &display_ref);
        workspace.is_active = !workspaces.values().any(|w| w.is_active);
        workspaces.insert(name.to_string(), workspace);
        Ok(display_ref)
    }

    /// Make `name` the workspace that receives launches without an
    /// explicit target. At most one workspace is active at a time.
    pub async fn activate(&self, name: &str) -> SurfaceResult<()> {
        let mut workspaces = self.workspaces.write().await;
        if !workspaces.contains_key(name) {
            return Err(SurfaceError::NotFound(name.to_string()));
        }
        for (ws_name, ws) in workspaces.iter_mut() {
            ws.is_active = ws_name == name;
        }
        Ok(())
    }

    async fn resolve_target(&self, workspace_name: Option<&str>) -> String {
        if let Some(name) = workspace_name {
            return name.to_string();
        }
        let workspaces = self.workspaces.read().await;
        workspaces
            .values()
            .find(|w| w.is_active)
            .map(|w| w.name.clone())
            .unwrap_or_else(|| self.default_name())
    }

    /// Start a process on a hidden surface so its window never appears
    /// on, or steals focus from, the interactive session.
    pub async fn launch_on_hidden_surface(
        &self,
        path: &str,
        args: &[String],
        workspace_name: Option<&str>,
        timeout: Duration,
    ) -> SurfaceResult<LaunchOutcome> {
        if path.trim().is_empty() {
            return Err(SurfaceError::InvalidArgument("path cannot be empty".to_string()));
        }

        let name = self.resolve_target(workspace_name).await;
        let launch = async {
            let display_ref = self.ensure_workspace(&name).await?;
            self.backend.spawn_process(&display_ref, path, args).await
        };

        let pid = tokio::time::timeout(timeout, launch)
            .await
            .map_err(|_| SurfaceError::ProcessFailed("timeout".to_string()))??;

        self.touch(&name).await;
        info!("Launched '{}' (pid {}) on hidden workspace '{}'", path, pid, name);
        Ok(LaunchOutcome {
            pid,
            workspace_name: name,
        })
    }

    /// Run a script against a surface, capturing stdout/stderr through
    /// temp files rather than pipes: pipe inheritance across the
    /// isolation boundary is unreliable. The capture directory is
    /// removed on every path, success or failure.
    pub async fn run_on_surface(
        &self,
        workspace_name: &str,
        script: &str,
        timeout: Duration,
    ) -> SurfaceResult<ScriptOutput> {
        let display_ref = self.ensure_workspace(workspace_name).await?;

        let capture_dir = tempfile::Builder::new()
            .prefix(CAPTURE_DIR_PREFIX)
            .tempdir()?;
        let script_file = capture_dir.path().join("script.sh");
        let stdout_file = capture_dir.path().join("stdout.txt");
        let stderr_file = capture_dir.path().join("stderr.txt");
        tokio::fs::write(&script_file, script).await?;

        let result = self
            .poll_script(&display_ref, &script_file, &stdout_file, &stderr_file, timeout)
            .await;

        // TempDir drop removes the capture directory whether the
        // script succeeded, failed, or timed out.
        drop(capture_dir);

        if result.is_ok() {
            self.touch(workspace_name).await;
        }
        result
    }

    async fn poll_script(
        &self,
        display_ref: &str,
        script_file: &std::path::Path,
        stdout_file: &std::path::Path,
        stderr_file: &std::path::Path,
        timeout: Duration,
    ) -> SurfaceResult<ScriptOutput> {
        let mut child = self
            .backend
            .spawn_script(display_ref, script_file, stdout_file, stderr_file)
            .await?;

        let deadline = Instant::now() + timeout;
        let (exit_code, timed_out) = loop {
            match child.try_wait() {
                Ok(Some(status)) => break (status.code().unwrap_or(-1), false),
                Ok(None) => {
                    if Instant::now() >= deadline {
                        warn!("Script timed out after {}ms, killing", timeout.as_millis());
                        let _ = child.start_kill();
                        let _ = child.wait().await;
                        break (TIMEOUT_EXIT_CODE, true);
                    }
                    sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
                }
                Err(e) => return Err(SurfaceError::Io(e)),
            }
        };

        let stdout = tokio::fs::read_to_string(stdout_file).await.unwrap_or_default();
        let stderr = tokio::fs::read_to_string(stderr_file).await.unwrap_or_default();

        Ok(ScriptOutput {
            stdout,
            stderr,
            exit_code,
            timed_out,
        })
    }

    async fn touch(&self, name: &str) {
        let mut workspaces = self.workspaces.write().await;
        if let Some(ws) = workspaces.get_mut(name) {
            ws.touch();
        }
    }

    pub async fn get_workspaces(&self) -> Vec<Workspace> {
        self.workspaces.read().await.values().cloned().collect()
    }

    /// Whether a previously launched pid is still alive.
    pub fn process_alive(&self, pid: u32) -> bool {
        let mut system = sysinfo::System::new();
        system.refresh_processes();
        system.process(sysinfo::Pid::from_u32(pid)).is_some()
    }

    /// Destroy surfaces idle past the configured threshold. The active
    /// flag does not exempt a workspace; only recent use does.
    pub async fn sweep_idle(&self) -> usize {
        let stale: Vec<(String, String)> = {
            let workspaces = self.workspaces.read().await;
            workspaces
                .values()
                .filter(|w| w.idle_for().num_milliseconds() as u128 > self.idle_timeout.as_millis())
                .map(|w| (w.name.clone(), w.display_ref.clone()))
                .collect()
        };

        let mut destroyed = 0;
        for (name, display_ref) in stale {
            if let Err(e) = self.backend.destroy_surface(&display_ref).await {
                warn!("Failed to destroy surface for '{}': {}", name, e);
                continue;
            }
            self.workspaces.write().await.remove(&name);
            info!("Swept idle workspace '{}'", name);
            destroyed += 1;
        }
        destroyed
    }

    /// Destroy every surface. Used at shutdown.
    pub async fn shutdown(&self) {
        let all: Vec<(String, String)> = {
            let workspaces = self.workspaces.read().await;
            workspaces
                .values()
                .map(|w| (w.name.clone(), w.display_ref.clone()))
                .collect()
        };
        for (name, display_ref) in all {
            if let Err(e) = self.backend.destroy_surface(&display_ref).await {
                warn!("Failed to destroy surface for '{}': {}", name, e);
            }
        }
        self.workspaces.write().await.clear();
    }
}
