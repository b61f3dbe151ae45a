use crate::options::SandboxOptions;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use veildesk_contract::{codes, Action, ActionKind, ActionPayload, AdapterRegistry, ExecutionResult};

/// Policy-gated wrapper around adapter dispatch.
///
/// The allow-list is mutable process-lifetime state; persistence is
/// the caller's responsibility.
pub struct Sandbox {
    registry: Arc<AdapterRegistry>,
    app_allowlist: RwLock<HashSet<String>>,
}

impl Sandbox {
    pub fn new(registry: Arc<AdapterRegistry>) -> Self {
        Self {
            registry,
            app_allowlist: RwLock::new(HashSet::new()),
        }
    }

    pub async fn allow_path(&self, path: impl Into<String>) {
        self.app_allowlist.write().await.insert(path.into());
    }

    pub async fn revoke_path(&self, path: &str) {
        self.app_allowlist.write().await.remove(path);
    }

    pub async fn allowed_paths(&self) -> Vec<String> {
        self.app_allowlist.read().await.iter().cloned().collect()
    }

    /// Gate and (maybe) execute one action.
    ///
    /// Order matters: category flag, then app allow-list, then risk
    /// threshold, then simulate short-circuit, then real dispatch.
    /// Nothing below a failed check runs.
    pub async fn execute(&self, action: &Action, options: &SandboxOptions) -> ExecutionResult {
        if let Some(denied) = self.check_category(action, options) {
            warn!(
                "Sandbox rejected action '{}': {}",
                action.name(),
                denied.error_tag().unwrap_or("")
            );
            return denied;
        }

        let allow_listed = self.is_allow_listed(action).await;

        if action.kind() == ActionKind::App && !allow_listed {
            warn!("Sandbox rejected app action '{}': path not allow-listed", action.name());
            return ExecutionResult::failure(codes::APP_NOT_ALLOWED);
        }

        if action.risk_level() > options.risk_threshold && !allow_listed {
            warn!(
                "Sandbox rejected action '{}': risk {} above threshold {}",
                action.name(),
                action.risk_level(),
                options.risk_threshold
            );
            return ExecutionResult::failure(codes::BLOCKED_BY_SANDBOX_POLICY);
        }

        if options.simulate {
            info!("Simulated action '{}' ({})", action.name(), action.kind().as_str());
            return ExecutionResult::success(json!({
                "simulated": true,
                "action": action.name(),
                "kind": action.kind().as_str(),
            }));
        }

        info!("Dispatching action '{}' ({})", action.name(), action.kind().as_str());
        self.registry.dispatch(action).await
    }

    fn check_category(&self, action: &Action, options: &SandboxOptions) -> Option<ExecutionResult> {
        let allowed = match action.kind() {
            ActionKind::App => options.allow_app,
            ActionKind::Process => options.allow_process,
            ActionKind::Powershell => options.allow_powershell,
            ActionKind::Ui => options.allow_ui,
            // Network and connector actions are gated by the stealth
            // policy and approval flow upstream, not by category flags.
            ActionKind::Http | ActionKind::Web | ActionKind::Connector | ActionKind::Custom => true,
        };
        if allowed {
            None
        } else {
            Some(ExecutionResult::failure(codes::category_not_allowed(
                action.kind().as_str(),
            )))
        }
    }

    async fn is_allow_listed(&self, action: &Action) -> bool {
        let path = match action.payload() {
            ActionPayload::App { path, .. } | ActionPayload::Process { path, .. } => path,
            _ => return false,
        };
        self.app_allowlist.read().await.contains(path)
    }
}
