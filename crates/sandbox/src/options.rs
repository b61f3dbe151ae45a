use serde::{Deserialize, Serialize};

/// Per-call execution policy. Fail closed: every category flag
/// defaults to off and `simulate` to on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxOptions {
    pub simulate: bool,
    pub allow_app: bool,
    pub allow_process: bool,
    pub allow_powershell: bool,
    pub allow_ui: bool,
    pub risk_threshold: f32,
}

impl Default for SandboxOptions {
    fn default() -> Self {
        Self {
            simulate: true,
            allow_app: false,
            allow_process: false,
            allow_powershell: false,
            allow_ui: false,
            risk_threshold: 0.7,
        }
    }
}

impl SandboxOptions {
    /// Real-mode options with every category enabled. For callers that
    /// gate upstream (e.g. the orchestrator's approval flow).
    pub fn permissive() -> Self {
        Self {
            simulate: false,
            allow_app: true,
            allow_process: true,
            allow_powershell: true,
            allow_ui: true,
            risk_threshold: 0.7,
        }
    }

    pub fn with_simulate(mut self, simulate: bool) -> Self {
        self.simulate = simulate;
        self
    }

    pub fn with_risk_threshold(mut self, threshold: f32) -> Self {
        self.risk_threshold = threshold.clamp(0.0, 1.0);
        self
    }
}
