use crate::codes;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Outcome of one adapter execution. Adapters never return `Err`
/// across the contract boundary; every failure lands here as a tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub ok: bool,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn success(result: serde_json::Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(error.into()),
        }
    }

    /// A pause request: the step needs a human-supplied value before
    /// it can complete. The orchestrator recognizes this tag and
    /// freezes the task instead of counting a failure.
    pub fn needs_input(prompt: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: Some(json!({ "prompt": prompt.into() })),
            error: Some(codes::NEEDS_USER_INPUT.to_string()),
        }
    }

    pub fn is_pause_request(&self) -> bool {
        self.error.as_deref() == Some(codes::NEEDS_USER_INPUT)
    }

    pub fn error_tag(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
