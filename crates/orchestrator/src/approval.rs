use crate::error::TaskError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptSpec {
    pub level: u8,
    pub title: String,
    pub rationale: String,
    pub options: Vec<String>,
}

impl PromptSpec {
    pub fn approve_or_deny(title: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self {
            level: 1,
            title: title.into(),
            rationale: rationale.into(),
            options: vec!["approve".to_string(), "deny".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalPrompt {
    pub id: String,
    pub level: u8,
    pub title: String,
    pub rationale: String,
    pub options: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approved(String),
    /// Explicit denial, expiry, and an unreachable decision surface
    /// all land here: the policy is default-deny, uniformly.
    Denied(String),
}

impl ApprovalDecision {
    pub fn is_approved(&self) -> bool {
        matches!(self, ApprovalDecision::Approved(_))
    }
}

struct PendingPrompt {
    prompt: ApprovalPrompt,
    tx: oneshot::Sender<String>,
}

/// Bridge to the external decision surface. The orchestrator only
/// awaits the existence of a resolution; UI mechanics live elsewhere.
/// Each prompt is resolved exactly once.
pub struct ApprovalBroker {
    pending: Mutex<HashMap<String, PendingPrompt>>,
}

impl ApprovalBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            pending: Mutex::new(HashMap::new()),
        })
    }

    /// Register a prompt and hand back the receiver its resolution
    /// will arrive on.
    pub async fn create_prompt(&self, spec: PromptSpec) -> (ApprovalPrompt, oneshot::Receiver<String>) {
        let prompt = ApprovalPrompt {
            id: uuid::Uuid::new_v4().to_string(),
            level: spec.level,
            title: spec.title,
            rationale: spec.rationale,
            options: spec.options,
            created_at: Utc::now(),
        };
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(
            prompt.id.clone(),
            PendingPrompt {
                prompt: prompt.clone(),
                tx,
            },
        );
        info!("Created approval prompt '{}' ({})", prompt.title, prompt.id);
        (prompt, rx)
    }

    /// Resolve a prompt with one of its options. Called by the
    /// external decision surface.
    pub async fn resolve(&self, prompt_id: &str, option: &str) -> Result<(), TaskError> {
        let mut pending = self.pending.lock().await;
        let entry = pending
            .get(prompt_id)
            .ok_or_else(|| TaskError::PromptNotFound(prompt_id.to_string()))?;

        if !entry.options_contains(option) {
            return Err(TaskError::InvalidOption(
                prompt_id.to_string(),
                option.to_string(),
            ));
        }

        let entry = pending
            .remove(prompt_id)
            .ok_or_else(|| TaskError::PromptNotFound(prompt_id.to_string()))?;
        entry
            .tx
            .send(option.to_string())
            .map_err(|_| TaskError::AlreadyResolved(prompt_id.to_string()))?;
        info!("Prompt {} resolved with '{}'", prompt_id, option);
        Ok(())
    }

    pub async fn list_pending(&self) -> Vec<ApprovalPrompt> {
        self.pending
            .lock()
            .await
            .values()
            .map(|p| p.prompt.clone())
            .collect()
    }

    /// Create a prompt and wait for its decision, default-denying on
    /// timeout. Exactly one waiting step is unblocked per prompt.
    pub async fn request(&self, spec: PromptSpec, timeout: Duration) -> ApprovalDecision {
        let (prompt, rx) = self.create_prompt(spec).await;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(option)) if option != "deny" => ApprovalDecision::Approved(option),
            Ok(Ok(option)) => ApprovalDecision::Denied(option),
            Ok(Err(_)) => ApprovalDecision::Denied("broker_dropped".to_string()),
            Err(_) => {
                warn!("Prompt {} expired, default-denying", prompt.id);
                self.pending.lock().await.remove(&prompt.id);
                ApprovalDecision::Denied("approval_timeout".to_string())
            }
        }
    }
}

impl PendingPrompt {
    fn options_contains(&self, option: &str) -> bool {
        self.prompt.options.iter().any(|o| o == option)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_unblocks_waiting_request() {
        let broker = ApprovalBroker::new();
        let waiter = {
            let broker = broker.clone();
            tokio::spawn(async move {
                broker
                    .request(
                        PromptSpec::approve_or_deny("Send payment", "step is high impact"),
                        Duration::from_secs(5),
                    )
                    .await
            })
        };

        // Let the prompt register, then resolve it.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let pending = broker.list_pending().await;
        assert_eq!(pending.len(), 1);
        broker.resolve(&pending[0].id, "approve").await.unwrap();

        let decision = waiter.await.unwrap();
        assert_eq!(decision, ApprovalDecision::Approved("approve".to_string()));
        assert!(broker.list_pending().await.is_empty());
    }

    #[tokio::test]
    async fn timeout_is_a_denial() {
        let broker = ApprovalBroker::new();
        let decision = broker
            .request(
                PromptSpec::approve_or_deny("t", "r"),
                Duration::from_millis(30),
            )
            .await;
        assert!(!decision.is_approved());
        assert!(broker.list_pending().await.is_empty());
    }

    #[tokio::test]
    async fn invalid_option_is_rejected_and_prompt_survives() {
        let broker = ApprovalBroker::new();
        let (prompt, _rx) = broker
            .create_prompt(PromptSpec::approve_or_deny("t", "r"))
            .await;

        let err = broker.resolve(&prompt.id, "maybe").await.unwrap_err();
        assert!(matches!(err, TaskError::InvalidOption(_, _)));
        assert_eq!(broker.list_pending().await.len(), 1);
    }

    #[tokio::test]
    async fn prompts_resolve_exactly_once() {
        let broker = ApprovalBroker::new();
        let (prompt, _rx) = broker
            .create_prompt(PromptSpec::approve_or_deny("t", "r"))
            .await;

        broker.resolve(&prompt.id, "deny").await.unwrap();
        let err = broker.resolve(&prompt.id, "deny").await.unwrap_err();
        assert!(matches!(err, TaskError::PromptNotFound(_)));
    }
}
