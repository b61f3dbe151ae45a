use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use veildesk_contract::Action;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    /// Frozen by the global pause switch; resumable without input.
    PausedForInteraction,
    /// A step asked for a human-supplied value.
    WaitingForUser,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    pub fn is_resumable(&self) -> bool {
        matches!(
            self,
            TaskStatus::PausedForInteraction | TaskStatus::WaitingForUser
        )
    }
}

/// One multi-step task. Mutated only by the orchestrator's processing
/// loop; callers see clones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub actions: Vec<Action>,
    pub status: TaskStatus,
    pub progress: f32,
    pub retry_count: u32,
    pub max_retries: u32,
    /// Index of the step a pause froze on, if any.
    pub interaction_step_index: Option<usize>,
    pub waiting_for_prompt_id: Option<String>,
    /// Next step to execute; survives retries and resumes.
    pub cursor: usize,
    pub step_results: Vec<Option<serde_json::Value>>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(name: impl Into<String>, actions: Vec<Action>, max_retries: u32) -> Self {
        let now = Utc::now();
        let steps = actions.len();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            actions,
            status: TaskStatus::Pending,
            progress: 0.0,
            retry_count: 0,
            max_retries,
            interaction_step_index: None,
            waiting_for_prompt_id: None,
            cursor: 0,
            step_results: vec![None; steps],
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn update_progress(&mut self) {
        let total = self.actions.len().max(1);
        self.progress = self.cursor as f32 / total as f32;
    }
}
