use crate::activity::{wait_for_quiet, InputActivityMonitor};
use crate::approval::{ApprovalBroker, PromptSpec};
use crate::classify::is_high_impact;
use crate::error::TaskError;
use crate::task::{Task, TaskStatus};
use futures::future::join_all;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Duration;
use tracing::{info, warn};
use veildesk_contract::{codes, Action, ActionKind, ActionPayload, ExecutionResult};
use veildesk_sandbox::{Sandbox, SandboxOptions};
use veildesk_stealth::StealthPolicy;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_concurrency: usize,
    pub approval_timeout: Duration,
    pub quiet_timeout: Duration,
    pub default_max_retries: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            approval_timeout: Duration::from_secs(120),
            quiet_timeout: Duration::from_secs(10),
            default_max_retries: 3,
        }
    }
}

enum StepVerdict {
    Done(ExecutionResult),
    Paused(ExecutionResult),
    Errored(String),
}

/// Sequences multi-step tasks through the sandbox with retry,
/// approval gating, and cooperative pause/resume.
///
/// The queue pop and the state helpers here are the only mutation
/// points for task records; a task is held by at most one processing
/// iteration at a time.
pub struct TaskOrchestrator {
    sandbox: Arc<Sandbox>,
    sandbox_options: SandboxOptions,
    stealth: Arc<StealthPolicy>,
    approvals: Arc<ApprovalBroker>,
    activity: Option<Arc<dyn InputActivityMonitor>>,
    config: OrchestratorConfig,
    tasks: RwLock<HashMap<String, Task>>,
    queue: Mutex<VecDeque<String>>,
    /// Serializes pointer-moving work per workspace: two tasks must
    /// never jitter the same surface at once.
    workspace_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    paused: AtomicBool,
    killed: AtomicBool,
}

impl TaskOrchestrator {
    pub fn new(
        sandbox: Arc<Sandbox>,
        sandbox_options: SandboxOptions,
        stealth: Arc<StealthPolicy>,
        approvals: Arc<ApprovalBroker>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            sandbox,
            sandbox_options,
            stealth,
            approvals,
            activity: None,
            config,
            tasks: RwLock::new(HashMap::new()),
            queue: Mutex::new(VecDeque::new()),
            workspace_locks: Mutex::new(HashMap::new()),
            paused: AtomicBool::new(false),
            killed: AtomicBool::new(false),
        }
    }

    pub fn with_activity_monitor(mut self, monitor: Arc<dyn InputActivityMonitor>) -> Self {
        self.activity = Some(monitor);
        self
    }

    /// Global pause: running tasks freeze before their next step.
    pub fn pause_all(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume_all(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Kill switch: tasks cancel before their next step. In-flight
    /// native calls finish on their own timeouts.
    pub fn kill_all(&self) {
        self.killed.store(true, Ordering::SeqCst);
    }

    pub async fn submit(&self, name: impl Into<String>, actions: Vec<Action>) -> String {
        let task = Task::new(name, actions, self.config.default_max_retries);
        let id = task.id.clone();
        self.tasks.write().await.insert(id.clone(), task);
        self.queue.lock().await.push_back(id.clone());
        info!("Submitted task {}", id);
        id
    }

    pub async fn get_task(&self, id: &str) -> Result<Task, TaskError> {
        self.tasks
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| TaskError::NotFound(id.to_string()))
    }

    pub async fn list_tasks(&self) -> Vec<Task> {
        self.tasks.read().await.values().cloned().collect()
    }

    /// Re-queue a task frozen in `WaitingForUser`, binding the
    /// supplied value as the paused step's result. The paused step is
    /// not re-run; execution continues at the next index.
    pub async fn resume(&self, id: &str, value: serde_json::Value) -> Result<(), TaskError> {
        {
            let mut tasks = self.tasks.write().await;
            let task = tasks
                .get_mut(id)
                .ok_or_else(|| TaskError::NotFound(id.to_string()))?;
            if task.status.is_terminal() {
                return Err(TaskError::Terminal(id.to_string()));
            }
            if task.status != TaskStatus::WaitingForUser {
                return Err(TaskError::NotWaiting(id.to_string()));
            }
            let index = task
                .interaction_step_index
                .ok_or_else(|| TaskError::NotWaiting(id.to_string()))?;
            task.step_results[index] = Some(value);
            task.cursor = index + 1;
            task.interaction_step_index = None;
            task.waiting_for_prompt_id = None;
            task.status = TaskStatus::Pending;
            task.touch();
        }
        self.queue.lock().await.push_back(id.to_string());
        Ok(())
    }

    /// Re-queue a task frozen by the global pause switch.
    pub async fn resume_paused(&self, id: &str) -> Result<(), TaskError> {
        {
            let mut tasks = self.tasks.write().await;
            let task = tasks
                .get_mut(id)
                .ok_or_else(|| TaskError::NotFound(id.to_string()))?;
            if task.status != TaskStatus::PausedForInteraction {
                return Err(TaskError::NotWaiting(id.to_string()));
            }
            task.status = TaskStatus::Pending;
            task.interaction_step_index = None;
            task.touch();
        }
        self.queue.lock().await.push_back(id.to_string());
        Ok(())
    }

    /// Cooperative cancel: the task goes terminal now, but an
    /// in-flight native call is not forcibly interrupted.
    pub async fn cancel(&self, id: &str) -> Result<(), TaskError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| TaskError::NotFound(id.to_string()))?;
        if task.status.is_terminal() {
            return Err(TaskError::Terminal(id.to_string()));
        }
        task.status = TaskStatus::Cancelled;
        task.touch();
        self.queue.lock().await.retain(|queued| queued != id);
        info!("Cancelled task {}", id);
        Ok(())
    }

    /// Drain the queue until no task is queued, running each batch of
    /// at most `max_concurrency` tasks concurrently. Tasks that pause
    /// or exhaust retries leave the queue; retrying tasks re-enter it.
    pub async fn run_until_idle(&self) {
        loop {
            let batch: Vec<String> = {
                let mut queue = self.queue.lock().await;
                let n = queue.len().min(self.config.max_concurrency);
                queue.drain(..n).collect()
            };
            if batch.is_empty() {
                break;
            }

            join_all(batch.into_iter().map(|id| self.process_task(id))).await;
        }
    }

    async fn process_task(&self, id: String) {
        {
            let mut tasks = self.tasks.write().await;
            let Some(task) = tasks.get_mut(&id) else {
                return;
            };
            if task.status != TaskStatus::Pending {
                return;
            }
            task.status = TaskStatus::Running;
            task.touch();
        }

        let (actions, start) = {
            let tasks = self.tasks.read().await;
            let task = &tasks[&id];
            (task.actions.clone(), task.cursor)
        };

        for index in start..actions.len() {
            if self.killed.load(Ordering::SeqCst) {
                self.finish(&id, TaskStatus::Cancelled, Some("kill_switch".to_string()))
                    .await;
                return;
            }
            if self.paused.load(Ordering::SeqCst) {
                self.freeze(&id, index, TaskStatus::PausedForInteraction).await;
                return;
            }
            // A cancel that landed while the previous step was in
            // flight must stick: stop once the task is no longer Running.
            let running = self
                .tasks
                .read()
                .await
                .get(&id)
                .map(|task| task.status == TaskStatus::Running)
                .unwrap_or(false);
            if !running {
                return;
            }

            let action = &actions[index];
            match self.run_step(&id, index, action).await {
                StepVerdict::Done(result) => {
                    let mut tasks = self.tasks.write().await;
                    if let Some(task) = tasks.get_mut(&id) {
                        if task.status.is_terminal() {
                            return;
                        }
                        task.step_results[index] = result.result;
                        task.cursor = index + 1;
                        task.update_progress();
                        task.touch();
                    }
                }
                StepVerdict::Paused(result) => {
                    let prompt = result
                        .result
                        .as_ref()
                        .and_then(|v| v.get("prompt"))
                        .and_then(|p| p.as_str())
                        .map(|p| p.to_string());
                    let mut tasks = self.tasks.write().await;
                    if let Some(task) = tasks.get_mut(&id) {
                        if task.status.is_terminal() {
                            return;
                        }
                        task.status = TaskStatus::WaitingForUser;
                        task.interaction_step_index = Some(index);
                        task.waiting_for_prompt_id = prompt;
                        task.touch();
                    }
                    info!("Task {} waiting for user at step {}", id, index);
                    return;
                }
                StepVerdict::Errored(error) => {
                    self.handle_step_error(&id, index, error).await;
                    return;
                }
            }
        }

        self.finish(&id, TaskStatus::Completed, None).await;
    }

    async fn run_step(&self, task_id: &str, index: usize, action: &Action) -> StepVerdict {
        // OS/UI steps wait for a quiet input window and serialize on
        // their workspace so two tasks never move one pointer at once.
        let _workspace_guard = if touches_surface(action) {
            let cleared = wait_for_quiet(self.activity.as_ref(), self.config.quiet_timeout).await;
            if !cleared {
                info!(
                    "Task {} step {}: {}, proceeding after bound",
                    task_id,
                    index,
                    codes::DEFERRED_DUE_TO_USER_ACTIVITY
                );
            }
            Some(self.lock_workspace(workspace_of(action)).await)
        } else {
            None
        };

        if let Some(url) = action.payload().url() {
            if let Some(host) = veildesk_stealth::retry::host_of(url) {
                if self.stealth.is_blacklisted(host) {
                    warn!("Task {} step {}: host {} is blacklisted", task_id, index, host);
                    return StepVerdict::Errored(codes::HOST_BLACKLISTED.to_string());
                }
            }
        }

        if is_high_impact(action) {
            let spec = PromptSpec::approve_or_deny(
                format!("Approve step: {}", action.name()),
                format!(
                    "Task {task_id} step {index} was classified high-impact (kind {})",
                    action.kind().as_str()
                ),
            );
            let decision = self.approvals.request(spec, self.config.approval_timeout).await;
            if !decision.is_approved() {
                warn!("Task {} step {} denied approval", task_id, index);
                return StepVerdict::Errored(codes::APPROVAL_DENIED.to_string());
            }
        }

        let result = self.sandbox.execute(action, &self.sandbox_options).await;
        if result.ok {
            StepVerdict::Done(result)
        } else if result.is_pause_request() {
            StepVerdict::Paused(result)
        } else {
            self.note_detection_signals(action, &result);
            StepVerdict::Errored(
                result
                    .error
                    .unwrap_or_else(|| "step_failed".to_string()),
            )
        }
    }

    /// Detection signals are more than step errors: they feed the
    /// per-host ledger so later navigation avoids the host, whatever
    /// becomes of the current step.
    fn note_detection_signals(&self, action: &Action, result: &ExecutionResult) {
        let Some(host) = action
            .payload()
            .url()
            .and_then(veildesk_stealth::retry::host_of)
        else {
            return;
        };
        match result.error_tag() {
            Some(codes::CAPTCHA_DETECTED) => self.stealth.record_captcha(host),
            Some(codes::RATE_LIMITED) => self.stealth.record_rate_limit(host),
            _ => {}
        }
    }

    async fn handle_step_error(&self, id: &str, index: usize, error: String) {
        let retry = {
            let mut tasks = self.tasks.write().await;
            let Some(task) = tasks.get_mut(id) else {
                return;
            };
            if task.status.is_terminal() {
                return;
            }
            task.cursor = index;
            task.error = Some(error.clone());
            if error == codes::APPROVAL_DENIED {
                // Denial is a policy decision; retrying cannot change it.
                task.status = TaskStatus::Failed;
                task.touch();
                false
            } else if task.retry_count < task.max_retries {
                task.retry_count += 1;
                task.status = TaskStatus::Pending;
                task.touch();
                true
            } else {
                task.status = TaskStatus::Failed;
                task.touch();
                false
            }
        };

        if retry {
            info!("Task {} step {} errored ({}), re-queued", id, index, error);
            self.queue.lock().await.push_back(id.to_string());
        } else {
            warn!("Task {} failed at step {}: {}", id, index, error);
        }
    }

    async fn freeze(&self, id: &str, index: usize, status: TaskStatus) {
        let mut tasks = self.tasks.write().await;
        if let Some(task) = tasks.get_mut(id) {
            if task.status.is_terminal() {
                return;
            }
            task.status = status;
            task.interaction_step_index = Some(index);
            task.cursor = index;
            task.touch();
        }
    }

    // Terminal states are final: a task that went Cancelled (or
    // otherwise terminal) under a running step is never rewritten.
    async fn finish(&self, id: &str, status: TaskStatus, error: Option<String>) {
        let mut tasks = self.tasks.write().await;
        if let Some(task) = tasks.get_mut(id) {
            if task.status.is_terminal() {
                return;
            }
            task.status = status;
            if status == TaskStatus::Completed {
                task.progress = 1.0;
            }
            if error.is_some() {
                task.error = error;
            }
            task.touch();
        }
    }

    async fn lock_workspace(&self, name: String) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.workspace_locks.lock().await;
            locks
                .entry(name)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

fn touches_surface(action: &Action) -> bool {
    matches!(
        action.kind(),
        ActionKind::Ui | ActionKind::App | ActionKind::Process | ActionKind::Powershell
    )
}

fn workspace_of(action: &Action) -> String {
    match action.payload() {
        ActionPayload::App {
            workspace: Some(ws),
            ..
        } => ws.clone(),
        ActionPayload::Ui(map) => map
            .get("workspace")
            .and_then(|w| w.as_str())
            .unwrap_or("default")
            .to_string(),
        _ => "default".to_string(),
    }
}
