//! Task orchestrator.
//!
//! Owns a bounded-concurrency queue of multi-step tasks. Every step
//! goes through the sandbox; steps that need a human pause the task
//! and resumption re-injects the supplied value instead of re-running
//! the step. High-impact steps block on an approval prompt first.

pub mod activity;
pub mod approval;
pub mod classify;
pub mod error;
pub mod orchestrator;
pub mod task;

pub use activity::InputActivityMonitor;
pub use approval::{ApprovalBroker, ApprovalDecision, ApprovalPrompt, PromptSpec};
pub use classify::is_high_impact;
pub use error::TaskError;
pub use orchestrator::{OrchestratorConfig, TaskOrchestrator};
pub use task::{Task, TaskStatus};
