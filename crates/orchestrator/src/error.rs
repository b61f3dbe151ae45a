use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Task {0} is in a terminal state")]
    Terminal(String),

    #[error("Task {0} is not waiting for input")]
    NotWaiting(String),

    #[error("Prompt not found: {0}")]
    PromptNotFound(String),

    #[error("Option '{1}' is not valid for prompt {0}")]
    InvalidOption(String, String),

    #[error("Prompt {0} already resolved")]
    AlreadyResolved(String),
}
