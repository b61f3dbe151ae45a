use thiserror::Error;
use veildesk_contract::codes;

#[derive(Debug, Error)]
pub enum UiError {
    #[error("Window not found: {0}")]
    WindowNotFound(String),

    #[error("Control not found: {0}")]
    ControlNotFound(String),

    #[error("No visual match for: {0}")]
    VlmNoMatch(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Backend operation failed: {0}")]
    OperationFailed(String),

    #[error("Inference transport failed: {0}")]
    InferenceTransport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UiError {
    pub fn tag(&self) -> String {
        match self {
            UiError::WindowNotFound(_) | UiError::ControlNotFound(_) => {
                codes::CONTROL_NOT_FOUND.to_string()
            }
            UiError::VlmNoMatch(_) => codes::VLM_NO_MATCH.to_string(),
            UiError::InvalidArgument(msg) => format!("invalid_argument:{msg}"),
            UiError::OperationFailed(_) | UiError::Io(_) => "ui_operation_failed".to_string(),
            UiError::InferenceTransport(_) => "vlm_transport_failed".to_string(),
        }
    }
}

pub type UiResult<T> = Result<T, UiError>;
