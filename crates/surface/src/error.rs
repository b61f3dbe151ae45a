use thiserror::Error;
use veildesk_contract::codes;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("Surface creation failed: {0}")]
    CreateFailed(String),

    #[error("Process launch failed with code {0}")]
    ProcessFailed(String),

    #[error("Workspace not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SurfaceError {
    /// Stable string tag for the contract boundary.
    pub fn tag(&self) -> String {
        match self {
            SurfaceError::CreateFailed(_) => codes::DESKTOP_CREATE_OR_OPEN_FAILED.to_string(),
            SurfaceError::ProcessFailed(code) => codes::create_process_failed(code),
            SurfaceError::NotFound(name) => format!("workspace_not_found:{name}"),
            SurfaceError::InvalidArgument(msg) => format!("invalid_argument:{msg}"),
            SurfaceError::Io(e) => codes::create_process_failed(&e.kind().to_string()),
        }
    }
}

pub type SurfaceResult<T> = Result<T, SurfaceError>;
