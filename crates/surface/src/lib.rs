//! Workspace isolation layer.
//!
//! Owns hidden execution surfaces (virtual displays) so launched
//! processes never take window focus or move the pointer on the
//! session a human is using. Surfaces are expensive to create, so
//! they are reused across launches and torn down by an idle sweep,
//! not per call.

pub mod backend;
pub mod error;
pub mod manager;
pub mod workspace;

pub use backend::{HeadlessBackend, SurfaceBackend};
pub use error::{SurfaceError, SurfaceResult};
pub use manager::{LaunchOutcome, ScriptOutput, WorkspaceManager};
pub use workspace::{Platform, Workspace};
