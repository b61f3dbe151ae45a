pub mod action;
pub mod codes;
pub mod registry;
pub mod result;

pub use action::{Action, ActionKind, ActionPayload};
pub use registry::{Adapter, AdapterRegistry};
pub use result::ExecutionResult;
