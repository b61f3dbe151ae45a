//! Anti-detection subsystem: humanized pointer/typing timing, per-host
//! hostile-signal tracking, and scoped retry rules for network actions.

pub mod jitter;
pub mod policy;
pub mod retry;

pub use jitter::{JitterConfig, PathStep, pointer_path, typing_delays};
pub use policy::{HostState, StealthPolicy};
pub use retry::{host_of, RetryPolicy, RetryRule, RetryScope, RetrySettings};
