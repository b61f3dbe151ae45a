//! Error tags surfaced across the adapter contract boundary.
//!
//! Callers match on these strings, so they are part of the public
//! contract and must stay stable.

pub const NO_ADAPTER: &str = "no_adapter";
pub const APP_NOT_ALLOWED: &str = "app_not_allowed";
pub const BLOCKED_BY_SANDBOX_POLICY: &str = "blocked_by_sandbox_policy";
pub const CAPTCHA_DETECTED: &str = "captcha_detected";
pub const RATE_LIMITED: &str = "rate_limited";
pub const HOST_BLACKLISTED: &str = "host_blacklisted";
pub const DEFERRED_DUE_TO_USER_ACTIVITY: &str = "deferred_due_to_user_activity";
pub const VLM_NO_MATCH: &str = "vlm_no_match";
pub const CONTROL_NOT_FOUND: &str = "control_not_found";
pub const DESKTOP_CREATE_OR_OPEN_FAILED: &str = "desktop_create_or_open_failed";
pub const NEEDS_USER_INPUT: &str = "needs_user_input";
pub const APPROVAL_DENIED: &str = "approval_denied";

/// `<category>_not_allowed` tag for a sandbox category rejection.
pub fn category_not_allowed(category: &str) -> String {
    format!("{category}_not_allowed")
}

/// `create_process_failed:<code>` tag for a failed launch.
pub fn create_process_failed(code: &str) -> String {
    format!("create_process_failed:{code}")
}
