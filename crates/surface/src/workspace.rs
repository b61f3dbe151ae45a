use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Windows,
    Linux,
    Macos,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::Macos
        } else {
            Platform::Linux
        }
    }
}

/// One isolated execution surface. Owned exclusively by the
/// `WorkspaceManager`; callers only see snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub name: String,
    pub platform: Platform,
    pub is_active: bool,
    /// Backend display reference (e.g. an X display like ":91").
    pub display_ref: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

impl Workspace {
    pub fn new(name: impl Into<String>, display_ref: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            platform: Platform::current(),
            is_active: false,
            display_ref: display_ref.into(),
            created_at: now,
            last_used_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_used_at = Utc::now();
    }

    pub fn idle_for(&self) -> chrono::Duration {
        Utc::now() - self.last_used_at
    }
}
