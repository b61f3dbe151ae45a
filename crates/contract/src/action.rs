use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Category of requested work. New adapter classes extend `Custom`
/// rather than this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Process,
    App,
    Powershell,
    Http,
    Web,
    Ui,
    Connector,
    Custom,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Process => "process",
            ActionKind::App => "app",
            ActionKind::Powershell => "powershell",
            ActionKind::Http => "http",
            ActionKind::Web => "web",
            ActionKind::Ui => "ui",
            ActionKind::Connector => "connector",
            ActionKind::Custom => "custom",
        }
    }
}

/// Payload per action kind. Known kinds get a typed shape so adapters
/// match exhaustively; `Ui` and `Custom` stay open maps because any
/// adapter may define its own fields there.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionPayload {
    Process {
        path: String,
        args: Vec<String>,
    },
    App {
        path: String,
        args: Vec<String>,
        workspace: Option<String>,
    },
    Powershell {
        script: String,
        timeout_ms: Option<u64>,
    },
    Http {
        url: String,
        method: String,
    },
    Web {
        url: String,
        op: String,
    },
    Ui(serde_json::Value),
    Connector {
        connector: String,
        op: String,
        params: serde_json::Value,
    },
    Custom(serde_json::Value),
}

impl ActionPayload {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionPayload::Process { .. } => ActionKind::Process,
            ActionPayload::App { .. } => ActionKind::App,
            ActionPayload::Powershell { .. } => ActionKind::Powershell,
            ActionPayload::Http { .. } => ActionKind::Http,
            ActionPayload::Web { .. } => ActionKind::Web,
            ActionPayload::Ui(_) => ActionKind::Ui,
            ActionPayload::Connector { .. } => ActionKind::Connector,
            ActionPayload::Custom(_) => ActionKind::Custom,
        }
    }

    /// Target URL for navigation-shaped payloads, if any.
    pub fn url(&self) -> Option<&str> {
        match self {
            ActionPayload::Http { url, .. } | ActionPayload::Web { url, .. } => Some(url),
            _ => None,
        }
    }
}

/// A typed, risk-scored unit of requested work.
///
/// Immutable once constructed; risk and tags are computed by the
/// caller, never inferred downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    name: String,
    payload: ActionPayload,
    risk_level: f32,
    tags: BTreeSet<String>,
}

impl Action {
    pub fn new(name: impl Into<String>, payload: ActionPayload) -> Self {
        Self {
            name: name.into(),
            payload,
            risk_level: 0.0,
            tags: BTreeSet::new(),
        }
    }

    pub fn with_risk(mut self, risk_level: f32) -> Self {
        self.risk_level = risk_level.clamp(0.0, 1.0);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ActionKind {
        self.payload.kind()
    }

    pub fn payload(&self) -> &ActionPayload {
        &self.payload
    }

    pub fn risk_level(&self) -> f32 {
        self.risk_level
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_is_clamped() {
        let action = Action::new(
            "launch",
            ActionPayload::App {
                path: "/usr/bin/foo".into(),
                args: vec![],
                workspace: None,
            },
        )
        .with_risk(3.5);
        assert_eq!(action.risk_level(), 1.0);
    }

    #[test]
    fn kind_follows_payload() {
        let action = Action::new(
            "fetch",
            ActionPayload::Http {
                url: "https://example.com".into(),
                method: "GET".into(),
            },
        );
        assert_eq!(action.kind(), ActionKind::Http);
        assert_eq!(action.payload().url(), Some("https://example.com"));
    }
}
