use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryScope {
    Domain,
    Endpoint,
    Selector,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub backoff_ms: u64,
    /// Fractional jitter applied to each backoff delay, 0.0..=1.0.
    pub jitter: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 1_000,
            jitter: 0.2,
        }
    }
}

impl RetrySettings {
    /// Exponential backoff for a zero-based attempt number, with
    /// jitter applied symmetrically.
    pub fn backoff_delay(&self, attempt: u32) -> std::time::Duration {
        let base = self.backoff_ms.saturating_mul(1u64 << attempt.min(16));
        let jitter = rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        let ms = (base as f64 * (1.0 + jitter)).max(0.0) as u64;
        std::time::Duration::from_millis(ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryRule {
    pub scope: RetryScope,
    /// Domain: hostname. Endpoint: URL prefix. Selector: substring of
    /// a UI selector.
    pub pattern: String,
    pub retry: RetrySettings,
    pub added_at: DateTime<Utc>,
    pub ttl: Option<Duration>,
}

impl RetryRule {
    pub fn new(scope: RetryScope, pattern: impl Into<String>, retry: RetrySettings) -> Self {
        Self {
            scope,
            pattern: pattern.into(),
            retry,
            added_at: Utc::now(),
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn is_expired(&self) -> bool {
        match self.ttl {
            Some(ttl) => Utc::now() > self.added_at + ttl,
            None => false,
        }
    }

    fn matches_url(&self, url: &str) -> bool {
        match self.scope {
            RetryScope::Endpoint => url.starts_with(&self.pattern),
            RetryScope::Domain => host_of(url).is_some_and(|h| h == self.pattern),
            RetryScope::Selector => false,
        }
    }
}

/// Extract the host component from a URL without a full parser.
/// Scheme, userinfo, port, path, query, and fragment are stripped.
pub fn host_of(url: &str) -> Option<&str> {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    let host = rest.split(['/', '?', '#']).next()?;
    let host = host.split('@').next_back()?;
    let host = host.split(':').next()?;
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

/// Ordered rule set consumed by callers performing network actions.
/// Endpoint rules take precedence over domain rules for the same URL.
pub struct RetryPolicy {
    rules: std::sync::RwLock<Vec<RetryRule>>,
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self {
            rules: std::sync::RwLock::new(Vec::new()),
        }
    }

    pub fn add_rule(&self, rule: RetryRule) {
        self.rules
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(rule);
    }

    pub fn find_for_url(&self, url: &str) -> Option<RetryRule> {
        let rules = self.rules.read().unwrap_or_else(|e| e.into_inner());
        let live = |r: &&RetryRule| !r.is_expired() && r.matches_url(url);

        rules
            .iter()
            .filter(|r| r.scope == RetryScope::Endpoint)
            .find(live)
            .or_else(|| {
                rules
                    .iter()
                    .filter(|r| r.scope == RetryScope::Domain)
                    .find(live)
            })
            .cloned()
    }

    pub fn find_for_selector(&self, selector: &str) -> Option<RetryRule> {
        let rules = self.rules.read().unwrap_or_else(|e| e.into_inner());
        rules
            .iter()
            .find(|r| {
                r.scope == RetryScope::Selector
                    && !r.is_expired()
                    && selector.contains(&r.pattern)
            })
            .cloned()
    }

    /// Drop expired rules; returns how many were removed.
    pub fn prune(&self) -> usize {
        let mut rules = self.rules.write().unwrap_or_else(|e| e.into_inner());
        let before = rules.len();
        rules.retain(|r| !r.is_expired());
        before - rules.len()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}
