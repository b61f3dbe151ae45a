use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{info, warn};

/// Observed hostile signals for one remote host. Created lazily the
/// first time a signal is recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostState {
    pub host: String,
    pub captcha_count: u32,
    pub last_429_at: Option<DateTime<Utc>>,
    pub blocked_until: Option<DateTime<Utc>>,
}

impl HostState {
    fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            captcha_count: 0,
            last_429_at: None,
            blocked_until: None,
        }
    }

    /// Extend-only: a new window never shortens an existing block.
    fn extend_block(&mut self, until: DateTime<Utc>) {
        self.blocked_until = Some(match self.blocked_until {
            Some(existing) if existing > until => existing,
            _ => until,
        });
    }
}

/// Per-host cooldown ledger. `is_blacklisted` is the single gate
/// consulted before any new navigation to a host.
pub struct StealthPolicy {
    hosts: RwLock<HashMap<String, HostState>>,
    captcha_base: Duration,
    rate_limit_cooldown: Duration,
}

impl StealthPolicy {
    pub fn new() -> Self {
        Self {
            hosts: RwLock::new(HashMap::new()),
            captcha_base: Duration::minutes(10),
            rate_limit_cooldown: Duration::minutes(5),
        }
    }

    pub fn with_captcha_base(mut self, base: Duration) -> Self {
        self.captcha_base = base;
        self
    }

    pub fn with_rate_limit_cooldown(mut self, cooldown: Duration) -> Self {
        self.rate_limit_cooldown = cooldown;
        self
    }

    /// A challenge page was served. Escalates exponentially, capped at
    /// eight times the base window.
    pub fn record_captcha(&self, host: &str) {
        let mut hosts = self.hosts.write().unwrap_or_else(|e| e.into_inner());
        let state = hosts
            .entry(host.to_string())
            .or_insert_with(|| HostState::new(host));
        state.captcha_count += 1;
        let multiplier = state.captcha_count.min(8) as i32;
        state.extend_block(Utc::now() + self.captcha_base * multiplier);
        warn!(
            "Captcha #{} from {}, blocked until {:?}",
            state.captcha_count, host, state.blocked_until
        );
    }

    /// An HTTP 429 was served. Flat cooldown, extend-only.
    pub fn record_rate_limit(&self, host: &str) {
        let mut hosts = self.hosts.write().unwrap_or_else(|e| e.into_inner());
        let state = hosts
            .entry(host.to_string())
            .or_insert_with(|| HostState::new(host));
        state.last_429_at = Some(Utc::now());
        state.extend_block(Utc::now() + self.rate_limit_cooldown);
        info!("Rate limited by {}, blocked until {:?}", host, state.blocked_until);
    }

    pub fn is_blacklisted(&self, host: &str) -> bool {
        let hosts = self.hosts.read().unwrap_or_else(|e| e.into_inner());
        match hosts.get(host).and_then(|s| s.blocked_until) {
            Some(until) => Utc::now() <= until,
            None => false,
        }
    }

    pub fn host_state(&self, host: &str) -> Option<HostState> {
        let hosts = self.hosts.read().unwrap_or_else(|e| e.into_inner());
        hosts.get(host).cloned()
    }

    /// Drop block state for a host (operator override).
    pub fn clear(&self, host: &str) {
        let mut hosts = self.hosts.write().unwrap_or_else(|e| e.into_inner());
        hosts.remove(host);
    }
}

impl Default for StealthPolicy {
    fn default() -> Self {
        Self::new()
    }
}
