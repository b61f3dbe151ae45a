use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::{sleep, Duration, Instant};
use tracing::warn;

/// External signal source answering "is the human using the input
/// devices right now". Absence of a monitor is treated as "active":
/// the orchestrator fails safe toward not interfering.
#[async_trait]
pub trait InputActivityMonitor: Send + Sync {
    async fn is_active(&self) -> bool;
}

const POLL_INTERVAL_MS: u64 = 100;

/// Wait for a quiet window before touching OS/UI state. Bounded: if
/// the window never clears, proceed anyway — this is a soft
/// guarantee, not hard exclusion.
pub(crate) async fn wait_for_quiet(
    monitor: Option<&Arc<dyn InputActivityMonitor>>,
    timeout: Duration,
) -> bool {
    let Some(monitor) = monitor else {
        // No signal source: assume the human is active and hold off
        // for the full bound.
        sleep(timeout).await;
        return false;
    };

    let deadline = Instant::now() + timeout;
    loop {
        if !monitor.is_active().await {
            return true;
        }
        if Instant::now() >= deadline {
            warn!("Quiet window never cleared within {:?}, proceeding", timeout);
            return false;
        }
        sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FlagMonitor {
        active: AtomicBool,
    }

    #[async_trait]
    impl InputActivityMonitor for FlagMonitor {
        async fn is_active(&self) -> bool {
            self.active.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn quiet_monitor_returns_immediately() {
        let monitor: Arc<dyn InputActivityMonitor> = Arc::new(FlagMonitor {
            active: AtomicBool::new(false),
        });
        let start = Instant::now();
        assert!(wait_for_quiet(Some(&monitor), Duration::from_secs(10)).await);
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn busy_monitor_proceeds_after_bound() {
        let monitor: Arc<dyn InputActivityMonitor> = Arc::new(FlagMonitor {
            active: AtomicBool::new(true),
        });
        assert!(!wait_for_quiet(Some(&monitor), Duration::from_millis(150)).await);
    }

    #[tokio::test]
    async fn missing_monitor_assumes_active() {
        assert!(!wait_for_quiet(None, Duration::from_millis(50)).await);
    }
}
