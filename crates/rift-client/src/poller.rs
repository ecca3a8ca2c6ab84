//! Bounded polling used by the lifecycle queries.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Attempts used by `is_running`, `has_started` and `has_stopped`.
pub const DEFAULT_ATTEMPTS: u32 = 10;
/// Pause between lifecycle probes.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);
/// Attempts used to confirm shutdown after the stop command.
pub const STOP_CONFIRM_ATTEMPTS: u32 = 50;
/// Pause between shutdown confirmation probes.
pub const STOP_CONFIRM_INTERVAL: Duration = Duration::from_millis(5);

/// Pause between polling attempts.
#[async_trait]
pub trait Sleep: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleep;

#[async_trait]
impl Sleep for TokioSleep {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Re-evaluates a probe until it holds or the attempts run out.
#[derive(Clone)]
pub struct LifecyclePoller {
    attempts: u32,
    interval: Duration,
    sleeper: Arc<dyn Sleep>,
}

impl std::fmt::Debug for LifecyclePoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecyclePoller")
            .field("attempts", &self.attempts)
            .field("interval", &self.interval)
            .finish()
    }
}

impl LifecyclePoller {
    pub fn new(attempts: u32, interval: Duration, sleeper: Arc<dyn Sleep>) -> Self {
        Self {
            attempts,
            interval,
            sleeper,
        }
    }

    /// Run `probe` until it returns `Ok(true)`.
    ///
    /// The probe runs at most `attempts + 1` times with one `interval` pause
    /// between runs. Returns `Ok(false)` once the attempts are exhausted; the
    /// first probe error ends polling and is returned as is.
    pub async fn poll<F, Fut, E>(&self, mut probe: F) -> Result<bool, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, E>>,
    {
        let mut remaining = self.attempts;
        loop {
            if probe().await? {
                return Ok(true);
            }
            if remaining == 0 {
                return Ok(false);
            }
            self.sleeper.sleep(self.interval).await;
            remaining -= 1;
        }
    }
}
