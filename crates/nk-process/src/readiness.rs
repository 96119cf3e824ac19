//! Bounded polling for node readiness gates.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use nk_core::{AppError, ReadinessCondition};
use tracing::debug;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);
pub const DEFAULT_DAG_TIMEOUT: Duration = Duration::from_secs(600);
pub const DEFAULT_IPC_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(60);

/// Per-condition timeouts used while bringing a chain up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessTimeouts {
    pub dag: Duration,
    pub ipc: Duration,
    pub rpc: Duration,
    pub poll_interval: Duration,
}

impl Default for ReadinessTimeouts {
    fn default() -> Self {
        Self {
            dag: DEFAULT_DAG_TIMEOUT,
            ipc: DEFAULT_IPC_TIMEOUT,
            rpc: DEFAULT_RPC_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl ReadinessTimeouts {
    pub fn waiter(&self, condition: ReadinessCondition) -> ReadinessWaiter {
        let timeout = match condition {
            ReadinessCondition::Dag => self.dag,
            ReadinessCondition::Ipc => self.ipc,
            ReadinessCondition::Rpc => self.rpc,
        };
        ReadinessWaiter::new(timeout).with_poll_interval(self.poll_interval)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessWaiter {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl ReadinessWaiter {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Poll `is_ready` until it returns true or the timeout elapses.
    ///
    /// The predicate is evaluated at least once, and once more after the
    /// final sleep, so a zero timeout still checks the current state.
    pub fn wait(
        &self,
        condition: ReadinessCondition,
        mut is_ready: impl FnMut() -> bool,
    ) -> Result<()> {
        let started = Instant::now();
        let deadline = started + self.timeout;
        loop {
            if is_ready() {
                debug!(%condition, elapsed = ?started.elapsed(), "readiness reached");
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(AppError::ReadinessTimeout {
                    condition,
                    timeout: self.timeout,
                }
                .into());
            }
            thread::sleep(self.poll_interval.min(deadline - now));
        }
    }
}
