//! Cooperative cancellation for long batches.
//!
//! Checked between cells, rounds and dimensions, never while a judge call is
//! in flight.

use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::types::StopReason;

const SLEEP_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Default)]
pub struct RunControl {
    cancel_flag: Option<Arc<AtomicBool>>,
    deadline: Option<Instant>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = Some(flag);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// `Some(reason)` once the run should stop.
    pub fn interrupted(&self) -> Option<StopReason> {
        if let Some(flag) = &self.cancel_flag {
            if flag.load(AtomicOrdering::Relaxed) {
                return Some(StopReason::Cancelled);
            }
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Some(StopReason::DeadlineExceeded);
            }
        }
        None
    }

    /// Sleep for `delay`, waking early if the run is interrupted.
    pub async fn pause(&self, delay: Duration) -> Option<StopReason> {
        if self.cancel_flag.is_none() && self.deadline.is_none() {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            return None;
        }

        let until = Instant::now() + delay;
        loop {
            if let Some(reason) = self.interrupted() {
                return Some(reason);
            }
            let now = Instant::now();
            if now >= until {
                return None;
            }
            tokio::time::sleep(SLEEP_SLICE.min(until - now)).await;
        }
    }
}

/// Spaces consecutive judge calls by a fixed delay. The first call goes out
/// immediately; one pacer is shared by every provider evaluated in a cell.
#[derive(Debug, Clone)]
pub struct JudgePacer {
    delay: Duration,
    called: bool,
}

impl JudgePacer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            called: false,
        }
    }

    /// Wait out the delay owed before the next judge call.
    pub async fn before_call(&mut self, control: &RunControl) -> Option<StopReason> {
        if self.called {
            if let Some(reason) = control.pause(self.delay).await {
                return Some(reason);
            }
        } else if let Some(reason) = control.interrupted() {
            return Some(reason);
        }
        self.called = true;
        None
    }
}
