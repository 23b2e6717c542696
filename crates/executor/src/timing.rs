// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cancellation-aware sleeping and loop pacing.

use std::time::{Duration, Instant};

use crate::context;

/// Sleep for `duration`, returning promptly when the owning scope cancels.
pub async fn sleep(duration: Duration) {
    let ctx = context::current();
    match ctx.cancel {
        Some(token) => {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(duration) => {}
            }
        }
        None => tokio::time::sleep(duration).await,
    }
}

/// Yield this task back to its executor.
pub async fn yield_now() {
    tokio::task::yield_now().await;
}

/// Whether the ambient module is still running.
pub fn ok() -> bool {
    context::current().is_ok()
}

/// Fixed-period loop pacing.
///
/// `ok().await` sleeps the remainder of the period since the previous
/// iteration and reports the module run flag. An overrunning body proceeds
/// immediately and resets the anchor.
#[derive(Debug, Default)]
pub struct Loop {
    period: Duration,
    anchor: Option<Instant>,
}

impl Loop {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            anchor: None,
        }
    }

    pub fn from_hz(hz: u32) -> Self {
        Self::new(Duration::from_nanos(1_000_000_000 / u64::from(hz.max(1))))
    }

    pub async fn ok(&mut self) -> bool {
        if self.period.is_zero() {
            return ok();
        }

        let now = Instant::now();
        match self.anchor {
            None => {
                // First iteration runs immediately.
                self.anchor = Some(now);
            }
            Some(anchor) => {
                // Advance the anchor by the slept amount instead of re-reading
                // the clock; a late reschedule then shows up as lag on the
                // next iteration.
                let elapsed = now - anchor;
                match self.period.checked_sub(elapsed) {
                    Some(dt) if !dt.is_zero() => {
                        sleep(dt).await;
                        self.anchor = Some(anchor + dt);
                    }
                    _ => {
                        self.anchor = Some(now);
                    }
                }
            }
        }

        ok()
    }
}

#[cfg(test)]
#[path = "timing_tests.rs"]
mod tests;
