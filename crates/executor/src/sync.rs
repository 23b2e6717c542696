// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coroutine-friendly synchronization primitives for user state.
//!
//! Registry maps are frozen after Init and need no locking; these exist for
//! per-subscription state user modules keep (latest-value caches, counters).

pub use tokio::sync::{Mutex, MutexGuard};

use tokio::sync::Notify;

/// Condition variable usable from tasks.
///
/// The notified future is registered before the guard drops, so a notify
/// between unlock and wait is not lost.
#[derive(Debug, Default)]
pub struct ConditionVariable {
    notify: Notify,
}

impl ConditionVariable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify_one(&self) {
        self.notify.notify_one();
    }

    pub fn notify_all(&self) {
        self.notify.notify_waiters();
    }

    /// Atomically release `guard`, wait for a notification, and re-lock.
    pub async fn wait<'a, T>(
        &self,
        guard: MutexGuard<'a, T>,
        mutex: &'a Mutex<T>,
    ) -> MutexGuard<'a, T> {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        drop(guard);
        notified.await;
        mutex.lock().await
    }

    /// Wait until `pred` holds, re-checking after every notification.
    pub async fn wait_until<'a, T>(
        &self,
        mutex: &'a Mutex<T>,
        mut pred: impl FnMut(&T) -> bool,
    ) -> MutexGuard<'a, T> {
        let mut guard = mutex.lock().await;
        while !pred(&guard) {
            guard = self.wait(guard, mutex).await;
        }
        guard
    }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
