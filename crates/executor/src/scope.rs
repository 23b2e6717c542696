// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle-scoped task ownership.
//!
//! Each module context owns one `AsyncScope`. Tasks spawned through it are
//! tracked; shutdown either drains them (`complete`) or cancels them
//! (`cleanup`). The scope publishes an `ok` flag user loops poll.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

#[derive(Clone, Default)]
pub struct AsyncScope {
    tracker: TaskTracker,
    cancel: CancellationToken,
    ok: Arc<AtomicBool>,
}

impl AsyncScope {
    pub fn new() -> Self {
        Self {
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
            ok: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn ok_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.ok)
    }

    pub fn is_ok(&self) -> bool {
        self.ok.load(Ordering::Acquire)
    }

    /// Ask tasks to wind down without waiting for them.
    pub fn require_shutdown(&self) {
        self.ok.store(false, Ordering::Release);
    }

    /// Track `fut` on the given runtime handle.
    pub fn spawn_on<F>(&self, handle: &tokio::runtime::Handle, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn_on(fut, handle);
    }

    /// Wait for every outstanding task to return.
    pub async fn complete(&self) {
        self.ok.store(false, Ordering::Release);
        self.tracker.close();
        self.tracker.wait().await;
    }

    /// Cancel outstanding tasks and wait for them to unwind. Tasks observe
    /// the cancellation through their sleeps and the `ok` flag.
    pub async fn cleanup(&self) {
        self.ok.store(false, Ordering::Release);
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

impl std::fmt::Debug for AsyncScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncScope")
            .field("ok", &self.is_ok())
            .field("outstanding", &self.tracker.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "scope_tests.rs"]
mod tests;
