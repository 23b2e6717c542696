// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ambient per-task context and the [`Task`] wrapper that carries it.
//!
//! The thread-local slot holds whatever context the currently polled task
//! installed. `Task::poll` swaps the task's captured context in, polls the
//! inner future, then captures the (possibly updated) context back out and
//! restores the previous slot. Code before and after an `.await` therefore
//! sees the same ambient state, on whatever thread the resume landed.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::executor::ExecutorHandle;

type ErasedModule = Weak<dyn std::any::Any + Send + Sync>;

/// Ambient state visible to a running task.
#[derive(Clone, Default)]
pub struct ThreadContext {
    /// The owning module context, type-erased to break the crate cycle.
    pub module: Option<ErasedModule>,
    /// Module name, for log decoration.
    pub module_name: Option<String>,
    /// The executor this task currently runs on.
    pub executor: Option<ExecutorHandle>,
    /// Deadline of the RPC call being served, if any.
    pub rpc_deadline: Option<Instant>,
    /// The module's run flag; cleared on shutdown.
    pub ok: Option<Arc<AtomicBool>>,
    /// Cancellation token of the owning scope; wakes sleeps promptly.
    pub cancel: Option<CancellationToken>,
}

impl ThreadContext {
    /// Whether the owning module is still running. Without an installed
    /// context this reads true, matching a bare thread.
    pub fn is_ok(&self) -> bool {
        match (&self.ok, &self.cancel) {
            (Some(flag), _) => flag.load(Ordering::Acquire),
            (None, Some(token)) => !token.is_cancelled(),
            (None, None) => true,
        }
    }
}

impl std::fmt::Debug for ThreadContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadContext")
            .field("module_name", &self.module_name)
            .field("executor", &self.executor.as_ref().map(|e| e.name().to_owned()))
            .field("rpc_deadline", &self.rpc_deadline)
            .finish()
    }
}

thread_local! {
    static THREAD_CTX: RefCell<ThreadContext> = RefCell::new(ThreadContext::default());
}

/// Snapshot of the ambient context on this thread.
pub fn current() -> ThreadContext {
    THREAD_CTX.with(|slot| slot.borrow().clone())
}

/// Swap `ctx` into the thread-local slot, returning the previous value.
pub fn install(ctx: ThreadContext) -> ThreadContext {
    THREAD_CTX.with(|slot| std::mem::replace(&mut *slot.borrow_mut(), ctx))
}

/// Run `f` with `ctx` installed, restoring the previous slot afterwards.
pub fn with_installed<R>(ctx: ThreadContext, f: impl FnOnce() -> R) -> R {
    let prev = install(ctx);
    let result = f();
    install(prev);
    result
}

/// A single-shot awaitable computation carrying its captured context.
///
/// Created from any future; the ambient context at creation time is captured
/// into the task and re-installed around every poll.
pub struct Task<T> {
    fut: Pin<Box<dyn Future<Output = T> + Send>>,
    ctx: ThreadContext,
}

impl<T> Task<T> {
    /// Capture the current ambient context around `fut`.
    pub fn new(fut: impl Future<Output = T> + Send + 'static) -> Self {
        Self {
            fut: Box::pin(fut),
            ctx: current(),
        }
    }

    /// Capture an explicit context instead of the ambient one.
    pub fn with_context(ctx: ThreadContext, fut: impl Future<Output = T> + Send + 'static) -> Self {
        Self {
            fut: Box::pin(fut),
            ctx,
        }
    }
}

impl<T> Future for Task<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let this = self.get_mut();
        let prev = install(this.ctx.clone());
        let result = this.fut.as_mut().poll(cx);
        // Capture updates made before the suspension so they survive resume.
        this.ctx = install(prev);
        result
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
