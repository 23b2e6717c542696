// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named executors.
//!
//! An executor is a dedicated scheduling domain with its own thread pool.
//! Single-thread executors preserve FIFO between tasks posted from one
//! thread; multi-thread executors give no inter-task ordering. The
//! `time_wheel` kind is a single thread reserved for deadline timers.

use std::future::Future;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

use crate::context::{self, Task, ThreadContext};
use crate::scope::AsyncScope;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("duplicate executor name [{0}]")]
    DuplicateName(String),

    #[error("unknown executor type [{0}]")]
    UnknownKind(String),

    #[error("failed to build executor [{name}]: {source}")]
    Build {
        name: String,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorKind {
    /// General-purpose pool, N worker threads.
    AsioThread,
    /// One dedicated thread, FIFO.
    SimpleThread,
    /// One dedicated thread driving deadline timers.
    TimeWheel,
}

em_core::simple_display! {
    ExecutorKind {
        AsioThread => "asio_thread",
        SimpleThread => "simple_thread",
        TimeWheel => "time_wheel",
    }
}

em_core::parse_from_str! {
    ExecutorKind, "executor type" {
        AsioThread => "asio_thread",
        SimpleThread => "simple_thread",
        TimeWheel => "time_wheel",
    }
}

/// One executor to build, resolved from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorSpec {
    pub name: String,
    pub kind: ExecutorKind,
    pub thread_num: u32,
}

struct Inner {
    name: String,
    kind: ExecutorKind,
    thread_num: u32,
    handle: tokio::runtime::Handle,
    // Present until shutdown; dropping the runtime stops the threads.
    runtime: Mutex<Option<tokio::runtime::Runtime>>,
}

/// Cheap shareable reference to a built executor.
#[derive(Clone)]
pub struct ExecutorHandle {
    inner: Arc<Inner>,
}

impl ExecutorHandle {
    fn build(spec: &ExecutorSpec) -> Result<Self, ExecutorError> {
        let threads = match spec.kind {
            ExecutorKind::AsioThread => spec.thread_num.max(1) as usize,
            ExecutorKind::SimpleThread | ExecutorKind::TimeWheel => 1,
        };

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(threads)
            .thread_name(format!("em-exe-{}", spec.name))
            .enable_all()
            .build()
            .map_err(|source| ExecutorError::Build {
                name: spec.name.clone(),
                source,
            })?;

        Ok(Self {
            inner: Arc::new(Inner {
                name: spec.name.clone(),
                kind: spec.kind,
                thread_num: threads as u32,
                handle: runtime.handle().clone(),
                runtime: Mutex::new(Some(runtime)),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn kind(&self) -> ExecutorKind {
        self.inner.kind
    }

    pub fn thread_num(&self) -> u32 {
        self.inner.thread_num
    }

    /// A single-thread executor serializes everything posted to it.
    pub fn thread_safe(&self) -> bool {
        self.inner.thread_num == 1
    }

    fn task_context(&self) -> ThreadContext {
        let mut ctx = context::current();
        ctx.executor = Some(self.clone());
        ctx
    }

    /// Schedule a task on this executor, tracked by `scope`.
    pub fn post<F>(&self, scope: &AsyncScope, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task = Task::with_context(self.task_context(), fut);
        scope.spawn_on(&self.inner.handle, task);
    }

    /// Track an already-wrapped future on this executor. Callers that build
    /// their own [`Task`] (to install a specific context) come through here.
    pub fn spawn_tracked<F>(&self, scope: &AsyncScope, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        scope.spawn_on(&self.inner.handle, fut);
    }

    /// Schedule a task nobody waits for. Used by backends delivering
    /// callbacks onto a subscriber's executor.
    pub fn post_detached<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task = Task::with_context(self.task_context(), fut);
        self.inner.handle.spawn(task);
    }

    /// Run `f` synchronously with this executor installed as the ambient
    /// one, so `f` may use the post interfaces.
    pub fn inline<R>(&self, f: impl FnOnce() -> R) -> R {
        context::with_installed(self.task_context(), f)
    }

    /// Block the calling thread on a future scheduled here. Only legal from
    /// outside any executor thread (the orchestrator's main thread).
    pub fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.inner.handle.block_on(fut)
    }

    fn shutdown(&self) {
        if let Some(runtime) = self.inner.runtime.lock().take() {
            debug!(executor = %self.inner.name, "shutting down executor");
            runtime.shutdown_background();
        }
    }
}

impl std::fmt::Debug for ExecutorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorHandle")
            .field("name", &self.inner.name)
            .field("kind", &self.inner.kind)
            .field("thread_num", &self.inner.thread_num)
            .finish()
    }
}

/// Owns every named executor of one process, keyed in declaration order.
#[derive(Default, Debug)]
pub struct ExecutorManager {
    executors: IndexMap<String, ExecutorHandle>,
}

impl ExecutorManager {
    pub const TIMEOUT_EXECUTOR: &'static str = "default_timeout_executor";

    pub fn build(specs: &[ExecutorSpec]) -> Result<Self, ExecutorError> {
        let mut executors = IndexMap::new();
        for spec in specs {
            if executors.contains_key(&spec.name) {
                return Err(ExecutorError::DuplicateName(spec.name.clone()));
            }
            executors.insert(spec.name.clone(), ExecutorHandle::build(spec)?);
        }
        Ok(Self { executors })
    }

    pub fn get(&self, name: &str) -> Option<ExecutorHandle> {
        self.executors.get(name).cloned()
    }

    pub fn timeout_executor(&self) -> Option<ExecutorHandle> {
        self.get(Self::TIMEOUT_EXECUTOR)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.executors.keys().map(String::as_str)
    }

    /// Stop every executor. Idempotent.
    pub fn shutdown(&self) {
        for handle in self.executors.values() {
            handle.shutdown();
        }
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
