// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executor operators: lookup, posting, inline execution.

use std::future::Future;
use std::sync::Arc;

use em_core::{ExecutorRes, Location, MisuseError};
use em_executor::{ExecutorHandle, Task};

use super::{InitError, ModuleContext};

impl ModuleContext {
    /// Look up a configured executor by name and bind a descriptor to it.
    /// Legal only during Init; a missing executor is fatal.
    #[track_caller]
    pub fn init_executor(self: &Arc<Self>, name: &str) -> Result<ExecutorRes, InitError> {
        let loc = Location::capture();
        self.expect_init_phase("init_executor", loc)?;

        let handle = self
            .exe_manager
            .get(name)
            .ok_or_else(|| MisuseError::MissingExecutor {
                name: name.to_owned(),
                loc,
            })?;

        let mut executors = self.executors.write();
        let existing = executors.iter().position(|e| e.name() == name);
        let index = match existing {
            Some(index) => index,
            None => {
                executors.push(handle);
                executors.len() - 1
            }
        };
        drop(executors);

        let mut res = ExecutorRes::new(name);
        res.bind(
            em_core::Binding {
                context_id: self.id(),
                index,
            },
            loc,
        )?;
        Ok(res)
    }

    pub(crate) fn executor_handle(
        &self,
        res: &ExecutorRes,
        loc: Location,
    ) -> Result<ExecutorHandle, MisuseError> {
        let index = self.check_binding(res.name(), res.binding(), loc)?;
        let executors = self.executors.read();
        executors
            .get(index)
            .cloned()
            .ok_or_else(|| MisuseError::ResourceUnbound {
                name: res.name().to_owned(),
                loc,
            })
    }

    /// Scoped operator for a bound executor.
    #[track_caller]
    pub fn exe(self: &Arc<Self>, res: &ExecutorRes) -> Result<OpExe, MisuseError> {
        let loc = Location::capture();
        let handle = self.executor_handle(res, loc)?;
        Ok(OpExe {
            ctx: Arc::clone(self),
            handle,
        })
    }
}

/// On-executor operations with this module's ambient context installed.
pub struct OpExe {
    ctx: Arc<ModuleContext>,
    handle: ExecutorHandle,
}

impl std::fmt::Debug for OpExe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpExe").field("name", &self.name()).finish()
    }
}

impl OpExe {
    pub fn name(&self) -> &str {
        self.handle.name()
    }

    /// One thread means everything posted here is serialized.
    pub fn thread_safe(&self) -> bool {
        self.handle.thread_safe()
    }

    /// Schedule a task; its lifetime is owned by the module's scope.
    pub fn post<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let thread_ctx = self.ctx.thread_context(Some(self.handle.clone()));
        let task = Task::with_context(thread_ctx, fut);
        self.handle.spawn_tracked(self.ctx.scope(), task);
    }

    /// Run `f` synchronously with the executor installed as ambient.
    pub fn inline<R>(&self, f: impl FnOnce() -> R) -> R {
        let thread_ctx = self.ctx.thread_context(Some(self.handle.clone()));
        em_executor::context::with_installed(thread_ctx, f)
    }

    pub fn handle(&self) -> &ExecutorHandle {
        &self.handle
    }
}
