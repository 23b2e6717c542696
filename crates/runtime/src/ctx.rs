// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ambient operations for code running inside a module's tasks.
//!
//! They resolve through the thread context the executor installed; calling
//! them from a bare thread with no context is a misuse (except `sleep` and
//! `yield_now`, which degrade to plain waiting).

use std::sync::Arc;

use em_core::{Adapt, Channel, ExecutorRes, Location, MisuseError, Service};
use em_executor::context as exe_context;
use em_rpc::{RpcContext, Status, StatusCode};

use crate::context::{ModuleContext, OpExe};

pub use em_executor::{sleep, yield_now, Loop};

/// Whether the ambient module should keep running.
pub fn ok() -> bool {
    em_executor::timing::ok()
}

/// The module context of the current task, if any.
pub fn current_module() -> Option<Arc<ModuleContext>> {
    let thread_ctx = exe_context::current();
    let erased = thread_ctx.module?.upgrade()?;
    erased.downcast::<ModuleContext>().ok()
}

/// Publish through the ambient module context.
#[track_caller]
pub fn publish<T: Adapt>(ch: &Channel<T>, msg: &T) -> Result<(), MisuseError> {
    let loc = Location::capture();
    let ctx = current_module().ok_or(MisuseError::NoAmbientContext { loc })?;
    ctx.publish(ch, msg)
}

/// Call through the ambient module context.
pub async fn call<Q: Adapt, P: Adapt>(
    srv: &Service<Q, P>,
    rpc_ctx: RpcContext,
    request: &Q,
) -> (Status, Option<P>) {
    match current_module() {
        Some(ctx) => ctx.call(srv, rpc_ctx, request).await,
        None => (
            Status::with_message(StatusCode::InvalidArg, "no ambient module context"),
            None,
        ),
    }
}

/// Executor operations through the ambient module context.
#[track_caller]
pub fn exe(res: &ExecutorRes) -> Result<OpExe, MisuseError> {
    let loc = Location::capture();
    let ctx = current_module().ok_or(MisuseError::NoAmbientContext { loc })?;
    ctx.exe(res)
}

#[cfg(test)]
#[path = "ctx_tests.rs"]
mod tests;
