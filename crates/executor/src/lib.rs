// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! em-executor: named executors, ambient task context, structured
//! concurrency, and pacing helpers.
//!
//! Every coroutine runs on exactly one named executor at a time. The ambient
//! [`ThreadContext`] travels with a [`Task`]: it is installed around every
//! poll and re-captured afterwards, so ambient accessors behave identically
//! after a suspension point, whichever thread resumed the task.

pub mod any;
pub mod context;
pub mod executor;
pub mod scope;
pub mod sync;
pub mod timing;

pub use any::{any2, any3, any_of};
pub use context::{current, Task, ThreadContext};
pub use executor::{ExecutorError, ExecutorHandle, ExecutorKind, ExecutorManager, ExecutorSpec};
pub use scope::AsyncScope;
pub use timing::{sleep, yield_now, Loop};
