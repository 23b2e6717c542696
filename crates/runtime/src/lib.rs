// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! em-runtime: the per-module context, the lifecycle orchestrator, and the
//! module contract that ties the messaging fabric together.

pub mod context;
pub mod core;
pub mod ctx;
pub mod lifecycle;
pub mod module;
pub mod resource;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use context::{Client, InitError, ModuleContext, OpExe, Publisher, Server, Subscriber};
pub use core::{configure_modules, Core, CoreError, ShutdownHandle};
pub use lifecycle::{Edge, HookRegistry, Stage, State, Subsystem};
pub use module::{Module, ModuleCfg, ModuleInfo, NamedModule};
pub use resource::ResourceHandle;
