// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! em-config: the configuration engine.
//!
//! Four layers compose into one effective YAML document: code defaults,
//! env-gated injected defaults, the user file, and command-line patches.
//! The result is optionally dumped to `<cfg>.dump` and parsed into the typed
//! [`CoreConfig`] the orchestrator consumes.

mod builder;
mod envsub;
mod error;
mod patch;
mod processor;
mod schema;

pub use builder::{Cfg, ModuleDecl};
pub use envsub::expand_env;
pub use error::ConfigError;
pub use patch::{patch_root, PatchCtx};
pub use processor::{EffectiveConfig, Processor};
pub use schema::{
    BackendCfg, ChannelCfg, CoreConfig, ExecutorCfg, ExecutorEntry, ExecutorEntryOptions,
    LogBackendCfg, LogCfg, ModuleEntry, ModuleSectionCfg, PkgEntry, PluginCfg, PluginEntry,
    RpcCfg, RpcFuncOptions, TopicOptions,
};
