// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-module runtime context.
//!
//! Created by the orchestrator for each module, it binds resources during
//! Init, dispatches publish/call traffic during Start..PreShutdown, and owns
//! the coroutine scope that drains on shutdown. Resource descriptors carry
//! only `(context_id, index)`; everything they do goes through here.

mod op_cli;
mod op_exe;
mod op_log;
mod op_pub;
mod op_srv;
mod op_sub;

pub use op_cli::Client;
pub use op_exe::OpExe;
pub use op_log::{Check, LogLevel};
pub use op_pub::Publisher;
pub use op_srv::{markers, IntoServerHandler, Server, TypedHandler};
pub use op_sub::Subscriber;

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::{Mutex, RwLock};
use thiserror::Error;

use em_backend::BackendHub;
use em_channel::{ChannelError, ChannelRegistry, ChannelRegistryBuilder, FilterChain, FilterRegistry};
use em_core::{AdaptError, Location, MethodNameError, MisuseError, TypeSupport};
use em_executor::{AsyncScope, ExecutorHandle, ExecutorManager, ThreadContext};
use em_rpc::{RpcError, RpcFilterRegistry, RpcRegistry, RpcRegistryBuilder};

use crate::resource::ResourceIndex;

/// Failures of the `init_*` family. Fatal: the module's `on_initialize`
/// should propagate them and return false.
#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    Misuse(#[from] MisuseError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("bad method name: {0}")]
    Method(#[from] MethodNameError),
}

/// Lifecycle phase of one context, gating which operator families are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CtxPhase {
    Init,
    Running,
    Shutdown,
}

em_core::simple_display! {
    CtxPhase {
        Init => "init",
        Running => "running",
        Shutdown => "shutdown",
    }
}

/// Registries still under construction, shared between the contexts and the
/// orchestrator during Init.
#[derive(Default)]
pub(crate) struct SharedInit {
    pub(crate) channel: ChannelRegistryBuilder,
    pub(crate) rpc: RpcRegistryBuilder,
}

/// Frozen fabric handed to every context once Init completes.
#[derive(Clone)]
pub(crate) struct Fabric {
    pub(crate) channel: Arc<ChannelRegistry>,
    pub(crate) rpc: Arc<RpcRegistry>,
    pub(crate) hub: Arc<BackendHub>,
    pub(crate) filters: Arc<FilterRegistry>,
    pub(crate) rpc_filters: Arc<RpcFilterRegistry>,
}

pub(crate) struct ChannelSlot {
    pub(crate) topic: String,
    pub(crate) type_name: &'static str,
    pub(crate) support: TypeSupport,
    pub(crate) pub_registered: bool,
    pub(crate) pub_filters: OnceLock<FilterChain>,
}

pub(crate) struct ServiceSlot {
    pub(crate) method: em_core::MethodName,
}

static NEXT_CONTEXT_ID: AtomicU32 = AtomicU32::new(1);

pub struct ModuleContext {
    id: u32,
    name: String,
    pub(crate) self_weak: Weak<ModuleContext>,

    phase: Mutex<CtxPhase>,
    started: AtomicBool,
    scope: AsyncScope,

    pub(crate) exe_manager: Arc<ExecutorManager>,
    pub(crate) shared_init: Arc<Mutex<SharedInit>>,
    pub(crate) fabric: OnceLock<Fabric>,

    pub(crate) executors: RwLock<Vec<ExecutorHandle>>,
    pub(crate) channels: RwLock<Vec<ChannelSlot>>,
    pub(crate) services: RwLock<Vec<ServiceSlot>>,
    channel_index: Mutex<ResourceIndex>,
    service_index: Mutex<ResourceIndex>,
}

impl ModuleContext {
    pub(crate) fn new(
        name: impl Into<String>,
        exe_manager: Arc<ExecutorManager>,
        shared_init: Arc<Mutex<SharedInit>>,
    ) -> Arc<Self> {
        let name = name.into();
        Arc::new_cyclic(|self_weak| Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            name,
            self_weak: self_weak.clone(),
            phase: Mutex::new(CtxPhase::Init),
            started: AtomicBool::new(false),
            scope: AsyncScope::new(),
            exe_manager,
            shared_init,
            fabric: OnceLock::new(),
            executors: RwLock::new(Vec::new()),
            channels: RwLock::new(Vec::new()),
            services: RwLock::new(Vec::new()),
            channel_index: Mutex::new(ResourceIndex::default()),
            service_index: Mutex::new(ResourceIndex::default()),
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this module should keep running. Cleared on shutdown.
    pub fn ok(&self) -> bool {
        self.scope.is_ok()
    }

    /// Ask the module to wind down; only sets the flag user loops poll.
    pub fn require_shutdown(&self) {
        self.scope.require_shutdown();
    }

    pub fn scope(&self) -> &AsyncScope {
        &self.scope
    }

    pub(crate) fn phase(&self) -> CtxPhase {
        *self.phase.lock()
    }

    pub(crate) fn enter_running(&self) {
        *self.phase.lock() = CtxPhase::Running;
        self.started.store(true, Ordering::Release);
    }

    pub(crate) fn enter_shutdown(&self) {
        *self.phase.lock() = CtxPhase::Shutdown;
        self.scope.require_shutdown();
    }

    pub(crate) fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub(crate) fn install_fabric(&self, fabric: Fabric) {
        let _ = self.fabric.set(fabric);
    }

    /// The ambient context tasks of this module run under.
    pub(crate) fn thread_context(&self, executor: Option<ExecutorHandle>) -> ThreadContext {
        let mut ctx = ThreadContext::default();
        ctx.module = Some(self.erased_weak());
        ctx.module_name = Some(self.name.clone());
        ctx.executor = executor;
        ctx.ok = Some(self.scope.ok_flag());
        ctx.cancel = Some(self.scope.token());
        ctx
    }

    fn erased_weak(&self) -> Weak<dyn std::any::Any + Send + Sync> {
        self.self_weak.clone() as Weak<dyn std::any::Any + Send + Sync>
    }

    pub(crate) fn expect_init_phase(
        &self,
        op: &'static str,
        loc: Location,
    ) -> Result<(), MisuseError> {
        let phase = self.phase();
        if phase != CtxPhase::Init {
            return Err(MisuseError::WrongPhase {
                op,
                phase: phase.to_string(),
                loc,
            });
        }
        Ok(())
    }

    pub(crate) fn check_binding(
        &self,
        name: &str,
        binding: Option<em_core::Binding>,
        loc: Location,
    ) -> Result<usize, MisuseError> {
        let binding = binding.ok_or_else(|| MisuseError::ResourceUnbound {
            name: name.to_owned(),
            loc,
        })?;
        if binding.context_id != self.id {
            return Err(MisuseError::ContextMismatch {
                name: name.to_owned(),
                ours: self.id,
                theirs: binding.context_id,
                loc,
            });
        }
        Ok(binding.index)
    }

    pub(crate) fn alloc_channel_slot(&self, topic: &str, type_name: &'static str) -> (usize, bool) {
        let key = format!("{topic}\u{1}{type_name}");
        self.channel_index.lock().get_or_insert(&key)
    }

    pub(crate) fn alloc_service_slot(&self, key: &str) -> (usize, bool) {
        self.service_index.lock().get_or_insert(key)
    }

    /// Number of bound resource slots, for the descriptor invariants.
    pub fn registry_size(&self) -> usize {
        self.channel_index.lock().len() + self.service_index.lock().len()
    }

    /// Drop failure on the adaptation edge: log and carry on.
    pub(crate) fn drop_with_log(&self, what: &'static str, topic: &str, err: &AdaptError) {
        tracing::error!(module = %self.name, %topic, error = %err, "{what} dropped");
    }
}

impl std::fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleContext")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("phase", &self.phase())
            .finish()
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
