// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The backend protocol every wire carrier implements, plus the hub that
//! owns the started instances.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use thiserror::Error;

use em_channel::{ChannelRegistry, MessageWrapper, PublishTypeWrapper, SubscribeWrapper};
use em_rpc::{ClientFuncWrapper, RpcContext, RpcRegistry, ServiceFuncWrapper, Status, StatusCode};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend [{backend}] cannot {op} while in state [{state}]")]
    State {
        backend: &'static str,
        op: &'static str,
        state: BackendState,
    },

    #[error("backend [{backend}] options invalid: {reason}")]
    Options {
        backend: &'static str,
        reason: String,
    },

    #[error("backend [{backend}] i/o failure: {source}")]
    Io {
        backend: &'static str,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BackendState {
    PreInit,
    Init,
    Start,
    Shutdown,
}

em_core::simple_display! {
    BackendState {
        PreInit => "pre_init",
        Init => "init",
        Start => "start",
        Shutdown => "shutdown",
    }
}

/// Tracks one backend's lifecycle and rejects out-of-order transitions.
#[derive(Debug)]
pub struct StateCell {
    backend: &'static str,
    state: Mutex<BackendState>,
}

impl StateCell {
    pub fn new(backend: &'static str) -> Self {
        Self {
            backend,
            state: Mutex::new(BackendState::PreInit),
        }
    }

    pub fn get(&self) -> BackendState {
        *self.state.lock()
    }

    pub fn is_started(&self) -> bool {
        self.get() == BackendState::Start
    }

    fn advance(
        &self,
        from: BackendState,
        to: BackendState,
        op: &'static str,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        if *state != from {
            return Err(BackendError::State {
                backend: self.backend,
                op,
                state: *state,
            });
        }
        *state = to;
        Ok(())
    }

    pub fn to_init(&self) -> Result<(), BackendError> {
        self.advance(BackendState::PreInit, BackendState::Init, "initialize")
    }

    pub fn to_start(&self) -> Result<(), BackendError> {
        self.advance(BackendState::Init, BackendState::Start, "start")
    }

    /// Shutdown is idempotent from any post-init state.
    pub fn to_shutdown(&self) -> bool {
        let mut state = self.state.lock();
        if *state == BackendState::Shutdown {
            return false;
        }
        *state = BackendState::Shutdown;
        true
    }

    /// Registration is only legal between Init and Start.
    pub fn expect_init(&self, op: &'static str) -> Result<(), BackendError> {
        let state = *self.state.lock();
        if state != BackendState::Init {
            return Err(BackendError::State {
                backend: self.backend,
                op,
                state,
            });
        }
        Ok(())
    }
}

/// The contract each wire backend implements. All methods take `&self`;
/// implementations guard their own mutable state.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Unique non-empty identifier, used in routing rules.
    fn name(&self) -> &'static str;

    /// Validate options and acquire resources.
    fn initialize(&self, options: serde_yaml::Mapping) -> Result<(), BackendError>;

    /// Snapshot the channel registry; the pointer stays valid through
    /// PreShutdown.
    fn set_channel_registry(&self, registry: Arc<ChannelRegistry>) {
        let _ = registry;
    }

    /// Snapshot the rpc registry.
    fn set_rpc_registry(&self, registry: Arc<RpcRegistry>) {
        let _ = registry;
    }

    /// Begin accepting traffic. Before this no publish or receive is legal.
    fn start(&self) -> Result<(), BackendError>;

    /// Called during Init for each (topic, type) this backend must carry.
    /// Returning false rejects the registration.
    fn register_publish_type(&self, wrapper: &PublishTypeWrapper) -> bool {
        let _ = wrapper;
        true
    }

    /// Called during Init for each subscription routed at this backend.
    fn subscribe(&self, wrapper: Arc<SubscribeWrapper>) -> bool {
        let _ = wrapper;
        true
    }

    /// Called during Init for each served method routed at this backend.
    fn register_service_func(&self, wrapper: Arc<ServiceFuncWrapper>) -> bool {
        let _ = wrapper;
        true
    }

    /// Called during Init for each client the backend may carry calls for.
    fn register_client_func(&self, wrapper: &ClientFuncWrapper) -> bool {
        let _ = wrapper;
        true
    }

    /// Best-effort send; retry/QoS policy is backend-internal.
    fn publish(&self, msg: MessageWrapper);

    /// Issue an RPC. The returned pair is produced at most once per call.
    async fn invoke(&self, ctx: Arc<RpcContext>, method: &str, request: Vec<u8>)
        -> (Status, Vec<u8>);

    /// Idempotent; must unblock in-flight receives.
    fn shutdown(&self);
}

/// Started backends by name. Built by the orchestrator during Init; shared
/// read-only from Start on.
#[derive(Default)]
pub struct BackendHub {
    backends: IndexMap<String, Arc<dyn Backend>>,
}

impl BackendHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, backend: Arc<dyn Backend>) {
        self.backends.insert(backend.name().to_owned(), backend);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Backend>> {
        self.backends.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Backend>> {
        self.backends.values()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }

    /// Fan a message out to the named backends. Unknown names were filtered
    /// during Init; a missing one here is a routing bug, reported as a drop.
    pub fn publish_to(&self, backend_names: &[String], msg: &MessageWrapper) {
        for name in backend_names {
            match self.backends.get(name) {
                Some(backend) => backend.publish(msg.clone()),
                None => {
                    tracing::warn!(backend = %name, topic = %msg.topic, "publish dropped, backend not present");
                }
            }
        }
    }

    /// Invoke on the first present backend of the matched set.
    pub async fn invoke_on(
        &self,
        backend_names: &[String],
        ctx: Arc<RpcContext>,
        method: &str,
        request: Vec<u8>,
    ) -> (Status, Vec<u8>) {
        for name in backend_names {
            if let Some(backend) = self.backends.get(name) {
                return backend.invoke(ctx, method, request).await;
            }
        }
        (
            Status::with_message(StatusCode::Unavailable, format!("no backend for [{method}]")),
            Vec::new(),
        )
    }

    pub fn shutdown(&self) {
        for backend in self.backends.values() {
            backend.shutdown();
        }
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
