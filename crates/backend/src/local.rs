// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The in-process backend: publishes loop straight back into this process's
//! subscription table, and RPC calls dispatch directly to the registered
//! handler. No sockets, no serialization beyond the shared payload bytes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use em_channel::{MessageWrapper, SubscribeWrapper};
use em_rpc::{RpcContext, RpcRegistry, ServiceFuncWrapper, Status, StatusCode};

use crate::protocol::{Backend, BackendError, StateCell};

#[derive(Default)]
struct Tables {
    subscriptions: HashMap<String, Vec<Arc<SubscribeWrapper>>>,
    services: HashMap<String, Arc<ServiceFuncWrapper>>,
}

pub struct LocalBackend {
    state: StateCell,
    tables: RwLock<Tables>,
    rpc_registry: RwLock<Option<Arc<RpcRegistry>>>,
}

impl LocalBackend {
    pub const NAME: &'static str = "local";

    pub fn new() -> Self {
        Self {
            state: StateCell::new(Self::NAME),
            tables: RwLock::new(Tables::default()),
            rpc_registry: RwLock::new(None),
        }
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for LocalBackend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn initialize(&self, _options: serde_yaml::Mapping) -> Result<(), BackendError> {
        self.state.to_init()
    }

    fn set_rpc_registry(&self, registry: Arc<RpcRegistry>) {
        *self.rpc_registry.write() = Some(registry);
    }

    fn start(&self) -> Result<(), BackendError> {
        self.state.to_start()
    }

    fn subscribe(&self, wrapper: Arc<SubscribeWrapper>) -> bool {
        if self.state.expect_init("subscribe").is_err() {
            return false;
        }
        self.tables
            .write()
            .subscriptions
            .entry(wrapper.topic.clone())
            .or_default()
            .push(wrapper);
        true
    }

    fn register_service_func(&self, wrapper: Arc<ServiceFuncWrapper>) -> bool {
        if self.state.expect_init("register_service_func").is_err() {
            return false;
        }
        self.tables
            .write()
            .services
            .insert(wrapper.method.full(), wrapper);
        true
    }

    fn publish(&self, msg: MessageWrapper) {
        if !self.state.is_started() {
            debug!(topic = %msg.topic, "local publish dropped, backend not started");
            return;
        }

        let tables = self.tables.read();
        let Some(subs) = tables.subscriptions.get(msg.topic.as_ref()) else {
            return;
        };
        for sub in subs {
            if sub.type_name == msg.type_name {
                sub.deliver(msg.clone());
            }
        }
    }

    async fn invoke(
        &self,
        ctx: Arc<RpcContext>,
        method: &str,
        request: Vec<u8>,
    ) -> (Status, Vec<u8>) {
        if !self.state.is_started() {
            return (
                Status::with_message(StatusCode::Unavailable, "local backend not started"),
                Vec::new(),
            );
        }

        let service = {
            let tables = self.tables.read();
            match tables.services.get(method) {
                Some(service) => Arc::clone(service),
                // fall back to the shared registry for handlers other
                // backends registered
                None => {
                    let registry = self.rpc_registry.read();
                    match registry.as_ref().and_then(|r| r.service(method)) {
                        Some(service) => Arc::clone(service),
                        None => {
                            return (
                                Status::with_message(
                                    StatusCode::Unavailable,
                                    format!("no handler for [{method}]"),
                                ),
                                Vec::new(),
                            )
                        }
                    }
                }
            }
        };

        service.invoke(ctx, request).await
    }

    fn shutdown(&self) {
        if self.state.to_shutdown() {
            self.tables.write().subscriptions.clear();
        }
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
