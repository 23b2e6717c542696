// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Method → handler index and client routing rules.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use regex::Regex;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::warn;

use em_core::{MethodName, TypeSupport};
use em_executor::ExecutorHandle;

use crate::context::RpcContext;
use crate::status::{Status, StatusCode};

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("bad method rule [{pattern}]: {source}")]
    BadRule {
        pattern: String,
        source: regex::Error,
    },

    #[error("service [{0}] already has a registered handler")]
    DuplicateMethod(String),

    #[error("no client rule matches method [{0}]")]
    NoBackendMatched(String),
}

/// Where a server handler runs.
#[derive(Clone)]
pub enum RpcDeliveryMode {
    /// On the delivering backend's thread.
    Inline,
    /// Re-posted onto a named executor.
    OnExecutor(ExecutorHandle),
}

impl std::fmt::Debug for RpcDeliveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inline => f.write_str("Inline"),
            Self::OnExecutor(exe) => write!(f, "OnExecutor({})", exe.name()),
        }
    }
}

/// Byte-level server handler, normalized from every accepted typed variant.
pub type ErasedHandler = Arc<
    dyn Fn(Arc<RpcContext>, Vec<u8>) -> BoxFuture<'static, (Status, Vec<u8>)> + Send + Sync,
>;

/// The framework-owned server side of one method.
#[derive(Clone)]
pub struct ServiceFuncWrapper {
    pub method: MethodName,
    pub req_support: TypeSupport,
    pub resp_support: TypeSupport,
    pub mode: RpcDeliveryMode,
    handler: ErasedHandler,
}

impl ServiceFuncWrapper {
    pub fn new(
        method: MethodName,
        req_support: TypeSupport,
        resp_support: TypeSupport,
        mode: RpcDeliveryMode,
        handler: ErasedHandler,
    ) -> Self {
        Self {
            method,
            req_support,
            resp_support,
            mode,
            handler,
        }
    }

    /// Invoke the handler, honoring the delivery mode. On-executor handlers
    /// are re-posted; the future resolves when the handler replies.
    pub fn invoke(
        &self,
        ctx: Arc<RpcContext>,
        request: Vec<u8>,
    ) -> BoxFuture<'static, (Status, Vec<u8>)> {
        match &self.mode {
            RpcDeliveryMode::Inline => (self.handler)(ctx, request),
            RpcDeliveryMode::OnExecutor(exe) => {
                let handler = Arc::clone(&self.handler);
                let (tx, rx) = oneshot::channel();
                exe.post_detached(async move {
                    let reply = handler(ctx, request).await;
                    if tx.send(reply).is_err() {
                        warn!("rpc reply dropped, caller went away");
                    }
                });
                Box::pin(async move {
                    rx.await.unwrap_or_else(|_| {
                        (
                            Status::with_message(StatusCode::Cancelled, "handler executor stopped"),
                            Vec::new(),
                        )
                    })
                })
            }
        }
    }
}

impl std::fmt::Debug for ServiceFuncWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceFuncWrapper")
            .field("method", &self.method.full())
            .field("mode", &self.mode)
            .finish()
    }
}

/// Client registration: tells backends which types travel on a method.
#[derive(Debug, Clone)]
pub struct ClientFuncWrapper {
    pub method: MethodName,
    pub req_support: TypeSupport,
    pub resp_support: TypeSupport,
}

#[derive(Debug)]
struct ClientRule {
    pattern: Regex,
    backends: Vec<String>,
    filters: Vec<String>,
}

#[derive(Default)]
pub struct RpcRegistryBuilder {
    client_rules: Vec<ClientRule>,
    services: HashMap<String, Arc<ServiceFuncWrapper>>,
    clients: Vec<ClientFuncWrapper>,
}

impl RpcRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `(method_regex, backends)` client routing rule; exact names
    /// behave as `^literal$` through anchoring, as on the channel side.
    pub fn add_client_rule(
        &mut self,
        func_rule: &str,
        backends: Vec<String>,
        filters: Vec<String>,
    ) -> Result<(), RpcError> {
        let pattern =
            Regex::new(&format!("^(?:{func_rule})$")).map_err(|source| RpcError::BadRule {
                pattern: func_rule.to_owned(),
                source,
            })?;
        self.client_rules.push(ClientRule {
            pattern,
            backends,
            filters,
        });
        Ok(())
    }

    pub fn register_service(&mut self, wrapper: ServiceFuncWrapper) -> Result<(), RpcError> {
        let full = wrapper.method.full();
        if self.services.contains_key(&full) {
            return Err(RpcError::DuplicateMethod(full));
        }
        self.services.insert(full, Arc::new(wrapper));
        Ok(())
    }

    pub fn register_client(&mut self, wrapper: ClientFuncWrapper) {
        self.clients.push(wrapper);
    }

    pub fn freeze(self) -> Arc<RpcRegistry> {
        Arc::new(RpcRegistry {
            client_rules: self.client_rules,
            services: self.services,
            clients: self.clients,
        })
    }
}

/// Read-only dispatch state shared with backends for Start..PreShutdown.
pub struct RpcRegistry {
    client_rules: Vec<ClientRule>,
    services: HashMap<String, Arc<ServiceFuncWrapper>>,
    clients: Vec<ClientFuncWrapper>,
}

impl RpcRegistry {
    /// The single registered handler of a method, by full wire name.
    pub fn service(&self, method_full: &str) -> Option<&Arc<ServiceFuncWrapper>> {
        self.services.get(method_full)
    }

    pub fn services(&self) -> impl Iterator<Item = &Arc<ServiceFuncWrapper>> {
        self.services.values()
    }

    pub fn clients(&self) -> &[ClientFuncWrapper] {
        &self.clients
    }

    pub fn client_backends(&self, method_full: &str) -> Option<&[String]> {
        self.client_rules
            .iter()
            .find(|rule| rule.pattern.is_match(method_full))
            .map(|rule| rule.backends.as_slice())
    }

    pub fn client_filters(&self, method_full: &str) -> &[String] {
        self.client_rules
            .iter()
            .find(|rule| rule.pattern.is_match(method_full))
            .map(|rule| rule.filters.as_slice())
            .unwrap_or(&[])
    }
}

impl std::fmt::Debug for RpcRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcRegistry")
            .field("services", &self.services.len())
            .field("clients", &self.clients.len())
            .field("client_rules", &self.client_rules.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
