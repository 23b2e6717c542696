// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client-side RPC operators.

use std::sync::{Arc, Weak};

use em_core::{Adapt, Location, MethodName, Service, TypeSupport};
use em_rpc::{ClientFuncWrapper, RpcContext, Status, StatusCode};

use super::{InitError, ModuleContext, ServiceSlot};

impl ModuleContext {
    /// Bind an RPC client for `(Q, P)` on `method`. Legal only during Init.
    #[track_caller]
    pub fn init_client<Q: Adapt, P: Adapt>(
        self: &Arc<Self>,
        method: &str,
    ) -> Result<Client<Q, P>, InitError> {
        let loc = Location::capture();
        self.expect_init_phase("init_client", loc)?;

        let method = MethodName::parse(method)?;
        let req_support = TypeSupport::of::<Q::Wire>();
        let resp_support = TypeSupport::of::<P::Wire>();

        let key = format!(
            "cli\u{1}{}\u{1}{}\u{1}{}",
            method.full(),
            req_support.type_name(),
            resp_support.type_name()
        );
        let (index, created) = self.alloc_service_slot(&key);
        if created {
            self.services.write().push(ServiceSlot {
                method: method.clone(),
            });
            self.shared_init.lock().rpc.register_client(ClientFuncWrapper {
                method: method.clone(),
                req_support,
                resp_support,
            });
        }

        let mut res = Service::new(method.full());
        res.bind(
            em_core::Binding {
                context_id: self.id(),
                index,
            },
            loc,
        )?;

        Ok(Client {
            res,
            method,
            ctx: self.self_weak.clone(),
        })
    }

    /// Issue a call. Per-call failures come back as a `Status`; a misuse of
    /// the descriptor is logged and surfaces as `INVALID_ARG`.
    pub async fn call<Q: Adapt, P: Adapt>(
        &self,
        srv: &Service<Q, P>,
        rpc_ctx: RpcContext,
        request: &Q,
    ) -> (Status, Option<P>) {
        let loc = Location::capture();
        let index = match self.check_binding(srv.name(), srv.binding(), loc) {
            Ok(index) => index,
            Err(err) => {
                tracing::error!(module = %self.name(), error = %err, "call misuse");
                return (Status::new(StatusCode::InvalidArg), None);
            }
        };

        if !rpc_ctx.consume() {
            return (
                Status::with_message(StatusCode::InvalidArg, "rpc context reused across calls"),
                None,
            );
        }

        let method = {
            let services = self.services.read();
            match services.get(index) {
                Some(slot) => slot.method.clone(),
                None => return (Status::new(StatusCode::InvalidArg), None),
            }
        };
        let full = method.full();

        let Some(fabric) = self.fabric.get() else {
            return (
                Status::with_message(StatusCode::Unavailable, "called before start"),
                None,
            );
        };
        if !self.ok() {
            return (Status::new(StatusCode::Cancelled), None);
        }

        let Some(backends) = fabric.rpc.client_backends(&full) else {
            return (
                Status::with_message(StatusCode::Unavailable, format!("no rule for [{full}]")),
                None,
            );
        };

        let wire = match request.to_wire() {
            Ok(wire) => wire,
            Err(err) => {
                return (Status::with_message(StatusCode::InvalidArg, err.to_string()), None)
            }
        };
        let req_support = TypeSupport::of::<Q::Wire>();
        let bytes = match req_support.encode_value(&wire) {
            Ok(bytes) => bytes,
            Err(err) => {
                return (Status::with_message(StatusCode::InvalidArg, err.to_string()), None)
            }
        };

        let chain = match fabric.rpc_filters.chain(fabric.rpc.client_filters(&full)) {
            Ok(chain) => chain,
            Err(_) => Default::default(),
        };
        let Some(bytes) = chain.run_request(&full, bytes) else {
            return (chain.run_response(&full, Status::new(StatusCode::Cancelled)), None);
        };

        let deadline = rpc_ctx.deadline();
        let invocation = fabric
            .hub
            .invoke_on(backends, Arc::new(rpc_ctx), &full, bytes);

        let (status, reply) = match deadline {
            Some(deadline) => {
                match tokio::time::timeout_at(deadline.into(), invocation).await {
                    Ok(result) => result,
                    // expiry drops the in-flight invocation, cancelling it
                    // at the backend
                    Err(_) => (Status::new(StatusCode::Timeout), Vec::new()),
                }
            }
            None => invocation.await,
        };

        let status = chain.run_response(&full, status);
        if !status.is_ok() {
            return (status, None);
        }

        let resp_support = TypeSupport::of::<P::Wire>();
        let decoded = match resp_support.decode(&reply) {
            Ok(decoded) => decoded,
            Err(err) => {
                return (
                    Status::with_message(StatusCode::Internal, err.to_string()),
                    None,
                )
            }
        };
        let Some(wire) = decoded.downcast_ref::<P::Wire>() else {
            return (Status::new(StatusCode::Internal), None);
        };
        match P::from_wire(wire) {
            Ok(value) => (status, Some(value)),
            Err(err) => (
                Status::with_message(StatusCode::Internal, err.to_string()),
                None,
            ),
        }
    }
}

/// Operator façade over a bound RPC client.
pub struct Client<Q: Adapt, P: Adapt> {
    res: Service<Q, P>,
    method: MethodName,
    ctx: Weak<ModuleContext>,
}

impl<Q: Adapt, P: Adapt> Client<Q, P> {
    pub fn method(&self) -> &MethodName {
        &self.method
    }

    pub fn service(&self) -> &Service<Q, P> {
        &self.res
    }

    /// Call with a fresh default context (no deadline).
    pub async fn call(&self, request: &Q) -> (Status, Option<P>) {
        self.call_with(RpcContext::new(), request).await
    }

    /// Call with an explicit context; the context is consumed by the call.
    pub async fn call_with(&self, rpc_ctx: RpcContext, request: &Q) -> (Status, Option<P>) {
        let Some(ctx) = self.ctx.upgrade() else {
            return (
                Status::with_message(StatusCode::Cancelled, "module context gone"),
                None,
            );
        };
        ctx.call(&self.res, rpc_ctx, request).await
    }
}

impl<Q: Adapt, P: Adapt> Clone for Client<Q, P> {
    fn clone(&self) -> Self {
        Self {
            res: self.res.clone(),
            method: self.method.clone(),
            ctx: self.ctx.clone(),
        }
    }
}

impl<Q: Adapt, P: Adapt> std::fmt::Debug for Client<Q, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("method", &self.method.full())
            .finish()
    }
}
