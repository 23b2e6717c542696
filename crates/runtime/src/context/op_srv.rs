// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server-side RPC operators.
//!
//! Every accepted handler shape is normalized to one coroutine form taking
//! the call context and the decoded request and producing `(Status, P)`.

use std::future::Future;
use std::sync::{Arc, Weak};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use em_core::{Adapt, ExecutorRes, Location, MethodName, Service, TypeSupport};
use em_executor::context as exe_context;
use em_executor::Task;
use em_rpc::{RpcContext, RpcDeliveryMode, ServiceFuncWrapper, Status, StatusCode};

use super::{InitError, ModuleContext, ServiceSlot};

/// The normalized handler form.
pub type TypedHandler<Q, P> =
    Arc<dyn Fn(Arc<RpcContext>, Q) -> BoxFuture<'static, (Status, P)> + Send + Sync>;

/// Accepted handler shapes, selected by the marker type parameter:
/// synchronous `Fn(&Q, &mut P) -> Status`, the context-taking variant,
/// the void variant (implicitly OK), and the coroutine variant.
pub trait IntoServerHandler<Q, P, M>: Sized {
    fn into_handler(self) -> TypedHandler<Q, P>;
}

pub mod markers {
    pub struct Blocking;
    pub struct BlockingCtx;
    pub struct BlockingVoid;
    pub struct Coroutine;
}

impl<Q, P, F> IntoServerHandler<Q, P, markers::Blocking> for F
where
    Q: Send + 'static,
    P: Default + Send + 'static,
    F: Fn(&Q, &mut P) -> Status + Send + Sync + 'static,
{
    fn into_handler(self) -> TypedHandler<Q, P> {
        Arc::new(move |_ctx, request| {
            let mut response = P::default();
            let status = self(&request, &mut response);
            async move { (status, response) }.boxed()
        })
    }
}

impl<Q, P, F> IntoServerHandler<Q, P, markers::BlockingCtx> for F
where
    Q: Send + 'static,
    P: Default + Send + 'static,
    F: Fn(&RpcContext, &Q, &mut P) -> Status + Send + Sync + 'static,
{
    fn into_handler(self) -> TypedHandler<Q, P> {
        Arc::new(move |ctx, request| {
            let mut response = P::default();
            let status = self(&ctx, &request, &mut response);
            async move { (status, response) }.boxed()
        })
    }
}

impl<Q, P, F> IntoServerHandler<Q, P, markers::BlockingVoid> for F
where
    Q: Send + 'static,
    P: Default + Send + 'static,
    F: Fn(&Q, &mut P) + Send + Sync + 'static,
{
    fn into_handler(self) -> TypedHandler<Q, P> {
        Arc::new(move |_ctx, request| {
            let mut response = P::default();
            self(&request, &mut response);
            async move { (Status::ok(), response) }.boxed()
        })
    }
}

impl<Q, P, F, Fut> IntoServerHandler<Q, P, markers::Coroutine> for F
where
    Q: Send + 'static,
    P: Send + 'static,
    F: Fn(Arc<RpcContext>, Q) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (Status, P)> + Send + 'static,
{
    fn into_handler(self) -> TypedHandler<Q, P> {
        Arc::new(move |ctx, request| self(ctx, request).boxed())
    }
}

impl ModuleContext {
    /// Bind an RPC server for `(Q, P)` on `method`. Legal only during Init.
    #[track_caller]
    pub fn init_server<Q: Adapt, P: Adapt>(
        self: &Arc<Self>,
        method: &str,
    ) -> Result<Server<Q, P>, InitError> {
        let loc = Location::capture();
        self.expect_init_phase("init_server", loc)?;

        let method = MethodName::parse(method)?;
        let key = format!(
            "srv\u{1}{}\u{1}{}\u{1}{}",
            method.full(),
            TypeSupport::of::<Q::Wire>().type_name(),
            TypeSupport::of::<P::Wire>().type_name()
        );
        let (index, created) = self.alloc_service_slot(&key);
        if created {
            self.services.write().push(ServiceSlot {
                method: method.clone(),
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

        Ok(Server {
            res,
            method,
            ctx: self.self_weak.clone(),
        })
    }

    /// Register a handler that runs on the delivering backend's thread.
    #[track_caller]
    pub fn serve_inline<Q, P, M, H>(
        self: &Arc<Self>,
        srv: &Service<Q, P>,
        handler: H,
    ) -> Result<(), InitError>
    where
        Q: Adapt,
        P: Adapt,
        H: IntoServerHandler<Q, P, M>,
    {
        self.serve_with_mode(srv, RpcDeliveryMode::Inline, handler)
    }

    /// Register a handler re-posted onto the named executor.
    #[track_caller]
    pub fn serve_on<Q, P, M, H>(
        self: &Arc<Self>,
        exe: &ExecutorRes,
        srv: &Service<Q, P>,
        handler: H,
    ) -> Result<(), InitError>
    where
        Q: Adapt,
        P: Adapt,
        H: IntoServerHandler<Q, P, M>,
    {
        let loc = Location::capture();
        let handle = self.executor_handle(exe, loc)?;
        self.serve_with_mode(srv, RpcDeliveryMode::OnExecutor(handle), handler)
    }

    #[track_caller]
    fn serve_with_mode<Q, P, M, H>(
        self: &Arc<Self>,
        srv: &Service<Q, P>,
        mode: RpcDeliveryMode,
        handler: H,
    ) -> Result<(), InitError>
    where
        Q: Adapt,
        P: Adapt,
        H: IntoServerHandler<Q, P, M>,
    {
        let loc = Location::capture();
        self.expect_init_phase("serve", loc)?;
        let index = self.check_binding(srv.name(), srv.binding(), loc)?;

        let method = {
            let services = self.services.read();
            services[index].method.clone()
        };

        let req_support = TypeSupport::of::<Q::Wire>();
        let resp_support = TypeSupport::of::<P::Wire>();
        let typed = handler.into_handler();

        // Erase to the byte-level form the registry carries: decode the
        // request, run the handler as a context-carrying task, encode the
        // response.
        let ctx_weak = self.self_weak.clone();
        let decode_support = req_support.clone();
        let encode_support = resp_support.clone();
        let erased: em_rpc::ErasedHandler = Arc::new(move |rpc_ctx, request_bytes| {
            let Some(ctx) = ctx_weak.upgrade() else {
                return async move {
                    (
                        Status::with_message(StatusCode::Cancelled, "module context gone"),
                        Vec::new(),
                    )
                }
                .boxed();
            };

            let decoded = match decode_support.decode(&request_bytes) {
                Ok(decoded) => decoded,
                Err(err) => {
                    return async move {
                        (
                            Status::with_message(StatusCode::InvalidArg, err.to_string()),
                            Vec::new(),
                        )
                    }
                    .boxed()
                }
            };
            let request = decoded
                .downcast_ref::<Q::Wire>()
                .map(Q::from_wire)
                .and_then(Result::ok);
            let Some(request) = request else {
                return async move { (Status::new(StatusCode::InvalidArg), Vec::new()) }.boxed();
            };

            let mut thread_ctx = ctx.thread_context(exe_context::current().executor);
            thread_ctx.rpc_deadline = rpc_ctx.deadline();

            let typed = Arc::clone(&typed);
            let encode_support = encode_support.clone();
            Task::with_context(thread_ctx, async move {
                let (status, response) = typed(rpc_ctx, request).await;
                if !status.is_ok() {
                    return (status, Vec::new());
                }
                let wire = match response.to_wire() {
                    Ok(wire) => wire,
                    Err(err) => {
                        return (
                            Status::with_message(StatusCode::Internal, err.to_string()),
                            Vec::new(),
                        )
                    }
                };
                match encode_support.encode_value(&wire) {
                    Ok(bytes) => (status, bytes),
                    Err(err) => (
                        Status::with_message(StatusCode::Internal, err.to_string()),
                        Vec::new(),
                    ),
                }
            })
            .boxed()
        });

        self.shared_init.lock().rpc.register_service(
            ServiceFuncWrapper::new(method, req_support, resp_support, mode, erased),
        )?;
        Ok(())
    }
}

/// Operator façade over a bound RPC server.
pub struct Server<Q: Adapt, P: Adapt> {
    res: Service<Q, P>,
    method: MethodName,
    ctx: Weak<ModuleContext>,
}

impl<Q: Adapt, P: Adapt> Server<Q, P> {
    pub fn method(&self) -> &MethodName {
        &self.method
    }

    pub fn service(&self) -> &Service<Q, P> {
        &self.res
    }

    /// Register a handler on the delivering backend's thread. Keep it
    /// light; heavy handlers belong on an executor via `serve_on`.
    #[track_caller]
    pub fn serve_inline<M, H>(&self, handler: H) -> Result<(), InitError>
    where
        H: IntoServerHandler<Q, P, M>,
    {
        let ctx = self.upgrade()?;
        ctx.serve_inline(&self.res, handler)
    }

    /// Register a handler on the named executor.
    #[track_caller]
    pub fn serve_on<M, H>(&self, exe: &ExecutorRes, handler: H) -> Result<(), InitError>
    where
        H: IntoServerHandler<Q, P, M>,
    {
        let ctx = self.upgrade()?;
        ctx.serve_on(exe, &self.res, handler)
    }

    fn upgrade(&self) -> Result<Arc<ModuleContext>, InitError> {
        self.ctx.upgrade().ok_or_else(|| {
            InitError::Misuse(em_core::MisuseError::NoAmbientContext {
                loc: Location::capture(),
            })
        })
    }
}

impl<Q: Adapt, P: Adapt> Clone for Server<Q, P> {
    fn clone(&self) -> Self {
        Self {
            res: self.res.clone(),
            method: self.method.clone(),
            ctx: self.ctx.clone(),
        }
    }
}

impl<Q: Adapt, P: Adapt> std::fmt::Debug for Server<Q, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("method", &self.method.full())
            .finish()
    }
}
