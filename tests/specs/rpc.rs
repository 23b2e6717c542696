// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RPC specs: OK round trip and deadline expiry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use em_rpc::{RpcContext, Status, StatusCode};
use em_runtime::{Client, Module, ModuleCfg, ModuleContext, ModuleInfo, NamedModule};

use crate::prelude::*;

struct Increment;

impl Module for Increment {
    fn info(&self) -> ModuleInfo {
        ModuleInfo::named("increment")
    }

    fn on_configure(&mut self, cfg: &mut ModuleCfg) {
        cfg.declare_server_func("m");
    }

    fn on_initialize(&mut self, ctx: &Arc<ModuleContext>) -> bool {
        let Ok(server) = ctx.init_server::<Num, Num>("m") else {
            return false;
        };
        server
            .serve_inline(|req: &Num, resp: &mut Num| {
                resp.v = req.v + 1;
                Status::ok()
            })
            .is_ok()
    }

    fn on_start(&mut self, _ctx: &Arc<ModuleContext>) -> bool {
        true
    }

    fn on_shutdown(&mut self, _ctx: &Arc<ModuleContext>) {}
}

struct Napper;

impl Module for Napper {
    fn info(&self) -> ModuleInfo {
        ModuleInfo::named("napper")
    }

    fn on_configure(&mut self, cfg: &mut ModuleCfg) {
        cfg.declare_server_func("nap");
    }

    fn on_initialize(&mut self, ctx: &Arc<ModuleContext>) -> bool {
        let Ok(server) = ctx.init_server::<Num, Num>("nap") else {
            return false;
        };
        server
            .serve_inline(|_ctx: Arc<RpcContext>, _req: Num| async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                (Status::ok(), Num { v: 0 })
            })
            .is_ok()
    }

    fn on_start(&mut self, _ctx: &Arc<ModuleContext>) -> bool {
        true
    }

    fn on_shutdown(&mut self, _ctx: &Arc<ModuleContext>) {}
}

struct Requester {
    increment: Shared<Option<Client<Num, Num>>>,
    nap: Shared<Option<Client<Num, Num>>>,
}

impl Module for Requester {
    fn info(&self) -> ModuleInfo {
        ModuleInfo::named("requester")
    }

    fn on_configure(&mut self, cfg: &mut ModuleCfg) {
        cfg.declare_client_func("m");
        cfg.declare_client_func("nap");
    }

    fn on_initialize(&mut self, ctx: &Arc<ModuleContext>) -> bool {
        match (
            ctx.init_client::<Num, Num>("m"),
            ctx.init_client::<Num, Num>("nap"),
        ) {
            (Ok(increment), Ok(nap)) => {
                *self.increment.lock() = Some(increment);
                *self.nap.lock() = Some(nap);
                true
            }
            _ => false,
        }
    }

    fn on_start(&mut self, _ctx: &Arc<ModuleContext>) -> bool {
        true
    }

    fn on_shutdown(&mut self, _ctx: &Arc<ModuleContext>) {}
}

fn started_core(
    increment: &Shared<Option<Client<Num, Num>>>,
    nap: &Shared<Option<Client<Num, Num>>>,
) -> em_runtime::Core {
    let mut core = build_core(
        |_cfg| {},
        vec![
            NamedModule::from_module(Box::new(Increment)),
            NamedModule::from_module(Box::new(Napper)),
            NamedModule::from_module(Box::new(Requester {
                increment: Arc::clone(increment),
                nap: Arc::clone(nap),
            })),
        ],
    );
    core.start().unwrap();
    core
}

/// Scenario: bind client and server on "m"; server replies with v + 1.
#[test]
fn call_round_trips_with_ok() {
    let increment = shared();
    let nap = shared();
    let mut core = started_core(&increment, &nap);

    let (status, reply) = {
        let guard = increment.lock();
        let client = guard.as_ref().unwrap();
        block_on(client.call(&Num { v: 41 }))
    };
    core.shutdown();

    assert!(status.is_ok(), "status was {status}");
    assert_eq!(reply, Some(Num { v: 42 }));
}

/// Scenario: the server naps 5 s, the client allows 100 ms; the call comes
/// back with TIMEOUT once the deadline passes, not when the server wakes.
#[test]
fn deadline_expiry_returns_timeout() {
    let increment = shared();
    let nap = shared();
    let mut core = started_core(&increment, &nap);

    let started = Instant::now();
    let (status, reply) = {
        let guard = nap.lock();
        let client = guard.as_ref().unwrap();
        block_on(client.call_with(
            RpcContext::with_timeout(Duration::from_millis(100)),
            &Num { v: 1 },
        ))
    };
    let elapsed = started.elapsed();
    core.shutdown();

    assert_eq!(status.code(), StatusCode::Timeout);
    assert!(reply.is_none());
    assert!(elapsed >= Duration::from_millis(100), "took {elapsed:?}");
    assert!(elapsed <= Duration::from_millis(1000), "took {elapsed:?}");
}

/// Methods declared without a prefix normalize to `pb:/`; the same path
/// under a different prefix is a distinct method.
#[test]
fn method_names_normalize_and_do_not_alias() {
    use em_rpc::MethodName;

    assert_eq!(MethodName::parse("m").unwrap().full(), "pb:/m");
    assert_ne!(
        MethodName::parse("pb:/m").unwrap(),
        MethodName::parse("ros2:/m").unwrap()
    );
}
