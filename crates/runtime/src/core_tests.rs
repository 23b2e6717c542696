// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::context::{Client, ModuleContext, Publisher, Subscriber};
use crate::module::{Module, ModuleCfg, ModuleInfo, NamedModule};
use crate::resource::ResourceHandle;
use crate::testing;
use em_core::WireMessage;
use em_rpc::{RpcContext, Status, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Num {
    v: u64,
}

impl WireMessage for Num {
    fn type_name() -> &'static str {
        "em.test.Num"
    }
}

fn test_runtime() -> tokio::runtime::Runtime {
    #[allow(clippy::unwrap_used)]
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

// ---- publish/subscribe over the local loop ----

struct Talker {
    publisher: Arc<parking_lot::Mutex<Option<Publisher<Num>>>>,
    hidden: Arc<parking_lot::Mutex<Option<Publisher<Num>>>>,
}

impl Module for Talker {
    fn info(&self) -> ModuleInfo {
        ModuleInfo::named("talker")
    }

    fn on_configure(&mut self, cfg: &mut ModuleCfg) {
        cfg.declare_pub_topic("/t");
        // note: /hidden is deliberately NOT declared, so no publish rule
        // will match it
    }

    fn on_initialize(&mut self, ctx: &Arc<ModuleContext>) -> bool {
        let Ok(publisher) = ctx.init_publisher::<Num>("/t") else {
            return false;
        };
        let Ok(hidden) = ctx.init_publisher::<Num>("/hidden") else {
            return false;
        };
        *self.publisher.lock() = Some(publisher);
        *self.hidden.lock() = Some(hidden);
        true
    }

    fn on_start(&mut self, _ctx: &Arc<ModuleContext>) -> bool {
        true
    }

    fn on_shutdown(&mut self, _ctx: &Arc<ModuleContext>) {}
}

struct Listener {
    seen: Arc<parking_lot::Mutex<Vec<u64>>>,
}

impl Module for Listener {
    fn info(&self) -> ModuleInfo {
        ModuleInfo::named("listener")
    }

    fn on_configure(&mut self, cfg: &mut ModuleCfg) {
        cfg.declare_sub_topic("/t");
    }

    fn on_initialize(&mut self, ctx: &Arc<ModuleContext>) -> bool {
        let Ok(subscriber) = ctx.init_subscriber::<Num>("/t") else {
            return false;
        };
        let seen = Arc::clone(&self.seen);
        subscriber
            .subscribe_inline(move |msg: Num| {
                seen.lock().push(msg.v);
            })
            .is_ok()
    }

    fn on_start(&mut self, _ctx: &Arc<ModuleContext>) -> bool {
        true
    }

    fn on_shutdown(&mut self, _ctx: &Arc<ModuleContext>) {}
}

#[test]
fn local_loop_delivers_in_sequence() {
    let publisher = Arc::new(parking_lot::Mutex::new(None));
    let hidden = Arc::new(parking_lot::Mutex::new(None));
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

    let modules = vec![
        NamedModule::from_module(Box::new(Talker {
            publisher: Arc::clone(&publisher),
            hidden: Arc::clone(&hidden),
        })),
        NamedModule::from_module(Box::new(Listener {
            seen: Arc::clone(&seen),
        })),
    ];

    testing::run_started(modules, |_core| {
        let guard = publisher.lock();
        let publisher = guard.as_ref().unwrap();
        for v in 0..100 {
            publisher.publish(&Num { v });
        }

        // a topic matching no publish rule produces zero deliveries
        let hidden_guard = hidden.lock();
        let hidden = hidden_guard.as_ref().unwrap();
        for v in 0..10 {
            hidden.publish(&Num { v });
        }
    })
    .unwrap();

    assert_eq!(*seen.lock(), (0..100).collect::<Vec<_>>());
}

#[test]
fn publish_after_shutdown_is_a_noop() {
    let publisher = Arc::new(parking_lot::Mutex::new(None));
    let hidden = Arc::new(parking_lot::Mutex::new(None));
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

    let modules = vec![
        NamedModule::from_module(Box::new(Talker {
            publisher: Arc::clone(&publisher),
            hidden: Arc::clone(&hidden),
        })),
        NamedModule::from_module(Box::new(Listener {
            seen: Arc::clone(&seen),
        })),
    ];

    let mut core = testing::local_core(modules).unwrap();
    core.start().unwrap();
    core.shutdown();

    let guard = publisher.lock();
    let publisher = guard.as_ref().unwrap();
    publisher.publish(&Num { v: 7 });
    assert!(seen.lock().is_empty());
}

// ---- rpc over the local loop ----

struct AddServer;

impl Module for AddServer {
    fn info(&self) -> ModuleInfo {
        ModuleInfo::named("add_server")
    }

    fn on_configure(&mut self, cfg: &mut ModuleCfg) {
        cfg.declare_server_func("pb:/add");
    }

    fn on_initialize(&mut self, ctx: &Arc<ModuleContext>) -> bool {
        let Ok(server) = ctx.init_server::<Num, Num>("pb:/add") else {
            return false;
        };
        server
            .serve_inline(|q: &Num, p: &mut Num| {
                p.v = q.v + 1;
                Status::ok()
            })
            .is_ok()
    }

    fn on_start(&mut self, _ctx: &Arc<ModuleContext>) -> bool {
        true
    }

    fn on_shutdown(&mut self, _ctx: &Arc<ModuleContext>) {}
}

struct SlowServer;

impl Module for SlowServer {
    fn info(&self) -> ModuleInfo {
        ModuleInfo::named("slow_server")
    }

    fn on_configure(&mut self, cfg: &mut ModuleCfg) {
        cfg.declare_server_func("pb:/slow");
    }

    fn on_initialize(&mut self, ctx: &Arc<ModuleContext>) -> bool {
        let Ok(server) = ctx.init_server::<Num, Num>("pb:/slow") else {
            return false;
        };
        server
            .serve_inline(|_ctx: Arc<RpcContext>, _q: Num| async move {
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

struct Caller {
    add: Arc<parking_lot::Mutex<Option<Client<Num, Num>>>>,
    slow: Arc<parking_lot::Mutex<Option<Client<Num, Num>>>>,
}

impl Module for Caller {
    fn info(&self) -> ModuleInfo {
        ModuleInfo::named("caller")
    }

    fn on_configure(&mut self, cfg: &mut ModuleCfg) {
        cfg.declare_client_func("pb:/add");
        cfg.declare_client_func("pb:/slow");
    }

    fn on_initialize(&mut self, ctx: &Arc<ModuleContext>) -> bool {
        match (
            ctx.init_client::<Num, Num>("pb:/add"),
            ctx.init_client::<Num, Num>("pb:/slow"),
        ) {
            (Ok(add), Ok(slow)) => {
                *self.add.lock() = Some(add);
                *self.slow.lock() = Some(slow);
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

fn rpc_modules(
    add: &Arc<parking_lot::Mutex<Option<Client<Num, Num>>>>,
    slow: &Arc<parking_lot::Mutex<Option<Client<Num, Num>>>>,
) -> Vec<NamedModule> {
    vec![
        NamedModule::from_module(Box::new(AddServer)),
        NamedModule::from_module(Box::new(SlowServer)),
        NamedModule::from_module(Box::new(Caller {
            add: Arc::clone(add),
            slow: Arc::clone(slow),
        })),
    ]
}

#[test]
fn rpc_call_returns_ok_and_the_reply() {
    let add = Arc::new(parking_lot::Mutex::new(None));
    let slow = Arc::new(parking_lot::Mutex::new(None));

    testing::run_started(rpc_modules(&add, &slow), |_core| {
        let runtime = test_runtime();
        let guard = add.lock();
        let client = guard.as_ref().unwrap();
        let (status, reply) = runtime.block_on(client.call(&Num { v: 41 }));
        assert!(status.is_ok(), "status was {status}");
        assert_eq!(reply, Some(Num { v: 42 }));
    })
    .unwrap();
}

#[test]
fn rpc_deadline_expires_with_timeout_status() {
    let add = Arc::new(parking_lot::Mutex::new(None));
    let slow = Arc::new(parking_lot::Mutex::new(None));

    testing::run_started(rpc_modules(&add, &slow), |_core| {
        let runtime = test_runtime();
        let guard = slow.lock();
        let client = guard.as_ref().unwrap();

        let started = Instant::now();
        let (status, reply) = runtime.block_on(
            client.call_with(RpcContext::with_timeout(Duration::from_millis(100)), &Num { v: 1 }),
        );
        let elapsed = started.elapsed();

        assert_eq!(status.code(), StatusCode::Timeout);
        assert!(reply.is_none());
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(1000), "took {elapsed:?}");
    })
    .unwrap();
}

#[test]
fn reused_rpc_context_is_invalid_arg() {
    let add = Arc::new(parking_lot::Mutex::new(None));
    let slow = Arc::new(parking_lot::Mutex::new(None));

    testing::run_started(rpc_modules(&add, &slow), |_core| {
        let runtime = test_runtime();
        let guard = add.lock();
        let client = guard.as_ref().unwrap();

        let rpc_ctx = RpcContext::new();
        assert!(rpc_ctx.consume());
        let (status, _reply) = runtime.block_on(client.call_with(rpc_ctx, &Num { v: 1 }));
        assert_eq!(status.code(), StatusCode::InvalidArg);
    })
    .unwrap();
}

// ---- lifecycle behavior ----

struct Idle;

impl Module for Idle {
    fn info(&self) -> ModuleInfo {
        ModuleInfo::named("idle")
    }

    fn on_initialize(&mut self, _ctx: &Arc<ModuleContext>) -> bool {
        true
    }

    fn on_start(&mut self, _ctx: &Arc<ModuleContext>) -> bool {
        true
    }

    fn on_shutdown(&mut self, _ctx: &Arc<ModuleContext>) {}
}

#[test]
fn hooks_fire_in_lifecycle_order() {
    use crate::lifecycle::{Edge, Stage, State, Subsystem};

    let mut core = {
        let mut cfg = em_config::Cfg::new();
        cfg.with_default_local();
        let processor = em_config::Processor::new(cfg);
        Core::new(
            processor.effective().unwrap().typed,
            vec![NamedModule::from_module(Box::new(Idle))],
        )
        .unwrap()
    };

    let trace = Arc::new(parking_lot::Mutex::new(Vec::new()));
    for state in [
        State::stage_boundary(Stage::Init, Edge::Pre),
        State::of(Stage::Init, Edge::Pre, Subsystem::Modules),
        State::stage_boundary(Stage::Start, Edge::Post),
        State::of(Stage::Shutdown, Edge::Pre, Subsystem::Modules),
    ] {
        let trace = Arc::clone(&trace);
        core.register_hook(state, move || {
            trace.lock().push(state.to_string());
            Ok(())
        });
    }

    core.initialize().unwrap();
    core.start().unwrap();
    core.shutdown();

    assert_eq!(
        *trace.lock(),
        vec![
            "pre_init",
            "pre_init_modules",
            "post_start",
            "pre_shutdown_modules"
        ]
    );
}

#[test]
fn failing_hook_aborts_startup_and_tears_down() {
    use crate::lifecycle::{Edge, Stage, State};

    let mut cfg = em_config::Cfg::new();
    cfg.with_default_local();
    let processor = em_config::Processor::new(cfg);
    let mut core = Core::new(
        processor.effective().unwrap().typed,
        vec![NamedModule::from_module(Box::new(Idle))],
    )
    .unwrap();

    core.register_hook(State::stage_boundary(Stage::Init, Edge::Pre), || {
        Err("refused".to_owned())
    });

    let err = core.initialize().unwrap_err();
    assert!(matches!(err, CoreError::Hook { .. }));
}

struct FailsInit;

impl Module for FailsInit {
    fn info(&self) -> ModuleInfo {
        ModuleInfo::named("fails_init")
    }

    fn on_initialize(&mut self, _ctx: &Arc<ModuleContext>) -> bool {
        false
    }

    fn on_start(&mut self, _ctx: &Arc<ModuleContext>) -> bool {
        true
    }

    fn on_shutdown(&mut self, _ctx: &Arc<ModuleContext>) {}
}

#[test]
fn module_init_failure_aborts() {
    let err = testing::local_core(vec![NamedModule::from_module(Box::new(FailsInit))])
        .unwrap_err();
    assert!(matches!(err, CoreError::ModuleInit(name) if name == "fails_init"));
}

#[test]
fn shutdown_cancels_inflight_sleeps_promptly() {
    struct LongSleeper {
        exe: Arc<parking_lot::Mutex<Option<em_core::ExecutorRes>>>,
    }

    impl Module for LongSleeper {
        fn info(&self) -> ModuleInfo {
            ModuleInfo::named("long_sleeper")
        }

        fn on_configure(&mut self, cfg: &mut ModuleCfg) {
            cfg.declare_executor(&em_core::ExecutorRes::with_options(
                "long_work",
                em_core::ExecutorOptions { thread_num: 1 },
            ));
        }

        fn on_initialize(&mut self, ctx: &Arc<ModuleContext>) -> bool {
            match ctx.init_executor("long_work") {
                Ok(res) => {
                    *self.exe.lock() = Some(res);
                    true
                }
                Err(_) => false,
            }
        }

        fn on_start(&mut self, ctx: &Arc<ModuleContext>) -> bool {
            let guard = self.exe.lock();
            let Some(res) = guard.as_ref() else {
                return false;
            };
            let Ok(op) = ctx.exe(res) else {
                return false;
            };
            op.post(async {
                crate::ctx::sleep(Duration::from_secs(60)).await;
            });
            true
        }

        fn on_shutdown(&mut self, _ctx: &Arc<ModuleContext>) {}
    }

    let exe = Arc::new(parking_lot::Mutex::new(None));
    let mut core = testing::local_core(vec![NamedModule::from_module(Box::new(
        LongSleeper { exe },
    ))])
    .unwrap();
    core.start().unwrap();

    let started = Instant::now();
    core.shutdown();
    assert!(started.elapsed() < Duration::from_secs(10));
}

// ---- framework-driven binding of declared resources ----

struct DeclaredPair {
    // the declared publisher handle, exported for the test to publish on
    publisher_out: Arc<parking_lot::Mutex<Option<ResourceHandle<Publisher<Num>>>>>,
    subscriber: ResourceHandle<Subscriber<Num>>,
    seen: Arc<parking_lot::Mutex<Vec<u64>>>,
}

impl Module for DeclaredPair {
    fn info(&self) -> ModuleInfo {
        ModuleInfo::named("declared_pair")
    }

    fn on_configure(&mut self, cfg: &mut ModuleCfg) {
        *self.publisher_out.lock() = Some(cfg.declare_publisher::<Num>("/declared"));
        self.subscriber = cfg.declare_subscriber::<Num>("/declared");
    }

    fn on_initialize(&mut self, _ctx: &Arc<ModuleContext>) -> bool {
        // the framework bound the declared resources before this ran
        let Some(subscriber) = self.subscriber.get() else {
            return false;
        };
        let seen = Arc::clone(&self.seen);
        subscriber
            .subscribe_inline(move |msg: Num| {
                seen.lock().push(msg.v);
            })
            .is_ok()
    }

    fn on_start(&mut self, _ctx: &Arc<ModuleContext>) -> bool {
        true
    }

    fn on_shutdown(&mut self, _ctx: &Arc<ModuleContext>) {}
}

#[test]
fn declared_resources_are_bound_before_initialize() {
    let publisher_out = Arc::new(parking_lot::Mutex::new(None));
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

    let mut core = testing::local_core(vec![NamedModule::from_module(Box::new(
        DeclaredPair {
            publisher_out: Arc::clone(&publisher_out),
            subscriber: ResourceHandle::default(),
            seen: Arc::clone(&seen),
        },
    ))])
    .unwrap();
    core.start().unwrap();

    let handle = publisher_out
        .lock()
        .clone()
        .expect("declared during configure");
    let bound = handle.get().expect("publisher bound by the framework");
    for v in 0..5 {
        bound.publish(&Num { v });
    }
    core.shutdown();

    assert_eq!(*seen.lock(), vec![0, 1, 2, 3, 4]);
}
