// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle specs: descriptor invariants, phase gating, cancellation
//! liveness.

use std::sync::Arc;
use std::time::{Duration, Instant};

use em_runtime::{ctx, Module, ModuleCfg, ModuleContext, ModuleInfo, NamedModule, Publisher};

use crate::prelude::*;

struct Inspector {
    binding_ok: Shared<Option<bool>>,
    publisher: Shared<Option<Publisher<Seq>>>,
}

impl Module for Inspector {
    fn info(&self) -> ModuleInfo {
        ModuleInfo::named("inspector")
    }

    fn on_configure(&mut self, cfg: &mut ModuleCfg) {
        cfg.declare_pub_topic("/inspect");
    }

    fn on_initialize(&mut self, context: &Arc<ModuleContext>) -> bool {
        let Ok(publisher) = context.init_publisher::<Seq>("/inspect") else {
            return false;
        };

        // every bound descriptor carries this context's id and a slot
        // inside the registry
        let binding = publisher.channel().binding();
        let holds = binding
            .map(|b| b.context_id == context.id() && b.index < context.registry_size())
            .unwrap_or(false);
        *self.binding_ok.lock() = Some(holds);
        *self.publisher.lock() = Some(publisher);
        true
    }

    fn on_start(&mut self, _ctx: &Arc<ModuleContext>) -> bool {
        true
    }

    fn on_shutdown(&mut self, _ctx: &Arc<ModuleContext>) {}
}

#[test]
fn bound_descriptors_satisfy_the_registry_invariant() {
    let binding_ok = shared();
    let publisher = shared();

    let mut core = build_core(
        |_cfg| {},
        vec![NamedModule::from_module(Box::new(Inspector {
            binding_ok: Arc::clone(&binding_ok),
            publisher: Arc::clone(&publisher),
        }))],
    );
    assert_eq!(*binding_ok.lock(), Some(true));
    core.shutdown();
}

/// Publishing between Init and Start must be a silent success; a counting
/// subscriber on the same topic must see nothing from that window.
struct EarlyBird {
    publisher: Shared<Option<Publisher<Seq>>>,
    seen: Shared<Vec<u64>>,
}

impl Module for EarlyBird {
    fn info(&self) -> ModuleInfo {
        ModuleInfo::named("early_bird")
    }

    fn on_configure(&mut self, cfg: &mut ModuleCfg) {
        cfg.declare_pub_topic("/early");
        cfg.declare_sub_topic("/early");
    }

    fn on_initialize(&mut self, context: &Arc<ModuleContext>) -> bool {
        let Ok(publisher) = context.init_publisher::<Seq>("/early") else {
            return false;
        };

        let Ok(subscriber) = context.init_subscriber::<Seq>("/early") else {
            return false;
        };
        let seen = Arc::clone(&self.seen);
        if subscriber
            .subscribe_inline(move |msg: Seq| {
                seen.lock().push(msg.seq);
            })
            .is_err()
        {
            return false;
        }

        // still initializing: this publish must succeed and deliver nothing
        publisher.publish(&Seq { seq: 99 });
        *self.publisher.lock() = Some(publisher);
        true
    }

    fn on_start(&mut self, _ctx: &Arc<ModuleContext>) -> bool {
        true
    }

    fn on_shutdown(&mut self, _ctx: &Arc<ModuleContext>) {}
}

#[test]
fn publish_outside_start_window_is_a_noop() {
    let publisher = shared();
    let seen = shared::<Vec<u64>>();

    let mut core = build_core(
        |_cfg| {},
        vec![NamedModule::from_module(Box::new(EarlyBird {
            publisher: Arc::clone(&publisher),
            seen: Arc::clone(&seen),
        }))],
    );
    core.start().unwrap();
    assert!(seen.lock().is_empty());

    {
        let guard = publisher.lock();
        guard.as_ref().unwrap().publish(&Seq { seq: 1 });
    }
    core.shutdown();
    assert_eq!(*seen.lock(), vec![1]);

    // after shutdown: success, no delivery
    let guard = publisher.lock();
    guard.as_ref().unwrap().publish(&Seq { seq: 2 });
    assert_eq!(*seen.lock(), vec![1]);
}

/// Cancellation liveness: an in-flight sleep far longer than the shutdown
/// window returns promptly once shutdown is requested.
struct DeepSleeper {
    exe: Shared<Option<em_core::ExecutorRes>>,
    woke_after: Shared<Option<Duration>>,
}

impl Module for DeepSleeper {
    fn info(&self) -> ModuleInfo {
        ModuleInfo::named("deep_sleeper")
    }

    fn on_configure(&mut self, cfg: &mut ModuleCfg) {
        cfg.declare_executor(&em_core::ExecutorRes::with_options(
            "deep_work",
            em_core::ExecutorOptions { thread_num: 1 },
        ));
    }

    fn on_initialize(&mut self, context: &Arc<ModuleContext>) -> bool {
        match context.init_executor("deep_work") {
            Ok(res) => {
                *self.exe.lock() = Some(res);
                true
            }
            Err(_) => false,
        }
    }

    fn on_start(&mut self, context: &Arc<ModuleContext>) -> bool {
        let guard = self.exe.lock();
        let Some(res) = guard.as_ref() else {
            return false;
        };
        let Ok(op) = context.exe(res) else {
            return false;
        };
        let woke_after = Arc::clone(&self.woke_after);
        op.post(async move {
            let started = Instant::now();
            ctx::sleep(Duration::from_secs(600)).await;
            *woke_after.lock() = Some(started.elapsed());
        });
        true
    }

    fn on_shutdown(&mut self, _ctx: &Arc<ModuleContext>) {}
}

#[test]
fn shutdown_wakes_sleepers_within_the_window() {
    let exe = shared();
    let woke_after = shared();

    let mut core = build_core(
        |_cfg| {},
        vec![NamedModule::from_module(Box::new(DeepSleeper {
            exe: Arc::clone(&exe),
            woke_after: Arc::clone(&woke_after),
        }))],
    );
    core.start().unwrap();
    std::thread::sleep(Duration::from_millis(50));

    let requested = Instant::now();
    core.shutdown();
    assert!(requested.elapsed() < Duration::from_secs(10));

    let woke = woke_after.lock().expect("sleeper must have woken");
    assert!(woke < Duration::from_secs(30), "slept {woke:?}");
}
