// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! em-demo: a ping/pong pair over the local backend.
//!
//! Ping publishes a counter at 1 Hz and asks the pong module for its tally
//! over RPC; pong counts deliveries inline and serves the tally. Both sides
//! declare their resources during Configure and receive them bound.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::info;

use em_app::{run, AppOptions};
use em_core::{ExecutorOptions, ExecutorRes, WireMessage};
use em_rpc::Status;
use em_runtime::{
    ctx, Client, Module, ModuleCfg, ModuleContext, ModuleInfo, NamedModule, Publisher,
    ResourceHandle, Server, Subscriber,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Ball {
    seq: u64,
}

impl WireMessage for Ball {
    fn type_name() -> &'static str {
        "em.demo.Ball"
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TallyReq {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TallyResp {
    count: u64,
}

impl WireMessage for TallyReq {
    fn type_name() -> &'static str {
        "em.demo.TallyReq"
    }
}

impl WireMessage for TallyResp {
    fn type_name() -> &'static str {
        "em.demo.TallyResp"
    }
}

const BALL_TOPIC: &str = "/demo/ball";
const TALLY_METHOD: &str = "pb:/demo/tally";
const PING_EXECUTOR: &str = "ping_loop";

#[derive(Default)]
struct PingModule {
    exe: ResourceHandle<ExecutorRes>,
    publisher: ResourceHandle<Publisher<Ball>>,
    client: ResourceHandle<Client<TallyReq, TallyResp>>,
}

impl Module for PingModule {
    fn info(&self) -> ModuleInfo {
        ModuleInfo::named("ping")
    }

    fn on_configure(&mut self, cfg: &mut ModuleCfg) {
        self.exe = cfg.declare_executor(&ExecutorRes::with_options(
            PING_EXECUTOR,
            ExecutorOptions { thread_num: 1 },
        ));
        self.publisher = cfg.declare_publisher::<Ball>(BALL_TOPIC);
        self.client = cfg.declare_client::<TallyReq, TallyResp>(TALLY_METHOD);
    }

    fn on_initialize(&mut self, _ctx: &Arc<ModuleContext>) -> bool {
        // declared resources are already bound
        true
    }

    fn on_start(&mut self, context: &Arc<ModuleContext>) -> bool {
        let (Some(exe), Some(publisher), Some(client)) = (
            self.exe.get(),
            self.publisher.get(),
            self.client.get(),
        ) else {
            return false;
        };
        let Ok(op) = context.exe(&exe) else {
            return false;
        };

        op.post(async move {
            let mut pacer = ctx::Loop::from_hz(1);
            let mut seq = 0u64;
            while pacer.ok().await {
                publisher.publish(&Ball { seq });
                seq += 1;

                let (status, reply) = client.call(&TallyReq {}).await;
                if status.is_ok() {
                    if let Some(reply) = reply {
                        info!(tally = reply.count, sent = seq, "pong has seen");
                    }
                }
            }
        });
        true
    }

    fn on_shutdown(&mut self, _ctx: &Arc<ModuleContext>) {}
}

#[derive(Default)]
struct PongModule {
    subscriber: ResourceHandle<Subscriber<Ball>>,
    server: ResourceHandle<Server<TallyReq, TallyResp>>,
    received: Arc<AtomicU64>,
}

impl Module for PongModule {
    fn info(&self) -> ModuleInfo {
        ModuleInfo::named("pong")
    }

    fn on_configure(&mut self, cfg: &mut ModuleCfg) {
        self.subscriber = cfg.declare_subscriber::<Ball>(BALL_TOPIC);
        self.server = cfg.declare_server::<TallyReq, TallyResp>(TALLY_METHOD);
    }

    fn on_initialize(&mut self, _ctx: &Arc<ModuleContext>) -> bool {
        let (Some(subscriber), Some(server)) = (self.subscriber.get(), self.server.get())
        else {
            return false;
        };

        let received = Arc::clone(&self.received);
        if subscriber
            .subscribe_inline(move |ball: Ball| {
                received.fetch_add(1, Ordering::Relaxed);
                info!(seq = ball.seq, "ball received");
            })
            .is_err()
        {
            return false;
        }

        let received = Arc::clone(&self.received);
        server
            .serve_inline(move |_req: &TallyReq, resp: &mut TallyResp| {
                resp.count = received.load(Ordering::Relaxed);
                Status::ok()
            })
            .is_ok()
    }

    fn on_start(&mut self, _ctx: &Arc<ModuleContext>) -> bool {
        true
    }

    fn on_shutdown(&mut self, _ctx: &Arc<ModuleContext>) {}
}

fn main() {
    let options = AppOptions::parse();
    let modules = vec![
        NamedModule::from_module(Box::<PingModule>::default()),
        NamedModule::from_module(Box::<PongModule>::default()),
    ];
    std::process::exit(run(options, modules));
}
