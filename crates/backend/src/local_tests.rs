// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::protocol::Backend;
use em_channel::DeliveryMode;
use em_core::{TypeSupport, WireMessage};
use em_rpc::{MethodName, RpcDeliveryMode, RpcRegistryBuilder};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Ping {
    seq: u64,
}

impl WireMessage for Ping {
    fn type_name() -> &'static str {
        "em.test.Ping"
    }
}

fn msg(seq: u64) -> MessageWrapper {
    MessageWrapper::new(
        "/ping",
        Ping::type_name(),
        serde_json::to_vec(&Ping { seq }).unwrap(),
    )
}

fn counting_sub(counter: Arc<AtomicU64>) -> Arc<SubscribeWrapper> {
    Arc::new(SubscribeWrapper::new(
        "/ping",
        TypeSupport::of::<Ping>(),
        DeliveryMode::Inline,
        Arc::new(move |_msg| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    ))
}

#[test]
fn publish_before_start_is_dropped() {
    let backend = LocalBackend::new();
    backend.initialize(Default::default()).unwrap();
    let counter = Arc::new(AtomicU64::new(0));
    assert!(backend.subscribe(counting_sub(Arc::clone(&counter))));

    backend.publish(msg(0));
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    backend.start().unwrap();
    backend.publish(msg(1));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn publish_fans_out_to_matching_type_only() {
    let backend = LocalBackend::new();
    backend.initialize(Default::default()).unwrap();

    let hits = Arc::new(AtomicU64::new(0));
    assert!(backend.subscribe(counting_sub(Arc::clone(&hits))));

    // same topic, different wire type
    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Other;
    impl WireMessage for Other {
        fn type_name() -> &'static str {
            "em.test.Other"
        }
    }
    let other_hits = Arc::new(AtomicU64::new(0));
    {
        let other_hits = Arc::clone(&other_hits);
        assert!(backend.subscribe(Arc::new(SubscribeWrapper::new(
            "/ping",
            TypeSupport::of::<Other>(),
            DeliveryMode::Inline,
            Arc::new(move |_msg| {
                other_hits.fetch_add(1, Ordering::SeqCst);
            }),
        ))));
    }

    backend.start().unwrap();
    for seq in 0..10 {
        backend.publish(msg(seq));
    }

    assert_eq!(hits.load(Ordering::SeqCst), 10);
    assert_eq!(other_hits.load(Ordering::SeqCst), 0);
}

#[test]
fn subscribe_after_start_is_rejected() {
    let backend = LocalBackend::new();
    backend.initialize(Default::default()).unwrap();
    backend.start().unwrap();

    let counter = Arc::new(AtomicU64::new(0));
    assert!(!backend.subscribe(counting_sub(counter)));
}

#[test]
fn invoke_dispatches_to_registered_handler() {
    let backend = LocalBackend::new();
    backend.initialize(Default::default()).unwrap();

    let handler: em_rpc::ServiceFuncWrapper = em_rpc::ServiceFuncWrapper::new(
        MethodName::parse("pb:/echo").unwrap(),
        TypeSupport::of::<Ping>(),
        TypeSupport::of::<Ping>(),
        RpcDeliveryMode::Inline,
        Arc::new(|_ctx, request| Box::pin(async move { (Status::ok(), request) })),
    );
    assert!(backend.register_service_func(Arc::new(handler)));
    backend.start().unwrap();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let (status, reply) = runtime.block_on(backend.invoke(
        Arc::new(RpcContext::new()),
        "pb:/echo",
        br#"{"seq":3}"#.to_vec(),
    ));

    assert!(status.is_ok());
    assert_eq!(reply, br#"{"seq":3}"#);
}

#[test]
fn invoke_falls_back_to_shared_registry() {
    let backend = LocalBackend::new();
    backend.initialize(Default::default()).unwrap();

    let mut builder = RpcRegistryBuilder::new();
    builder
        .register_service(em_rpc::ServiceFuncWrapper::new(
            MethodName::parse("pb:/echo").unwrap(),
            TypeSupport::of::<Ping>(),
            TypeSupport::of::<Ping>(),
            RpcDeliveryMode::Inline,
            Arc::new(|_ctx, request| Box::pin(async move { (Status::ok(), request) })),
        ))
        .unwrap();
    backend.set_rpc_registry(builder.freeze());
    backend.start().unwrap();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let (status, _reply) = runtime.block_on(backend.invoke(
        Arc::new(RpcContext::new()),
        "pb:/echo",
        b"{}".to_vec(),
    ));
    assert!(status.is_ok());
}

#[test]
fn invoke_unknown_method_is_unavailable() {
    let backend = LocalBackend::new();
    backend.initialize(Default::default()).unwrap();
    backend.start().unwrap();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let (status, _reply) = runtime.block_on(backend.invoke(
        Arc::new(RpcContext::new()),
        "pb:/ghost",
        Vec::new(),
    ));
    assert_eq!(status.code(), StatusCode::Unavailable);
}
