// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

struct CountingFilter {
    seen: AtomicUsize,
}

impl ChannelFilter for CountingFilter {
    fn name(&self) -> &str {
        "counting"
    }

    fn on_publish(&self, msg: MessageWrapper) -> Option<MessageWrapper> {
        self.seen.fetch_add(1, Ordering::SeqCst);
        Some(msg)
    }
}

struct DropOdd;

impl ChannelFilter for DropOdd {
    fn name(&self) -> &str {
        "drop_odd"
    }

    fn on_publish(&self, msg: MessageWrapper) -> Option<MessageWrapper> {
        if msg.payload.len() % 2 == 1 {
            None
        } else {
            Some(msg)
        }
    }
}

struct Stamp;

impl ChannelFilter for Stamp {
    fn name(&self) -> &str {
        "stamp"
    }

    fn on_deliver(&self, msg: MessageWrapper) -> Option<MessageWrapper> {
        let mut payload = msg.payload.to_vec();
        payload.push(0xEE);
        Some(MessageWrapper {
            topic: msg.topic,
            type_name: msg.type_name,
            payload: payload.into(),
        })
    }
}

fn msg(payload: &[u8]) -> MessageWrapper {
    MessageWrapper::new("/t", "em.test.Raw", payload.to_vec())
}

#[test]
fn unknown_filter_name_is_an_error() {
    let registry = FilterRegistry::new();
    let err = registry.chain(&["ghost".to_owned()]).unwrap_err();
    assert!(matches!(err, ChannelError::UnknownFilter(name) if name == "ghost"));
}

#[test]
fn empty_chain_passes_messages_through() {
    let chain = FilterChain::default();
    assert!(chain.is_empty());
    assert!(chain.run_publish(msg(b"x")).is_some());
}

#[test]
fn chain_runs_in_registration_order_and_observes() {
    let mut registry = FilterRegistry::new();
    let counter = std::sync::Arc::new(CountingFilter {
        seen: AtomicUsize::new(0),
    });
    registry.register(counter.clone());
    registry.register(std::sync::Arc::new(DropOdd));

    let chain = registry
        .chain(&["counting".to_owned(), "drop_odd".to_owned()])
        .unwrap();

    assert!(chain.run_publish(msg(b"even")).is_some());
    assert!(chain.run_publish(msg(b"odd")).is_none());
    // the counting filter ran before the drop in both cases
    assert_eq!(counter.seen.load(Ordering::SeqCst), 2);
}

#[test]
fn drop_stops_the_chain() {
    let mut registry = FilterRegistry::new();
    let counter = std::sync::Arc::new(CountingFilter {
        seen: AtomicUsize::new(0),
    });
    registry.register(std::sync::Arc::new(DropOdd));
    registry.register(counter.clone());

    let chain = registry
        .chain(&["drop_odd".to_owned(), "counting".to_owned()])
        .unwrap();

    assert!(chain.run_publish(msg(b"odd")).is_none());
    assert_eq!(counter.seen.load(Ordering::SeqCst), 0);
}

#[test]
fn deliver_filter_may_rewrite_payload() {
    let mut registry = FilterRegistry::new();
    registry.register(std::sync::Arc::new(Stamp));
    let chain = registry.chain(&["stamp".to_owned()]).unwrap();

    let out = chain.run_deliver(msg(b"ab")).unwrap();
    assert_eq!(out.payload.as_ref(), b"ab\xEE");
}
