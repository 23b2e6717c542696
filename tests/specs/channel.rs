// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Channel specs: local-loop delivery, typed conversion, regex routing.

use std::sync::Arc;

use em_core::{Adapt, AdaptError};
use em_runtime::{Module, ModuleCfg, ModuleContext, ModuleInfo, NamedModule, Publisher};

use crate::prelude::*;

struct SeqTalker {
    publisher: Shared<Option<Publisher<Seq>>>,
}

impl Module for SeqTalker {
    fn info(&self) -> ModuleInfo {
        ModuleInfo::named("seq_talker")
    }

    fn on_configure(&mut self, cfg: &mut ModuleCfg) {
        cfg.declare_pub_topic("/t");
    }

    fn on_initialize(&mut self, ctx: &Arc<ModuleContext>) -> bool {
        match ctx.init_publisher::<Seq>("/t") {
            Ok(publisher) => {
                *self.publisher.lock() = Some(publisher);
                true
            }
            Err(_) => false,
        }
    }

    fn on_start(&mut self, _ctx: &Arc<ModuleContext>) -> bool {
        true
    }

    fn on_shutdown(&mut self, _ctx: &Arc<ModuleContext>) {}
}

struct SeqListener {
    seen: Shared<Vec<u64>>,
}

impl Module for SeqListener {
    fn info(&self) -> ModuleInfo {
        ModuleInfo::named("seq_listener")
    }

    fn on_configure(&mut self, cfg: &mut ModuleCfg) {
        cfg.declare_sub_topic("/t");
    }

    fn on_initialize(&mut self, ctx: &Arc<ModuleContext>) -> bool {
        let Ok(subscriber) = ctx.init_subscriber::<Seq>("/t") else {
            return false;
        };
        let seen = Arc::clone(&self.seen);
        subscriber
            .subscribe_inline(move |msg: Seq| {
                seen.lock().push(msg.seq);
            })
            .is_ok()
    }

    fn on_start(&mut self, _ctx: &Arc<ModuleContext>) -> bool {
        true
    }

    fn on_shutdown(&mut self, _ctx: &Arc<ModuleContext>) {}
}

/// Scenario: configure only the local backend, publish 100 sequenced
/// messages, receive them inline in order.
#[test]
fn local_loop_pub_sub_keeps_sequence() {
    let publisher = shared::<Option<Publisher<Seq>>>();
    let seen = shared::<Vec<u64>>();

    let mut core = build_core(
        |_cfg| {},
        vec![
            NamedModule::from_module(Box::new(SeqTalker {
                publisher: Arc::clone(&publisher),
            })),
            NamedModule::from_module(Box::new(SeqListener {
                seen: Arc::clone(&seen),
            })),
        ],
    );
    core.start().unwrap();

    {
        let guard = publisher.lock();
        let publisher = guard.as_ref().unwrap();
        for seq in 0..100 {
            publisher.publish(&Seq { seq });
        }
    }
    core.shutdown();

    assert_eq!(*seen.lock(), (0..100).collect::<Vec<_>>());
}

// A user type carried on the wire as Seq.
#[derive(Debug, Clone, PartialEq)]
struct Label(String);

impl Adapt for Label {
    type Wire = Seq;

    fn to_wire(&self) -> Result<Seq, AdaptError> {
        Ok(Seq {
            seq: self.0.len() as u64,
        })
    }

    fn from_wire(wire: &Seq) -> Result<Self, AdaptError> {
        Ok(Label("x".repeat(wire.seq as usize)))
    }
}

struct LabelPair {
    publisher: Shared<Option<Publisher<Label>>>,
    seen: Shared<Vec<Label>>,
}

impl Module for LabelPair {
    fn info(&self) -> ModuleInfo {
        ModuleInfo::named("label_pair")
    }

    fn on_configure(&mut self, cfg: &mut ModuleCfg) {
        cfg.declare_pub_topic("/s");
        cfg.declare_sub_topic("/s");
    }

    fn on_initialize(&mut self, ctx: &Arc<ModuleContext>) -> bool {
        let Ok(publisher) = ctx.init_publisher::<Label>("/s") else {
            return false;
        };
        *self.publisher.lock() = Some(publisher);

        let Ok(subscriber) = ctx.init_subscriber::<Label>("/s") else {
            return false;
        };
        let seen = Arc::clone(&self.seen);
        subscriber
            .subscribe_inline(move |label: Label| {
                seen.lock().push(label);
            })
            .is_ok()
    }

    fn on_start(&mut self, _ctx: &Arc<ModuleContext>) -> bool {
        true
    }

    fn on_shutdown(&mut self, _ctx: &Arc<ModuleContext>) {}
}

/// Scenario: publish a user type converted to its wire type; the
/// subscriber observes the converted-back value.
#[test]
fn user_type_converts_across_the_wire() {
    let publisher = shared::<Option<Publisher<Label>>>();
    let seen = shared::<Vec<Label>>();

    let mut core = build_core(
        |_cfg| {},
        vec![NamedModule::from_module(Box::new(LabelPair {
            publisher: Arc::clone(&publisher),
            seen: Arc::clone(&seen),
        }))],
    );
    core.start().unwrap();

    publisher.lock().as_ref().unwrap().publish(&Label("hi".to_owned()));
    core.shutdown();

    assert_eq!(*seen.lock(), vec![Label("xx".to_owned())]);
}

struct RoutedTalker {
    log_pub: Shared<Option<Publisher<Seq>>>,
    data_pub: Shared<Option<Publisher<Seq>>>,
    log_seen: Shared<Vec<u64>>,
    data_seen: Shared<Vec<u64>>,
}

impl Module for RoutedTalker {
    fn info(&self) -> ModuleInfo {
        ModuleInfo::named("routed_talker")
    }

    fn on_initialize(&mut self, ctx: &Arc<ModuleContext>) -> bool {
        let (Ok(log_pub), Ok(data_pub)) = (
            ctx.init_publisher::<Seq>("/log/x"),
            ctx.init_publisher::<Seq>("/data/y"),
        ) else {
            return false;
        };
        *self.log_pub.lock() = Some(log_pub);
        *self.data_pub.lock() = Some(data_pub);

        for (topic, seen) in [("/log/x", &self.log_seen), ("/data/y", &self.data_seen)] {
            let Ok(subscriber) = ctx.init_subscriber::<Seq>(topic) else {
                return false;
            };
            let seen = Arc::clone(seen);
            if subscriber
                .subscribe_inline(move |msg: Seq| {
                    seen.lock().push(msg.seq);
                })
                .is_err()
            {
                return false;
            }
        }
        true
    }

    fn on_start(&mut self, _ctx: &Arc<ModuleContext>) -> bool {
        true
    }

    fn on_shutdown(&mut self, _ctx: &Arc<ModuleContext>) {}
}

/// Scenario: pub rule list `[("/log/.*", [monitor]), ("(.*)", [local])]`.
/// Publishing on /log/x routes to the tap only, so the local subscriber
/// sees nothing; /data/y routes to local and is delivered.
#[test]
fn first_matching_rule_routes_the_topic() {
    let log_pub = shared();
    let data_pub = shared();
    let log_seen = shared::<Vec<u64>>();
    let data_seen = shared::<Vec<u64>>();

    let mut core = build_core(
        |cfg| {
            cfg.ensure_channel_backend("monitor");
            cfg.core_mut().channel.pub_topics_options = vec![
                em_config::TopicOptions {
                    topic_name: "/log/.*".to_owned(),
                    enable_backends: vec!["monitor".to_owned()],
                    enable_filters: Vec::new(),
                },
                em_config::TopicOptions {
                    topic_name: "(.*)".to_owned(),
                    enable_backends: vec!["local".to_owned()],
                    enable_filters: Vec::new(),
                },
            ];
            cfg.core_mut().channel.sub_topics_options = vec![em_config::TopicOptions {
                topic_name: "(.*)".to_owned(),
                enable_backends: vec!["local".to_owned()],
                enable_filters: Vec::new(),
            }];
        },
        vec![NamedModule::from_module(Box::new(RoutedTalker {
            log_pub: Arc::clone(&log_pub),
            data_pub: Arc::clone(&data_pub),
            log_seen: Arc::clone(&log_seen),
            data_seen: Arc::clone(&data_seen),
        }))],
    );
    core.start().unwrap();

    for seq in 0..5 {
        log_pub.lock().as_ref().unwrap().publish(&Seq { seq });
        data_pub.lock().as_ref().unwrap().publish(&Seq { seq });
    }
    core.shutdown();

    assert!(log_seen.lock().is_empty());
    assert_eq!(*data_seen.lock(), vec![0, 1, 2, 3, 4]);
}
