// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subscribe-side operators.

use std::sync::{Arc, Weak};

use em_channel::{DeliveryMode, SubscribeWrapper};
use em_core::{Adapt, Channel, ExecutorRes, Location, TypeSupport};
use em_executor::context as exe_context;

use super::{ChannelSlot, InitError, ModuleContext};

impl ModuleContext {
    /// Bind a subscribe channel for `T` on `topic`. Legal only during Init.
    #[track_caller]
    pub fn init_subscriber<T: Adapt>(
        self: &Arc<Self>,
        topic: &str,
    ) -> Result<Subscriber<T>, InitError> {
        let loc = Location::capture();
        self.expect_init_phase("init_subscriber", loc)?;

        let support = TypeSupport::of::<T::Wire>();
        let type_name = support.type_name();
        let (index, created) = self.alloc_channel_slot(topic, type_name);
        if created {
            self.channels.write().push(ChannelSlot {
                topic: topic.to_owned(),
                type_name,
                support,
                pub_registered: false,
                pub_filters: Default::default(),
            });
        }

        let mut res = Channel::new(topic);
        res.bind(
            em_core::Binding {
                context_id: self.id(),
                index,
            },
            loc,
        )?;

        Ok(Subscriber {
            res,
            ctx: self.self_weak.clone(),
        })
    }

    /// Register `callback` to run on the delivering backend's thread.
    #[track_caller]
    pub fn subscribe_inline<T, F>(
        self: &Arc<Self>,
        ch: &Channel<T>,
        callback: F,
    ) -> Result<(), InitError>
    where
        T: Adapt,
        F: Fn(T) + Send + Sync + 'static,
    {
        self.subscribe_with_mode(ch, DeliveryMode::Inline, callback)
    }

    /// Register `callback` to run on the named executor.
    #[track_caller]
    pub fn subscribe_on<T, F>(
        self: &Arc<Self>,
        exe: &ExecutorRes,
        ch: &Channel<T>,
        callback: F,
    ) -> Result<(), InitError>
    where
        T: Adapt,
        F: Fn(T) + Send + Sync + 'static,
    {
        let loc = Location::capture();
        let handle = self.executor_handle(exe, loc)?;
        self.subscribe_with_mode(ch, DeliveryMode::OnExecutor(handle), callback)
    }

    #[track_caller]
    fn subscribe_with_mode<T, F>(
        self: &Arc<Self>,
        ch: &Channel<T>,
        mode: DeliveryMode,
        callback: F,
    ) -> Result<(), InitError>
    where
        T: Adapt,
        F: Fn(T) + Send + Sync + 'static,
    {
        let loc = Location::capture();
        self.expect_init_phase("subscribe", loc)?;
        let index = self.check_binding(ch.name(), ch.binding(), loc)?;

        let (topic, support) = {
            let channels = self.channels.read();
            let slot = &channels[index];
            (slot.topic.clone(), slot.support.clone())
        };

        // Fold decode, conversion, sub filters, and the ambient context
        // install into one erased callback; backends only see bytes.
        let ctx_weak = self.self_weak.clone();
        let decode_support = support.clone();
        let erased: Arc<dyn Fn(em_channel::MessageWrapper) + Send + Sync> =
            Arc::new(move |msg| {
                let Some(ctx) = ctx_weak.upgrade() else {
                    return;
                };

                let msg = {
                    let Some(fabric) = ctx.fabric.get() else {
                        return;
                    };
                    let names = fabric.channel.sub_filters(msg.topic.as_ref());
                    match fabric.filters.chain(names) {
                        Ok(chain) => match chain.run_deliver(msg) {
                            Some(msg) => msg,
                            None => return,
                        },
                        Err(_) => msg,
                    }
                };

                let wire = match decode_support.decode(&msg.payload) {
                    Ok(wire) => wire,
                    Err(err) => {
                        ctx.drop_with_log("delivery", msg.topic.as_ref(), &err);
                        return;
                    }
                };
                let Some(wire) = wire.downcast_ref::<T::Wire>() else {
                    return;
                };
                let value = match T::from_wire(wire) {
                    Ok(value) => value,
                    Err(err) => {
                        ctx.drop_with_log("delivery", msg.topic.as_ref(), &err);
                        return;
                    }
                };

                let thread_ctx = ctx.thread_context(exe_context::current().executor);
                exe_context::with_installed(thread_ctx, || callback(value));
            });

        self.shared_init
            .lock()
            .channel
            .subscribe(SubscribeWrapper::new(topic, support, mode, erased))?;
        Ok(())
    }
}

/// Operator façade over a bound subscribe channel.
pub struct Subscriber<T: Adapt> {
    res: Channel<T>,
    ctx: Weak<ModuleContext>,
}

impl<T: Adapt> Subscriber<T> {
    pub fn topic(&self) -> &str {
        self.res.name()
    }

    pub fn channel(&self) -> &Channel<T> {
        &self.res
    }

    /// Register a callback running on the delivering backend's thread.
    /// Keep it light; heavy work belongs on an executor.
    #[track_caller]
    pub fn subscribe_inline<F>(&self, callback: F) -> Result<(), InitError>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let ctx = self.ctx.upgrade().ok_or_else(|| {
            InitError::Misuse(em_core::MisuseError::NoAmbientContext {
                loc: Location::capture(),
            })
        })?;
        ctx.subscribe_inline(&self.res, callback)
    }

    /// Register a callback re-posted onto the given executor.
    #[track_caller]
    pub fn subscribe_on<F>(&self, exe: &ExecutorRes, callback: F) -> Result<(), InitError>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let ctx = self.ctx.upgrade().ok_or_else(|| {
            InitError::Misuse(em_core::MisuseError::NoAmbientContext {
                loc: Location::capture(),
            })
        })?;
        ctx.subscribe_on(exe, &self.res, callback)
    }
}

impl<T: Adapt> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self {
            res: self.res.clone(),
            ctx: self.ctx.clone(),
        }
    }
}

impl<T: Adapt> std::fmt::Debug for Subscriber<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("topic", &self.res.name())
            .finish()
    }
}
