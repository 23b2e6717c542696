// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Publish-side operators.

use std::sync::Weak;

use em_channel::{FilterChain, MessageWrapper, PublishTypeWrapper};
use em_core::{Adapt, Channel, Location, MisuseError, TypeSupport};

use super::{ChannelSlot, ModuleContext};

impl ModuleContext {
    /// Bind a publish channel for `T` on `topic`. Legal only during Init.
    #[track_caller]
    pub fn init_publisher<T: Adapt>(
        self: &std::sync::Arc<Self>,
        topic: &str,
    ) -> Result<Publisher<T>, super::InitError> {
        let loc = Location::capture();
        self.expect_init_phase("init_publisher", loc)?;

        let support = TypeSupport::of::<T::Wire>();
        let type_name = support.type_name();
        let (index, created) = self.alloc_channel_slot(topic, type_name);

        let mut channels = self.channels.write();
        if created {
            channels.push(ChannelSlot {
                topic: topic.to_owned(),
                type_name,
                support: support.clone(),
                pub_registered: false,
                pub_filters: Default::default(),
            });
        }
        let slot = &mut channels[index];
        if !slot.pub_registered {
            slot.pub_registered = true;
            self.shared_init
                .lock()
                .channel
                .register_publish_type(PublishTypeWrapper {
                    topic: topic.to_owned(),
                    support,
                });
        }
        drop(channels);

        let mut res = Channel::new(topic);
        res.bind(
            em_core::Binding {
                context_id: self.id(),
                index,
            },
            loc,
        )?;

        Ok(Publisher {
            res,
            ctx: self.self_weak.clone(),
        })
    }

    /// Convert, filter, and fan `msg` out to every backend the topic's
    /// publish rule names. A publish before Start or after Shutdown is a
    /// successful no-op; conversion failures drop the message with an error
    /// log.
    #[track_caller]
    pub fn publish<T: Adapt>(&self, ch: &Channel<T>, msg: &T) -> Result<(), MisuseError> {
        let loc = Location::capture();
        let index = self.check_binding(ch.name(), ch.binding(), loc)?;

        if !self.is_started() || !self.ok() {
            return Ok(());
        }
        let Some(fabric) = self.fabric.get() else {
            return Ok(());
        };

        let channels = self.channels.read();
        let Some(slot) = channels.get(index) else {
            return Err(MisuseError::ResourceUnbound {
                name: ch.name().to_owned(),
                loc,
            });
        };

        let wire = match msg.to_wire() {
            Ok(wire) => wire,
            Err(err) => {
                self.drop_with_log("publish", &slot.topic, &err);
                return Ok(());
            }
        };
        let payload = match slot.support.encode_value(&wire) {
            Ok(payload) => payload,
            Err(err) => {
                self.drop_with_log("publish", &slot.topic, &err);
                return Ok(());
            }
        };

        let Some(backends) = fabric.channel.pub_backends(&slot.topic) else {
            tracing::debug!(module = %self.name(), topic = %slot.topic, "publish matched no rule");
            return Ok(());
        };

        let wrapper = MessageWrapper::new(&slot.topic, slot.type_name, payload);

        let chain = slot.pub_filters.get_or_init(|| {
            match fabric.filters.chain(fabric.channel.pub_filters(&slot.topic)) {
                Ok(chain) => chain,
                Err(err) => {
                    tracing::warn!(topic = %slot.topic, error = %err, "publish filter chain unresolved, running without");
                    FilterChain::default()
                }
            }
        });
        let Some(wrapper) = chain.run_publish(wrapper) else {
            return Ok(());
        };

        fabric.hub.publish_to(backends, &wrapper);
        Ok(())
    }
}

/// Operator façade over a bound publish channel.
pub struct Publisher<T: Adapt> {
    res: Channel<T>,
    ctx: Weak<ModuleContext>,
}

impl<T: Adapt> Publisher<T> {
    pub fn topic(&self) -> &str {
        self.res.name()
    }

    pub fn channel(&self) -> &Channel<T> {
        &self.res
    }

    /// Publish through the owning context. A publish after the context is
    /// gone (process tear-down) is a silent no-op.
    #[track_caller]
    pub fn publish(&self, msg: &T) {
        if let Some(ctx) = self.ctx.upgrade() {
            if let Err(err) = ctx.publish(&self.res, msg) {
                tracing::error!(error = %err, "publish misuse");
            }
        }
    }
}

impl<T: Adapt> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self {
            res: self.res.clone(),
            ctx: self.ctx.clone(),
        }
    }
}

impl<T: Adapt> std::fmt::Debug for Publisher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("topic", &self.res.name())
            .finish()
    }
}
