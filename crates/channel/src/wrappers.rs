// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Type-erased carriers crossing the registry/backend boundary.

use std::sync::Arc;

use em_core::TypeSupport;
use em_executor::ExecutorHandle;

/// A serialized message in flight. Payload bytes are shared across the
/// backends of one fan-out.
#[derive(Clone)]
pub struct MessageWrapper {
    pub topic: Arc<str>,
    pub type_name: &'static str,
    pub payload: Arc<[u8]>,
}

impl MessageWrapper {
    pub fn new(topic: &str, type_name: &'static str, payload: Vec<u8>) -> Self {
        Self {
            topic: Arc::from(topic),
            type_name,
            payload: Arc::from(payload),
        }
    }
}

impl std::fmt::Debug for MessageWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageWrapper")
            .field("topic", &self.topic)
            .field("type_name", &self.type_name)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// One registered publish side of a (topic, wire type) pair.
#[derive(Debug, Clone)]
pub struct PublishTypeWrapper {
    pub topic: String,
    pub support: TypeSupport,
}

/// Where a subscription callback runs.
#[derive(Clone)]
pub enum DeliveryMode {
    /// On the delivering backend's thread.
    Inline,
    /// Re-posted onto a named executor.
    OnExecutor(ExecutorHandle),
}

impl std::fmt::Debug for DeliveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inline => f.write_str("Inline"),
            Self::OnExecutor(exe) => write!(f, "OnExecutor({})", exe.name()),
        }
    }
}

type ErasedCallback = Arc<dyn Fn(MessageWrapper) + Send + Sync>;

/// One registered subscription: decoding and the user callback are folded
/// into `callback` by the module context; backends only see bytes.
#[derive(Clone)]
pub struct SubscribeWrapper {
    pub topic: String,
    pub type_name: &'static str,
    pub support: TypeSupport,
    pub mode: DeliveryMode,
    callback: ErasedCallback,
}

impl SubscribeWrapper {
    pub fn new(
        topic: impl Into<String>,
        support: TypeSupport,
        mode: DeliveryMode,
        callback: ErasedCallback,
    ) -> Self {
        Self {
            topic: topic.into(),
            type_name: support.type_name(),
            support,
            mode,
            callback,
        }
    }

    /// Run the callback according to the delivery mode. Inline runs on the
    /// caller (backend) thread; on-executor re-posts and returns.
    pub fn deliver(&self, msg: MessageWrapper) {
        match &self.mode {
            DeliveryMode::Inline => (self.callback)(msg),
            DeliveryMode::OnExecutor(exe) => {
                let callback = Arc::clone(&self.callback);
                exe.post_detached(async move { callback(msg) });
            }
        }
    }
}

impl std::fmt::Debug for SubscribeWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscribeWrapper")
            .field("topic", &self.topic)
            .field("type_name", &self.type_name)
            .field("mode", &self.mode)
            .finish()
    }
}
