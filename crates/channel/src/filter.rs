// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Middleware on the send/deliver edges.
//!
//! Outbound: publish → pub filters → backends. Inbound: backend → sub
//! filters → callback. A filter may rewrite the message or drop it; a drop
//! stops the chain and is logged.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::registry::ChannelError;
use crate::wrappers::MessageWrapper;

pub trait ChannelFilter: Send + Sync {
    fn name(&self) -> &str;

    /// Outbound edge. Returning `None` drops the publish.
    fn on_publish(&self, msg: MessageWrapper) -> Option<MessageWrapper> {
        Some(msg)
    }

    /// Inbound edge. Returning `None` drops the delivery.
    fn on_deliver(&self, msg: MessageWrapper) -> Option<MessageWrapper> {
        Some(msg)
    }
}

/// Filter instances by name; plugins register here during init.
#[derive(Default)]
pub struct FilterRegistry {
    filters: HashMap<String, Arc<dyn ChannelFilter>>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, filter: Arc<dyn ChannelFilter>) {
        self.filters.insert(filter.name().to_owned(), filter);
    }

    /// Resolve the named filters of one topic rule, in order.
    pub fn chain(&self, names: &[String]) -> Result<FilterChain, ChannelError> {
        let mut filters = Vec::with_capacity(names.len());
        for name in names {
            let filter = self
                .filters
                .get(name)
                .ok_or_else(|| ChannelError::UnknownFilter(name.clone()))?;
            filters.push(Arc::clone(filter));
        }
        Ok(FilterChain { filters })
    }
}

#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn ChannelFilter>>,
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterChain")
            .field("filters", &self.filters.iter().map(|flt| flt.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl FilterChain {
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn run_publish(&self, mut msg: MessageWrapper) -> Option<MessageWrapper> {
        for filter in &self.filters {
            let topic = Arc::clone(&msg.topic);
            match filter.on_publish(msg) {
                Some(next) => msg = next,
                None => {
                    warn!(%topic, filter = filter.name(), "publish dropped by filter");
                    return None;
                }
            }
        }
        Some(msg)
    }

    pub fn run_deliver(&self, mut msg: MessageWrapper) -> Option<MessageWrapper> {
        for filter in &self.filters {
            let topic = Arc::clone(&msg.topic);
            match filter.on_deliver(msg) {
                Some(next) => msg = next,
                None => {
                    warn!(%topic, filter = filter.name(), "delivery dropped by filter");
                    return None;
                }
            }
        }
        Some(msg)
    }
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod tests;
