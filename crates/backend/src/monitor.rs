// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The monitor tap. It observes registrations and traffic for the monitor
//! plugin; it is not a carrier, so `publish` transports nothing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use em_channel::{MessageWrapper, PublishTypeWrapper, SubscribeWrapper};
use em_rpc::{ClientFuncWrapper, RpcContext, ServiceFuncWrapper, Status, StatusCode};

use crate::protocol::{Backend, BackendError, StateCell};

#[derive(Debug, Default)]
pub struct MonitorCounters {
    pub publish_types: AtomicU64,
    pub subscriptions: AtomicU64,
    pub services: AtomicU64,
    pub clients: AtomicU64,
    pub published: AtomicU64,
}

pub struct MonitorBackend {
    state: StateCell,
    counters: Arc<MonitorCounters>,
}

impl MonitorBackend {
    pub const NAME: &'static str = "monitor";

    pub fn new() -> Self {
        Self {
            state: StateCell::new(Self::NAME),
            counters: Arc::new(MonitorCounters::default()),
        }
    }

    pub fn counters(&self) -> Arc<MonitorCounters> {
        Arc::clone(&self.counters)
    }
}

impl Default for MonitorBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for MonitorBackend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn initialize(&self, _options: serde_yaml::Mapping) -> Result<(), BackendError> {
        self.state.to_init()
    }

    fn start(&self) -> Result<(), BackendError> {
        self.state.to_start()
    }

    fn register_publish_type(&self, _wrapper: &PublishTypeWrapper) -> bool {
        self.counters.publish_types.fetch_add(1, Ordering::Relaxed);
        true
    }

    fn subscribe(&self, _wrapper: Arc<SubscribeWrapper>) -> bool {
        self.counters.subscriptions.fetch_add(1, Ordering::Relaxed);
        true
    }

    fn register_service_func(&self, _wrapper: Arc<ServiceFuncWrapper>) -> bool {
        self.counters.services.fetch_add(1, Ordering::Relaxed);
        true
    }

    fn register_client_func(&self, _wrapper: &ClientFuncWrapper) -> bool {
        self.counters.clients.fetch_add(1, Ordering::Relaxed);
        true
    }

    fn publish(&self, _msg: MessageWrapper) {
        // tap-only: observe, never transport
        self.counters.published.fetch_add(1, Ordering::Relaxed);
    }

    async fn invoke(
        &self,
        _ctx: Arc<RpcContext>,
        method: &str,
        _request: Vec<u8>,
    ) -> (Status, Vec<u8>) {
        (
            Status::with_message(
                StatusCode::Unavailable,
                format!("monitor tap cannot carry [{method}]"),
            ),
            Vec::new(),
        )
    }

    fn shutdown(&self) {
        self.state.to_shutdown();
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
