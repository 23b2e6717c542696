// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Middleware around RPC invocations: a filter may rewrite the request
//! bytes, drop the call, or annotate the resulting status.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::status::Status;

pub trait RpcFilter: Send + Sync {
    fn name(&self) -> &str;

    /// Outbound edge. Returning `None` drops the call; the client observes
    /// `Cancelled`.
    fn on_request(&self, method: &str, request: Vec<u8>) -> Option<Vec<u8>> {
        let _ = method;
        Some(request)
    }

    /// Observes/annotates the status travelling back to the caller.
    fn on_response(&self, method: &str, status: Status) -> Status {
        let _ = method;
        status
    }
}

#[derive(Default)]
pub struct RpcFilterRegistry {
    filters: HashMap<String, Arc<dyn RpcFilter>>,
}

impl RpcFilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, filter: Arc<dyn RpcFilter>) {
        self.filters.insert(filter.name().to_owned(), filter);
    }

    pub fn chain(&self, names: &[String]) -> Result<RpcFilterChain, String> {
        let mut filters = Vec::with_capacity(names.len());
        for name in names {
            let filter = self
                .filters
                .get(name)
                .ok_or_else(|| format!("unknown rpc filter [{name}]"))?;
            filters.push(Arc::clone(filter));
        }
        Ok(RpcFilterChain { filters })
    }
}

#[derive(Clone, Default)]
pub struct RpcFilterChain {
    filters: Vec<Arc<dyn RpcFilter>>,
}

impl RpcFilterChain {
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn run_request(&self, method: &str, mut request: Vec<u8>) -> Option<Vec<u8>> {
        for filter in &self.filters {
            match filter.on_request(method, request) {
                Some(next) => request = next,
                None => {
                    warn!(method, filter = filter.name(), "rpc call dropped by filter");
                    return None;
                }
            }
        }
        Some(request)
    }

    /// Response filters run in reverse registration order.
    pub fn run_response(&self, method: &str, mut status: Status) -> Status {
        for filter in self.filters.iter().rev() {
            status = filter.on_response(method, status);
        }
        status
    }
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod tests;
