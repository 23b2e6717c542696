// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-call RPC context: deadline, serialization hint, metadata.
//!
//! A context is single-use on the client side; the deadline timer transfers
//! into the call. Server handlers receive a shared read-only reference.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use em_core::SerKind;

#[derive(Debug, Default)]
pub struct RpcContext {
    deadline: Option<Instant>,
    ser_hint: Option<SerKind>,
    metadata: HashMap<String, String>,
    consumed: AtomicBool,
}

impl RpcContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            ..Self::default()
        }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            ..Self::default()
        }
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.deadline = Some(Instant::now() + timeout);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn set_ser_hint(&mut self, hint: SerKind) {
        self.ser_hint = Some(hint);
    }

    pub fn ser_hint(&self) -> Option<SerKind> {
        self.ser_hint
    }

    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn meta_iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.metadata
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Claim this context for one call. The second claim fails; the caller
    /// maps that to `InvalidArg`.
    pub fn consume(&self) -> bool {
        !self.consumed.swap(true, Ordering::AcqRel)
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
