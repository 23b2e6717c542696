// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource descriptors: value handles for executors, channels, and services.
//!
//! A descriptor is declared with only a name. During module initialization the
//! resource manager binds it to a `(context_id, index)` slot; from then on
//! every runtime operation dispatches through the owning module context using
//! that slot. Descriptors never carry behavior themselves.

use std::marker::PhantomData;

use crate::error::{Location, MisuseError};

/// The slot a descriptor is bound to after Init.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Binding {
    pub context_id: u32,
    pub index: usize,
}

/// Shared declaration/binding state for all descriptor kinds.
#[derive(Debug, Clone, Default)]
pub struct ResBase {
    name: String,
    binding: Option<Binding>,
}

impl ResBase {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            binding: None,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn binding(&self) -> Option<Binding> {
        self.binding
    }

    /// Bind to a slot. Re-binding to the same slot is idempotent; binding the
    /// same name to a different slot is a misuse.
    fn bind(&mut self, binding: Binding, loc: Location) -> Result<(), MisuseError> {
        match self.binding {
            None => {
                self.binding = Some(binding);
                Ok(())
            }
            Some(existing) if existing == binding => Ok(()),
            Some(_) => Err(MisuseError::DuplicateName {
                name: self.name.clone(),
                loc,
            }),
        }
    }
}

impl PartialEq for ResBase {
    fn eq(&self, other: &Self) -> bool {
        match (self.binding, other.binding) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.name == other.name,
            _ => false,
        }
    }
}

impl Eq for ResBase {}

/// Declared thread options for an executor resource.
///
/// Declarations feed the generated configuration; the effective executor
/// configuration may be overridden by the user file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorOptions {
    pub thread_num: u32,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self { thread_num: 1 }
    }
}

/// Descriptor for a named executor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutorRes {
    base: ResBase,
    options: Option<ExecutorOptions>,
}

impl ExecutorRes {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: ResBase::new(name),
            options: None,
        }
    }

    /// Declare an executor together with its default thread options.
    pub fn with_options(name: impl Into<String>, options: ExecutorOptions) -> Self {
        Self {
            base: ResBase::new(name),
            options: Some(options),
        }
    }

    pub fn name(&self) -> &str {
        self.base.name()
    }

    pub fn is_bound(&self) -> bool {
        self.base.binding().is_some()
    }

    pub fn binding(&self) -> Option<Binding> {
        self.base.binding()
    }

    pub fn declared_options(&self) -> Option<ExecutorOptions> {
        self.options
    }

    pub fn bind(&mut self, binding: Binding, loc: Location) -> Result<(), MisuseError> {
        self.base.bind(binding, loc)
    }
}

/// Descriptor for a typed pub/sub channel on a topic.
///
/// `T` is the value type at the API edge; the wire type is resolved through
/// [`Adapt`](crate::adapt::Adapt) when the channel is initialized.
#[derive(Debug)]
pub struct Channel<T> {
    base: ResBase,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Channel<T> {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            base: ResBase::new(topic),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        self.base.name()
    }

    pub fn is_bound(&self) -> bool {
        self.base.binding().is_some()
    }

    pub fn binding(&self) -> Option<Binding> {
        self.base.binding()
    }

    pub fn bind(&mut self, binding: Binding, loc: Location) -> Result<(), MisuseError> {
        self.base.bind(binding, loc)
    }

    /// The bound slot, or `ResourceUnbound` when the descriptor was never
    /// initialized.
    pub fn expect_bound(&self, loc: Location) -> Result<Binding, MisuseError> {
        self.base.binding().ok_or_else(|| MisuseError::ResourceUnbound {
            name: self.base.name().to_owned(),
            loc,
        })
    }
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self {
            base: ResBase::default(),
            _marker: PhantomData,
        }
    }
}

impl<T> PartialEq for Channel<T> {
    fn eq(&self, other: &Self) -> bool {
        self.base == other.base
    }
}

impl<T> Eq for Channel<T> {}

/// Descriptor for a typed RPC method with request `Q` and response `P`.
#[derive(Debug)]
pub struct Service<Q, P> {
    base: ResBase,
    _marker: PhantomData<fn() -> (Q, P)>,
}

impl<Q, P> Service<Q, P> {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            base: ResBase::new(method),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        self.base.name()
    }

    pub fn is_bound(&self) -> bool {
        self.base.binding().is_some()
    }

    pub fn binding(&self) -> Option<Binding> {
        self.base.binding()
    }

    pub fn bind(&mut self, binding: Binding, loc: Location) -> Result<(), MisuseError> {
        self.base.bind(binding, loc)
    }

    pub fn expect_bound(&self, loc: Location) -> Result<Binding, MisuseError> {
        self.base.binding().ok_or_else(|| MisuseError::ResourceUnbound {
            name: self.base.name().to_owned(),
            loc,
        })
    }
}

impl<Q, P> Clone for Service<Q, P> {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            _marker: PhantomData,
        }
    }
}

impl<Q, P> Default for Service<Q, P> {
    fn default() -> Self {
        Self {
            base: ResBase::default(),
            _marker: PhantomData,
        }
    }
}

impl<Q, P> PartialEq for Service<Q, P> {
    fn eq(&self, other: &Self) -> bool {
        self.base == other.base
    }
}

impl<Q, P> Eq for Service<Q, P> {}

#[cfg(test)]
#[path = "res_tests.rs"]
mod tests;
