// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource binding for one module context.
//!
//! Two pieces live here: the name → slot allocator the context's `init_*`
//! operators share, and the manager that walks the resources a module
//! declared during Configure and binds each one before the module's own
//! initialize runs. Descriptors declared that way are already bound when
//! `on_initialize` is entered.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::context::{InitError, ModuleContext};

/// Binds one declared resource against the freshly created context.
pub(crate) type ResourceInitializer =
    Box<dyn FnOnce(&Arc<ModuleContext>) -> Result<(), InitError> + Send>;

/// Shared slot a declared resource lands in once the binding pass ran.
///
/// Handed out by the `ModuleCfg::declare_*` family during Configure; empty
/// until Init, then holds the bound operator façade.
pub struct ResourceHandle<T> {
    slot: Arc<Mutex<Option<T>>>,
}

impl<T> ResourceHandle<T> {
    pub(crate) fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    pub(crate) fn set(&self, value: T) {
        *self.slot.lock() = Some(value);
    }

    pub fn is_bound(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// The bound resource, cloned out of the slot. `None` before the
    /// binding pass (or when it failed and aborted startup anyway).
    pub fn get(&self) -> Option<T>
    where
        T: Clone,
    {
        self.slot.lock().clone()
    }
}

impl<T> Clone for ResourceHandle<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Default for ResourceHandle<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for ResourceHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("bound", &self.is_bound())
            .finish()
    }
}

/// Owns the initializers captured during Configure and runs them once the
/// module's context exists, immediately before `on_initialize`.
#[derive(Default)]
pub(crate) struct ContextResourceManager {
    initializers: Vec<ResourceInitializer>,
}

impl ContextResourceManager {
    pub(crate) fn new(initializers: Vec<ResourceInitializer>) -> Self {
        Self { initializers }
    }

    /// Walk the declared resources and bind each one. The first failure
    /// aborts; binding is a one-shot pass.
    pub(crate) fn bind_declared(
        &mut self,
        ctx: &Arc<ModuleContext>,
    ) -> Result<(), InitError> {
        for initializer in self.initializers.drain(..) {
            initializer(ctx)?;
        }
        Ok(())
    }
}

/// Name → slot allocation shared by the context's `init_*` operators.
///
/// A name binds to exactly one slot for the context's lifetime. Re-binding
/// the same name is idempotent and returns the existing slot; the slot
/// count only grows during Init.
#[derive(Debug, Default)]
pub(crate) struct ResourceIndex {
    by_name: HashMap<String, usize>,
    next: usize,
}

impl ResourceIndex {
    /// The slot for `name`, allocating the next one on first sight.
    /// Returns `(index, created)`.
    pub(crate) fn get_or_insert(&mut self, name: &str) -> (usize, bool) {
        if let Some(&index) = self.by_name.get(name) {
            return (index, false);
        }
        let index = self.next;
        self.next += 1;
        self.by_name.insert(name.to_owned(), index);
        (index, true)
    }

    pub(crate) fn len(&self) -> usize {
        self.next
    }
}

#[cfg(test)]
#[path = "resource_tests.rs"]
mod tests;
