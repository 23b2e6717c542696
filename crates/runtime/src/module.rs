// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The module contract and its configure-time declaration surface.

use std::sync::Arc;

use em_config::ModuleDecl;
use em_core::{Adapt, ExecutorOptions, ExecutorRes, MethodName};

use crate::context::{Client, ModuleContext, Publisher, Server, Subscriber};
use crate::resource::{ContextResourceManager, ResourceHandle, ResourceInitializer};

/// Declared method names land in routing rules in their full wire form, so
/// lookups by `<ser>:/<path>` match them.
fn normalize_method(declared: String) -> String {
    MethodName::parse(&declared)
        .map(|method| method.full())
        .unwrap_or(declared)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: String,
}

impl ModuleInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// One independently developed unit hosted by the runtime.
///
/// `on_configure` runs before the framework exists and declares resources;
/// the framework walks those declarations and binds each one, so the
/// handles are live when `on_initialize` is entered. Traffic is legal from
/// `on_start` until the context's run flag clears.
pub trait Module: Send {
    fn info(&self) -> ModuleInfo;

    /// Declare executors, topics, and methods this module will use.
    fn on_configure(&mut self, cfg: &mut ModuleCfg) {
        let _ = cfg;
    }

    /// Register callbacks and bind any late resources. Declared resources
    /// are already bound at this point. Returning false aborts the process
    /// startup.
    fn on_initialize(&mut self, ctx: &Arc<ModuleContext>) -> bool;

    fn on_start(&mut self, ctx: &Arc<ModuleContext>) -> bool;

    fn on_shutdown(&mut self, ctx: &Arc<ModuleContext>);
}

/// Configure-time declaration sink handed to `on_configure`.
///
/// Declarations shape the generated configuration, and the typed
/// `declare_*` family additionally captures an initializer: the framework
/// runs those against the module's context after Configure, binding each
/// resource into the returned [`ResourceHandle`] before `on_initialize`.
#[derive(Default)]
pub struct ModuleCfg {
    decl: ModuleDecl,
    initializers: Vec<ResourceInitializer>,
}

impl ModuleCfg {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            decl: ModuleDecl {
                name: module_name.into(),
                ..ModuleDecl::default()
            },
            initializers: Vec::new(),
        }
    }

    pub fn module_name(&self) -> &str {
        &self.decl.name
    }

    /// Declare an executor and receive its bound descriptor at Init.
    pub fn declare_executor(&mut self, exe: &ExecutorRes) -> ResourceHandle<ExecutorRes> {
        let options = exe.declared_options().unwrap_or(ExecutorOptions { thread_num: 1 });
        self.decl.executors.push(em_config::ExecutorEntry {
            name: exe.name().to_owned(),
            executor_type: em_core::sys::default_executor_type(),
            options: em_config::ExecutorEntryOptions {
                thread_num: options.thread_num,
            },
        });

        let name = exe.name().to_owned();
        let handle = ResourceHandle::new();
        let slot = handle.clone();
        self.initializers.push(Box::new(move |ctx| {
            slot.set(ctx.init_executor(&name)?);
            Ok(())
        }));
        handle
    }

    /// Declare a publish channel for `T`; the handle holds the bound
    /// publisher once Init ran.
    pub fn declare_publisher<T: Adapt>(
        &mut self,
        topic: impl Into<String>,
    ) -> ResourceHandle<Publisher<T>> {
        let topic = topic.into();
        self.decl.pub_topics.push(topic.clone());

        let handle = ResourceHandle::new();
        let slot = handle.clone();
        self.initializers.push(Box::new(move |ctx| {
            slot.set(ctx.init_publisher::<T>(&topic)?);
            Ok(())
        }));
        handle
    }

    /// Declare a subscribe channel for `T`.
    pub fn declare_subscriber<T: Adapt>(
        &mut self,
        topic: impl Into<String>,
    ) -> ResourceHandle<Subscriber<T>> {
        let topic = topic.into();
        self.decl.sub_topics.push(topic.clone());

        let handle = ResourceHandle::new();
        let slot = handle.clone();
        self.initializers.push(Box::new(move |ctx| {
            slot.set(ctx.init_subscriber::<T>(&topic)?);
            Ok(())
        }));
        handle
    }

    /// Declare an RPC client for `(Q, P)`.
    pub fn declare_client<Q: Adapt, P: Adapt>(
        &mut self,
        method: impl Into<String>,
    ) -> ResourceHandle<Client<Q, P>> {
        let method = method.into();
        self.decl.client_funcs.push(normalize_method(method.clone()));

        let handle = ResourceHandle::new();
        let slot = handle.clone();
        self.initializers.push(Box::new(move |ctx| {
            slot.set(ctx.init_client::<Q, P>(&method)?);
            Ok(())
        }));
        handle
    }

    /// Declare an RPC server for `(Q, P)`; handlers register against the
    /// bound handle during `on_initialize`.
    pub fn declare_server<Q: Adapt, P: Adapt>(
        &mut self,
        method: impl Into<String>,
    ) -> ResourceHandle<Server<Q, P>> {
        let method = method.into();
        self.decl.server_funcs.push(normalize_method(method.clone()));

        let handle = ResourceHandle::new();
        let slot = handle.clone();
        self.initializers.push(Box::new(move |ctx| {
            slot.set(ctx.init_server::<Q, P>(&method)?);
            Ok(())
        }));
        handle
    }

    /// Routing-only declaration: add a publish rule for a topic this module
    /// binds lazily (or not at all) without capturing an initializer.
    pub fn declare_pub_topic(&mut self, topic: impl Into<String>) -> &mut Self {
        self.decl.pub_topics.push(topic.into());
        self
    }

    /// Routing-only declaration for the subscribe side.
    pub fn declare_sub_topic(&mut self, topic: impl Into<String>) -> &mut Self {
        self.decl.sub_topics.push(topic.into());
        self
    }

    /// Routing-only declaration for a client method.
    pub fn declare_client_func(&mut self, method: impl Into<String>) -> &mut Self {
        self.decl.client_funcs.push(normalize_method(method.into()));
        self
    }

    /// Routing-only declaration for a served method.
    pub fn declare_server_func(&mut self, method: impl Into<String>) -> &mut Self {
        self.decl.server_funcs.push(normalize_method(method.into()));
        self
    }

    /// Preferred channel backends for this module's declared topics.
    pub fn with_default_channel_backends(&mut self, backends: &[&str]) -> &mut Self {
        self.decl.default_channel_backends =
            backends.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_default_rpc_backends(&mut self, backends: &[&str]) -> &mut Self {
        self.decl.default_rpc_backends = backends.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn set_log_lvl(&mut self, lvl: impl Into<String>) -> &mut Self {
        self.decl.log_lvl = Some(lvl.into());
        self
    }

    pub fn into_decl(self) -> ModuleDecl {
        self.decl
    }

    pub(crate) fn into_parts(self) -> (ModuleDecl, Vec<ResourceInitializer>) {
        (self.decl, self.initializers)
    }
}

impl std::fmt::Debug for ModuleCfg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleCfg")
            .field("module", &self.decl.name)
            .field("initializers", &self.initializers.len())
            .finish()
    }
}

/// Naming decorator with the configure-once guard, so the same module code
/// works both under the run entry and stand-alone. Owns the declared
/// resource initializers between Configure and Init.
pub struct NamedModule {
    name: String,
    module: Box<dyn Module>,
    configured: bool,
    resources: ContextResourceManager,
}

impl NamedModule {
    pub fn new(name: impl Into<String>, module: Box<dyn Module>) -> Self {
        Self {
            name: name.into(),
            module,
            configured: false,
            resources: ContextResourceManager::default(),
        }
    }

    /// Wrap with the module's own reported name.
    pub fn from_module(module: Box<dyn Module>) -> Self {
        let name = module.info().name.clone();
        Self::new(name, module)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the declaration pass once; later calls are no-ops.
    pub fn configure(&mut self) -> Option<ModuleDecl> {
        if self.configured {
            return None;
        }
        self.configured = true;
        let mut cfg = ModuleCfg::new(self.name.clone());
        self.module.on_configure(&mut cfg);
        let (decl, initializers) = cfg.into_parts();
        self.resources = ContextResourceManager::new(initializers);
        Some(decl)
    }

    /// Configure implicitly when a module is driven without the run entry.
    pub fn ensure_configured(&mut self) {
        if !self.configured {
            let _ = self.configure();
        }
    }

    /// Bind the declared resources, then hand control to the module.
    pub fn on_initialize(&mut self, ctx: &Arc<ModuleContext>) -> bool {
        self.ensure_configured();
        if let Err(err) = self.resources.bind_declared(ctx) {
            tracing::error!(module = %self.name, error = %err, "declared resource binding failed");
            return false;
        }
        self.module.on_initialize(ctx)
    }

    pub fn on_start(&mut self, ctx: &Arc<ModuleContext>) -> bool {
        self.module.on_start(ctx)
    }

    pub fn on_shutdown(&mut self, ctx: &Arc<ModuleContext>) {
        self.module.on_shutdown(ctx);
    }
}

impl std::fmt::Debug for NamedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedModule")
            .field("name", &self.name)
            .field("configured", &self.configured)
            .finish()
    }
}

#[cfg(test)]
#[path = "module_tests.rs"]
mod tests;
