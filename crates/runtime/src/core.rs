// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The lifecycle orchestrator: builds executors, backends, and registries
//! from the effective configuration, drives the modules through their
//! phases, and tears everything down in reverse on shutdown or failure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use em_backend::{
    Backend, BackendError, BackendHub, LocalBackend, MonitorBackend, TcpBackend, UdpBackend,
};
use em_channel::{ChannelError, ChannelFilter, FilterRegistry, MessageWrapper, RuleList};
use em_config::{CoreConfig, Processor};
use em_executor::{ExecutorError, ExecutorKind, ExecutorManager, ExecutorSpec};
use em_rpc::{RpcError, RpcFilter, RpcFilterRegistry};

use crate::context::{Fabric, ModuleContext, SharedInit};
use crate::lifecycle::{Edge, HookRegistry, Stage, State, Subsystem, SUBSYSTEMS};
use crate::module::NamedModule;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("hook failed at [{state}]: {reason}")]
    Hook { state: String, reason: String },

    #[error("module [{0}] initialize failed")]
    ModuleInit(String),

    #[error("module [{0}] start failed")]
    ModuleStart(String),

    #[error("unknown executor type [{kind}] for executor [{name}]")]
    UnknownExecutorKind { name: String, kind: String },

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Run every module's declaration pass into the config processor.
pub fn configure_modules(processor: &mut Processor, modules: &mut [NamedModule]) {
    for module in modules.iter_mut() {
        if let Some(decl) = module.configure() {
            processor.add_module_decl(&decl);
        }
    }
}

/// Requests a graceful shutdown from signal handlers or timers.
#[derive(Clone, Default)]
pub struct ShutdownHandle {
    notify: Arc<tokio::sync::Notify>,
    requested: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    pub async fn wait(&self) {
        loop {
            if self.is_requested() {
                return;
            }
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // register before the re-check so a request in between is not lost
            notified.as_mut().enable();
            if self.is_requested() {
                return;
            }
            notified.await;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Created,
    Initialized,
    Started,
    Shutdown,
}

/// Observation tap the monitor plugin reads; registered as the `monitor`
/// filter on both fabrics.
#[derive(Default)]
struct MonitorTapFilter {
    seen: std::sync::atomic::AtomicU64,
}

impl ChannelFilter for MonitorTapFilter {
    fn name(&self) -> &str {
        "monitor"
    }

    fn on_publish(&self, msg: MessageWrapper) -> Option<MessageWrapper> {
        self.seen.fetch_add(1, Ordering::Relaxed);
        Some(msg)
    }
}

impl RpcFilter for MonitorTapFilter {
    fn name(&self) -> &str {
        "monitor"
    }
}

pub struct Core {
    config: CoreConfig,
    modules: Vec<NamedModule>,
    contexts: Vec<Arc<ModuleContext>>,
    hooks: HookRegistry,
    state: RunState,

    shared_init: Arc<Mutex<SharedInit>>,
    server_rules: RuleList,
    exe_manager: Option<Arc<ExecutorManager>>,
    hub: Option<Arc<BackendHub>>,

    shutdown_handle: ShutdownHandle,
    // drives async scope drains from the synchronous lifecycle edge
    driver: StdMutex<Option<tokio::runtime::Runtime>>,
}

impl Core {
    pub fn new(config: CoreConfig, modules: Vec<NamedModule>) -> Result<Self, CoreError> {
        let driver = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            config,
            modules,
            contexts: Vec::new(),
            hooks: HookRegistry::new(),
            state: RunState::Created,
            shared_init: Arc::new(Mutex::new(SharedInit::default())),
            server_rules: RuleList::default(),
            exe_manager: None,
            hub: None,
            shutdown_handle: ShutdownHandle::default(),
            driver: StdMutex::new(Some(driver)),
        })
    }

    pub fn register_hook<F>(&mut self, state: State, hook: F)
    where
        F: Fn() -> Result<(), String> + Send + 'static,
    {
        self.hooks.register(state, hook);
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown_handle.clone()
    }

    pub fn context(&self, module_name: &str) -> Option<&Arc<ModuleContext>> {
        self.contexts
            .iter()
            .find(|ctx| ctx.name() == module_name)
    }

    fn run_hooks(&self, state: State) -> Result<(), CoreError> {
        self.hooks.run(state).map_err(|(state, reason)| CoreError::Hook {
            state: state.to_string(),
            reason,
        })
    }

    fn enter(&self, stage: Stage, subsystem: Subsystem) -> Result<(), CoreError> {
        self.run_hooks(State::of(stage, Edge::Pre, subsystem))
    }

    fn leave(&self, stage: Stage, subsystem: Subsystem) -> Result<(), CoreError> {
        self.run_hooks(State::of(stage, Edge::Post, subsystem))
    }

    pub fn initialize(&mut self) -> Result<(), CoreError> {
        debug_assert_eq!(self.state, RunState::Created);
        match self.do_initialize() {
            Ok(()) => {
                self.state = RunState::Initialized;
                Ok(())
            }
            Err(err) => {
                self.tear_down();
                Err(err)
            }
        }
    }

    fn do_initialize(&mut self) -> Result<(), CoreError> {
        self.run_hooks(State::stage_boundary(Stage::Init, Edge::Pre))?;

        for subsystem in SUBSYSTEMS {
            self.enter(Stage::Init, subsystem)?;
            match subsystem {
                Subsystem::Executor => self.init_executors()?,
                Subsystem::Channel => self.init_channel()?,
                Subsystem::Rpc => self.init_rpc()?,
                Subsystem::Plugin => self.init_backends()?,
                Subsystem::Modules => self.init_modules()?,
                // configurator, threads, log, allocator, parameter: nothing
                // to build in-process; the states exist for hooks
                _ => {}
            }
            self.leave(Stage::Init, subsystem)?;
        }

        self.freeze_fabric();
        self.run_hooks(State::stage_boundary(Stage::Init, Edge::Post))?;
        Ok(())
    }

    fn init_executors(&mut self) -> Result<(), CoreError> {
        let mut specs = Vec::with_capacity(self.config.executor.executors.len());
        for entry in &self.config.executor.executors {
            let kind: ExecutorKind =
                entry
                    .executor_type
                    .parse()
                    .map_err(|_| CoreError::UnknownExecutorKind {
                        name: entry.name.clone(),
                        kind: entry.executor_type.clone(),
                    })?;
            specs.push(ExecutorSpec {
                name: entry.name.clone(),
                kind,
                thread_num: entry.options.thread_num,
            });
        }
        self.exe_manager = Some(Arc::new(ExecutorManager::build(&specs)?));
        Ok(())
    }

    fn init_channel(&mut self) -> Result<(), CoreError> {
        let mut shared = self.shared_init.lock();
        for option in &self.config.channel.pub_topics_options {
            shared.channel.add_pub_rule(
                &option.topic_name,
                option.enable_backends.clone(),
                option.enable_filters.clone(),
            )?;
        }
        for option in &self.config.channel.sub_topics_options {
            shared.channel.add_sub_rule(
                &option.topic_name,
                option.enable_backends.clone(),
                option.enable_filters.clone(),
            )?;
        }
        Ok(())
    }

    fn init_rpc(&mut self) -> Result<(), CoreError> {
        let mut shared = self.shared_init.lock();
        for option in &self.config.rpc.clients_options {
            shared.rpc.add_client_rule(
                &option.func_name,
                option.enable_backends.clone(),
                option.enable_filters.clone(),
            )?;
        }
        drop(shared);
        for option in &self.config.rpc.servers_options {
            self.server_rules.push(
                &option.func_name,
                option.enable_backends.clone(),
                option.enable_filters.clone(),
            )?;
        }
        Ok(())
    }

    fn init_backends(&mut self) -> Result<(), CoreError> {
        let mut hub = BackendHub::new();

        let configured = self
            .config
            .channel
            .backends
            .iter()
            .chain(self.config.rpc.backends.iter());
        for backend_cfg in configured {
            if hub.contains(&backend_cfg.backend_type) {
                continue;
            }
            let backend: Arc<dyn Backend> = match backend_cfg.backend_type.as_str() {
                "local" => Arc::new(LocalBackend::new()),
                "udp" => Arc::new(UdpBackend::new()),
                "tcp" => Arc::new(TcpBackend::new()),
                "monitor" => Arc::new(MonitorBackend::new()),
                other => {
                    // externally provided carriers (ros2, mqtt, zenoh, ...)
                    // register through plugins; without one the name routes
                    // nowhere
                    warn!(backend = other, "no native backend for configured type");
                    continue;
                }
            };
            backend.initialize(backend_cfg.options.clone())?;
            hub.insert(backend);
        }

        self.hub = Some(Arc::new(hub));
        Ok(())
    }

    fn init_modules(&mut self) -> Result<(), CoreError> {
        let Some(exe_manager) = self.exe_manager.clone() else {
            return Ok(());
        };

        for module in &mut self.modules {
            let ctx = ModuleContext::new(
                module.name(),
                Arc::clone(&exe_manager),
                Arc::clone(&self.shared_init),
            );
            info!(module = module.name(), context_id = ctx.id(), "initializing module");
            if !module.on_initialize(&ctx) {
                return Err(CoreError::ModuleInit(module.name().to_owned()));
            }
            self.contexts.push(ctx);
        }
        Ok(())
    }

    /// Freeze the registries, hand them to the backends, and fan the
    /// registered endpoints out to their matched backend sets.
    fn freeze_fabric(&mut self) {
        let shared = std::mem::take(&mut *self.shared_init.lock());
        let channel_registry = shared.channel.freeze();
        let rpc_registry = shared.rpc.freeze();

        let mut filters = FilterRegistry::new();
        let mut rpc_filters = RpcFilterRegistry::new();
        filters.register(Arc::new(MonitorTapFilter::default()));
        rpc_filters.register(Arc::new(MonitorTapFilter::default()));

        let Some(hub) = self.hub.clone() else {
            return;
        };

        for backend in hub.iter() {
            backend.set_channel_registry(Arc::clone(&channel_registry));
            backend.set_rpc_registry(Arc::clone(&rpc_registry));
        }

        for wrapper in channel_registry.publish_types() {
            if let Some(backends) = channel_registry.pub_backends(&wrapper.topic) {
                for name in backends {
                    if let Some(backend) = hub.get(name) {
                        backend.register_publish_type(wrapper);
                    }
                }
            }
        }

        // a subscription registers with every backend its topic matched
        for wrapper in channel_registry.all_subscriptions() {
            let Some(backends) = channel_registry.sub_backends(&wrapper.topic) else {
                continue;
            };
            for name in backends {
                match hub.get(name) {
                    Some(backend) => {
                        backend.subscribe(Arc::clone(wrapper));
                    }
                    None => {
                        warn!(backend = %name, topic = %wrapper.topic, "subscription routed at absent backend");
                    }
                }
            }
        }

        for service in rpc_registry.services() {
            let full = service.method.full();
            match self.server_rules.match_backends(&full) {
                Some(backends) => {
                    for name in backends {
                        if let Some(backend) = hub.get(name) {
                            backend.register_service_func(Arc::clone(service));
                        }
                    }
                }
                None => {
                    warn!(method = %full, "service matched no server rule");
                }
            }
        }

        for client in rpc_registry.clients() {
            let full = client.method.full();
            if let Some(backends) = rpc_registry.client_backends(&full) {
                for name in backends {
                    if let Some(backend) = hub.get(name) {
                        backend.register_client_func(client);
                    }
                }
            }
        }

        let fabric = Fabric {
            channel: channel_registry,
            rpc: rpc_registry,
            hub,
            filters: Arc::new(filters),
            rpc_filters: Arc::new(rpc_filters),
        };
        for ctx in &self.contexts {
            ctx.install_fabric(fabric.clone());
        }
    }

    pub fn start(&mut self) -> Result<(), CoreError> {
        debug_assert_eq!(self.state, RunState::Initialized);
        match self.do_start() {
            Ok(()) => {
                self.state = RunState::Started;
                Ok(())
            }
            Err(err) => {
                self.tear_down();
                Err(err)
            }
        }
    }

    fn do_start(&mut self) -> Result<(), CoreError> {
        self.run_hooks(State::stage_boundary(Stage::Start, Edge::Pre))?;

        for subsystem in SUBSYSTEMS {
            self.enter(Stage::Start, subsystem)?;
            match subsystem {
                Subsystem::Channel => {
                    if let Some(hub) = &self.hub {
                        for backend in hub.iter() {
                            backend.start()?;
                        }
                    }
                }
                Subsystem::Modules => {
                    for (module, ctx) in self.modules.iter_mut().zip(&self.contexts) {
                        ctx.enter_running();
                        info!(module = module.name(), "starting module");
                        if !module.on_start(ctx) {
                            return Err(CoreError::ModuleStart(module.name().to_owned()));
                        }
                    }
                }
                _ => {}
            }
            self.leave(Stage::Start, subsystem)?;
        }

        self.run_hooks(State::stage_boundary(Stage::Start, Edge::Post))?;
        Ok(())
    }

    /// Reverse-walk shutdown. Idempotent; also the tear-down path for
    /// failures during initialize/start.
    pub fn shutdown(&mut self) {
        if self.state == RunState::Shutdown {
            return;
        }
        self.state = RunState::Shutdown;
        self.shutdown_handle.request();

        let _ = self.run_hooks(State::stage_boundary(Stage::Shutdown, Edge::Pre));

        for subsystem in SUBSYSTEMS.iter().rev() {
            let _ = self.run_hooks(State::of(Stage::Shutdown, Edge::Pre, *subsystem));
            match subsystem {
                Subsystem::Modules => self.shutdown_modules(),
                Subsystem::Channel => {
                    if let Some(hub) = &self.hub {
                        hub.shutdown();
                    }
                }
                Subsystem::Executor => {
                    if let Some(exe_manager) = &self.exe_manager {
                        exe_manager.shutdown();
                    }
                }
                _ => {}
            }
            let _ = self.run_hooks(State::of(Stage::Shutdown, Edge::Post, *subsystem));
        }

        let _ = self.run_hooks(State::stage_boundary(Stage::Shutdown, Edge::Post));
        debug!("core shutdown complete");
    }

    fn shutdown_modules(&mut self) {
        let driver = self.driver.lock().ok().and_then(|mut slot| slot.take());

        for (module, ctx) in self.modules.iter_mut().zip(&self.contexts).rev() {
            info!(module = module.name(), "shutting down module");
            ctx.enter_shutdown();
            module.on_shutdown(ctx);
            if let Some(driver) = &driver {
                driver.block_on(ctx.scope().cleanup());
            }
        }
    }

    fn tear_down(&mut self) {
        warn!("startup failed, tearing down entered states");
        self.shutdown();
    }

    /// Block the calling thread until someone requests a shutdown.
    pub fn wait_for_shutdown_request(&self) {
        let handle = self.shutdown_handle.clone();
        if handle.is_requested() {
            return;
        }
        if let Ok(slot) = self.driver.lock() {
            if let Some(driver) = slot.as_ref() {
                driver.block_on(handle.wait());
            }
        }
    }
}

impl std::fmt::Debug for Core {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Core")
            .field("state", &self.state)
            .field("modules", &self.modules.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "core_tests.rs"]
mod tests;
