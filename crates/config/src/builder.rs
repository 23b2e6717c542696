// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Code-declared configuration defaults.
//!
//! Modules declare resources during Configure; those declarations land here
//! as [`ModuleDecl`]s and become the first layer of the effective config.
//! The builder also owns the `with_default_*` helpers that pull whole
//! backend families in.

use em_core::sys;

use crate::schema::{
    BackendCfg, CoreConfig, ExecutorEntry, ExecutorEntryOptions, LogBackendCfg, ModuleEntry,
    PluginEntry, RpcFuncOptions, TopicOptions,
};

/// Everything one module declared during its Configure pass.
#[derive(Debug, Clone, Default)]
pub struct ModuleDecl {
    pub name: String,
    pub log_lvl: Option<String>,
    pub executors: Vec<ExecutorEntry>,
    pub pub_topics: Vec<String>,
    pub sub_topics: Vec<String>,
    pub client_funcs: Vec<String>,
    pub server_funcs: Vec<String>,
    /// Preferred backends for the declared topics; empty means "use the
    /// process-wide default".
    pub default_channel_backends: Vec<String>,
    pub default_rpc_backends: Vec<String>,
}

/// Accumulates the code-default configuration layer.
#[derive(Debug, Clone, Default)]
pub struct Cfg {
    core: CoreConfig,
}

impl Cfg {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn core(&self) -> &CoreConfig {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut CoreConfig {
        &mut self.core
    }

    /// The in-process backend pair plus the facilities every process needs:
    /// a timeout executor for RPC deadlines and a default log backend.
    pub fn with_default_local(&mut self) -> &mut Self {
        self.ensure_channel_backend("local");
        self.ensure_rpc_backend("local");
        self.ensure_timeout_executor();
        self.ensure_log_backend("console");
        self
    }

    /// Socket-level backends (udp for channels, tcp for channels and rpc).
    pub fn with_default_net(&mut self) -> &mut Self {
        self.ensure_channel_backend("udp");
        self.ensure_channel_backend("tcp");
        self.ensure_rpc_backend("tcp");
        self
    }

    pub fn ensure_channel_backend(&mut self, backend_type: &str) -> &mut Self {
        let backends = &mut self.core.channel.backends;
        if !backends.iter().any(|b| b.backend_type == backend_type) {
            backends.push(BackendCfg {
                backend_type: backend_type.to_owned(),
                options: Default::default(),
            });
        }
        self
    }

    pub fn channel_backend_options(&mut self, backend_type: &str, options: serde_yaml::Mapping) {
        self.ensure_channel_backend(backend_type);
        if let Some(backend) = self
            .core
            .channel
            .backends
            .iter_mut()
            .find(|b| b.backend_type == backend_type)
        {
            for (key, value) in options {
                backend.options.insert(key, value);
            }
        }
    }

    pub fn ensure_rpc_backend(&mut self, backend_type: &str) -> &mut Self {
        let backends = &mut self.core.rpc.backends;
        if !backends.iter().any(|b| b.backend_type == backend_type) {
            backends.push(BackendCfg {
                backend_type: backend_type.to_owned(),
                options: Default::default(),
            });
        }
        self
    }

    pub fn ensure_log_backend(&mut self, backend_type: &str) -> &mut Self {
        let backends = &mut self.core.log.backends;
        if !backends.iter().any(|b| b.backend_type == backend_type) {
            backends.push(LogBackendCfg {
                backend_type: backend_type.to_owned(),
                options: Default::default(),
            });
        }
        self
    }

    /// Deadline timers need a dedicated single-thread wheel; RPC timeouts
    /// fire on it.
    pub fn ensure_timeout_executor(&mut self) -> &mut Self {
        self.ensure_executor(ExecutorEntry {
            name: "default_timeout_executor".to_owned(),
            executor_type: "time_wheel".to_owned(),
            options: ExecutorEntryOptions { thread_num: 1 },
        });
        self
    }

    /// Add an executor unless one with the same name is already declared.
    pub fn ensure_executor(&mut self, entry: ExecutorEntry) -> &mut Self {
        let executors = &mut self.core.executor.executors;
        if !executors.iter().any(|e| e.name == entry.name) {
            executors.push(entry);
        }
        self
    }

    pub fn ensure_plugin(&mut self, name: &str, options: serde_yaml::Mapping) -> &mut Self {
        let plugins = &mut self.core.plugin.plugins;
        if !plugins.iter().any(|p| p.name == name) {
            plugins.push(PluginEntry {
                name: name.to_owned(),
                options,
            });
        }
        self
    }

    /// Injected rules go to the front so they win over module declarations.
    pub fn push_front_pub_topic(&mut self, options: TopicOptions) -> &mut Self {
        self.core.channel.pub_topics_options.insert(0, options);
        self
    }

    fn add_exact_topic(list: &mut Vec<TopicOptions>, topic: &str, backends: &[String]) {
        if list.iter().any(|t| t.topic_name == topic) {
            return;
        }
        list.push(TopicOptions {
            topic_name: topic.to_owned(),
            enable_backends: backends.to_vec(),
            enable_filters: Vec::new(),
        });
    }

    fn add_exact_func(list: &mut Vec<RpcFuncOptions>, func: &str, backends: &[String]) {
        if list.iter().any(|f| f.func_name == func) {
            return;
        }
        list.push(RpcFuncOptions {
            func_name: func.to_owned(),
            enable_backends: backends.to_vec(),
            enable_filters: Vec::new(),
        });
    }

    /// Fold one module's declarations in. Declared executors keep their
    /// options unless the name is already taken; declared topics and funcs
    /// get exact-match rules routed at the module's preferred backends.
    pub fn apply_module_decl(&mut self, decl: &ModuleDecl) -> &mut Self {
        let channel_backends = resolve_backends(
            &decl.default_channel_backends,
            sys::default_channel_backends,
        );
        let rpc_backends =
            resolve_backends(&decl.default_rpc_backends, sys::default_rpc_backends);

        for backend in channel_backends.iter().chain(rpc_backends.iter()) {
            if is_native_backend(backend) {
                self.ensure_channel_backend_for(backend);
            }
        }

        for executor in &decl.executors {
            self.ensure_executor(executor.clone());
        }

        for topic in &decl.pub_topics {
            Self::add_exact_topic(
                &mut self.core.channel.pub_topics_options,
                topic,
                &channel_backends,
            );
        }
        for topic in &decl.sub_topics {
            Self::add_exact_topic(
                &mut self.core.channel.sub_topics_options,
                topic,
                &channel_backends,
            );
        }
        for func in &decl.client_funcs {
            Self::add_exact_func(&mut self.core.rpc.clients_options, func, &rpc_backends);
        }
        for func in &decl.server_funcs {
            Self::add_exact_func(&mut self.core.rpc.servers_options, func, &rpc_backends);
        }

        let modules = &mut self.core.module.modules;
        if !modules.iter().any(|m| m.name == decl.name) {
            modules.push(ModuleEntry {
                name: decl.name.clone(),
                log_lvl: decl.log_lvl.clone(),
                cfg: Default::default(),
            });
        }

        self
    }

    fn ensure_channel_backend_for(&mut self, backend: &str) {
        match backend {
            "local" => {
                self.with_default_local();
            }
            "udp" | "tcp" => {
                self.with_default_net();
            }
            _ => {}
        }
    }
}

fn resolve_backends(declared: &[String], env_default: fn() -> Vec<String>) -> Vec<String> {
    if !declared.is_empty() {
        return declared.to_vec();
    }
    let from_env = env_default();
    if !from_env.is_empty() {
        return from_env;
    }
    vec!["local".to_owned()]
}

fn is_native_backend(backend: &str) -> bool {
    matches!(backend, "local" | "udp" | "tcp" | "monitor")
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
