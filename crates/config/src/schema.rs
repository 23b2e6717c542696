// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed shape of the effective configuration.
//!
//! Patching happens on the raw YAML tree; this module is the final, typed
//! read of the merged document. Every list the patch engine matches by key
//! lives here: `log.backends[*].type`, `plugin.plugins[*].name`,
//! `channel.backends[*].type`, `channel.{pub,sub}_topics_options[*].topic_name`,
//! `rpc.backends[*].type`, `rpc.{clients,servers}_options[*].func_name`,
//! `executor.executors[*].name`, `module.modules[*].name`,
//! `module.pkgs[*].path`.

use serde::{Deserialize, Serialize};

fn default_lvl() -> String {
    "info".to_owned()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub configurator: serde_yaml::Mapping,
    pub main_thread: serde_yaml::Mapping,
    pub guard_thread: serde_yaml::Mapping,
    pub log: LogCfg,
    pub plugin: PluginCfg,
    pub channel: ChannelCfg,
    pub rpc: RpcCfg,
    pub executor: ExecutorCfg,
    pub module: ModuleSectionCfg,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogCfg {
    pub core_lvl: String,
    pub default_module_lvl: String,
    pub backends: Vec<LogBackendCfg>,
}

impl Default for LogCfg {
    fn default() -> Self {
        Self {
            core_lvl: default_lvl(),
            default_module_lvl: default_lvl(),
            backends: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogBackendCfg {
    #[serde(rename = "type")]
    pub backend_type: String,
    #[serde(default, skip_serializing_if = "serde_yaml::Mapping::is_empty")]
    pub options: serde_yaml::Mapping,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginCfg {
    pub plugins: Vec<PluginEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "serde_yaml::Mapping::is_empty")]
    pub options: serde_yaml::Mapping,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelCfg {
    pub backends: Vec<BackendCfg>,
    pub pub_topics_options: Vec<TopicOptions>,
    pub sub_topics_options: Vec<TopicOptions>,
}

/// One wire backend instance (channel or rpc side).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendCfg {
    #[serde(rename = "type")]
    pub backend_type: String,
    #[serde(default, skip_serializing_if = "serde_yaml::Mapping::is_empty")]
    pub options: serde_yaml::Mapping,
}

/// Regex-matched routing rule for one direction. The topic name is treated
/// as a regex; exact strings behave as `^literal$`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicOptions {
    pub topic_name: String,
    pub enable_backends: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub enable_filters: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcCfg {
    pub backends: Vec<BackendCfg>,
    pub clients_options: Vec<RpcFuncOptions>,
    pub servers_options: Vec<RpcFuncOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcFuncOptions {
    pub func_name: String,
    pub enable_backends: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub enable_filters: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorCfg {
    pub executors: Vec<ExecutorEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub executor_type: String,
    pub options: ExecutorEntryOptions,
}

impl Default for ExecutorEntry {
    fn default() -> Self {
        Self {
            name: String::new(),
            executor_type: "asio_thread".to_owned(),
            options: ExecutorEntryOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorEntryOptions {
    pub thread_num: u32,
}

impl Default for ExecutorEntryOptions {
    fn default() -> Self {
        Self { thread_num: 1 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleSectionCfg {
    pub pkgs: Vec<PkgEntry>,
    pub modules: Vec<ModuleEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PkgEntry {
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleEntry {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_lvl: Option<String>,
    #[serde(skip_serializing_if = "serde_yaml::Mapping::is_empty")]
    pub cfg: serde_yaml::Mapping,
}

impl CoreConfig {
    /// Serialize to the raw YAML tree the patch engine operates on.
    pub fn to_value(&self) -> Result<serde_yaml::Value, serde_yaml::Error> {
        serde_yaml::to_value(self)
    }

    /// Typed read of a merged tree.
    pub fn from_value(value: serde_yaml::Value) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_value(value)
    }
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
