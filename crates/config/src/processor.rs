// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Composes the four configuration layers into one effective document.
//!
//! Order: code defaults (builder + module declarations) → env-gated injected
//! defaults → user file → patches (`AGIBOT_CFG_PATCH_BEFORE`, then the
//! `--patch_cfg_file_path` list, then `AGIBOT_CFG_PATCH_AFTER`). The user
//! file and every patch file may carry mode tags.

use std::path::{Path, PathBuf};

use serde_yaml::Value;
use tracing::debug;

use em_core::sys;

use crate::builder::{Cfg, ModuleDecl};
use crate::envsub::expand_env;
use crate::error::ConfigError;
use crate::patch::{patch_root, strip_tags, PatchCtx};
use crate::schema::{CoreConfig, ExecutorEntry, ExecutorEntryOptions, TopicOptions};

/// The merged result: the raw tree (what gets dumped) and the typed view
/// (what the orchestrator consumes).
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub tree: Value,
    pub typed: CoreConfig,
}

impl EffectiveConfig {
    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(&self.tree).map_err(|source| ConfigError::Shape { source })
    }
}

#[derive(Debug, Default)]
pub struct Processor {
    cfg: Cfg,
    user_cfg_path: Option<PathBuf>,
    user_patch_paths: Vec<PathBuf>,
    ignore_predefined: bool,
}

impl Processor {
    pub fn new(cfg: Cfg) -> Self {
        Self {
            cfg,
            user_cfg_path: None,
            user_patch_paths: Vec::new(),
            ignore_predefined: false,
        }
    }

    pub fn set_user_cfg_path(&mut self, path: Option<PathBuf>) {
        self.user_cfg_path = path;
    }

    pub fn set_user_patch_paths(&mut self, paths: Vec<PathBuf>) {
        self.user_patch_paths = paths;
    }

    pub fn set_ignore_predefined(&mut self, ignore: bool) {
        self.ignore_predefined = ignore;
    }

    pub fn add_module_decl(&mut self, decl: &ModuleDecl) {
        self.cfg.apply_module_decl(decl);
    }

    /// Run all layers and return the merged document.
    pub fn effective(&self) -> Result<EffectiveConfig, ConfigError> {
        // Ignoring the predefined layer means the user file IS the base
        // document (dump-and-reuse); otherwise the user file patches the
        // code-default tree.
        let mut tree = if self.ignore_predefined {
            match &self.user_cfg_path {
                Some(path) => read_file(path)?,
                None => CoreConfig::default()
                    .to_value()
                    .map_err(|source| ConfigError::Shape { source })?,
            }
        } else {
            let mut cfg = self.cfg.clone();
            inject_env_defaults(&mut cfg);
            let mut tree = cfg
                .core()
                .to_value()
                .map_err(|source| ConfigError::Shape { source })?;
            if let Some(path) = &self.user_cfg_path {
                apply_file(&mut tree, path)?;
            }
            tree
        };

        for path in sys::cfg_patch_before() {
            apply_file(&mut tree, Path::new(&path))?;
        }
        for path in &self.user_patch_paths {
            apply_file(&mut tree, path)?;
        }
        for path in sys::cfg_patch_after() {
            apply_file(&mut tree, Path::new(&path))?;
        }

        strip_tags(&mut tree);

        let typed = CoreConfig::from_value(tree.clone())
            .map_err(|source| ConfigError::Shape { source })?;

        Ok(EffectiveConfig { tree, typed })
    }

    /// Write the merged document to `path`.
    pub fn dump_to(&self, path: &Path) -> Result<EffectiveConfig, ConfigError> {
        let effective = self.effective()?;
        let text = effective.to_yaml_string()?;
        std::fs::write(path, text).map_err(|source| ConfigError::Dump {
            path: path.to_owned(),
            source,
        })?;
        Ok(effective)
    }
}

fn read_file(path: &Path) -> Result<Value, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_owned(),
        source,
    })?;
    serde_yaml::from_str(&expand_env(&text)).map_err(|source| ConfigError::Yaml {
        path: path.to_owned(),
        source,
    })
}

fn apply_file(tree: &mut Value, path: &Path) -> Result<(), ConfigError> {
    debug!(path = %path.display(), "applying cfg layer");
    let ext = read_file(path)?;
    let ctx = PatchCtx::new(path.display().to_string());
    patch_root(tree, &ext, &ctx)
}

const HEARTBEAT_TOPIC: &str = "/aima/heartbeat";
const HDS_TOPIC: &str = "/aima/hds/exception";
const TRACE_TOPIC: &str = "/aimrte/trace/events";
const DEFAULT_MONITOR_EXECUTOR: &str = "default_monitor_executor";

/// Layer two: defaults injected depending on environment toggles.
fn inject_env_defaults(cfg: &mut Cfg) {
    if sys::enable_flag("HDS") {
        inject_hds(cfg);
    }
    if sys::enable_flag("MONITOR") {
        inject_monitor(cfg);
    }
    if sys::enable_flag("TRACE") {
        cfg.push_front_pub_topic(TopicOptions {
            topic_name: TRACE_TOPIC.to_owned(),
            enable_backends: vec!["local".to_owned()],
            enable_filters: Vec::new(),
        });
        cfg.with_default_local();
    }
}

fn inject_hds(cfg: &mut Cfg) {
    let backend = sys::feature_hds_new_backend().unwrap_or_default();
    let enable_backends = match backend.as_str() {
        "udp" => {
            cfg.with_default_net();
            let monitor_ip =
                std::env::var("HDS_MONITOR_IP").unwrap_or_else(|_| "127.0.0.1".to_owned());
            let mut options = serde_yaml::Mapping::new();
            options.insert(
                Value::String("server_url_list".to_owned()),
                Value::Sequence(vec![Value::String(format!("{monitor_ip}:51587"))]),
            );
            cfg.channel_backend_options("udp", options);
            vec!["udp".to_owned()]
        }
        // ros2/zenoh are externally registered backends; route at them by name
        "ros2" | "zenoh" => vec![backend],
        _ => {
            cfg.with_default_local();
            vec!["local".to_owned()]
        }
    };

    cfg.push_front_pub_topic(TopicOptions {
        topic_name: HDS_TOPIC.to_owned(),
        enable_backends,
        enable_filters: Vec::new(),
    });
}

fn inject_monitor(cfg: &mut Cfg) {
    let mut plugin_options = serde_yaml::Mapping::new();
    plugin_options.insert(
        Value::String("executor".to_owned()),
        Value::String(DEFAULT_MONITOR_EXECUTOR.to_owned()),
    );
    plugin_options.insert(
        Value::String("heartbeat_interval_ms".to_owned()),
        Value::Number((sys::heartbeat_interval_ms().as_millis() as u64).into()),
    );
    cfg.ensure_plugin("monitor_plugin", plugin_options);
    cfg.ensure_channel_backend("monitor");
    cfg.ensure_rpc_backend("monitor");
    cfg.ensure_executor(ExecutorEntry {
        name: DEFAULT_MONITOR_EXECUTOR.to_owned(),
        executor_type: "asio_thread".to_owned(),
        options: ExecutorEntryOptions { thread_num: 3 },
    });

    let enable_backends = match sys::feature_heartbeat_new_backend().as_deref() {
        Some(backend @ ("ros2" | "zenoh" | "mqtt")) => vec![backend.to_owned()],
        _ => {
            cfg.with_default_local();
            vec!["local".to_owned()]
        }
    };

    cfg.push_front_pub_topic(TopicOptions {
        topic_name: HEARTBEAT_TOPIC.to_owned(),
        enable_backends,
        enable_filters: vec!["monitor".to_owned()],
    });
}

#[cfg(test)]
#[path = "processor_tests.rs"]
mod tests;
