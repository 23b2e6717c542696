// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed accessors for the process environment.
//!
//! Boolean toggles accept `1/true/on/yes` (case-insensitive); anything else,
//! including an unset variable, reads as the documented default.

use std::time::Duration;

fn bool_env(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(value) => matches!(
            value.to_ascii_lowercase().as_str(),
            "1" | "true" | "on" | "yes"
        ),
        Err(_) => default,
    }
}

fn int_env(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

fn string_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

fn list_env(key: &str, separator: char) -> Vec<String> {
    string_env(key)
        .map(|value| {
            value
                .split(separator)
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// Crash-dump knobs (`AIMRTE_MINIDUMP_*`). The dump writer itself is an
/// external collaborator; the runtime only parses and forwards these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinidumpSettings {
    pub enabled: bool,
    pub count: u32,
    pub max_dump_size_kb: u32,
    pub enable_rotation: bool,
}

pub fn minidump_settings() -> MinidumpSettings {
    // The writer cannot produce anything useful below 500 KB.
    const MIN_DUMP_SIZE_KB: i64 = 500;

    MinidumpSettings {
        enabled: bool_env("AIMRTE_MINIDUMP_ENABLED", true),
        count: int_env("AIMRTE_MINIDUMP_COUNT", 3).max(0) as u32,
        max_dump_size_kb: int_env("AIMRTE_MINIDUMP_MAX_DUMP_SIZE_KB", MIN_DUMP_SIZE_KB)
            .max(MIN_DUMP_SIZE_KB) as u32,
        enable_rotation: bool_env("AIMRTE_MINIDUMP_ENABLE_ROTATION", true),
    }
}

pub fn heartbeat_interval_ms() -> Duration {
    Duration::from_millis(int_env("AIMRTE_HEARTBEAT_INTERVAL", 1000).max(1) as u64)
}

/// `AGIBOT_ENABLE_<FEATURE>` toggle, default off.
pub fn enable_flag(feature: &str) -> bool {
    bool_env(&format!("AGIBOT_ENABLE_{feature}"), false)
}

pub fn online_mode() -> bool {
    enable_flag("ONLINE_MODE")
}

pub fn default_channel_backends() -> Vec<String> {
    list_env("AGIBOT_DEFAULT_CHANNEL_BACKENDS", '|')
}

pub fn default_rpc_backends() -> Vec<String> {
    list_env("AGIBOT_DEFAULT_RPC_BACKENDS", '|')
}

pub fn default_logger_backends() -> Vec<String> {
    list_env("AGIBOT_DEFAULT_LOGGER_BACKENDS", '|')
}

pub fn default_executor_type() -> String {
    string_env("AGIBOT_DEFAULT_EXECUTOR_TYPE").unwrap_or_else(|| "asio_thread".to_owned())
}

/// Patch files applied before the user patch list, `;`-separated.
pub fn cfg_patch_before() -> Vec<String> {
    list_env("AGIBOT_CFG_PATCH_BEFORE", ';')
}

/// Patch files applied after the user patch list, `;`-separated.
pub fn cfg_patch_after() -> Vec<String> {
    list_env("AGIBOT_CFG_PATCH_AFTER", ';')
}

pub fn feature_hds_new_backend() -> Option<String> {
    string_env("AGIBOT_FEATURE_HDS_NEW_BACKEND")
}

pub fn feature_heartbeat_new_backend() -> Option<String> {
    string_env("AGIBOT_FEATURE_HEARTBEAT_NEW_BACKEND")
}

/// Raw YAML blob overriding ROS2 channel QoS, forwarded untouched.
pub fn feature_ros2_channel_qos() -> Option<String> {
    string_env("AGIBOT_FEATURE_ROS2_CHANNEL_QOS")
}

pub fn feature_log_sync_interval_ms() -> Option<Duration> {
    string_env("AGIBOT_FEATURE_LOG_SYNC_INTERVAL")
        .and_then(|value| value.trim().parse().ok())
        .map(Duration::from_millis)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
