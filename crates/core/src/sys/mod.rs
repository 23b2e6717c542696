// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! System facilities: filesystem layout, device info files, env toggles.

mod config;
mod info;
mod paths;

pub use config::{
    cfg_patch_after, cfg_patch_before, default_channel_backends, default_executor_type,
    default_logger_backends, default_rpc_backends, enable_flag, feature_hds_new_backend,
    feature_heartbeat_new_backend, feature_log_sync_interval_ms, feature_ros2_channel_qos,
    heartbeat_interval_ms, minidump_settings, online_mode, MinidumpSettings,
};
pub use info::{read_info, software_version, InfoKey, SysInfoError};
pub use paths::{agibot_home, data_dir, module_tmp_dir, process_tmp_dir, DataKind};
