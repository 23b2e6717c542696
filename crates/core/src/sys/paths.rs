// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted filesystem layout under `$AGIBOT_HOME`.
//!
//! ```text
//! $AGIBOT_HOME/agibot/
//!   data/{info,var,param,tmp,log,ota,minidump}
//!   software
//!   sys
//! ```
//!
//! Per-process scratch lives at `data/tmp/agibot-<user>/proc/<process>`;
//! per-module scratch one level further down at `mod/<module>/<pid>`.

use std::path::PathBuf;

/// Subdirectories of `$AGIBOT_HOME/agibot/data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    Info,
    Var,
    Param,
    Tmp,
    Log,
    Ota,
    Minidump,
}

crate::simple_display! {
    DataKind {
        Info => "info",
        Var => "var",
        Param => "param",
        Tmp => "tmp",
        Log => "log",
        Ota => "ota",
        Minidump => "minidump",
    }
}

/// Root of the persisted layout: `$AGIBOT_HOME`, falling back to the user's
/// home directory, falling back to `/tmp`.
pub fn agibot_home() -> PathBuf {
    if let Ok(home) = std::env::var("AGIBOT_HOME") {
        if !home.is_empty() {
            return PathBuf::from(home);
        }
    }
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("/tmp"))
}

pub fn data_dir(kind: DataKind) -> PathBuf {
    agibot_home()
        .join("agibot")
        .join("data")
        .join(kind.to_string())
}

fn user_name() -> String {
    std::env::var("USER").unwrap_or_else(|_| "unknown".to_owned())
}

/// Per-process tmp directory: `data/tmp/agibot-<user>/proc/<process_name>`.
pub fn process_tmp_dir(process_name: &str) -> PathBuf {
    data_dir(DataKind::Tmp)
        .join(format!("agibot-{}", user_name()))
        .join("proc")
        .join(process_name)
}

/// Per-module tmp directory: `.../proc/<process>/mod/<module>/<pid>`.
pub fn module_tmp_dir(process_name: &str, module_name: &str, pid: u32) -> PathBuf {
    process_tmp_dir(process_name)
        .join("mod")
        .join(module_name)
        .join(pid.to_string())
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
