// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! em-app: the run entry tying the orchestrator to the command line.
//!
//! Translates the process flags into config-processor and core calls,
//! installs signal handlers, and guarantees the temporary merged config is
//! removed on exit.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use em_config::{Cfg, Processor};
use em_core::sys;
use em_runtime::{configure_modules, Core, NamedModule, ShutdownHandle};

/// Process-level flags. Long names match the runtime's established spelling
/// with underscores.
#[derive(Debug, Clone, Parser)]
#[command(name = "em")]
pub struct AppOptions {
    /// Path to the user YAML, merged after code defaults
    #[arg(long = "cfg_file_path", default_value = "")]
    pub cfg_file_path: String,

    /// Overrides process identity; $EM_APP_NAME wins over it
    #[arg(long = "process_name", default_value = "")]
    pub process_name: String,

    /// Topology file
    #[arg(
        long = "deployment_file_path",
        default_value = "../config/deployment/deployment.yaml"
    )]
    pub deployment_file_path: String,

    /// Suppress writing the `.dump` copy of the merged config
    #[arg(long = "no_dump_cfg_file", default_value_t = false)]
    pub no_dump_cfg_file: bool,

    /// Write the `.dump` copy then exit(0)
    #[arg(long = "dump_only", default_value_t = false)]
    pub dump_only: bool,

    /// Comma-separated YAML patches applied after the user file
    #[arg(long = "patch_cfg_file_path", default_value = "")]
    pub patch_cfg_file_path: String,

    /// Install SIGINT/SIGTERM handlers for graceful shutdown
    #[arg(
        long = "register_signal",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub register_signal: bool,

    /// Skip the code-defined configuration layer
    #[arg(long = "ignore_predefined_cfg", default_value_t = false)]
    pub ignore_predefined_cfg: bool,

    /// If > 0, schedule a graceful shutdown after this many seconds
    #[arg(long = "shutdown_after_seconds", default_value_t = 0)]
    pub shutdown_after_seconds: u64,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self::parse_from(["em"])
    }
}

/// `$EM_APP_NAME` beats `--process_name` beats the binary name.
pub fn resolve_process_name(options: &AppOptions) -> String {
    if let Ok(name) = std::env::var("EM_APP_NAME") {
        if !name.is_empty() {
            return name;
        }
    }
    if !options.process_name.is_empty() {
        return options.process_name.clone();
    }
    std::env::current_exe()
        .ok()
        .and_then(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "em-process".to_owned())
}

/// Where the merged effective config for this process lives.
pub fn merged_cfg_path(process_name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("em-cfg-{}-{}.yaml", process_name, std::process::id()))
}

pub fn split_patch_paths(raw: &str) -> Vec<PathBuf> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(PathBuf::from)
        .collect()
}

// Removes the temporary merged config whichever way the run ends.
struct MergedCfgGuard {
    path: PathBuf,
}

impl Drop for MergedCfgGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Console logging by default; on-robot (online mode) processes write a
/// rotating file under the data log dir instead. The returned guard must
/// stay alive for the process, it flushes the writer on drop.
fn install_tracing(process_name: &str) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if sys::online_mode() {
        let dir = sys::data_dir(sys::DataKind::Log);
        if std::fs::create_dir_all(&dir).is_ok() {
            let appender =
                tracing_appender::rolling::daily(&dir, format!("{process_name}.log"));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .try_init();
            return Some(guard);
        }
    }

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    None
}

fn spawn_signal_listener(handle: ShutdownHandle) {
    std::thread::Builder::new()
        .name("em-signal".to_owned())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    error!(error = %err, "signal listener runtime failed");
                    return;
                }
            };
            runtime.block_on(async move {
                use tokio::signal::unix::{signal, SignalKind};
                let (Ok(mut interrupt), Ok(mut terminate)) = (
                    signal(SignalKind::interrupt()),
                    signal(SignalKind::terminate()),
                ) else {
                    error!("failed to install signal handlers");
                    return;
                };
                tokio::select! {
                    _ = interrupt.recv() => info!("received SIGINT, shutting down"),
                    _ = terminate.recv() => info!("received SIGTERM, shutting down"),
                }
                handle.request();
            });
        })
        .map(|_| ())
        .unwrap_or_else(|err| error!(error = %err, "failed to spawn signal listener"));
}

fn spawn_shutdown_timer(handle: ShutdownHandle, after: Duration) {
    std::thread::Builder::new()
        .name("em-shutdown-timer".to_owned())
        .spawn(move || {
            std::thread::sleep(after);
            info!(after_seconds = after.as_secs(), "scheduled shutdown firing");
            handle.request();
        })
        .map(|_| ())
        .unwrap_or_else(|err| error!(error = %err, "failed to spawn shutdown timer"));
}

/// Run the process: merge configuration, drive the core through its
/// lifecycle, and wait for a shutdown request. Returns the process exit
/// code: 0 on a clean run, -1 on a caught failure during initialize/start.
pub fn run(options: AppOptions, modules: Vec<NamedModule>) -> i32 {
    let process_name = resolve_process_name(&options);
    let _log_guard = install_tracing(&process_name);

    match try_run(&options, modules, &process_name) {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "em runtime failed");
            -1
        }
    }
}

fn try_run(
    options: &AppOptions,
    mut modules: Vec<NamedModule>,
    process_name: &str,
) -> anyhow::Result<i32> {
    let minidump = sys::minidump_settings();
    info!(
        process = %process_name,
        minidump_enabled = minidump.enabled,
        "em runtime starting"
    );

    let mut cfg = Cfg::new();
    cfg.with_default_local();
    if !sys::online_mode() {
        cfg.ensure_log_backend("console");
    }

    let mut processor = Processor::new(cfg);
    configure_modules(&mut processor, &mut modules);

    if !options.cfg_file_path.is_empty() {
        processor.set_user_cfg_path(Some(PathBuf::from(&options.cfg_file_path)));
    }
    processor.set_user_patch_paths(split_patch_paths(&options.patch_cfg_file_path));
    processor.set_ignore_predefined(options.ignore_predefined_cfg);

    let merged_path = merged_cfg_path(process_name);
    let effective = processor
        .dump_to(&merged_path)
        .context("configuration failed")?;
    let _guard = MergedCfgGuard {
        path: merged_path.clone(),
    };

    if !options.cfg_file_path.is_empty() && !options.no_dump_cfg_file {
        let dump_path = format!("{}.dump", options.cfg_file_path);
        if let Err(err) = std::fs::copy(&merged_path, &dump_path) {
            warn!(error = %err, path = %dump_path, "failed to write cfg dump");
        }
    }

    if options.dump_only {
        let file_name = Path::new(&options.cfg_file_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{process_name}.yaml"));
        let out = PathBuf::from(format!("./{file_name}.dump"));
        std::fs::copy(&merged_path, &out)
            .with_context(|| format!("dump_only copy to {} failed", out.display()))?;
        info!(path = %out.display(), "config dumped, exiting");
        return Ok(0);
    }

    let mut core =
        Core::new(effective.typed, modules).context("core construction failed")?;
    core.initialize().context("initialize failed")?;
    core.start().context("start failed")?;

    if options.register_signal {
        spawn_signal_listener(core.shutdown_handle());
    }
    if options.shutdown_after_seconds > 0 {
        spawn_shutdown_timer(
            core.shutdown_handle(),
            Duration::from_secs(options.shutdown_after_seconds),
        );
    }

    info!(process = %process_name, "em runtime started");
    core.wait_for_shutdown_request();
    core.shutdown();
    info!(process = %process_name, "em runtime stopped");
    Ok(0)
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
