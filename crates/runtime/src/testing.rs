// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process harness: a local-backend-only runtime for driving modules in
//! tests without sockets or config files.

use em_config::{Cfg, Processor};

use crate::core::{configure_modules, Core, CoreError};
use crate::module::NamedModule;

/// Configure, merge, and initialize a core hosting `modules` over the local
/// backend. The caller still drives `start`/`shutdown`.
pub fn local_core(modules: Vec<NamedModule>) -> Result<Core, CoreError> {
    let mut cfg = Cfg::new();
    cfg.with_default_local();

    let mut processor = Processor::new(cfg);
    let mut modules = modules;
    configure_modules(&mut processor, &mut modules);

    let effective = processor
        .effective()
        .map_err(|err| CoreError::Hook {
            state: "pre_init_configurator".to_owned(),
            reason: err.to_string(),
        })?;

    let mut core = Core::new(effective.typed, modules)?;
    core.initialize()?;
    Ok(core)
}

/// Build, start, run `f`, and shut down, returning `f`'s output.
pub fn run_started<R>(
    modules: Vec<NamedModule>,
    f: impl FnOnce(&mut Core) -> R,
) -> Result<R, CoreError> {
    let mut core = local_core(modules)?;
    core.start()?;
    let result = f(&mut core);
    core.shutdown();
    Ok(result)
}
