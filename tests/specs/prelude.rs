// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for the scenario specs.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use em_config::{Cfg, Processor};
use em_core::WireMessage;
use em_runtime::{configure_modules, Core, NamedModule};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Seq {
    pub seq: u64,
}

impl WireMessage for Seq {
    fn type_name() -> &'static str {
        "em.specs.Seq"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Num {
    pub v: u64,
}

impl WireMessage for Num {
    fn type_name() -> &'static str {
        "em.specs.Num"
    }
}

pub type Shared<T> = Arc<parking_lot::Mutex<T>>;

pub fn shared<T: Default>() -> Shared<T> {
    Arc::new(parking_lot::Mutex::new(T::default()))
}

/// Build and initialize a core: local-backend defaults, an optional tweak
/// of the code-default layer, then the modules' declarations.
pub fn build_core(
    tweak: impl FnOnce(&mut Cfg),
    mut modules: Vec<NamedModule>,
) -> Core {
    let mut cfg = Cfg::new();
    cfg.with_default_local();
    tweak(&mut cfg);

    let mut processor = Processor::new(cfg);
    configure_modules(&mut processor, &mut modules);

    let effective = processor.effective().expect("config must merge");
    let mut core = Core::new(effective.typed, modules).expect("core must build");
    core.initialize().expect("initialize must succeed");
    core
}

pub fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("test runtime")
        .block_on(fut)
}
