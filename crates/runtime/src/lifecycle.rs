// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The phased state machine and its hook points.
//!
//! Each stage (Init, Start, Shutdown) opens with a bare Pre state, walks a
//! Pre/Post pair per subsystem, and closes with a bare Post state. Shutdown
//! walks the subsystems in reverse. Hooks run in registration order; a hook
//! failure aborts startup and triggers a tear-down through the states
//! already entered.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Init,
    Start,
    Shutdown,
}

em_core::simple_display! {
    Stage {
        Init => "init",
        Start => "start",
        Shutdown => "shutdown",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    Pre,
    Post,
}

em_core::simple_display! {
    Edge {
        Pre => "pre",
        Post => "post",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsystem {
    Configurator,
    Plugin,
    MainThread,
    GuardThread,
    Executor,
    Log,
    Allocator,
    Rpc,
    Channel,
    Parameter,
    Modules,
}

em_core::simple_display! {
    Subsystem {
        Configurator => "configurator",
        Plugin => "plugin",
        MainThread => "main_thread",
        GuardThread => "guard_thread",
        Executor => "executor",
        Log => "log",
        Allocator => "allocator",
        Rpc => "rpc",
        Channel => "channel",
        Parameter => "parameter",
        Modules => "modules",
    }
}

pub const SUBSYSTEMS: [Subsystem; 11] = [
    Subsystem::Configurator,
    Subsystem::Plugin,
    Subsystem::MainThread,
    Subsystem::GuardThread,
    Subsystem::Executor,
    Subsystem::Log,
    Subsystem::Allocator,
    Subsystem::Rpc,
    Subsystem::Channel,
    Subsystem::Parameter,
    Subsystem::Modules,
];

/// One hookable point of the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct State {
    pub stage: Stage,
    pub edge: Edge,
    pub subsystem: Option<Subsystem>,
}

impl State {
    pub const fn stage_boundary(stage: Stage, edge: Edge) -> Self {
        Self {
            stage,
            edge,
            subsystem: None,
        }
    }

    pub const fn of(stage: Stage, edge: Edge, subsystem: Subsystem) -> Self {
        Self {
            stage,
            edge,
            subsystem: Some(subsystem),
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.subsystem {
            Some(subsystem) => write!(f, "{}_{}_{}", self.edge, self.stage, subsystem),
            None => write!(f, "{}_{}", self.edge, self.stage),
        }
    }
}

/// Every state in walk order.
pub fn ordered_states() -> Vec<State> {
    let mut states = Vec::new();
    for stage in [Stage::Init, Stage::Start] {
        states.push(State::stage_boundary(stage, Edge::Pre));
        for subsystem in SUBSYSTEMS {
            states.push(State::of(stage, Edge::Pre, subsystem));
            states.push(State::of(stage, Edge::Post, subsystem));
        }
        states.push(State::stage_boundary(stage, Edge::Post));
    }
    states.push(State::stage_boundary(Stage::Shutdown, Edge::Pre));
    for subsystem in SUBSYSTEMS.iter().rev() {
        states.push(State::of(Stage::Shutdown, Edge::Pre, *subsystem));
        states.push(State::of(Stage::Shutdown, Edge::Post, *subsystem));
    }
    states.push(State::stage_boundary(Stage::Shutdown, Edge::Post));
    states
}

type Hook = Box<dyn Fn() -> Result<(), String> + Send>;

/// Hooks per state, run in registration order.
#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<State, Vec<Hook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, state: State, hook: F)
    where
        F: Fn() -> Result<(), String> + Send + 'static,
    {
        self.hooks.entry(state).or_default().push(Box::new(hook));
    }

    /// Run the hooks of one state; the first failure wins and is returned
    /// with the state it happened in.
    pub fn run(&self, state: State) -> Result<(), (State, String)> {
        let Some(hooks) = self.hooks.get(&state) else {
            return Ok(());
        };
        for hook in hooks {
            hook().map_err(|reason| (state, reason))?;
        }
        Ok(())
    }

    pub fn registered_states(&self) -> usize {
        self.hooks.len()
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("states", &self.hooks.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
