// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared error kinds for fatal API misuse.
//!
//! Misuse errors carry the source location of the offending call so the log
//! line points at user code, not at the runtime internals.

use thiserror::Error;

/// Source location captured at the outermost user-facing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    file: &'static str,
    line: u32,
}

impl Location {
    pub const fn new(file: &'static str, line: u32) -> Self {
        Self { file, line }
    }

    /// Capture the nearest `#[track_caller]` call site.
    #[track_caller]
    pub fn capture() -> Self {
        let caller = std::panic::Location::caller();
        Self {
            file: caller.file(),
            line: caller.line(),
        }
    }

    pub const fn file(&self) -> &'static str {
        self.file
    }

    pub const fn line(&self) -> u32 {
        self.line
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Capture the current source location as an [`Location`](crate::error::Location).
#[macro_export]
macro_rules! location {
    () => {
        $crate::error::Location::new(file!(), line!())
    };
}

/// Fatal misuse of the runtime API: wrong lifecycle phase, missing resource,
/// or a descriptor used against the wrong context. These abort module
/// initialization; they are never returned from per-message paths.
#[derive(Debug, Error)]
pub enum MisuseError {
    #[error("{loc}: resource [{name}] is not bound to any context")]
    ResourceUnbound { name: String, loc: Location },

    #[error("{loc}: wrong use of resource [{name}]: current context is [{ours}], but yours is [{theirs}]")]
    ContextMismatch {
        name: String,
        ours: u32,
        theirs: u32,
        loc: Location,
    },

    #[error("{loc}: resource name [{name}] is already bound to a different slot in this context")]
    DuplicateName { name: String, loc: Location },

    #[error("{loc}: [{op}] is not legal during [{phase}]")]
    WrongPhase {
        op: &'static str,
        phase: String,
        loc: Location,
    },

    #[error("{loc}: no executor named [{name}] is configured")]
    MissingExecutor { name: String, loc: Location },

    #[error("{loc}: no backend matches [{name}]")]
    MissingBackend { name: String, loc: Location },

    #[error("{loc}: no service registered under [{name}]")]
    MissingService { name: String, loc: Location },

    #[error("{loc}: no runtime context is installed on this task")]
    NoAmbientContext { loc: Location },

    #[error("{loc}: {message}")]
    Raised { message: String, loc: Location },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
