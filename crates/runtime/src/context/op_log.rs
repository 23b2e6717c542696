// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Logging, checked conditions, and log-then-fail.

use em_core::{Location, MisuseError};
use tracing::{debug, error, info, trace, warn};

use super::ModuleContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl ModuleContext {
    /// Structured log line decorated with this module's name.
    pub fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Trace => trace!(module = %self.name(), "{message}"),
            LogLevel::Debug => debug!(module = %self.name(), "{message}"),
            LogLevel::Info => info!(module = %self.name(), "{message}"),
            LogLevel::Warn => warn!(module = %self.name(), "{message}"),
            LogLevel::Error => error!(module = %self.name(), "{message}"),
        }
    }

    pub fn log_info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn log_warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    pub fn log_error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    /// Check a condition and pick the follow-up on failure.
    #[track_caller]
    pub fn check(&self, condition: bool) -> Check<'_> {
        Check {
            ctx: self,
            condition,
            loc: Location::capture(),
        }
    }

    /// Log at error level and produce the error to propagate.
    #[track_caller]
    pub fn raise(&self, message: impl Into<String>) -> MisuseError {
        let message = message.into();
        let loc = Location::capture();
        error!(module = %self.name(), %loc, "{message}");
        MisuseError::Raised { message, loc }
    }
}

/// Deferred follow-up of a `check` call.
pub struct Check<'a> {
    ctx: &'a ModuleContext,
    condition: bool,
    loc: Location,
}

impl Check<'_> {
    pub fn holds(&self) -> bool {
        self.condition
    }

    /// Log at error level when the condition failed. Returns the condition
    /// so call sites can branch on it.
    pub fn error_log(self, message: &str) -> bool {
        if !self.condition {
            error!(module = %self.ctx.name(), loc = %self.loc, "{message}");
        }
        self.condition
    }

    /// Log at warn level when the condition failed.
    pub fn warn_log(self, message: &str) -> bool {
        if !self.condition {
            warn!(module = %self.ctx.name(), loc = %self.loc, "{message}");
        }
        self.condition
    }

    /// Log then fail: `Err` carries the captured call site.
    pub fn or_raise(self, message: impl Into<String>) -> Result<(), MisuseError> {
        if self.condition {
            return Ok(());
        }
        let message = message.into();
        error!(module = %self.ctx.name(), loc = %self.loc, "{message}");
        Err(MisuseError::Raised {
            message,
            loc: self.loc,
        })
    }
}
