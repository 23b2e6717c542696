// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Domain-level result of an RPC call. Per-call failures come back as a
//! `Status`; the framework never aborts on them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StatusCode {
    #[default]
    Ok,
    Cancelled,
    Timeout,
    Unavailable,
    InvalidArg,
    Internal,
    Unknown,
}

em_core::simple_display! {
    StatusCode {
        Ok => "OK",
        Cancelled => "CANCELLED",
        Timeout => "TIMEOUT",
        Unavailable => "UNAVAILABLE",
        InvalidArg => "INVALID_ARG",
        Internal => "INTERNAL",
        Unknown => "UNKNOWN",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Status {
    code: StatusCode,
    /// Backend-specific error number; zero when not applicable.
    #[serde(default, skip_serializing_if = "is_zero")]
    backend_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

fn is_zero(v: &i32) -> bool {
    *v == 0
}

impl Status {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn new(code: StatusCode) -> Self {
        Self {
            code,
            backend_code: 0,
            message: None,
        }
    }

    pub fn with_backend_code(code: StatusCode, backend_code: i32) -> Self {
        Self {
            code,
            backend_code,
            message: None,
        }
    }

    pub fn with_message(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            backend_code: 0,
            message: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::Ok
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn backend_code(&self) -> i32 {
        self.backend_code
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code)?;
        if self.backend_code != 0 {
            write!(f, " (backend={})", self.backend_code)?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
