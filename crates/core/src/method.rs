// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RPC method name wire format: `"<ser>:/<path>"`.
//!
//! The serialization prefix namespaces the method so incompatible wire types
//! may share a path without aliasing. A declared name lacking a leading slash
//! is normalized to carry one; a name lacking a prefix defaults to `pb`.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MethodNameError {
    #[error("unknown serialization prefix [{0}], expected pb or ros2")]
    UnknownPrefix(String),

    #[error("empty method path")]
    EmptyPath,
}

/// Serialization kind encoded in a method name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SerKind {
    #[default]
    Pb,
    Ros2,
}

crate::simple_display! {
    SerKind {
        Pb => "pb",
        Ros2 => "ros2",
    }
}

crate::parse_from_str! {
    SerKind, "serialization prefix" {
        Pb => "pb",
        Ros2 => "ros2",
    }
}

/// A normalized RPC method name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodName {
    ser: SerKind,
    path: String,
}

impl MethodName {
    /// Parse and normalize a declared method name.
    ///
    /// Accepted inputs: `"pb:/a/b"`, `"ros2:x"` (slash inserted), `"plain"`
    /// (defaults to `pb:/plain`).
    pub fn parse(declared: &str) -> Result<Self, MethodNameError> {
        let (ser, rest) = match declared.split_once(':') {
            Some((prefix, rest)) => {
                let ser = prefix
                    .parse::<SerKind>()
                    .map_err(|_| MethodNameError::UnknownPrefix(prefix.to_owned()))?;
                (ser, rest)
            }
            None => (SerKind::default(), declared),
        };

        if rest.is_empty() {
            return Err(MethodNameError::EmptyPath);
        }

        let path = if rest.starts_with('/') {
            rest.to_owned()
        } else {
            format!("/{rest}")
        };

        Ok(Self { ser, path })
    }

    pub fn ser(&self) -> SerKind {
        self.ser
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The full wire-format name, e.g. `pb:/ping`.
    pub fn full(&self) -> String {
        format!("{}:{}", self.ser, self.path)
    }
}

impl std::fmt::Display for MethodName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.ser, self.path)
    }
}

#[cfg(test)]
#[path = "method_tests.rs"]
mod tests;
