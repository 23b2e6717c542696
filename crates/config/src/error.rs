// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use thiserror::Error;

/// Configuration errors are fatal at startup; none of them are recoverable
/// per-message conditions.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read cfg file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse cfg file {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("effective cfg does not deserialize: {source}")]
    Shape { source: serde_yaml::Error },

    #[error("failed to write cfg dump {path}: {source}")]
    Dump {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unsupported cfg mode [{mode}] in {file}")]
    UnsupportedMode { mode: String, file: String },

    #[error("multiple define cfg mode [{mode}] in {file}")]
    DuplicateMode { mode: String, file: String },

    #[error("cfg modes 'delete', 'override', and 'skip' cannot be used together, correct it in {file}")]
    ConflictingModes { file: String },

    #[error("patch targets a non-existent cfg node [{name}] in {file}, maybe use !!new or !!new.never")]
    PatchTargetMissing { name: String, file: String },

    #[error("config [{name}] already exists, specify override, skip, or delete mode in {file}")]
    AmbiguousExisting { name: String, file: String },

    #[error("invalid cfg structure in {file}: {reason}")]
    Structure { reason: String, file: String },
}
