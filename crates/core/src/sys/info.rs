// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Readers for device info files and software metadata.

use std::path::PathBuf;

use semver::Version;
use serde::Deserialize;
use thiserror::Error;

use super::paths::{agibot_home, data_dir, DataKind};

#[derive(Debug, Error)]
pub enum SysInfoError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

/// Info files consumed from `data/info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoKey {
    SerialNumber,
    Name,
    Model,
    SocIndex,
}

crate::simple_display! {
    InfoKey {
        SerialNumber => "sn",
        Name => "name",
        Model => "model",
        SocIndex => "soc_index",
    }
}

/// Read one info file, trimmed. Missing files are not an error here; the
/// caller decides whether the key is mandatory.
pub fn read_info(key: InfoKey) -> Result<Option<String>, SysInfoError> {
    let path = data_dir(DataKind::Info).join(key.to_string());
    match std::fs::read_to_string(&path) {
        Ok(text) => Ok(Some(text.trim().to_owned())),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(SysInfoError::Read { path, source }),
    }
}

#[derive(Debug, Deserialize)]
struct SoftwareMetadata {
    version: String,
}

/// Parse `software/v0/metadata.yaml` and return its semver version field.
pub fn software_version() -> Result<Option<Version>, SysInfoError> {
    let path = agibot_home()
        .join("agibot")
        .join("software")
        .join("v0")
        .join("metadata.yaml");

    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(SysInfoError::Read { path, source }),
    };

    let metadata: SoftwareMetadata =
        serde_yaml::from_str(&text).map_err(|err| SysInfoError::Parse {
            path: path.clone(),
            reason: err.to_string(),
        })?;

    let version = Version::parse(metadata.version.trim()).map_err(|err| SysInfoError::Parse {
        path,
        reason: err.to_string(),
    })?;

    Ok(Some(version))
}

#[cfg(test)]
#[path = "info_tests.rs"]
mod tests;
