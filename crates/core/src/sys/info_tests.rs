// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;

fn with_home(f: impl FnOnce(&std::path::Path)) {
    let temp = tempfile::tempdir().unwrap();
    std::env::set_var("AGIBOT_HOME", temp.path());
    f(temp.path());
    std::env::remove_var("AGIBOT_HOME");
}

#[test]
#[serial(agibot_env)]
fn missing_info_file_is_none() {
    with_home(|_| {
        assert_eq!(read_info(InfoKey::SerialNumber).unwrap(), None);
    });
}

#[test]
#[serial(agibot_env)]
fn info_file_is_trimmed() {
    with_home(|home| {
        let info_dir = home.join("agibot/data/info");
        std::fs::create_dir_all(&info_dir).unwrap();
        std::fs::write(info_dir.join("model"), "A2-W\n").unwrap();

        assert_eq!(read_info(InfoKey::Model).unwrap().as_deref(), Some("A2-W"));
    });
}

#[test]
#[serial(agibot_env)]
fn software_version_parses_semver() {
    with_home(|home| {
        let sw_dir = home.join("agibot/software/v0");
        std::fs::create_dir_all(&sw_dir).unwrap();
        std::fs::write(sw_dir.join("metadata.yaml"), "version: 1.4.0\n").unwrap();

        let version = software_version().unwrap().unwrap();
        assert_eq!(version, semver::Version::new(1, 4, 0));
    });
}

#[test]
#[serial(agibot_env)]
fn bad_software_version_is_a_parse_error() {
    with_home(|home| {
        let sw_dir = home.join("agibot/software/v0");
        std::fs::create_dir_all(&sw_dir).unwrap();
        std::fs::write(sw_dir.join("metadata.yaml"), "version: not-semver\n").unwrap();

        assert!(matches!(
            software_version().unwrap_err(),
            SysInfoError::Parse { .. }
        ));
    });
}
